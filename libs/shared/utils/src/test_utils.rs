use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            stripe_secret_key: "sk_test_123".to_string(),
            daily_api_key: "test-daily-key".to_string(),
            daily_base_url: "http://localhost:54322".to_string(),
            notification_webhook_url: String::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}.{}", header_encoded, payload_encoded, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }
}

/// Canned PostgREST row payloads used by wiremock-backed handler tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_response(doctor_id: &str, fee: f64, video_fee: Option<f64>) -> Value {
        Self::doctor_response_for_user(doctor_id, &Uuid::new_v4().to_string(), fee, video_fee)
    }

    pub fn doctor_response_for_user(doctor_id: &str, user_id: &str, fee: f64, video_fee: Option<f64>) -> Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "specialization": "General Practice",
            "consultation_fee": fee,
            "video_consultation_fee": video_fee,
            "slot_duration_minutes": 30,
            "is_accepting_appointments": true,
            "is_verified": true,
            "rating": { "average": 0.0, "count": 0 },
            "availability": {
                "monday":    { "start": "09:00:00", "end": "17:00:00", "is_available": true },
                "tuesday":   { "start": "09:00:00", "end": "17:00:00", "is_available": true },
                "wednesday": { "start": "09:00:00", "end": "17:00:00", "is_available": true },
                "thursday":  { "start": "09:00:00", "end": "17:00:00", "is_available": true },
                "friday":    { "start": "09:00:00", "end": "17:00:00", "is_available": true },
                "saturday":  { "start": null, "end": null, "is_available": false },
                "sunday":    { "start": null, "end": null, "is_available": false }
            },
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn slot_response(slot_id: &str, doctor_id: &str, date: &str) -> Value {
        json!({
            "id": slot_id,
            "doctor_id": doctor_id,
            "date": date,
            "start_time": "10:00:00",
            "end_time": "10:30:00",
            "max_capacity": 1,
            "booked_count": 0,
            "is_available": true,
            "blocked": false,
            "blocked_reason": null,
            "lock": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn appointment_response(appointment_id: &str, patient_id: &str, doctor_id: &str, slot_id: &str) -> Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "slot_id": slot_id,
            "date": "2026-09-01",
            "start_time": "10:00:00",
            "end_time": "10:30:00",
            "appointment_type": "in_person",
            "status": "pending",
            "reason": "checkup",
            "symptoms": [],
            "payment": {
                "status": "pending",
                "amount": 150.0,
                "currency": "usd",
                "external_reference": "pi_test_123",
                "paid_at": null,
                "refunded_at": null
            },
            "video_session": {},
            "prescription_id": null,
            "rating": null,
            "cancelled_by": null,
            "cancellation_reason": null,
            "cancelled_at": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }
}
