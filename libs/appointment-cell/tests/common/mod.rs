#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentStatus, AppointmentType, PaymentInfo, PaymentStatus, VideoSession,
};
use appointment_cell::services::{
    AppointmentLifecycleService, BookingCoordinator, TelemedicineService,
};
use appointment_cell::store::InMemoryAppointmentStore;
use doctor_cell::models::{Doctor, RatingAggregate, WeeklyAvailability};
use doctor_cell::store::InMemoryDoctorStore;
use notification_cell::dispatch::NotificationDispatcher;
use notification_cell::notifier::RecordingNotifier;
use payment_cell::gateway::InMemoryPaymentGateway;
use shared_models::auth::User;
use slot_cell::models::Slot;
use slot_cell::store::{InMemorySlotStore, SlotStore};
use video_cell::provider::InMemoryVideoProvider;

/// Everything a booking flows through, backed in memory.
pub struct TestWorld {
    pub doctors: Arc<InMemoryDoctorStore>,
    pub slots: Arc<InMemorySlotStore>,
    pub appointments: Arc<InMemoryAppointmentStore>,
    pub payments: Arc<InMemoryPaymentGateway>,
    pub video: Arc<InMemoryVideoProvider>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            doctors: Arc::new(InMemoryDoctorStore::new()),
            slots: Arc::new(InMemorySlotStore::new()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            payments: Arc::new(InMemoryPaymentGateway::new()),
            video: Arc::new(InMemoryVideoProvider::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    pub fn coordinator(&self) -> BookingCoordinator {
        BookingCoordinator::with_parts(
            self.doctors.clone(),
            self.slots.clone(),
            self.appointments.clone(),
            self.payments.clone(),
            NotificationDispatcher::with_notifier(self.notifier.clone()),
        )
    }

    pub fn lifecycle(&self) -> AppointmentLifecycleService {
        AppointmentLifecycleService::with_parts(
            self.doctors.clone(),
            self.slots.clone(),
            self.appointments.clone(),
            self.payments.clone(),
            self.video.clone(),
            NotificationDispatcher::with_notifier(self.notifier.clone()),
        )
    }

    pub fn telemedicine(&self) -> TelemedicineService {
        TelemedicineService::with_parts(
            self.doctors.clone(),
            self.appointments.clone(),
            self.video.clone(),
        )
    }

    pub async fn seed_doctor(&self, fee: f64, video_fee: Option<f64>) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            specialization: "General Practice".to_string(),
            consultation_fee: fee,
            video_consultation_fee: video_fee,
            slot_duration_minutes: 30,
            is_accepting_appointments: true,
            is_verified: true,
            rating: RatingAggregate::default(),
            availability: WeeklyAvailability::weekdays_nine_to_five(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.doctors.insert(doctor.clone()).await;
        doctor
    }

    pub async fn seed_slot(&self, doctor_id: Uuid, capacity: i32) -> Slot {
        // Each call gets a distinct start time so repeated seeding for the
        // same doctor never trips the store's duplicate-slot check.
        static SLOT_SEQ: std::sync::atomic::AtomicI64 = std::sync::atomic::AtomicI64::new(0);
        let seq = SLOT_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let start_time = chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap()
            + Duration::minutes((seq % 28) * 30);
        let now = Utc::now();
        let slot = Slot {
            id: Uuid::new_v4(),
            doctor_id,
            date: (now + Duration::days(1)).date_naive(),
            start_time,
            end_time: start_time + Duration::minutes(30),
            max_capacity: capacity,
            booked_count: 0,
            is_available: true,
            blocked: false,
            blocked_reason: None,
            lock: None,
            created_at: now,
            updated_at: now,
        };
        self.slots.insert(slot.clone()).await.unwrap();
        slot
    }

    /// A payment hold that really exists at the gateway, so capture and
    /// refund flows behave.
    pub async fn held_payment(&self, amount: f64) -> PaymentInfo {
        use payment_cell::gateway::PaymentGateway;
        use payment_cell::models::to_cents;

        let hold = self.payments
            .authorize_hold(to_cents(amount), "usd", "seeded")
            .await
            .unwrap();
        PaymentInfo {
            status: PaymentStatus::Held,
            amount,
            currency: "usd".to_string(),
            external_reference: Some(hold.id),
            paid_at: None,
            refunded_at: None,
        }
    }

    /// Seed an appointment directly, bypassing the booking saga. The slot
    /// is committed to match, preserving the ledger invariant.
    pub async fn seed_appointment(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        slot: &Slot,
        status: AppointmentStatus,
        appointment_type: AppointmentType,
        payment: PaymentInfo,
        minutes_from_now: i64,
    ) -> Appointment {
        use appointment_cell::store::AppointmentStore;

        let holder = patient_id;
        self.slots.try_acquire(slot.id, holder, Duration::minutes(5)).await.unwrap();
        self.slots.commit(slot.id, holder).await.unwrap();

        let start = Utc::now() + Duration::minutes(minutes_from_now);
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            slot_id: slot.id,
            date: start.date_naive(),
            start_time: start.time(),
            end_time: (start + Duration::minutes(30)).time(),
            appointment_type,
            status,
            reason: "Checkup".to_string(),
            symptoms: vec![],
            payment,
            video_session: VideoSession::default(),
            prescription_id: None,
            rating: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        self.appointments.insert(appointment.clone()).await.unwrap();
        appointment
    }
}

pub fn pending_payment(amount: f64) -> PaymentInfo {
    PaymentInfo {
        status: PaymentStatus::Pending,
        amount,
        currency: "usd".to_string(),
        external_reference: None,
        paid_at: None,
        refunded_at: None,
    }
}

pub fn patient_user(patient_id: Uuid) -> User {
    User {
        id: patient_id.to_string(),
        email: Some("patient@example.com".to_string()),
        role: Some("patient".to_string()),
        metadata: None,
        created_at: None,
    }
}

pub fn doctor_user(doctor: &Doctor) -> User {
    User {
        id: doctor.user_id.to_string(),
        email: Some("doctor@example.com".to_string()),
        role: Some("doctor".to_string()),
        metadata: None,
        created_at: None,
    }
}

pub fn admin_user() -> User {
    User {
        id: Uuid::new_v4().to_string(),
        email: Some("admin@example.com".to_string()),
        role: Some("admin".to_string()),
        metadata: None,
        created_at: None,
    }
}
