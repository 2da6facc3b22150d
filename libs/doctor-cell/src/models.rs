// libs/doctor-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveTime, Utc, Weekday};

// ==============================================================================
// DOCTOR MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub consultation_fee: f64,
    pub video_consultation_fee: Option<f64>,
    pub slot_duration_minutes: i32,
    pub is_accepting_appointments: bool,
    pub is_verified: bool,
    pub rating: RatingAggregate,
    pub availability: WeeklyAvailability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    /// Fee charged for a booking; video appointments use the video fee
    /// when one is configured and fall back to the standard fee otherwise.
    pub fn fee_for_video(&self, video: bool) -> f64 {
        if video {
            self.video_consultation_fee.unwrap_or(self.consultation_fee)
        } else {
            self.consultation_fee
        }
    }

    pub fn can_be_booked(&self) -> bool {
        self.is_verified && self.is_accepting_appointments
    }
}

/// Running rating aggregate. Mutated only through `RatingService`, which
/// applies the increment-and-reweight as one atomic storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub average: f64,
    pub count: i64,
}

impl Default for RatingAggregate {
    fn default() -> Self {
        Self { average: 0.0, count: 0 }
    }
}

impl RatingAggregate {
    /// Pure reweight used by the in-memory store and mirrored by the
    /// `record_doctor_rating` RPC on the PostgREST side.
    pub fn with_score(self, score: i32) -> Self {
        let count = self.count + 1;
        let average = (self.average * self.count as f64 + score as f64) / count as f64;
        Self {
            average: (average * 10.0).round() / 10.0,
            count,
        }
    }
}

// ==============================================================================
// WEEKLY AVAILABILITY TEMPLATE
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayAvailability {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub monday: DayAvailability,
    pub tuesday: DayAvailability,
    pub wednesday: DayAvailability,
    pub thursday: DayAvailability,
    pub friday: DayAvailability,
    pub saturday: DayAvailability,
    pub sunday: DayAvailability,
}

impl WeeklyAvailability {
    pub fn day(&self, weekday: Weekday) -> &DayAvailability {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn is_working_day(&self, weekday: Weekday) -> bool {
        self.day(weekday).is_available
    }

    /// Weekday template with 09:00-17:00 Monday through Friday.
    pub fn weekdays_nine_to_five() -> Self {
        let working = DayAvailability {
            start: NaiveTime::from_hms_opt(9, 0, 0),
            end: NaiveTime::from_hms_opt(17, 0, 0),
            is_available: true,
        };
        Self {
            monday: working.clone(),
            tuesday: working.clone(),
            wednesday: working.clone(),
            thursday: working.clone(),
            friday: working,
            saturday: DayAvailability::default(),
            sunday: DayAvailability::default(),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAcceptingRequest {
    pub is_accepting_appointments: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reweight_rounds_to_one_decimal() {
        let agg = RatingAggregate { average: 4.5, count: 2 };
        let next = agg.with_score(4);
        assert_eq!(next.count, 3);
        // (4.5*2 + 4) / 3 = 4.333...
        assert_eq!(next.average, 4.3);
    }

    #[test]
    fn video_fee_falls_back_to_standard() {
        let mut doctor = test_doctor();
        doctor.consultation_fee = 150.0;
        doctor.video_consultation_fee = None;
        assert_eq!(doctor.fee_for_video(true), 150.0);

        doctor.video_consultation_fee = Some(120.0);
        assert_eq!(doctor.fee_for_video(true), 120.0);
        assert_eq!(doctor.fee_for_video(false), 150.0);
    }

    fn test_doctor() -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            specialization: "General Practice".to_string(),
            consultation_fee: 100.0,
            video_consultation_fee: None,
            slot_duration_minutes: 30,
            is_accepting_appointments: true,
            is_verified: true,
            rating: RatingAggregate::default(),
            availability: WeeklyAvailability::weekdays_nine_to_five(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
