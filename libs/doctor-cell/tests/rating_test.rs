use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorError, RatingAggregate, WeeklyAvailability};
use doctor_cell::services::RatingService;
use doctor_cell::store::{DoctorStore, InMemoryDoctorStore};

fn test_doctor() -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        specialization: "General Practice".to_string(),
        consultation_fee: 150.0,
        video_consultation_fee: Some(120.0),
        slot_duration_minutes: 30,
        is_accepting_appointments: true,
        is_verified: true,
        rating: RatingAggregate::default(),
        availability: WeeklyAvailability::weekdays_nine_to_five(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn record_rating_updates_aggregate() {
    let store = Arc::new(InMemoryDoctorStore::new());
    let doctor = test_doctor();
    let doctor_id = doctor.id;
    store.insert(doctor).await;

    let service = RatingService::with_store(store.clone());

    let aggregate = service.record_rating(doctor_id, 5).await.unwrap();
    assert_eq!(aggregate.average, 5.0);
    assert_eq!(aggregate.count, 1);

    let aggregate = service.record_rating(doctor_id, 4).await.unwrap();
    assert_eq!(aggregate.average, 4.5);
    assert_eq!(aggregate.count, 2);
}

#[tokio::test]
async fn rating_out_of_range_is_rejected() {
    let store = Arc::new(InMemoryDoctorStore::new());
    let doctor = test_doctor();
    let doctor_id = doctor.id;
    store.insert(doctor).await;

    let service = RatingService::with_store(store);

    assert_matches!(service.record_rating(doctor_id, 0).await, Err(DoctorError::InvalidRating));
    assert_matches!(service.record_rating(doctor_id, 6).await, Err(DoctorError::InvalidRating));
}

#[tokio::test]
async fn rating_unknown_doctor_is_not_found() {
    let store = Arc::new(InMemoryDoctorStore::new());
    let service = RatingService::with_store(store);

    assert_matches!(service.record_rating(Uuid::new_v4(), 5).await, Err(DoctorError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ratings_compose_associatively() {
    let store = Arc::new(InMemoryDoctorStore::new());
    let doctor = test_doctor();
    let doctor_id = doctor.id;
    store.insert(doctor).await;

    // [5, 5, 5, 1] in any interleaving must land on average 4.0, count 4.
    let mut handles = Vec::new();
    for score in [5, 5, 5, 1] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let service = RatingService::with_store(store);
            service.record_rating(doctor_id, score).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let doctor = store.fetch(doctor_id).await.unwrap().unwrap();
    assert_eq!(doctor.rating.count, 4);
    assert_eq!(doctor.rating.average, 4.0);
}
