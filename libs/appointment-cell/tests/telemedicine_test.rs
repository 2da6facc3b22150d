mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus, AppointmentType};
use appointment_cell::store::AppointmentStore;

use common::{doctor_user, patient_user, TestWorld};

#[tokio::test]
async fn join_inside_window_creates_room_and_issues_tokens() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, Some(120.0)).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    // Starts in 5 minutes, well inside the -10/+30 window.
    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::Video,
        world.held_payment(120.0).await, 5,
    ).await;

    let service = world.telemedicine();

    let patient_join = service.join(appointment.id, &patient_user(patient_id)).await.unwrap();
    assert!(!patient_join.is_host);

    let doctor_join = service.join(appointment.id, &doctor_user(&doctor)).await.unwrap();
    assert!(doctor_join.is_host);
    assert_eq!(patient_join.room_url, doctor_join.room_url);

    let persisted = world.appointments.fetch(appointment.id).await.unwrap().unwrap();
    assert!(persisted.video_session.room_name.is_some());
}

#[tokio::test]
async fn join_outside_window_is_rejected() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, Some(120.0)).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    // Starts in 2 hours.
    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::Video,
        world.held_payment(120.0).await, 120,
    ).await;

    assert_matches!(
        world.telemedicine().join(appointment.id, &patient_user(patient_id)).await,
        Err(AppointmentError::VideoUnavailable(_))
    );
    assert!(!world.video.room_exists(&format!("appt-{}", appointment.id.simple())).await);
}

#[tokio::test]
async fn join_requires_video_type_and_participation() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let in_person = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        world.held_payment(150.0).await, 5,
    ).await;

    assert_matches!(
        world.telemedicine().join(in_person.id, &patient_user(patient_id)).await,
        Err(AppointmentError::VideoUnavailable(_))
    );

    let other_slot = world.seed_slot(doctor.id, 1).await;
    let video = world.seed_appointment(
        Uuid::new_v4(), doctor.id, &other_slot,
        AppointmentStatus::Confirmed, AppointmentType::Video,
        world.held_payment(150.0).await, 5,
    ).await;

    assert_matches!(
        world.telemedicine().join(video.id, &patient_user(Uuid::new_v4())).await,
        Err(AppointmentError::NotAuthorized)
    );
}

#[tokio::test]
async fn doctor_starts_and_ends_the_session() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, Some(120.0)).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::Video,
        world.held_payment(120.0).await, 5,
    ).await;

    let service = world.telemedicine();

    // Patients cannot drive the session state.
    assert_matches!(
        service.start_session(appointment.id, &patient_user(patient_id)).await,
        Err(AppointmentError::NotAuthorized)
    );

    let doctor_caller = doctor_user(&doctor);
    service.join(appointment.id, &doctor_caller).await.unwrap();

    let started = service.start_session(appointment.id, &doctor_caller).await.unwrap();
    assert_eq!(started.status, AppointmentStatus::InProgress);
    assert!(started.video_session.started_at.is_some());

    // Starting twice is an invalid transition.
    assert_matches!(
        service.start_session(appointment.id, &doctor_caller).await,
        Err(AppointmentError::InvalidTransition(AppointmentStatus::InProgress))
    );

    let ended = service.end_session(appointment.id, &doctor_caller).await.unwrap();
    assert!(ended.video_session.ended_at.is_some());
    assert!(ended.video_session.duration_seconds.is_some());
    assert!(!world.video.room_exists(&format!("appt-{}", appointment.id.simple())).await);
}

#[tokio::test]
async fn completing_a_video_appointment_tears_the_room_down() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, Some(120.0)).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::Video,
        world.held_payment(120.0).await, 5,
    ).await;

    let doctor_caller = doctor_user(&doctor);
    world.telemedicine().join(appointment.id, &doctor_caller).await.unwrap();
    world.telemedicine().start_session(appointment.id, &doctor_caller).await.unwrap();

    let completed = world.lifecycle().complete(appointment.id, &doctor_caller).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert!(completed.video_session.ended_at.is_some());
    assert!(!world.video.room_exists(&format!("appt-{}", appointment.id.simple())).await);
}
