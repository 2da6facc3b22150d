mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, AppointmentType, CancelledBy, PaymentStatus,
    RateAppointmentRequest,
};
use payment_cell::models::HoldStatus;
use slot_cell::store::SlotStore;

use common::{admin_user, doctor_user, patient_user, pending_payment, TestWorld};

#[tokio::test]
async fn complete_captures_held_payment() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();
    let payment = world.held_payment(150.0).await;
    let reference = payment.external_reference.clone().unwrap();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        payment, 60,
    ).await;

    let completed = world.lifecycle()
        .complete(appointment.id, &doctor_user(&doctor))
        .await
        .unwrap();

    assert_eq!(completed.status, AppointmentStatus::Completed);
    assert_eq!(completed.payment.status, PaymentStatus::Captured);
    assert!(completed.payment.paid_at.is_some());
    assert_eq!(world.payments.hold_status(&reference).await, Some(HoldStatus::Captured));
}

#[tokio::test]
async fn complete_on_pending_is_invalid_and_leaves_payment_alone() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;

    let appointment = world.seed_appointment(
        Uuid::new_v4(), doctor.id, &slot,
        AppointmentStatus::Pending, AppointmentType::InPerson,
        pending_payment(150.0), 60,
    ).await;

    let result = world.lifecycle()
        .complete(appointment.id, &doctor_user(&doctor))
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTransition(AppointmentStatus::Pending)));

    use appointment_cell::store::AppointmentStore;
    let current = world.appointments.fetch(appointment.id).await.unwrap().unwrap();
    assert_eq!(current.status, AppointmentStatus::Pending);
    assert_eq!(current.payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn complete_is_doctor_only() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        world.held_payment(150.0).await, 60,
    ).await;

    assert_matches!(
        world.lifecycle().complete(appointment.id, &patient_user(patient_id)).await,
        Err(AppointmentError::NotAuthorized)
    );
}

#[tokio::test]
async fn cancel_refunds_hold_and_restores_capacity_exactly_once() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();
    let payment = world.held_payment(150.0).await;
    let reference = payment.external_reference.clone().unwrap();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        payment, 60,
    ).await;

    let booked = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert_eq!(booked.booked_count, 1);

    let user = patient_user(patient_id);
    let cancelled = world.lifecycle()
        .cancel(appointment.id, &user, Some("Feeling better".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.payment.status, PaymentStatus::Refunded);
    assert!(cancelled.payment.refunded_at.is_some());
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Patient));
    assert_eq!(world.payments.hold_status(&reference).await, Some(HoldStatus::Cancelled));

    let restored = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert_eq!(restored.booked_count, 0);
    assert!(restored.is_available);

    // Second cancel hits the terminal state; no double release.
    assert_matches!(
        world.lifecycle().cancel(appointment.id, &user, None).await,
        Err(AppointmentError::InvalidTransition(AppointmentStatus::Cancelled))
    );
    let after = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert_eq!(after.booked_count, 0);
}

#[tokio::test]
async fn cancel_with_pending_payment_leaves_it_pending() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Pending, AppointmentType::InPerson,
        pending_payment(150.0), 60,
    ).await;

    let cancelled = world.lifecycle()
        .cancel(appointment.id, &patient_user(patient_id), None)
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.payment.status, PaymentStatus::Pending);
    assert!(cancelled.payment.refunded_at.is_none());
}

#[tokio::test]
async fn cancel_is_limited_to_participants() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;

    let appointment = world.seed_appointment(
        Uuid::new_v4(), doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        world.held_payment(150.0).await, 60,
    ).await;

    assert_matches!(
        world.lifecycle().cancel(appointment.id, &patient_user(Uuid::new_v4()), None).await,
        Err(AppointmentError::NotAuthorized)
    );

    // Admin cancels on behalf of the clinic.
    let cancelled = world.lifecycle()
        .cancel(appointment.id, &admin_user(), None)
        .await
        .unwrap();
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Admin));
}

#[tokio::test]
async fn no_show_only_from_confirmed() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;

    let appointment = world.seed_appointment(
        Uuid::new_v4(), doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        world.held_payment(150.0).await, -10,
    ).await;

    let marked = world.lifecycle()
        .mark_no_show(appointment.id, &doctor_user(&doctor))
        .await
        .unwrap();
    assert_eq!(marked.status, AppointmentStatus::NoShow);

    // Terminal now.
    assert_matches!(
        world.lifecycle().mark_no_show(appointment.id, &doctor_user(&doctor)).await,
        Err(AppointmentError::InvalidTransition(AppointmentStatus::NoShow))
    );
}

#[tokio::test]
async fn rating_requires_completion_and_ownership_and_happens_once() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let appointment = world.seed_appointment(
        patient_id, doctor.id, &slot,
        AppointmentStatus::Confirmed, AppointmentType::InPerson,
        world.held_payment(150.0).await, -40,
    ).await;

    let user = patient_user(patient_id);
    let request = RateAppointmentRequest { score: 5, review: Some("Great visit".to_string()) };

    // Not completed yet.
    assert_matches!(
        world.lifecycle().rate(appointment.id, &user, request.clone()).await,
        Err(AppointmentError::InvalidTransition(AppointmentStatus::Confirmed))
    );

    world.lifecycle().complete(appointment.id, &doctor_user(&doctor)).await.unwrap();

    // Only the owning patient may rate.
    assert_matches!(
        world.lifecycle().rate(appointment.id, &patient_user(Uuid::new_v4()), request.clone()).await,
        Err(AppointmentError::NotAuthorized)
    );

    // Score is validated before anything is written.
    assert_matches!(
        world.lifecycle().rate(appointment.id, &user, RateAppointmentRequest { score: 6, review: None }).await,
        Err(AppointmentError::InvalidRating)
    );

    let rated = world.lifecycle().rate(appointment.id, &user, request.clone()).await.unwrap();
    assert_eq!(rated.rating.as_ref().unwrap().score, 5);

    // The doctor's aggregate moved with it.
    use doctor_cell::store::DoctorStore;
    let doctor = world.doctors.fetch(doctor.id).await.unwrap().unwrap();
    assert_eq!(doctor.rating.count, 1);
    assert_eq!(doctor.rating.average, 5.0);

    assert_matches!(
        world.lifecycle().rate(appointment.id, &user, request).await,
        Err(AppointmentError::AlreadyRated)
    );
}
