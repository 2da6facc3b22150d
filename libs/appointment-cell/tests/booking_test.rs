mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, AppointmentType, BookAppointmentRequest, PaymentStatus,
};
use appointment_cell::services::BookingCoordinator;
use doctor_cell::store::DoctorStore;
use notification_cell::dispatch::NotificationDispatcher;
use slot_cell::models::{Slot, SlotError};
use slot_cell::store::{InMemorySlotStore, SlotStore};

use common::{patient_user, TestWorld};

fn book_request(doctor_id: Uuid, slot_id: Uuid, appointment_type: AppointmentType) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        slot_id,
        appointment_type,
        reason: "Persistent headaches".to_string(),
        symptoms: vec!["headache".to_string()],
    }
}

#[tokio::test]
async fn successful_booking_commits_slot_and_persists_appointment() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, Some(120.0)).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let appointment = world.coordinator()
        .book(patient_id, book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.payment.status, PaymentStatus::Pending);
    assert!(appointment.payment.external_reference.is_some());
    assert_eq!(appointment.date, slot.date);
    assert_eq!(appointment.start_time, slot.start_time);

    let slot = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert_eq!(slot.booked_count, 1);
    assert!(slot.lock.is_none());
}

#[tokio::test]
async fn video_booking_uses_video_fee() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, Some(120.0)).await;
    let video_slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let video = world.coordinator()
        .book(patient_id, book_request(doctor.id, video_slot.id, AppointmentType::Video))
        .await
        .unwrap();
    assert_eq!(video.payment.amount, 120.0);

    let in_person_slot = world.seed_slot(doctor.id, 1).await;
    let in_person = world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, in_person_slot.id, AppointmentType::InPerson))
        .await
        .unwrap();
    assert_eq!(in_person.payment.amount, 150.0);
}

#[tokio::test]
async fn video_fee_falls_back_to_standard_fee() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;

    let appointment = world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::Video))
        .await
        .unwrap();
    assert_eq!(appointment.payment.amount, 150.0);
}

#[tokio::test]
async fn doctor_not_accepting_is_rejected_before_any_reservation() {
    let world = TestWorld::new();
    let mut doctor = world.seed_doctor(150.0, None).await;
    doctor.is_accepting_appointments = false;
    world.doctors.insert(doctor.clone()).await;
    let slot = world.seed_slot(doctor.id, 1).await;

    let result = world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorUnavailable));
    let slot = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert!(slot.lock.is_none());
}

#[tokio::test]
async fn locked_slot_fails_fast_without_retry() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;

    world.slots.try_acquire(slot.id, Uuid::new_v4(), Duration::minutes(5)).await.unwrap();

    let result = world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn slot_of_another_doctor_is_rejected_and_lock_released() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let other_doctor = world.seed_doctor(90.0, None).await;
    let slot = world.seed_slot(other_doctor.id, 1).await;

    let result = world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
    let slot = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert!(slot.lock.is_none());
}

#[tokio::test]
async fn payment_failure_releases_lock_and_persists_nothing() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    world.payments.fail_authorizations(true);

    let result = world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await;

    assert_matches!(result, Err(AppointmentError::PaymentAuthorizationFailed(_)));
    assert_eq!(world.appointments.count().await, 0);

    let slot = world.slots.fetch(slot.id).await.unwrap().unwrap();
    assert!(slot.lock.is_none());
    assert_eq!(slot.booked_count, 0);

    // The slot is immediately bookable again.
    world.payments.fail_authorizations(false);
    world.coordinator()
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await
        .unwrap();
}

/// Slot store whose commit always fails, to drive the deepest
/// compensation path.
struct CommitFailingSlotStore {
    inner: InMemorySlotStore,
}

#[async_trait]
impl SlotStore for CommitFailingSlotStore {
    async fn fetch(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError> {
        self.inner.fetch(slot_id).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<Slot>, SlotError> {
        self.inner.list_for_doctor(doctor_id, from, to).await
    }

    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError> {
        self.inner.insert(slot).await
    }

    async fn delete(&self, slot_id: Uuid) -> Result<(), SlotError> {
        self.inner.delete(slot_id).await
    }

    async fn set_blocked(&self, slot_id: Uuid, blocked: bool, reason: Option<String>) -> Result<Slot, SlotError> {
        self.inner.set_blocked(slot_id, blocked, reason).await
    }

    async fn try_acquire(&self, slot_id: Uuid, holder_id: Uuid, lease: Duration) -> Result<Option<Slot>, SlotError> {
        self.inner.try_acquire(slot_id, holder_id, lease).await
    }

    async fn commit(&self, _slot_id: Uuid, _holder_id: Uuid) -> Result<Slot, SlotError> {
        Err(SlotError::DatabaseError("simulated commit failure".to_string()))
    }

    async fn release_lock(&self, slot_id: Uuid, holder_id: Uuid) -> Result<(), SlotError> {
        self.inner.release_lock(slot_id, holder_id).await
    }

    async fn release_capacity(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        self.inner.release_capacity(slot_id).await
    }

    async fn expire_stale_locks(&self, now: DateTime<Utc>) -> Result<usize, SlotError> {
        self.inner.expire_stale_locks(now).await
    }
}

#[tokio::test]
async fn commit_failure_rolls_back_appointment_and_hold() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;

    let failing = Arc::new(CommitFailingSlotStore { inner: InMemorySlotStore::new() });
    let now = Utc::now();
    let slot = Slot {
        id: Uuid::new_v4(),
        doctor_id: doctor.id,
        date: (now + Duration::days(1)).date_naive(),
        start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        max_capacity: 1,
        booked_count: 0,
        is_available: true,
        blocked: false,
        blocked_reason: None,
        lock: None,
        created_at: now,
        updated_at: now,
    };
    failing.insert(slot.clone()).await.unwrap();

    let coordinator = BookingCoordinator::with_parts(
        world.doctors.clone(),
        failing.clone(),
        world.appointments.clone(),
        world.payments.clone(),
        NotificationDispatcher::with_notifier(world.notifier.clone()),
    );

    let result = coordinator
        .book(Uuid::new_v4(), book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
    assert_eq!(world.appointments.count().await, 0);

    let slot = failing.fetch(slot.id).await.unwrap().unwrap();
    assert!(slot.lock.is_none());
    assert_eq!(slot.booked_count, 0);
}

#[tokio::test]
async fn confirm_payment_moves_to_confirmed_exactly_once() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let coordinator = world.coordinator();
    let appointment = coordinator
        .book(patient_id, book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await
        .unwrap();

    let user = patient_user(patient_id);
    let confirmed = coordinator.confirm_payment(appointment.id, &user).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    assert_eq!(confirmed.payment.status, PaymentStatus::Held);

    // A webhook replay or a double-submit gets a deterministic rejection.
    assert_matches!(
        coordinator.confirm_payment(appointment.id, &user).await,
        Err(AppointmentError::AlreadyProcessed)
    );
}

#[tokio::test]
async fn confirm_payment_is_owner_only() {
    let world = TestWorld::new();
    let doctor = world.seed_doctor(150.0, None).await;
    let slot = world.seed_slot(doctor.id, 1).await;
    let patient_id = Uuid::new_v4();

    let coordinator = world.coordinator();
    let appointment = coordinator
        .book(patient_id, book_request(doctor.id, slot.id, AppointmentType::InPerson))
        .await
        .unwrap();

    let stranger = patient_user(Uuid::new_v4());
    assert_matches!(
        coordinator.confirm_payment(appointment.id, &stranger).await,
        Err(AppointmentError::NotAuthorized)
    );
}
