mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::{Actor, AppointmentError, AppointmentStatus, LifecycleEvent};

use common::{monday, Clinic};

#[derive(Debug, Clone, Copy)]
enum Who {
    Owner,
    OtherOwner,
    Doctor,
    OtherDoctor,
    Admin,
}

fn actor(clinic: &Clinic, who: Who) -> Actor {
    match who {
        Who::Owner => clinic.owner(),
        Who::OtherOwner => Actor::PetOwner { owner_id: Uuid::new_v4() },
        Who::Doctor => clinic.doctor(),
        Who::OtherDoctor => Actor::Doctor { doctor_id: Uuid::new_v4() },
        Who::Admin => Actor::Admin,
    }
}

/// Books a fresh appointment and drives it into `status` as admin.
async fn appointment_in(clinic: &Clinic, status: AppointmentStatus, hour: u32) -> Uuid {
    let id = clinic.book(monday(hour, 0), 30).await.appointment.id;

    let path: &[LifecycleEvent] = match status {
        AppointmentStatus::Pending => &[],
        AppointmentStatus::Approved => &[LifecycleEvent::Approve],
        AppointmentStatus::Rejected => &[LifecycleEvent::Reject],
        AppointmentStatus::Completed => &[LifecycleEvent::Approve, LifecycleEvent::Complete],
        AppointmentStatus::Cancelled => &[LifecycleEvent::Cancel],
    };
    for event in path {
        clinic.scheduler.transition(&Actor::Admin, id, *event).await.unwrap();
    }
    id
}

#[tokio::test]
async fn permission_table() {
    use AppointmentStatus::*;
    use LifecycleEvent::*;

    // (from, event, actor, expected status or None for Forbidden)
    let allowed = [
        (Pending, Approve, Who::Doctor, Some(Approved)),
        (Pending, Approve, Who::Admin, Some(Approved)),
        (Pending, Approve, Who::Owner, None),
        (Pending, Reject, Who::Doctor, Some(Rejected)),
        (Pending, Reject, Who::Owner, None),
        (Pending, Cancel, Who::Owner, Some(Cancelled)),
        (Pending, Cancel, Who::Admin, Some(Cancelled)),
        (Pending, Cancel, Who::Doctor, None),
        (Approved, Complete, Who::Doctor, Some(Completed)),
        (Approved, Complete, Who::Owner, None),
        (Approved, Cancel, Who::Admin, Some(Cancelled)),
        (Approved, Cancel, Who::Owner, None),
        (Approved, Cancel, Who::Doctor, None),
    ];

    let clinic = Clinic::new().await;
    for (i, (from, event, who, expected)) in allowed.into_iter().enumerate() {
        let id = appointment_in(&clinic, from, 9 + (i as u32 % 8)).await;
        let result = clinic.scheduler.transition(&actor(&clinic, who), id, event).await;

        match expected {
            Some(to) => assert_eq!(result.unwrap().appointment.status, to, "{from} --{event}--> by {who:?}"),
            None => assert_matches!(result, Err(AppointmentError::Forbidden(_)), "{from} --{event}--> by {who:?}"),
        }

        // Keep the day free for the next row.
        clinic.scheduler.delete(id).await.unwrap();
    }
}

#[tokio::test]
async fn terminal_states_reject_every_event() {
    let clinic = Clinic::new().await;

    for (hour, status) in [
        (9, AppointmentStatus::Rejected),
        (10, AppointmentStatus::Completed),
        (11, AppointmentStatus::Cancelled),
    ] {
        let id = appointment_in(&clinic, status, hour).await;
        for event in [
            LifecycleEvent::Approve,
            LifecycleEvent::Reject,
            LifecycleEvent::Cancel,
            LifecycleEvent::Complete,
        ] {
            assert_matches!(
                clinic.scheduler.transition(&Actor::Admin, id, event).await,
                Err(AppointmentError::InvalidTransition { from, .. }) if from == status
            );
        }
    }
}

#[tokio::test]
async fn unrelated_actor_is_forbidden_before_transition_check() {
    let clinic = Clinic::new().await;
    let id = appointment_in(&clinic, AppointmentStatus::Completed, 10).await;

    // No edge exists, but strangers learn nothing about the state.
    assert_matches!(
        clinic.scheduler.transition(&actor(&clinic, Who::OtherDoctor), id, LifecycleEvent::Approve).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        clinic.scheduler.transition(&actor(&clinic, Who::OtherOwner), id, LifecycleEvent::Cancel).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        clinic.scheduler.transition(&clinic.doctor(), id, LifecycleEvent::Approve).await,
        Err(AppointmentError::InvalidTransition { .. })
    );
}

#[tokio::test]
async fn missing_appointment_is_not_found_first() {
    let clinic = Clinic::new().await;
    let stranger = Actor::PetOwner { owner_id: Uuid::new_v4() };

    assert_matches!(
        clinic.scheduler.transition(&stranger, Uuid::new_v4(), LifecycleEvent::Cancel).await,
        Err(AppointmentError::NotFound { .. })
    );
}
