// libs/appointment-cell/src/services/lifecycle.rs
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    Actor, ActorRole, Appointment, AppointmentError, AppointmentStatus, LifecycleEvent,
};

#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub from: AppointmentStatus,
    pub event: LifecycleEvent,
    pub to: AppointmentStatus,
    pub allowed: &'static [ActorRole],
}

/// Every legal status change. Terminal states have no outgoing edges.
pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: AppointmentStatus::Pending,
        event: LifecycleEvent::Approve,
        to: AppointmentStatus::Approved,
        allowed: &[ActorRole::Doctor, ActorRole::Admin],
    },
    Transition {
        from: AppointmentStatus::Pending,
        event: LifecycleEvent::Reject,
        to: AppointmentStatus::Rejected,
        allowed: &[ActorRole::Doctor, ActorRole::Admin],
    },
    Transition {
        from: AppointmentStatus::Pending,
        event: LifecycleEvent::Cancel,
        to: AppointmentStatus::Cancelled,
        allowed: &[ActorRole::PetOwner, ActorRole::Admin],
    },
    Transition {
        from: AppointmentStatus::Approved,
        event: LifecycleEvent::Complete,
        to: AppointmentStatus::Completed,
        allowed: &[ActorRole::Doctor, ActorRole::Admin],
    },
    // Owners lose the right to cancel once the doctor has approved.
    Transition {
        from: AppointmentStatus::Approved,
        event: LifecycleEvent::Cancel,
        to: AppointmentStatus::Cancelled,
        allowed: &[ActorRole::Admin],
    },
];

/// Appointment state machine plus who may drive it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_status(&self) -> AppointmentStatus {
        AppointmentStatus::Pending
    }

    pub fn edge(&self, from: AppointmentStatus, event: LifecycleEvent) -> Option<&'static Transition> {
        TRANSITIONS.iter().find(|t| t.from == from && t.event == event)
    }

    /// Target status, ignoring who asks.
    pub fn next_status(
        &self,
        from: AppointmentStatus,
        event: LifecycleEvent,
    ) -> Result<AppointmentStatus, AppointmentError> {
        self.edge(from, event)
            .map(|t| t.to)
            .ok_or(AppointmentError::InvalidTransition { from, event })
    }

    /// Pet owners book for their own pets; admins for anyone.
    pub fn authorize_create(&self, actor: &Actor, pet_owner: Option<Uuid>) -> Result<(), AppointmentError> {
        match actor {
            Actor::Admin => Ok(()),
            Actor::PetOwner { owner_id } if pet_owner == Some(*owner_id) => Ok(()),
            Actor::PetOwner { owner_id } => {
                warn!("Owner {} tried to book for a pet they do not own", owner_id);
                Err(AppointmentError::Forbidden("You can only book appointments for your own pets".to_string()))
            }
            Actor::Doctor { doctor_id } => {
                warn!("Doctor {} tried to create an appointment", doctor_id);
                Err(AppointmentError::Forbidden("Doctors cannot create appointments".to_string()))
            }
        }
    }

    /// Admins relate to everything; a doctor to their own bookings; an
    /// owner to bookings of their pets.
    pub fn is_related(&self, actor: &Actor, appointment: &Appointment, pet_owner: Option<Uuid>) -> bool {
        match actor {
            Actor::Admin => true,
            Actor::Doctor { doctor_id } => appointment.doctor_id == *doctor_id,
            Actor::PetOwner { owner_id } => pet_owner == Some(*owner_id),
        }
    }

    /// Checks run in order: relation, edge, role.
    pub fn authorize_transition(
        &self,
        actor: &Actor,
        appointment: &Appointment,
        pet_owner: Option<Uuid>,
        event: LifecycleEvent,
    ) -> Result<AppointmentStatus, AppointmentError> {
        if !self.is_related(actor, appointment, pet_owner) {
            return Err(AppointmentError::Forbidden(format!(
                "Not a participant of appointment {}",
                appointment.id
            )));
        }

        let transition = self.edge(appointment.status, event).ok_or(AppointmentError::InvalidTransition {
            from: appointment.status,
            event,
        })?;

        if !transition.allowed.contains(&actor.role()) {
            return Err(AppointmentError::Forbidden(format!(
                "A {:?} cannot {} an appointment that is {}",
                actor.role(),
                event,
                appointment.status
            )));
        }

        Ok(transition.to)
    }

    /// Moving a slot is open to every participant while the booking is live.
    pub fn authorize_reschedule(
        &self,
        actor: &Actor,
        appointment: &Appointment,
        pet_owner: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if !self.is_related(actor, appointment, pet_owner) {
            return Err(AppointmentError::Forbidden(format!(
                "Not a participant of appointment {}",
                appointment.id
            )));
        }

        match appointment.status {
            AppointmentStatus::Pending | AppointmentStatus::Approved => Ok(()),
            from => Err(AppointmentError::InvalidTransition { from, event: LifecycleEvent::Reschedule }),
        }
    }

    /// Removing a booking outright: admins, or the pet's owner, while Pending.
    pub fn authorize_withdraw(
        &self,
        actor: &Actor,
        appointment: &Appointment,
        pet_owner: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let allowed = match actor {
            Actor::Admin => true,
            Actor::PetOwner { owner_id } => pet_owner == Some(*owner_id),
            Actor::Doctor { .. } => false,
        };
        if !allowed {
            return Err(AppointmentError::Forbidden(format!(
                "Not authorized to delete appointment {}",
                appointment.id
            )));
        }

        match appointment.status {
            AppointmentStatus::Pending => Ok(()),
            status => Err(AppointmentError::NotWithdrawable(status)),
        }
    }

    /// Events the role may fire from `status`.
    pub fn valid_events(&self, status: AppointmentStatus, role: ActorRole) -> Vec<LifecycleEvent> {
        TRANSITIONS
            .iter()
            .filter(|t| t.from == status && t.allowed.contains(&role))
            .map(|t| t.event)
            .collect()
    }
}
