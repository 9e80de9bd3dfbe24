//! Capability checks for scheduling applications.
//!
//! Every view names an ordered list of capabilities. The gate evaluates
//! them in order against the acting user and, where the view has one, the
//! reservation being acted on; the first refusal ends evaluation.

use std::fmt;

use serde::Serialize;

use crate::model::{Reservation, User};

/// Reason reported when a policy refuses without naming one.
pub const DEFAULT_REASON: &str = "admin";

/// Named capability a view may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    View,
    Create,
    Edit,
    Delete,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::View => write!(f, "view"),
            Capability::Create => write!(f, "create"),
            Capability::Edit => write!(f, "edit"),
            Capability::Delete => write!(f, "delete"),
        }
    }
}

/// Who is making the request. Anonymous when no known user was named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    user: Option<User>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn as_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_perm(&self, permission: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_perm(permission))
    }

    /// Whether the actor owns `reservation`.
    pub fn owns(&self, reservation: &Reservation) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.username == reservation.person)
    }
}

/// A refusal with an explanation, raised by a policy instead of a plain
/// `false` when the reason matters to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denied {
    pub capability: Capability,
    pub reason: String,
}

/// Outcome of a single policy check.
pub type Check = std::result::Result<bool, String>;

/// Per-application access rules.
pub trait AccessPolicy: Send + Sync {
    fn can_view(&self, actor: &Actor, target: Option<&Reservation>) -> Check;

    fn can_create(&self, actor: &Actor) -> Check;

    fn can_edit(&self, actor: &Actor, target: &Reservation) -> Check;

    fn can_delete(&self, actor: &Actor, target: &Reservation) -> Check;

    /// Dispatch one capability. Edit and delete without a target refuse.
    fn check(
        &self,
        capability: Capability,
        actor: &Actor,
        target: Option<&Reservation>,
    ) -> Check {
        match (capability, target) {
            (Capability::View, target) => self.can_view(actor, target),
            (Capability::Create, _) => self.can_create(actor),
            (Capability::Edit, Some(target)) => self.can_edit(actor, target),
            (Capability::Delete, Some(target)) => self.can_delete(actor, target),
            (Capability::Edit | Capability::Delete, None) => Ok(false),
        }
    }
}

/// Evaluate `capabilities` in order, stopping at the first refusal.
pub fn check_forbidden(
    policy: &dyn AccessPolicy,
    actor: &Actor,
    capabilities: &[Capability],
    target: Option<&Reservation>,
) -> std::result::Result<(), Denied> {
    for &capability in capabilities {
        match policy.check(capability, actor, target) {
            Ok(true) => {}
            Ok(false) => {
                return Err(Denied {
                    capability,
                    reason: DEFAULT_REASON.to_string(),
                })
            }
            Err(reason) => return Err(Denied { capability, reason }),
        }
    }
    Ok(())
}

/// Rules of the plain reservation calendar: everyone may look, signed-in
/// users may book, owners may change their own bookings.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalendarPolicy;

impl AccessPolicy for CalendarPolicy {
    fn can_view(&self, _actor: &Actor, _target: Option<&Reservation>) -> Check {
        Ok(true)
    }

    fn can_create(&self, actor: &Actor) -> Check {
        Ok(actor.is_authenticated())
    }

    fn can_edit(&self, actor: &Actor, target: &Reservation) -> Check {
        Ok(actor.owns(target))
    }

    fn can_delete(&self, actor: &Actor, target: &Reservation) -> Check {
        Ok(actor.owns(target))
    }
}

/// Vehicle bookings: only signed-in users see the calendar, and holders of
/// the lesser change/delete permissions may manage any booking.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrivePolicy {
    base: CalendarPolicy,
}

impl AccessPolicy for DrivePolicy {
    fn can_view(&self, actor: &Actor, _target: Option<&Reservation>) -> Check {
        Ok(actor.is_authenticated())
    }

    fn can_create(&self, actor: &Actor) -> Check {
        Ok(actor.is_authenticated())
    }

    fn can_edit(&self, actor: &Actor, target: &Reservation) -> Check {
        Ok(self.base.can_edit(actor, target)? || actor.has_perm("change_reservation_lesser"))
    }

    fn can_delete(&self, actor: &Actor, target: &Reservation) -> Check {
        Ok(self.base.can_delete(actor, target)? || actor.has_perm("delete_reservation_lesser"))
    }
}

/// Duty rosters are maintained by users holding the full model permissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DutyPolicy {
    base: DrivePolicy,
}

impl AccessPolicy for DutyPolicy {
    fn can_view(&self, actor: &Actor, target: Option<&Reservation>) -> Check {
        self.base.can_view(actor, target)
    }

    fn can_create(&self, actor: &Actor) -> Check {
        Ok(actor.has_perm("add_reservation"))
    }

    fn can_edit(&self, actor: &Actor, _target: &Reservation) -> Check {
        Ok(actor.has_perm("change_reservation"))
    }

    fn can_delete(&self, actor: &Actor, _target: &Reservation) -> Check {
        Ok(actor.has_perm("delete_reservation"))
    }
}
