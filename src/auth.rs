//! Role and ownership checks run before any mutation
use crate::error::{Denial, EngineError};
use crate::order::{Actor, Order, Role, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Propose,
    AcceptAssigned,
    ReAcceptCounter,
    StartWork,
    Approve,
    Reject,
    Counter,
    Assign,
    Cancel,
    Delete,
    FinalizeInvoice,
    Advance(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allowed
    }

    pub fn into_result(self, order_id: &str) -> Result<(), EngineError> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(Denial::OrderNotFound) => {
                Err(EngineError::NotFound(order_id.to_string()))
            }
            Decision::Denied(denial) => Err(EngineError::AuthorizationDenied(denial)),
        }
    }
}

/// Pure check; never touches storage.
pub fn check(actor: &Actor, order: Option<&Order>, action: Action) -> Decision {
    let Some(order) = order else {
        return Decision::Denied(Denial::OrderNotFound);
    };

    match action {
        Action::Propose | Action::AcceptAssigned | Action::ReAcceptCounter | Action::StartWork => {
            technician_owns(actor, order, true)
        }
        Action::Approve | Action::Reject | Action::Counter => {
            require_role(actor, |r| r == Role::SuperAdmin)
        }
        Action::Assign | Action::Cancel | Action::Delete | Action::FinalizeInvoice => {
            require_role(actor, Role::is_admin)
        }
        Action::Advance(target) => match actor.role {
            Role::Admin | Role::SuperAdmin => Decision::Allowed,
            Role::Customer => Decision::Denied(Denial::InsufficientRole),
            Role::Technician => {
                if matches!(target, Status::InProgress | Status::WaitingParts | Status::Completed) {
                    technician_owns(actor, order, false)
                } else {
                    Decision::Denied(Denial::InsufficientRole)
                }
            }
        },
    }
}

fn require_role(actor: &Actor, allowed: impl Fn(Role) -> bool) -> Decision {
    if allowed(actor.role) {
        Decision::Allowed
    } else {
        Decision::Denied(Denial::InsufficientRole)
    }
}

// `allow_unassigned` covers the negotiation actions, which may run before an
// admin records the technician on the order.
fn technician_owns(actor: &Actor, order: &Order, allow_unassigned: bool) -> Decision {
    if actor.role != Role::Technician {
        return Decision::Denied(Denial::InsufficientRole);
    }
    match order.technician_id.as_deref() {
        None if allow_unassigned => Decision::Allowed,
        Some(id) if id == actor.id => Decision::Allowed,
        _ => Decision::Denied(Denial::NotAssignedTechnician),
    }
}
