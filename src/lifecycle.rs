//! Operational status transitions and the append-only status history
use std::sync::Arc;

use crate::auth::{self, Action};
use crate::error::EngineError;
use crate::notify::{self, Notification, NotificationKind, NotificationSink, Target};
use crate::order::{Actor, Order, PricingStatus, Role, Status, TimeStamp};
use crate::parts::PartsRequestQueue;
use crate::store::OrderStore;

pub struct StatusTransitionEngine {
    store: OrderStore,
    notifier: Arc<dyn NotificationSink>,
    parts: Arc<dyn PartsRequestQueue>,
}

impl StatusTransitionEngine {
    pub fn new(
        store: OrderStore,
        notifier: Arc<dyn NotificationSink>,
        parts: Arc<dyn PartsRequestQueue>,
    ) -> Self {
        Self {
            store,
            notifier,
            parts,
        }
    }

    /// Generic status move used by the status-update path.
    pub fn advance(
        &self,
        order_id: &str,
        actor: &Actor,
        new_status: Status,
        note: Option<String>,
    ) -> Result<Order, EngineError> {
        let order = self.transition(
            order_id,
            actor,
            Action::Advance(new_status),
            new_status,
            note,
            |_| Ok(()),
        )?;
        self.notify_customer(&order, new_status, vec![]);
        Ok(order)
    }

    pub fn assign(
        &self,
        order_id: &str,
        actor: &Actor,
        technician_id: &str,
        technician_name: &str,
    ) -> Result<Order, EngineError> {
        if technician_id.is_empty() {
            return Err(EngineError::InvalidInput("technician id is empty".into()));
        }
        let order = self.transition(
            order_id,
            actor,
            Action::Assign,
            Status::Assigned,
            Some(format!("Assigned to {technician_name}")),
            |order| {
                if order.status != Status::Pending || order.technician_id.is_some() {
                    return Err(EngineError::precondition(
                        "assign",
                        format!("order is {} and already has a technician", order.status),
                    ));
                }
                order.technician_id = Some(technician_id.to_string());
                order.technician_name = Some(technician_name.to_string());
                Ok(())
            },
        )?;

        let assigned = Notification::new(
            NotificationKind::OrderAssigned,
            Target::User(technician_id.to_string()),
            order_id,
            "New Order Assigned",
            format!("Order {order_id} ({}) has been assigned to you", order.device),
        );
        self.notify_customer(&order, Status::Assigned, vec![assigned]);
        Ok(order)
    }

    pub fn accept_assigned(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
        let order = self.transition(
            order_id,
            actor,
            Action::AcceptAssigned,
            Status::Accepted,
            Some("Technician accepted the order".into()),
            |order| require_status(order, Status::Assigned, "accept"),
        )?;

        let accepted = Notification::new(
            NotificationKind::OrderAccepted,
            Target::Role(Role::Admin),
            order_id,
            "Order Accepted",
            format!("Technician {} accepted order {order_id}", actor.id),
        );
        self.notify_customer(&order, Status::Accepted, vec![accepted]);
        Ok(order)
    }

    /// Move an accepted order into `in_progress`. Pricing must be approved,
    /// as for every status from `in_progress` onwards.
    pub fn start_work(
        &self,
        order_id: &str,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Order, EngineError> {
        let order = self.transition(
            order_id,
            actor,
            Action::StartWork,
            Status::InProgress,
            note.or_else(|| Some("Work started".into())),
            |order| require_status(order, Status::Accepted, "start work"),
        )?;
        self.notify_customer(&order, Status::InProgress, vec![]);
        Ok(order)
    }

    pub fn complete(
        &self,
        order_id: &str,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<Order, EngineError> {
        self.advance(order_id, actor, Status::Completed, note)
    }

    pub fn cancel(
        &self,
        order_id: &str,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Order, EngineError> {
        let order = self.transition(
            order_id,
            actor,
            Action::Cancel,
            Status::Cancelled,
            reason,
            |_| Ok(()),
        )?;
        self.notify_customer(&order, Status::Cancelled, vec![]);
        Ok(order)
    }

    /// Shared path for every status change: guard, ordering, the parts-request
    /// check for completion, then one atomic update that re-checks the guard
    /// and ordering, applies `prepare` and appends history.
    fn transition<F>(
        &self,
        order_id: &str,
        actor: &Actor,
        action: Action,
        new_status: Status,
        note: Option<String>,
        mut prepare: F,
    ) -> Result<Order, EngineError>
    where
        F: FnMut(&mut Order) -> Result<(), EngineError>,
    {
        let current = self.store.get(order_id)?;
        auth::check(actor, current.as_ref(), action).into_result(order_id)?;
        if let Some(order) = &current {
            ensure_can_advance(order, new_status)?;
        }

        if new_status == Status::Completed {
            let pending = self
                .parts
                .pending_count(order_id)
                .map_err(EngineError::Collaborator)?;
            if pending > 0 {
                tracing::info!(order_id, pending, "completion blocked by open parts requests");
                return Err(EngineError::PendingApprovalBlock { pending });
            }
        }

        let now = TimeStamp::now();
        let order = self.store.update(order_id, |order| {
            auth::check(actor, Some(&*order), action).into_result(order_id)?;
            ensure_can_advance(order, new_status)?;
            prepare(order)?;
            if new_status.needs_approved_pricing()
                && order.pricing_status != PricingStatus::Approved
            {
                return Err(EngineError::precondition(
                    "status change",
                    format!(
                        "{new_status} needs approved pricing, found {}",
                        order.pricing_status
                    ),
                ));
            }
            if new_status != Status::Cancelled && order.technician_id.is_none() {
                return Err(EngineError::precondition(
                    "status change",
                    "order has no assigned technician",
                ));
            }
            order.record_status(new_status, now, note.clone());
            Ok(())
        })?;

        tracing::info!(order_id, actor = %actor.id, status = %new_status, "order status changed");
        Ok(order)
    }

    // Message templates are chosen downstream from the `StatusChanged` kind.
    fn notify_customer(&self, order: &Order, status: Status, mut extra: Vec<Notification>) {
        let target = match &order.customer_id {
            Some(id) => Target::User(id.clone()),
            None => Target::Role(Role::Customer),
        };
        extra.push(Notification::new(
            NotificationKind::StatusChanged(status),
            target,
            &order.id,
            "Order Update",
            format!("Your repair order {} is now {status}", order.id),
        ));
        notify::dispatch_all(self.notifier.as_ref(), &extra);
    }
}

fn ensure_can_advance(order: &Order, new_status: Status) -> Result<(), EngineError> {
    if order.status.can_advance_to(new_status) {
        Ok(())
    } else {
        Err(EngineError::precondition(
            "status change",
            format!("cannot move from {} to {new_status}", order.status),
        ))
    }
}

fn require_status(
    order: &Order,
    expected: Status,
    operation: &'static str,
) -> Result<(), EngineError> {
    if order.status == expected {
        Ok(())
    } else {
        Err(EngineError::precondition(
            operation,
            format!("order status is {}, expected {expected}", order.status),
        ))
    }
}
