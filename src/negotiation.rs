//! Price negotiation between the assigned technician and super-admins.
//!
//! Every operation is a single guarded read-modify-write of the order followed
//! by best-effort notifications. The allowed `pricing_status` moves are the
//! ones in [`PricingStatus::can_transition_to`]; anything else is reported as
//! a retryable [`EngineError::PreconditionFailed`].
use std::sync::Arc;

use crate::auth::{self, Action};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::{self, Notification, NotificationKind, NotificationSink, Target};
use crate::order::{
    Actor, Approval, CounterOffer, Order, PriceSource, PricingStatus, Proposal, Role, Status,
    TimeStamp,
};
use crate::pricing::PricingInput;
use crate::store::OrderStore;
use crate::tier::{self, ApprovalTier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalParams {
    pub pricing: PricingInput,
    pub duration_minutes: u32,
    pub arrival_eta: Option<TimeStamp>,
    pub note: Option<String>,
    pub media_urls: Vec<String>,
}

impl ProposalParams {
    pub fn new(pricing: PricingInput, duration_minutes: u32) -> Self {
        Self {
            pricing,
            duration_minutes,
            arrival_eta: None,
            note: None,
            media_urls: vec![],
        }
    }
    pub fn set_arrival_eta(mut self, eta: TimeStamp) -> Self {
        self.arrival_eta = Some(eta);
        self
    }
    pub fn set_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
    pub fn add_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_urls.push(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterParams {
    pub price: u64,
    pub duration_minutes: u32,
    pub arrival_eta: Option<TimeStamp>,
    pub note: Option<String>,
}

impl CounterParams {
    pub fn new(price: u64, duration_minutes: u32) -> Self {
        Self {
            price,
            duration_minutes,
            arrival_eta: None,
            note: None,
        }
    }
    pub fn set_arrival_eta(mut self, eta: TimeStamp) -> Self {
        self.arrival_eta = Some(eta);
        self
    }
    pub fn set_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

pub struct PricingNegotiationEngine {
    store: OrderStore,
    notifier: Arc<dyn NotificationSink>,
    config: EngineConfig,
}

impl PricingNegotiationEngine {
    pub fn new(
        store: OrderStore,
        notifier: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Technician submits (or resubmits) a price for an assigned order.
    pub fn propose(
        &self,
        order_id: &str,
        actor: &Actor,
        params: ProposalParams,
    ) -> Result<Order, EngineError> {
        let now = TimeStamp::now();
        let total = params.pricing.recommended_total();
        let tier = tier::classify(total, &self.config.tiers);
        let expires_at = now.plus_hours(self.config.proposal_ttl_hours);

        let order = self.store.update(order_id, |order| {
            auth::check(actor, Some(&*order), Action::Propose).into_result(order_id)?;
            if !matches!(order.status, Status::Assigned | Status::Accepted) {
                return Err(EngineError::precondition(
                    "propose",
                    format!("order status is {}", order.status),
                ));
            }
            ensure_pricing_edge(order, PricingStatus::Proposed, "propose")?;
            if params.duration_minutes == 0 {
                return Err(EngineError::InvalidInput(
                    "proposed duration must be greater than zero".into(),
                ));
            }
            params.pricing.validate()?;

            order.proposal = Some(Proposal {
                pricing: params.pricing,
                recommended_total: total,
                tier,
                duration_minutes: params.duration_minutes,
                arrival_eta: params.arrival_eta,
                note: params.note.clone(),
                media_urls: params.media_urls.clone(),
                technician_id: actor.id.clone(),
                proposed_at: now,
                expires_at,
            });
            // a fresh proposal supersedes whatever the last counter said
            order.counter = None;
            order.pricing_status = PricingStatus::Proposed;
            order.updated_at = now;
            Ok(())
        })?;

        tracing::info!(
            order_id,
            technician = %actor.id,
            total = ?total,
            tier = %tier,
            "pricing proposed"
        );

        let amount = total.map_or_else(|| "an unspecified amount".to_string(), |t| t.to_string());
        let mut notifications = vec![Notification::new(
            NotificationKind::PricingProposed,
            Target::Role(Role::Admin),
            order_id,
            "Pricing Proposed",
            format!(
                "Technician proposed {amount} ({} min) for order {order_id}",
                params.duration_minutes
            ),
        )];
        if let Some(role) = tier.review_role() {
            notifications.push(Notification::new(
                NotificationKind::PricingReview(tier),
                Target::Role(role),
                order_id,
                review_title(tier),
                format!("Proposal of {amount} for order {order_id} is routed for {tier}"),
            ));
        }
        notify::dispatch_all(self.notifier.as_ref(), &notifications);

        Ok(order)
    }

    /// Bind the negotiated price. From `proposed` the total is recomputed
    /// from the stored pricing input; from `re_accepted` the counter-offer
    /// values are bound.
    pub fn approve(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
        let now = TimeStamp::now();

        let order = self.store.update(order_id, |order| {
            auth::check(actor, Some(&*order), Action::Approve).into_result(order_id)?;
            let from = order.pricing_status;
            ensure_pricing_edge(order, PricingStatus::Approved, "approve")?;

            let approval = if from == PricingStatus::ReAccepted {
                let counter = order.counter.as_ref().ok_or_else(|| {
                    EngineError::precondition("approve", "re-accepted order has no counter-offer")
                })?;
                Approval {
                    price: counter.price,
                    duration_minutes: counter.duration_minutes,
                    arrival_eta: counter.arrival_eta,
                    admin_id: actor.id.clone(),
                    approved_at: now,
                    source: PriceSource::CounterOffer,
                }
            } else {
                let proposal = live_proposal(order, &now, "approve")?;
                let price = proposal.pricing.recommended_total().ok_or_else(|| {
                    EngineError::precondition("approve", "proposal has no recoverable total")
                })?;
                Approval {
                    price,
                    duration_minutes: proposal.duration_minutes,
                    arrival_eta: proposal.arrival_eta,
                    admin_id: actor.id.clone(),
                    approved_at: now,
                    source: PriceSource::Proposal,
                }
            };

            order.approval = Some(approval);
            order.approved_by_admin_id = Some(actor.id.clone());
            order.pricing_status = PricingStatus::Approved;
            order.updated_at = now;
            Ok(())
        })?;

        let price = order.approved_price().unwrap_or_default();
        tracing::info!(order_id, admin = %actor.id, price, "pricing approved");
        notify::dispatch_all(
            self.notifier.as_ref(),
            &[Notification::new(
                NotificationKind::PricingApproved,
                Target::Role(Role::Technician),
                order_id,
                "Pricing Approved",
                format!("Price {price} approved for order {order_id}; work may start"),
            )],
        );

        Ok(order)
    }

    /// Turn down the open proposal or re-accepted counter. Expired proposals
    /// may still be rejected, which lets the technician propose again.
    pub fn reject(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
        let now = TimeStamp::now();

        let order = self.store.update(order_id, |order| {
            auth::check(actor, Some(&*order), Action::Reject).into_result(order_id)?;
            ensure_pricing_edge(order, PricingStatus::Rejected, "reject")?;
            order.pricing_status = PricingStatus::Rejected;
            order.updated_at = now;
            Ok(())
        })?;

        tracing::info!(order_id, admin = %actor.id, "pricing rejected");
        notify::dispatch_all(
            self.notifier.as_ref(),
            &[Notification::new(
                NotificationKind::PricingRejected,
                Target::Role(Role::Technician),
                order_id,
                "Pricing Rejected",
                format!("The proposal for order {order_id} was rejected; submit a new one"),
            )],
        );

        Ok(order)
    }

    pub fn counter(
        &self,
        order_id: &str,
        actor: &Actor,
        params: CounterParams,
    ) -> Result<Order, EngineError> {
        let now = TimeStamp::now();

        let order = self.store.update(order_id, |order| {
            auth::check(actor, Some(&*order), Action::Counter).into_result(order_id)?;
            ensure_pricing_edge(order, PricingStatus::Countered, "counter")?;
            live_proposal(order, &now, "counter")?;
            if params.price == 0 || params.duration_minutes == 0 {
                return Err(EngineError::InvalidInput(
                    "counter price and duration must be greater than zero".into(),
                ));
            }

            order.counter = Some(CounterOffer {
                price: params.price,
                duration_minutes: params.duration_minutes,
                arrival_eta: params.arrival_eta,
                admin_id: actor.id.clone(),
                countered_at: now,
            });
            order.approved_by_admin_id = Some(actor.id.clone());
            if let Some(proposal) = order.proposal.as_mut() {
                proposal.note = params.note.clone();
            }
            order.pricing_status = PricingStatus::Countered;
            order.updated_at = now;
            Ok(())
        })?;

        tracing::info!(order_id, admin = %actor.id, price = params.price, "counter-offer made");
        notify::dispatch_all(
            self.notifier.as_ref(),
            &[Notification::new(
                NotificationKind::PricingCountered,
                Target::Role(Role::Technician),
                order_id,
                "Counter-Offer Received",
                format!(
                    "Counter-offer of {} ({} min) for order {order_id}",
                    params.price, params.duration_minutes
                ),
            )],
        );

        Ok(order)
    }

    /// Technician agrees to the counter-offer. The price is not bound until a
    /// super-admin approves.
    pub fn re_accept_counter(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
        let now = TimeStamp::now();

        let order = self.store.update(order_id, |order| {
            auth::check(actor, Some(&*order), Action::ReAcceptCounter).into_result(order_id)?;
            ensure_pricing_edge(order, PricingStatus::ReAccepted, "re-accept counter")?;
            order.pricing_status = PricingStatus::ReAccepted;
            order.updated_at = now;
            Ok(())
        })?;

        tracing::info!(order_id, technician = %actor.id, "counter-offer re-accepted");
        notify::dispatch_all(
            self.notifier.as_ref(),
            &[Notification::new(
                NotificationKind::CounterReAccepted,
                Target::Role(Role::Admin),
                order_id,
                "Counter-Offer Accepted",
                format!(
                    "Technician accepted the counter-offer for order {order_id}; \
                     awaiting final approval"
                ),
            )],
        );

        Ok(order)
    }
}

fn ensure_pricing_edge(
    order: &Order,
    next: PricingStatus,
    operation: &'static str,
) -> Result<(), EngineError> {
    if order.pricing_status.can_transition_to(next) {
        Ok(())
    } else {
        Err(EngineError::precondition(
            operation,
            format!("pricing status is {}, cannot move to {next}", order.pricing_status),
        ))
    }
}

fn live_proposal<'a>(
    order: &'a Order,
    now: &TimeStamp,
    operation: &'static str,
) -> Result<&'a Proposal, EngineError> {
    let proposal = order
        .proposal
        .as_ref()
        .ok_or_else(|| EngineError::precondition(operation, "order has no proposal"))?;
    if proposal.is_expired(now) {
        return Err(EngineError::precondition(
            operation,
            format!("proposal expired at {}", proposal.expires_at.to_datetime_utc()),
        ));
    }
    Ok(proposal)
}

fn review_title(tier: ApprovalTier) -> &'static str {
    match tier {
        ApprovalTier::AutoApproveRecommended => "Auto-Approve Recommended",
        ApprovalTier::AdminReview => "Pricing Review Required",
        ApprovalTier::SuperAdminReview => "High-Value Pricing Review",
        ApprovalTier::Unknown => "Pricing Review",
    }
}
