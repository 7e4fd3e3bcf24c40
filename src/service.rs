//! Service layer wiring storage, engines and collaborators together
use std::sync::Arc;

use crate::auth::{self, Action};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::invoice::InvoiceSequencer;
use crate::lifecycle::StatusTransitionEngine;
use crate::negotiation::PricingNegotiationEngine;
use crate::notify::NotificationSink;
use crate::order::{Actor, NewOrder, Order, Status, TimeStamp};
use crate::parts::PartsRequestQueue;
use crate::store::{OrderStore, OrderSubscription};
use crate::utils;

pub struct RepairService {
    instance: Arc<sled::Db>,
    store: OrderStore,
    pricing: PricingNegotiationEngine,
    lifecycle: StatusTransitionEngine,
    invoices: InvoiceSequencer,
}

impl RepairService {
    pub fn new(
        instance: Arc<sled::Db>,
        config: EngineConfig,
        notifier: Arc<dyn NotificationSink>,
        parts: Arc<dyn PartsRequestQueue>,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let store = OrderStore::open(&instance)?;
        let invoices = InvoiceSequencer::open(&instance, &config)?;
        let pricing = PricingNegotiationEngine::new(store.clone(), notifier.clone(), config);
        let lifecycle = StatusTransitionEngine::new(store.clone(), notifier, parts);

        Ok(Self {
            instance,
            store,
            pricing,
            lifecycle,
            invoices,
        })
    }

    pub fn pricing(&self) -> &PricingNegotiationEngine {
        &self.pricing
    }

    pub fn lifecycle(&self) -> &StatusTransitionEngine {
        &self.lifecycle
    }

    pub fn invoices(&self) -> &InvoiceSequencer {
        &self.invoices
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Intake: a new order starts `pending` with no pricing activity.
    pub fn create_order(&self, intake: NewOrder) -> Result<Order, EngineError> {
        if intake.device.trim().is_empty() {
            return Err(EngineError::InvalidInput("device description is required".into()));
        }
        let id = utils::new_bech32_id("order_").map_err(EngineError::Collaborator)?;
        let order = Order::new(id, intake, TimeStamp::now());
        self.store.insert(&order)?;
        tracing::info!(order_id = %order.id, device = %order.device, "order created");

        Ok(order)
    }

    pub fn order(&self, order_id: &str) -> Result<Order, EngineError> {
        self.store.load(order_id)
    }

    pub fn subscribe(&self, order_id: &str) -> OrderSubscription {
        self.store.subscribe(order_id)
    }

    /// Hard delete; there is no soft-delete state.
    pub fn delete_order(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
        let current = self.store.get(order_id)?;
        auth::check(actor, current.as_ref(), Action::Delete).into_result(order_id)?;
        let removed = self.store.delete(order_id)?;
        tracing::info!(order_id, admin = %actor.id, "order deleted");

        Ok(removed)
    }

    /// Attach the next invoice number to a finished order. A number drawn for
    /// an order that lost a race to another finalizer is never reused.
    pub fn finalize_invoice(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
        let current = self.store.get(order_id)?;
        auth::check(actor, current.as_ref(), Action::FinalizeInvoice).into_result(order_id)?;
        if let Some(order) = &current {
            ensure_invoiceable(order)?;
        }

        let number = self.invoices.next_invoice_number()?;
        let result = self.store.update(order_id, |order| {
            ensure_invoiceable(order)?;
            order.invoice_number = Some(number.clone());
            order.updated_at = TimeStamp::now();
            Ok(())
        });

        match &result {
            Ok(_) => tracing::info!(order_id, invoice = %number, "invoice finalized"),
            Err(e) => tracing::warn!(
                order_id,
                invoice = %number,
                error = %e,
                "invoice number drawn but not attached"
            ),
        }
        result
    }

    pub fn flush(&self) -> Result<(), EngineError> {
        self.instance.flush()?;
        Ok(())
    }
}

fn ensure_invoiceable(order: &Order) -> Result<(), EngineError> {
    if !matches!(order.status, Status::Completed | Status::Delivered) {
        return Err(EngineError::precondition(
            "finalize invoice",
            format!("order status is {}", order.status),
        ));
    }
    if let Some(existing) = &order.invoice_number {
        return Err(EngineError::precondition(
            "finalize invoice",
            format!("order already carries invoice {existing}"),
        ));
    }
    Ok(())
}
