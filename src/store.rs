//! Order documents in a sled tree, keyed by order id
use std::time::Duration;

use sled::{Event, Subscriber, Tree};

use crate::error::EngineError;
use crate::order::Order;

pub const ORDERS_TREE: &str = "orders";

#[derive(Clone)]
pub struct OrderStore {
    orders: Tree,
}

/// A change observed on a watched order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSnapshot {
    Updated(Box<Order>),
    Deleted(String),
}

impl OrderStore {
    pub fn open(db: &sled::Db) -> Result<Self, EngineError> {
        Ok(Self {
            orders: db.open_tree(ORDERS_TREE)?,
        })
    }

    pub fn get(&self, order_id: &str) -> Result<Option<Order>, EngineError> {
        match self.orders.get(order_id)? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load(&self, order_id: &str) -> Result<Order, EngineError> {
        self.get(order_id)?
            .ok_or_else(|| EngineError::NotFound(order_id.to_string()))
    }

    /// Insert a brand new order. Fails if the id is already taken.
    pub fn insert(&self, order: &Order) -> Result<(), EngineError> {
        let encoded = minicbor::to_vec(order)?;
        self.orders
            .compare_and_swap(order.id.as_str(), None::<&[u8]>, Some(encoded))?
            .map_err(|_| EngineError::InvalidInput(format!("order {} already exists", order.id)))
    }

    /// Atomic read-modify-write of one order.
    ///
    /// `apply` runs against the freshest stored copy; if another writer wins
    /// the swap it runs again on the new copy, so guards and preconditions
    /// inside it always judge the state that actually gets replaced. An error
    /// from `apply` leaves the record untouched.
    pub fn update<F>(&self, order_id: &str, mut apply: F) -> Result<Order, EngineError>
    where
        F: FnMut(&mut Order) -> Result<(), EngineError>,
    {
        loop {
            let current = self
                .orders
                .get(order_id)?
                .ok_or_else(|| EngineError::NotFound(order_id.to_string()))?;

            let mut order: Order = minicbor::decode(&current)?;
            apply(&mut order)?;
            let encoded = minicbor::to_vec(&order)?;

            match self
                .orders
                .compare_and_swap(order_id, Some(&current), Some(encoded))?
            {
                Ok(()) => return Ok(order),
                Err(_) => {
                    tracing::debug!(order_id, "order changed concurrently, re-evaluating update");
                }
            }
        }
    }

    pub fn delete(&self, order_id: &str) -> Result<Order, EngineError> {
        let removed = self
            .orders
            .remove(order_id)?
            .ok_or_else(|| EngineError::NotFound(order_id.to_string()))?;
        Ok(minicbor::decode(&removed)?)
    }

    /// Push-based stream of changes to a single order.
    pub fn subscribe(&self, order_id: &str) -> OrderSubscription {
        OrderSubscription {
            order_id: order_id.to_string(),
            inner: self.orders.watch_prefix(order_id),
        }
    }
}

pub struct OrderSubscription {
    order_id: String,
    inner: Subscriber,
}

impl OrderSubscription {
    /// Wait up to `timeout` for the next change; `None` on timeout or once
    /// the store is dropped.
    pub fn next_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<Result<OrderSnapshot, EngineError>> {
        loop {
            let event = self.inner.next_timeout(timeout).ok()?;
            if let Some(snapshot) = self.snapshot(event) {
                return Some(snapshot);
            }
        }
    }

    fn snapshot(&self, event: Event) -> Option<Result<OrderSnapshot, EngineError>> {
        match event {
            Event::Insert { key, value } if key.as_ref() == self.order_id.as_bytes() => Some(
                minicbor::decode::<Order>(&value)
                    .map(|o| OrderSnapshot::Updated(Box::new(o)))
                    .map_err(EngineError::from),
            ),
            Event::Remove { key } if key.as_ref() == self.order_id.as_bytes() => {
                Some(Ok(OrderSnapshot::Deleted(self.order_id.clone())))
            }
            _ => None,
        }
    }
}

impl Iterator for OrderSubscription {
    type Item = Result<OrderSnapshot, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let event = self.inner.next()?;
            if let Some(snapshot) = self.snapshot(event) {
                return Some(snapshot);
            }
        }
    }
}
