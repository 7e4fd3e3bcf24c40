//! Repair order lifecycle and price negotiation engine.
//!
//! An order carries two independent state axes: the operational
//! [`order::Status`] driven by [`lifecycle::StatusTransitionEngine`] and the
//! [`order::PricingStatus`] driven by [`negotiation::PricingNegotiationEngine`].
//! Work may only start once pricing is approved. [`service::RepairService`]
//! wires both engines to a sled database.

pub mod auth;
pub mod config;
pub mod error;
pub mod invoice;
pub mod lifecycle;
pub mod negotiation;
pub mod notify;
pub mod order;
pub mod parts;
pub mod pricing;
pub mod service;
pub mod store;
pub mod tier;
pub mod utils;

pub use error::{Denial, EngineError};
