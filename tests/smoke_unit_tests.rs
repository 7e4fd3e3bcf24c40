//! Smoke Screen Unit tests for the repair order components
//!
//! Happy-path checks of each building block in isolation from the engine
//! scenarios in `scenarios.rs`.

use chrono::{Datelike, Timelike, Utc};
use repair_orders::{
    EngineError,
    auth::{self, Action, Decision},
    config::{EngineConfig, TierThresholds},
    notify::{Notification, NotificationKind, NotificationSink, SledNotificationLog, Target},
    order::{Actor, NewOrder, Order, PricingStatus, Role, Status, TimeStamp},
    parts::{PartsRequestQueue, RequestState, SledPartsRequests},
    pricing::{Breakdown, PricingInput, recommended_total},
    tier::{ApprovalTier, classify},
    utils::new_bech32_id,
};
use tempfile::tempdir;

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_bech32_id("order_").unwrap();
        assert!(encoded.starts_with("order_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_bech32_id("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_bech32_id("user_").unwrap();
        let id2 = new_bech32_id("user_").unwrap();
        assert_ne!(id1, id2);
    }
}

// ORDER MODULE TESTS
#[cfg(test)]
mod order_tests {
    use super::*;

    #[test]
    fn timestamp_from_parts() {
        let ts = TimeStamp::from_ymd_hms(2024, 6, 15, 10, 30, 0).unwrap();
        let dt = ts.to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
        assert!(TimeStamp::from_ymd_hms(2024, 2, 30, 0, 0, 0).is_none());
    }

    #[test]
    fn timestamp_now_is_current() {
        let diff = (Utc::now() - TimeStamp::now().to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1);
    }

    #[test]
    fn ttl_is_forty_eight_hours() {
        let start = TimeStamp::from_ymd_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let expiry = start.plus_hours(48);
        assert_eq!(expiry, TimeStamp::from_ymd_hms(2024, 6, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn order_cbor_roundtrip() {
        let order = Order::new(
            new_bech32_id("order_").unwrap(),
            NewOrder {
                customer_id: None,
                customer_name: "Ana".into(),
                device: "Phone".into(),
                issue: "Battery".into(),
                price: 90,
            },
            TimeStamp::now(),
        );

        let encoded = minicbor::to_vec(&order).unwrap();
        let decoded: Order = minicbor::decode(&encoded).unwrap();
        assert_eq!(order, decoded);
    }

    #[test]
    fn enum_strings_roundtrip() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        for status in PricingStatus::ALL {
            assert_eq!(status.to_string().parse::<PricingStatus>().unwrap(), status);
        }
        assert!(matches!("owner".parse::<Role>(), Err(EngineError::InvalidInput(_))));
    }
}

// PRICING AND TIER TESTS
#[cfg(test)]
mod pricing_tests {
    use super::*;

    #[test]
    fn published_examples() {
        assert_eq!(recommended_total(Some(&Breakdown::new(50, 30, 0)), None, None), Some(80));
        assert_eq!(recommended_total(None, Some(100), Some(150)), Some(150));
        assert_eq!(recommended_total(None, None, None), None);
    }

    #[test]
    fn breakdown_wins_over_range() {
        let b = Breakdown::new(10, 10, 10);
        assert_eq!(recommended_total(Some(&b), Some(100), Some(900)), Some(30));
    }

    #[test]
    fn tier_boundaries() {
        let t = TierThresholds::default();
        assert_eq!(classify(Some(199), &t), ApprovalTier::AutoApproveRecommended);
        assert_eq!(classify(Some(200), &t), ApprovalTier::AdminReview);
        assert_eq!(classify(Some(500), &t), ApprovalTier::AdminReview);
        assert_eq!(classify(Some(501), &t), ApprovalTier::SuperAdminReview);
    }

    #[test]
    fn range_input_total() {
        assert_eq!(PricingInput::range(300, 400).recommended_total(), Some(400));
    }
}

// AUTH TESTS
#[cfg(test)]
mod auth_tests {
    use super::*;

    #[test]
    fn admins_assign_and_cancel() {
        let order = Order::new("order_x".into(), NewOrder::default(), TimeStamp::now());
        let admin = Actor::new("user_a", Role::Admin);
        assert_eq!(auth::check(&admin, Some(&order), Action::Assign), Decision::Allowed);
        assert_eq!(auth::check(&admin, Some(&order), Action::Cancel), Decision::Allowed);
        assert!(auth::check(&admin, Some(&order), Action::FinalizeInvoice).is_allowed());
    }
}

// CONFIG TESTS
#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.invoice_prefix, "INV-");
        assert_eq!(config.invoice_width, 6);
    }
}

// COLLABORATOR TESTS
#[cfg(test)]
mod collaborator_tests {
    use super::*;

    #[test]
    fn notification_log_persists_and_filters() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = sled::open(temp_dir.path().join("notify.db"))?;
        let log = SledNotificationLog::open(&db)?;

        log.dispatch(&Notification::new(
            NotificationKind::PricingProposed,
            Target::Role(Role::Admin),
            "order_a",
            "Pricing Proposed",
            "300",
        ))?;
        log.dispatch(&Notification::new(
            NotificationKind::OrderAssigned,
            Target::User("user_t".into()),
            "order_b",
            "New Order Assigned",
            "",
        ))?;

        assert_eq!(log.all()?.len(), 2);
        assert_eq!(log.for_order("order_a")?.len(), 1);
        assert_eq!(log.for_target(&Target::User("user_t".into()))?.len(), 1);
        Ok(())
    }

    #[test]
    fn parts_requests_count_pending_only() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = sled::open(temp_dir.path().join("parts.db"))?;
        let parts = SledPartsRequests::open(&db)?;

        let first = parts.open_request("order_a", "user_t", "Screen")?;
        parts.open_request("order_a", "user_t", "Adhesive")?;
        parts.open_request("order_b", "user_t", "Battery")?;
        assert_eq!(parts.pending_count("order_a")?, 2);

        parts.resolve("order_a", &first.id, RequestState::Rejected)?;
        assert_eq!(parts.pending_count("order_a")?, 1);
        assert_eq!(parts.pending_count("order_b")?, 1);

        // resolving twice is refused
        assert!(parts.resolve("order_a", &first.id, RequestState::Approved).is_err());
        assert!(parts.resolve("order_a", &first.id, RequestState::Pending).is_err());
        Ok(())
    }
}
