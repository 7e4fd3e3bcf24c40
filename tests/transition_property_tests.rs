//! Property-based tests for the pricing and status state machines
//!
//! Random sequences of negotiation calls are replayed against a real engine.
//! Whatever the sequence, every successful call must follow an edge of the
//! negotiation table and every refused call must leave the order untouched.
//!
//! These tests focus on:
//!
//! 1. Edge discipline - pricing status only moves along allowed edges
//! 2. Failure atomicity - a rejected call never changes the stored order
//! 3. Status monotonicity - the history never goes backwards

mod common;

use common::harness;
use proptest::prelude::*;
use repair_orders::{
    EngineError,
    negotiation::{CounterParams, ProposalParams},
    order::{PricingStatus, Status},
    pricing::{Breakdown, PricingInput},
};

#[derive(Debug, Clone)]
enum Op {
    Propose(PricingInput),
    Approve,
    Reject,
    Counter(u64),
    ReAccept,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..=1_000, 0u64..=500)
            .prop_map(|(min, spread)| Op::Propose(PricingInput::range(min, min + spread))),
        (0u64..=400, 0u64..=400, 0u64..=100)
            .prop_map(|(l, p, i)| Op::Propose(PricingInput::Breakdown(Breakdown::new(l, p, i)))),
        Just(Op::Approve),
        Just(Op::Reject),
        (1u64..=1_000).prop_map(Op::Counter),
        Just(Op::ReAccept),
    ]
}

fn status_strategy() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

// Fewer cases than the default: each case opens its own sled database.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: pricing status only changes along the negotiation edges
    #[test]
    fn prop_pricing_follows_edges(ops in prop::collection::vec(op_strategy(), 1..=12)) {
        let h = harness().unwrap();
        let id = h.accepted_order().unwrap();
        let pricing = h.service.pricing();

        for op in ops {
            let before = h.service.order(&id).unwrap();
            let result = match &op {
                Op::Propose(input) => {
                    pricing.propose(&id, &h.technician, ProposalParams::new(*input, 30))
                }
                Op::Approve => pricing.approve(&id, &h.super_admin),
                Op::Reject => pricing.reject(&id, &h.super_admin),
                Op::Counter(price) => {
                    pricing.counter(&id, &h.super_admin, CounterParams::new(*price, 30))
                }
                Op::ReAccept => pricing.re_accept_counter(&id, &h.technician),
            };
            let after = h.service.order(&id).unwrap();

            match result {
                Ok(order) => {
                    prop_assert!(
                        before.pricing_status.can_transition_to(order.pricing_status),
                        "{:?} moved {} -> {}", op, before.pricing_status, order.pricing_status
                    );
                    prop_assert_eq!(&order, &after);
                }
                Err(err) => {
                    prop_assert!(
                        matches!(
                            err,
                            EngineError::PreconditionFailed { .. } | EngineError::InvalidInput(_)
                        ),
                        "unexpected error {:?}", err
                    );
                    prop_assert_eq!(&before, &after, "failed {:?} mutated the order", op);
                }
            }
        }

        let last = h.service.order(&id).unwrap();
        if last.pricing_status == PricingStatus::Approved {
            prop_assert!(last.approval.is_some());
        }
    }

    /// Property: status history is non-decreasing and never leaves a terminal status
    #[test]
    fn prop_status_history_is_monotone(
        targets in prop::collection::vec(status_strategy(), 1..=10)
    ) {
        let h = harness().unwrap();
        let id = h.accepted_order().unwrap();
        let params = ProposalParams::new(PricingInput::range(100, 150), 30);
        h.service.pricing().propose(&id, &h.technician, params).unwrap();
        h.service.pricing().approve(&id, &h.super_admin).unwrap();

        for target in targets {
            let before = h.service.order(&id).unwrap();
            match h.service.lifecycle().advance(&id, &h.admin, target, None) {
                Ok(order) => {
                    prop_assert!(before.status.can_advance_to(target));
                    prop_assert_eq!(order.status, target);
                    prop_assert_eq!(order.status_history.len(), before.status_history.len() + 1);
                }
                Err(_) => prop_assert_eq!(&before, &h.service.order(&id).unwrap()),
            }
        }

        let history = h.service.order(&id).unwrap().status_history;
        for pair in history.windows(2) {
            prop_assert!(
                pair[0].status.can_advance_to(pair[1].status),
                "history went {} -> {}", pair[0].status, pair[1].status
            );
        }
    }

    /// Property: the edge table itself never lets a status move to itself
    #[test]
    fn prop_no_self_edges(s in prop::sample::select(PricingStatus::ALL.to_vec())) {
        prop_assert!(!s.can_transition_to(s));
    }
}
