//! Property-based tests for lifecycle and policy invariants
//!
//! These use proptest to verify that the transition graph, the role
//! matrix, and the financial gate hold their invariants across the full
//! input space rather than hand-picked cases. Bugs here would let a
//! booking reach an unreachable status or charge the wrong commission.

use proptest::prelude::*;

use cleanmarket::actor::ActorRole;
use cleanmarket::booking::{BookingStatus, CancellationPolicy, role_may_transition};
use cleanmarket::finance::{calculate_commission, should_block_cleaner};
use cleanmarket::time::TimeStamp;

// PROPERTY TEST STRATEGIES

fn status_strategy() -> impl Strategy<Value = BookingStatus> {
    prop_oneof![
        Just(BookingStatus::Requested),
        Just(BookingStatus::Accepted),
        Just(BookingStatus::OnTheWay),
        Just(BookingStatus::Arrived),
        Just(BookingStatus::Completed),
        Just(BookingStatus::ClientConfirmed),
        Just(BookingStatus::Cancelled),
    ]
}

fn role_strategy() -> impl Strategy<Value = ActorRole> {
    prop_oneof![
        Just(ActorRole::Client),
        Just(ActorRole::Cleaner),
        Just(ActorRole::Admin),
    ]
}

/// The forward successor of each state, used as an independent
/// reference for the graph shape.
fn forward_successor(status: BookingStatus) -> Option<BookingStatus> {
    match status {
        BookingStatus::Requested => Some(BookingStatus::Accepted),
        BookingStatus::Accepted => Some(BookingStatus::OnTheWay),
        BookingStatus::OnTheWay => Some(BookingStatus::Arrived),
        BookingStatus::Arrived => Some(BookingStatus::Completed),
        BookingStatus::Completed => Some(BookingStatus::ClientConfirmed),
        BookingStatus::ClientConfirmed | BookingStatus::Cancelled => None,
    }
}

proptest! {
    /// Property: the transition graph is exactly the linear chain plus
    /// a cancel edge from every non-terminal state. Nothing else is
    /// reachable, so no operation can ever fabricate a status jump.
    #[test]
    fn prop_graph_is_chain_plus_cancel(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        let expected = if from.is_terminal() {
            false
        } else if to == BookingStatus::Cancelled {
            true
        } else {
            forward_successor(from) == Some(to)
        };

        prop_assert_eq!(
            from.can_transition_to(to),
            expected,
            "unexpected edge {:?} -> {:?}",
            from,
            to
        );
    }

    /// Property: authorization never grants an edge the graph forbids.
    #[test]
    fn prop_authorization_implies_legal_edge(
        from in status_strategy(),
        to in status_strategy(),
        role in role_strategy(),
    ) {
        if role_may_transition(from, to, role) {
            prop_assert!(from.can_transition_to(to));
        }
    }

    /// Property: admins can drive every legal edge.
    #[test]
    fn prop_admin_covers_the_graph(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        if from.can_transition_to(to) {
            prop_assert!(role_may_transition(from, to, ActorRole::Admin));
        }
    }

    /// Property: clients never drive the cleaner's progress edges.
    #[test]
    fn prop_clients_cannot_progress_the_job(
        from in status_strategy(),
        to in prop_oneof![
            Just(BookingStatus::Accepted),
            Just(BookingStatus::OnTheWay),
            Just(BookingStatus::Arrived),
            Just(BookingStatus::Completed),
        ],
    ) {
        prop_assert!(!role_may_transition(from, to, ActorRole::Client));
    }

    /// Property: a job is free exactly while the completed count is
    /// below the quota, and a free job never carries a commission.
    #[test]
    fn prop_quota_splits_free_from_charged(
        price in 0u64..=100_000_000,
        completed in 0u32..=1_000,
        quota in 0u32..=100,
    ) {
        let decision = calculate_commission(price, completed, quota, 0.07);

        prop_assert_eq!(decision.is_free_job, completed < quota);
        if decision.is_free_job {
            prop_assert_eq!(decision.commission_amount, 0);
        } else {
            prop_assert_eq!(
                decision.commission_amount,
                (price as f64 * 0.07).round() as u64
            );
        }
    }

    /// Property: commission never exceeds the job price for any sane
    /// rate.
    #[test]
    fn prop_commission_bounded_by_price(
        price in 0u64..=100_000_000,
        completed in 0u32..=1_000,
        rate in 0.0f64..=1.0,
    ) {
        let decision = calculate_commission(price, completed, 20, rate);

        prop_assert!(decision.commission_amount <= price + 1);
    }

    /// Property: blocking is exactly `balance < limit`, nothing fuzzier.
    #[test]
    fn prop_gate_is_strict_comparison(
        balance in -1_000_000i64..=1_000_000,
        limit in -1_000_000i64..=0,
    ) {
        prop_assert_eq!(should_block_cleaner(balance, limit), balance < limit);
    }

    /// Property: the cancellation window never blocks a requested
    /// booking and decides accepted bookings purely by remaining notice.
    #[test]
    fn prop_window_depends_only_on_notice(
        offset_minutes in -10_000i64..=10_000,
    ) {
        let policy = CancellationPolicy::default();
        let now = TimeStamp::from_ymd_hms(2025, 6, 1, 12, 0, 0);
        let scheduled = TimeStamp::from(
            now.to_datetime_utc() + chrono::Duration::minutes(offset_minutes),
        );

        prop_assert!(policy.allows(BookingStatus::Requested, &scheduled, &now));
        prop_assert_eq!(
            policy.allows(BookingStatus::Accepted, &scheduled, &now),
            offset_minutes >= 120
        );
    }
}
