//! Smoke-screen unit tests for marketplace core components
//!
//! Module-spanning unit tests exercising behavior in isolation from the
//! integration scenarios. Mostly happy paths plus the documented policy
//! boundaries.

use cleanmarket::actor::{Actor, ActorRole};
use cleanmarket::audit::{AuditAction, AuditRecord};
use cleanmarket::booking::{BookingStatus, CancellationPolicy, role_may_transition};
use cleanmarket::dispute::{DisputeStatus, DisputeVerdict};
use cleanmarket::finance::{FinancePolicy, calculate_commission, should_block_cleaner};
use cleanmarket::time::TimeStamp;
use cleanmarket::utils::{new_uuid_to_bech32, reference_code};
use cleanmarket::verification::{DocumentStatus, DocumentType, REQUIRED_DOCUMENT_TYPES};

mod id_tests {
    use super::*;

    #[test]
    fn every_entity_prefix_round_trips() {
        for hrp in ["booking_", "client_", "cleaner_", "dispute_", "doc_", "event_"] {
            let id = new_uuid_to_bech32(hrp).unwrap();
            assert!(id.starts_with(hrp), "{id} should start with {hrp}");
        }
    }

    #[test]
    fn reference_codes_are_stable_per_booking() {
        let id = new_uuid_to_bech32("booking_").unwrap();
        assert_eq!(reference_code(&id), reference_code(&id));

        let other = new_uuid_to_bech32("booking_").unwrap();
        assert_ne!(reference_code(&id), reference_code(&other));
    }
}

mod finance_tests {
    use super::*;

    #[test]
    fn gate_boundary_is_exclusive_at_the_limit() {
        assert!(should_block_cleaner(-201, -200));
        assert!(!should_block_cleaner(-200, -200));
    }

    #[test]
    fn quota_boundary_per_platform_terms() {
        let free = calculate_commission(10_000, 19, 20, 0.07);
        assert!(free.is_free_job);
        assert_eq!(free.commission_amount, 0);

        let charged = calculate_commission(10_000, 20, 20, 0.07);
        assert!(!charged.is_free_job);
        assert_eq!(charged.commission_amount, 700);
    }

    #[test]
    fn zero_quota_charges_from_the_first_job() {
        let decision = calculate_commission(10_000, 0, 0, 0.07);
        assert!(!decision.is_free_job);
        assert_eq!(decision.commission_amount, 700);
    }

    #[test]
    fn defaults_are_the_documented_platform_terms() {
        let policy = FinancePolicy::default();
        assert_eq!(policy.debt_limit, -200);
        assert_eq!(policy.free_jobs_quota, 20);
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn happy_path_walks_the_whole_graph() {
        let path = [
            BookingStatus::Requested,
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            BookingStatus::Arrived,
            BookingStatus::Completed,
            BookingStatus::ClientConfirmed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn cancellation_reaches_every_non_terminal_state() {
        for status in [
            BookingStatus::Requested,
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            BookingStatus::Arrived,
            BookingStatus::Completed,
        ] {
            assert!(status.can_transition_to(BookingStatus::Cancelled));
        }
        assert!(!BookingStatus::ClientConfirmed.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn matrix_gives_cleaners_the_progress_edges_only() {
        assert!(role_may_transition(
            BookingStatus::Requested,
            BookingStatus::Accepted,
            ActorRole::Cleaner
        ));
        assert!(!role_may_transition(
            BookingStatus::Completed,
            BookingStatus::ClientConfirmed,
            ActorRole::Cleaner
        ));
    }

    #[test]
    fn window_boundary_is_inclusive_at_exactly_the_notice() {
        let policy = CancellationPolicy::default();
        let now = TimeStamp::from_ymd_hms(2025, 6, 1, 10, 0, 0);
        let exactly_two_hours = TimeStamp::from_ymd_hms(2025, 6, 1, 12, 0, 0);
        let just_inside = TimeStamp::from_ymd_hms(2025, 6, 1, 11, 59, 59);

        assert!(policy.allows(BookingStatus::Accepted, &exactly_two_hours, &now));
        assert!(!policy.allows(BookingStatus::Accepted, &just_inside, &now));
    }

}

mod dispute_tests {
    use super::*;

    #[test]
    fn verdicts_map_to_terminal_statuses() {
        assert_eq!(DisputeVerdict::Resolved.into_status(), DisputeStatus::Resolved);
        assert_eq!(DisputeVerdict::Rejected.into_status(), DisputeStatus::Rejected);
        assert!(DisputeStatus::Resolved.is_terminal());
        assert!(DisputeStatus::Rejected.is_terminal());
        assert!(!DisputeStatus::Open.is_terminal());
    }
}

mod verification_tests {
    use super::*;

    #[test]
    fn insurance_is_not_required() {
        assert_eq!(REQUIRED_DOCUMENT_TYPES.len(), 3);
        assert!(!REQUIRED_DOCUMENT_TYPES.contains(&DocumentType::InsuranceCertificate));
    }

    #[test]
    fn only_pending_documents_are_reviewable() {
        assert!(!DocumentStatus::Pending.is_reviewed());
        assert!(DocumentStatus::Approved.is_reviewed());
        assert!(DocumentStatus::Rejected.is_reviewed());
    }
}

mod audit_tests {
    use super::*;

    #[test]
    fn audit_record_cbor_roundtrip() {
        let original = AuditRecord::new(
            "booking_test",
            "admin_test",
            AuditAction::BookingStatusChanged,
            Some("requested".into()),
            Some("accepted".into()),
            None,
        )
        .unwrap();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: AuditRecord = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }
}

mod actor_tests {
    use super::*;

    #[test]
    fn helpers_set_the_role() {
        assert_eq!(Actor::client("client_a").role, ActorRole::Client);
        assert_eq!(Actor::cleaner("cleaner_a").role, ActorRole::Cleaner);
        assert!(Actor::admin("admin_a").is_admin());
        assert!(!Actor::client("client_a").is_admin());
    }
}
