//! Append-only audit records and fraud flags
//!
//! Every mutation writes exactly one audit record inside the same
//! atomic commit as the entity it describes, so a committed mutation
//! can never be missing its trail.

use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::time::TimeStamp;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    #[n(0)]
    BookingCreated,
    #[n(1)]
    BookingStatusChanged,
    #[n(2)]
    BookingAssigned,
    #[n(3)]
    DisputeOpened,
    #[n(4)]
    DisputeResolved,
    #[n(5)]
    DocumentSubmitted,
    #[n(6)]
    DocumentReviewed,
    #[n(7)]
    CleanerAutoVerified,
    #[n(8)]
    CleanerAutoUnverified,
    #[n(9)]
    CleanerVerificationOverridden,
    #[n(10)]
    FraudFlagRaised,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BookingCreated => "booking_created",
            Self::BookingStatusChanged => "booking_status_changed",
            Self::BookingAssigned => "booking_assigned",
            Self::DisputeOpened => "dispute_opened",
            Self::DisputeResolved => "dispute_resolved",
            Self::DocumentSubmitted => "document_submitted",
            Self::DocumentReviewed => "document_reviewed",
            Self::CleanerAutoVerified => "cleaner_auto_verified",
            Self::CleanerAutoUnverified => "cleaner_auto_unverified",
            Self::CleanerVerificationOverridden => "cleaner_verification_overridden",
            Self::FraudFlagRaised => "fraud_flag_raised",
        }
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct AuditRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub entity_id: String,
    #[n(2)]
    pub actor_id: String,
    #[n(3)]
    pub action: AuditAction,
    #[n(4)]
    pub before: Option<String>,
    #[n(5)]
    pub after: Option<String>,
    #[n(6)]
    pub note: Option<String>,
    #[n(7)]
    pub recorded_at: TimeStamp,
}

impl AuditRecord {
    pub fn new(
        entity_id: impl Into<String>,
        actor_id: impl Into<String>,
        action: AuditAction,
        before: Option<String>,
        after: Option<String>,
        note: Option<String>,
    ) -> Result<Self, MarketError> {
        Ok(Self {
            id: utils::new_uuid_to_bech32("audit_")?,
            entity_id: entity_id.into(),
            actor_id: actor_id.into(),
            action,
            before,
            after,
            note,
            recorded_at: TimeStamp::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct FraudFlag {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub subject_user_id: String,
    #[n(2)]
    pub raised_by: String,
    #[n(3)]
    pub reason: String,
    #[n(4)]
    pub created_at: TimeStamp,
}
