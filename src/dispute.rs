//! Dispute tracking
//!
//! One dispute per booking, opened by a participant and closed once by
//! an admin. The storage key is the booking id, so the
//! one-dispute-per-booking rule holds even under concurrent creates.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::{Actor, ActorRole};
use crate::audit::{AuditAction, AuditRecord};
use crate::booking::Booking;
use crate::error::MarketError;
use crate::service::MarketService;
use crate::store::{self, keys};
use crate::time::TimeStamp;
use crate::utils;

/// `Resolved` and `Rejected` are terminal; a closed dispute never
/// reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    #[n(0)]
    Open,
    #[n(1)]
    Resolved,
    #[n(2)]
    Rejected,
}

impl DisputeStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

/// Admin's verdict when closing a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeVerdict {
    Resolved,
    Rejected,
}

impl DisputeVerdict {
    pub const fn into_status(self) -> DisputeStatus {
        match self {
            Self::Resolved => DisputeStatus::Resolved,
            Self::Rejected => DisputeStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct Dispute {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub booking_id: String,
    #[n(2)]
    pub opened_by: String,
    #[n(3)]
    pub opener_role: ActorRole,
    #[n(4)]
    pub reason: String,
    #[n(5)]
    pub status: DisputeStatus,
    #[n(6)]
    pub resolved_by: Option<String>,
    #[n(7)]
    pub resolution_note: Option<String>,
    #[n(8)]
    pub resolved_at: Option<TimeStamp>,
    #[n(9)]
    pub created_at: TimeStamp,
}

fn is_participant(booking: &Booking, opener: &Actor) -> bool {
    match opener.role {
        ActorRole::Client => booking.client_user_id == opener.id,
        ActorRole::Cleaner => booking.cleaner_user_id.as_deref() == Some(opener.id.as_str()),
        ActorRole::Admin => false,
    }
}

impl MarketService {
    /// Open a dispute over a booking. Only the booking's client or its
    /// assigned cleaner may open one, and only once per booking.
    pub fn create_dispute(
        &self,
        booking_id: &str,
        opener: &Actor,
        reason: &str,
    ) -> Result<Dispute, MarketError> {
        let booking = self.get_booking(booking_id)?;
        if !is_participant(&booking, opener) {
            return Err(MarketError::Forbidden(format!(
                "{} {} is not a participant of booking {}",
                opener.role.as_str(),
                opener.id,
                booking.id
            )));
        }
        if store::get_raw(&self.db, &keys::dispute(booking_id))?.is_some() {
            return Err(MarketError::InvalidState(format!(
                "booking {} already has a dispute",
                booking.id
            )));
        }

        let dispute = Dispute {
            id: utils::new_uuid_to_bech32("dispute_")?,
            booking_id: booking.id.clone(),
            opened_by: opener.id.clone(),
            opener_role: opener.role,
            reason: reason.to_string(),
            status: DisputeStatus::Open,
            resolved_by: None,
            resolution_note: None,
            resolved_at: None,
            created_at: TimeStamp::now(),
        };
        let audit = AuditRecord::new(
            &dispute.id,
            &opener.id,
            AuditAction::DisputeOpened,
            None,
            Some(DisputeStatus::Open.as_str().to_string()),
            Some(reason.to_string()),
        )?;

        let writes = vec![
            (keys::dispute(&booking.id), store::encode(&dispute)?),
            (keys::dispute_id_index(&dispute.id), store::encode(&booking.id)?),
            (keys::audit(&dispute.id, &audit.id), store::encode(&audit)?),
        ];
        // Guarding on key absence closes the create/create race: the
        // second writer gets Conflict instead of clobbering the first.
        store::commit(
            &self.db,
            Some((keys::dispute(&booking.id), None)),
            writes,
            Vec::new(),
        )?;

        info!(dispute = %dispute.id, booking = %booking.id, opener = %opener.id, "dispute opened");
        Ok(dispute)
    }

    /// Close an open dispute with a verdict. Refused once terminal.
    pub fn resolve_dispute(
        &self,
        dispute_id: &str,
        admin: &Actor,
        verdict: DisputeVerdict,
        note: &str,
    ) -> Result<Dispute, MarketError> {
        if !admin.is_admin() {
            return Err(MarketError::Forbidden(
                "only an admin may resolve a dispute".into(),
            ));
        }

        let booking_id: String = store::require(
            &self.db,
            &keys::dispute_id_index(dispute_id),
            "dispute",
            dispute_id,
        )?;
        let key = keys::dispute(&booking_id);
        let old_bytes = store::get_raw(&self.db, &key)?
            .ok_or_else(|| MarketError::not_found("dispute", dispute_id))?;
        let mut dispute: Dispute = store::decode(&old_bytes)?;

        if dispute.status.is_terminal() {
            return Err(MarketError::InvalidState(format!(
                "dispute {} is already {}",
                dispute.id,
                dispute.status.as_str()
            )));
        }

        let from = dispute.status;
        dispute.status = verdict.into_status();
        dispute.resolved_by = Some(admin.id.clone());
        dispute.resolution_note = Some(note.to_string());
        dispute.resolved_at = Some(TimeStamp::now());

        let audit = AuditRecord::new(
            &dispute.id,
            &admin.id,
            AuditAction::DisputeResolved,
            Some(from.as_str().to_string()),
            Some(dispute.status.as_str().to_string()),
            Some(note.to_string()),
        )?;

        let writes = vec![
            (key.clone(), store::encode(&dispute)?),
            (keys::audit(&dispute.id, &audit.id), store::encode(&audit)?),
        ];
        store::commit(&self.db, Some((key, Some(old_bytes))), writes, Vec::new())?;

        info!(
            dispute = %dispute.id,
            booking = %dispute.booking_id,
            verdict = dispute.status.as_str(),
            "dispute closed"
        );
        Ok(dispute)
    }

    pub fn get_dispute(&self, dispute_id: &str) -> Result<Dispute, MarketError> {
        let booking_id: String = store::require(
            &self.db,
            &keys::dispute_id_index(dispute_id),
            "dispute",
            dispute_id,
        )?;
        store::require(&self.db, &keys::dispute(&booking_id), "dispute", dispute_id)
    }

    pub fn dispute_for_booking(&self, booking_id: &str) -> Result<Option<Dispute>, MarketError> {
        store::get(&self.db, &keys::dispute(booking_id))
    }

    pub fn list_open_disputes(&self) -> Result<Vec<Dispute>, MarketError> {
        let all: Vec<Dispute> = store::scan_prefix(&self.db, &keys::dispute_prefix())?;
        Ok(all
            .into_iter()
            .filter(|d| d.status == DisputeStatus::Open)
            .collect())
    }
}
