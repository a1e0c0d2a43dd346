//! Cleaner verification documents
//!
//! Two linked trackers: per-document review (`Pending` to a terminal
//! decision, exactly once) and the per-cleaner aggregate flag, which is
//! a pure recomputation over the full document set. The recompute is
//! idempotent: when the stored flag already matches, nothing is written
//! and no audit entry is produced.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::Actor;
use crate::audit::{AuditAction, AuditRecord};
use crate::error::MarketError;
use crate::profiles::CleanerProfile;
use crate::service::MarketService;
use crate::store::{self, keys};
use crate::time::TimeStamp;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[n(0)]
    IdCard,
    #[n(1)]
    BusinessLicense,
    #[n(2)]
    VehicleRegistration,
    #[n(3)]
    InsuranceCertificate,
}

impl DocumentType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdCard => "id_card",
            Self::BusinessLicense => "business_license",
            Self::VehicleRegistration => "vehicle_registration",
            Self::InsuranceCertificate => "insurance_certificate",
        }
    }
}

/// Types a cleaner must have approved before the profile counts as
/// verified. Insurance is accepted but never required.
pub const REQUIRED_DOCUMENT_TYPES: &[DocumentType] = &[
    DocumentType::IdCard,
    DocumentType::BusinessLicense,
    DocumentType::VehicleRegistration,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl DocumentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// A document is reviewed at most once per submission.
    pub const fn is_reviewed(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub const fn into_status(self) -> DocumentStatus {
        match self {
            Self::Approve => DocumentStatus::Approved,
            Self::Reject => DocumentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct VerificationDocument {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub cleaner_user_id: String,
    #[n(2)]
    pub doc_type: DocumentType,
    #[n(3)]
    pub content_hash: String,
    #[n(4)]
    pub status: DocumentStatus,
    #[n(5)]
    pub reviewed_by: Option<String>,
    #[n(6)]
    pub reviewed_at: Option<TimeStamp>,
    #[n(7)]
    pub submitted_at: TimeStamp,
}

/// Verified iff, for every required type, the cleaner's most recently
/// submitted document of that type is approved. Resubmitting a type
/// starts a new review cycle, so a rejected replacement withdraws the
/// verification the earlier approval granted.
pub fn verified_from_documents(documents: &[VerificationDocument]) -> bool {
    REQUIRED_DOCUMENT_TYPES.iter().all(|required| {
        documents
            .iter()
            .filter(|d| d.doc_type == *required)
            .max_by(|a, b| a.submitted_at.cmp(&b.submitted_at))
            .is_some_and(|d| d.status == DocumentStatus::Approved)
    })
}

impl MarketService {
    /// Record a submitted document as `Pending`, keeping only the
    /// sha256 digest of its content. Resubmission after a rejection is
    /// a new document.
    pub fn submit_document(
        &self,
        cleaner_id: &str,
        doc_type: DocumentType,
        content: &[u8],
    ) -> Result<VerificationDocument, MarketError> {
        self.get_cleaner(cleaner_id)?;

        let document = VerificationDocument {
            id: utils::new_uuid_to_bech32("doc_")?,
            cleaner_user_id: cleaner_id.to_string(),
            doc_type,
            content_hash: sha256::digest(content),
            status: DocumentStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            submitted_at: TimeStamp::now(),
        };
        let audit = AuditRecord::new(
            &document.id,
            cleaner_id,
            AuditAction::DocumentSubmitted,
            None,
            Some(DocumentStatus::Pending.as_str().to_string()),
            Some(doc_type.as_str().to_string()),
        )?;

        let writes = vec![
            (
                keys::document(cleaner_id, &document.id),
                store::encode(&document)?,
            ),
            (
                keys::document_id_index(&document.id),
                store::encode(&cleaner_id.to_string())?,
            ),
            (keys::audit(&document.id, &audit.id), store::encode(&audit)?),
        ];
        store::commit(&self.db, None, writes, Vec::new())?;

        info!(
            document = %document.id,
            cleaner = cleaner_id,
            doc_type = doc_type.as_str(),
            "verification document submitted"
        );
        Ok(document)
    }

    /// Decide a pending document, then recompute the cleaner's
    /// aggregate flag. Reviewing an already-decided document is
    /// refused. The decided document, the (possibly flipped) profile,
    /// and all audit records commit in one atomic unit, guarded on the
    /// document's pre-review bytes so two concurrent reviews cannot
    /// both win.
    pub fn review_document(
        &self,
        document_id: &str,
        admin: &Actor,
        decision: ReviewDecision,
    ) -> Result<VerificationDocument, MarketError> {
        if !admin.is_admin() {
            return Err(MarketError::Forbidden(
                "only an admin may review a document".into(),
            ));
        }

        let cleaner_id: String = store::require(
            &self.db,
            &keys::document_id_index(document_id),
            "document",
            document_id,
        )?;
        let key = keys::document(&cleaner_id, document_id);
        let old_bytes = store::get_raw(&self.db, &key)?
            .ok_or_else(|| MarketError::not_found("document", document_id))?;
        let mut document: VerificationDocument = store::decode(&old_bytes)?;

        if document.status.is_reviewed() {
            return Err(MarketError::InvalidState(format!(
                "document {} is already {}",
                document.id,
                document.status.as_str()
            )));
        }

        document.status = decision.into_status();
        document.reviewed_by = Some(admin.id.clone());
        document.reviewed_at = Some(TimeStamp::now());

        let audit = AuditRecord::new(
            &document.id,
            &admin.id,
            AuditAction::DocumentReviewed,
            Some(DocumentStatus::Pending.as_str().to_string()),
            Some(document.status.as_str().to_string()),
            Some(document.doc_type.as_str().to_string()),
        )?;

        let mut writes = vec![
            (key.clone(), store::encode(&document)?),
            (keys::audit(&document.id, &audit.id), store::encode(&audit)?),
        ];

        // Recompute the aggregate over the full set, with the freshly
        // decided document substituted for its stale stored copy.
        let mut documents: Vec<VerificationDocument> =
            store::scan_prefix(&self.db, &keys::document_prefix(&cleaner_id))?;
        for stored in &mut documents {
            if stored.id == document.id {
                *stored = document.clone();
            }
        }
        let verified = verified_from_documents(&documents);

        let mut profile = self.get_cleaner(&cleaner_id)?;
        if profile.is_verified != verified {
            profile.is_verified = verified;
            let action = if verified {
                AuditAction::CleanerAutoVerified
            } else {
                AuditAction::CleanerAutoUnverified
            };
            let flip_audit = AuditRecord::new(
                &cleaner_id,
                &admin.id,
                action,
                Some((!verified).to_string()),
                Some(verified.to_string()),
                None,
            )?;
            writes.push((keys::cleaner(&cleaner_id), store::encode(&profile)?));
            writes.push((
                keys::audit(&cleaner_id, &flip_audit.id),
                store::encode(&flip_audit)?,
            ));
            info!(cleaner = %cleaner_id, verified, "cleaner verification flag recomputed");
        }

        store::commit(&self.db, Some((key, Some(old_bytes))), writes, Vec::new())?;

        info!(
            document = %document.id,
            cleaner = %cleaner_id,
            decision = document.status.as_str(),
            "verification document reviewed"
        );
        Ok(document)
    }

    /// Direct admin override of the aggregate flag. A no-op override
    /// writes nothing and leaves no audit entry.
    pub fn verify_cleaner(
        &self,
        cleaner_id: &str,
        admin: &Actor,
        verified: bool,
    ) -> Result<CleanerProfile, MarketError> {
        if !admin.is_admin() {
            return Err(MarketError::Forbidden(
                "only an admin may override verification".into(),
            ));
        }

        let mut profile = self.get_cleaner(cleaner_id)?;
        if profile.is_verified == verified {
            return Ok(profile);
        }

        let before = profile.is_verified;
        profile.is_verified = verified;
        let audit = AuditRecord::new(
            cleaner_id,
            &admin.id,
            AuditAction::CleanerVerificationOverridden,
            Some(before.to_string()),
            Some(verified.to_string()),
            None,
        )?;

        let writes = vec![
            (keys::cleaner(cleaner_id), store::encode(&profile)?),
            (keys::audit(cleaner_id, &audit.id), store::encode(&audit)?),
        ];
        store::commit(&self.db, None, writes, Vec::new())?;

        info!(cleaner = cleaner_id, verified, admin = %admin.id, "verification overridden");
        Ok(profile)
    }

    pub fn documents_for_cleaner(
        &self,
        cleaner_id: &str,
    ) -> Result<Vec<VerificationDocument>, MarketError> {
        let mut documents: Vec<VerificationDocument> =
            store::scan_prefix(&self.db, &keys::document_prefix(cleaner_id))?;
        documents.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(documents)
    }
}
