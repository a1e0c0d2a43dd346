//! Service layer API for marketplace operations
//!
//! `MarketService` owns the storage handle and exposes the booking
//! operations; dispute and verification operations live in their own
//! modules as further `impl` blocks. Every mutation commits the entity
//! write and its audit side effects in one atomic unit.

use std::collections::BTreeMap;
use std::sync::Arc;

use sled::Db;
use tracing::{debug, info};

use crate::actor::{Actor, ActorRole};
use crate::audit::{AuditAction, AuditRecord, FraudFlag};
use crate::booking::{self, Booking, BookingDraft, BookingStatus, CancellationPolicy};
use crate::catalog::{self, Addon, ServiceOffering};
use crate::error::MarketError;
use crate::events::{BookingEvent, BookingEventKind};
use crate::finance::{self, FinancePolicy};
use crate::profiles::{CleanerProfile, ClientProfile, Wallet};
use crate::review::{self, Review};
use crate::store::{self, keys};
use crate::time::TimeStamp;
use crate::utils;

/// Marketplace-wide policy knobs with the platform defaults.
#[derive(Debug, Clone, Default)]
pub struct ServicePolicy {
    pub finance: FinancePolicy,
    pub cancellation: CancellationPolicy,
}

pub struct MarketService {
    pub(crate) db: Arc<Db>,
    pub(crate) policy: ServicePolicy,
}

impl MarketService {
    pub fn new(db: Arc<Db>) -> Self {
        Self::with_policy(db, ServicePolicy::default())
    }

    pub fn with_policy(db: Arc<Db>, policy: ServicePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &ServicePolicy {
        &self.policy
    }

    // --- registration and catalog seams ---

    pub fn register_client(&self, display_name: &str) -> Result<ClientProfile, MarketError> {
        let profile = ClientProfile {
            id: utils::new_uuid_to_bech32("client_")?,
            display_name: display_name.to_string(),
            is_active: true,
            created_at: TimeStamp::now(),
        };
        self.db
            .insert(keys::client(&profile.id).as_bytes(), store::encode(&profile)?)?;
        Ok(profile)
    }

    pub fn register_cleaner(&self, display_name: &str) -> Result<CleanerProfile, MarketError> {
        let profile = CleanerProfile {
            id: utils::new_uuid_to_bech32("cleaner_")?,
            display_name: display_name.to_string(),
            is_active: true,
            is_verified: false,
            completed_jobs: 0,
            rating_avg: 0.0,
            rating_count: 0,
            created_at: TimeStamp::now(),
        };
        self.db
            .insert(keys::cleaner(&profile.id).as_bytes(), store::encode(&profile)?)?;
        Ok(profile)
    }

    pub fn get_client(&self, client_id: &str) -> Result<ClientProfile, MarketError> {
        store::require(&self.db, &keys::client(client_id), "client", client_id)
    }

    pub fn get_cleaner(&self, cleaner_id: &str) -> Result<CleanerProfile, MarketError> {
        store::require(&self.db, &keys::cleaner(cleaner_id), "cleaner", cleaner_id)
    }

    pub fn set_cleaner_active(&self, cleaner_id: &str, active: bool) -> Result<CleanerProfile, MarketError> {
        let mut cleaner = self.get_cleaner(cleaner_id)?;
        cleaner.is_active = active;
        self.db
            .insert(keys::cleaner(cleaner_id).as_bytes(), store::encode(&cleaner)?)?;
        Ok(cleaner)
    }

    pub fn create_offering(
        &self,
        cleaner_user_id: &str,
        name: &str,
        base_price: u64,
    ) -> Result<ServiceOffering, MarketError> {
        self.get_cleaner(cleaner_user_id)?;
        let offering = ServiceOffering {
            id: utils::new_uuid_to_bech32("offering_")?,
            cleaner_user_id: cleaner_user_id.to_string(),
            name: name.to_string(),
            base_price,
            is_active: true,
            created_at: TimeStamp::now(),
        };
        self.db
            .insert(keys::offering(&offering.id).as_bytes(), store::encode(&offering)?)?;
        Ok(offering)
    }

    pub fn set_offering_active(&self, offering_id: &str, active: bool) -> Result<ServiceOffering, MarketError> {
        let mut offering: ServiceOffering =
            store::require(&self.db, &keys::offering(offering_id), "offering", offering_id)?;
        offering.is_active = active;
        self.db
            .insert(keys::offering(offering_id).as_bytes(), store::encode(&offering)?)?;
        Ok(offering)
    }

    pub fn create_addon(&self, offering_id: &str, name: &str, price: u64) -> Result<Addon, MarketError> {
        let _offering: ServiceOffering =
            store::require(&self.db, &keys::offering(offering_id), "offering", offering_id)?;
        let addon = Addon {
            id: utils::new_uuid_to_bech32("addon_")?,
            offering_id: offering_id.to_string(),
            name: name.to_string(),
            price,
            is_active: true,
        };
        self.db
            .insert(keys::addon(&addon.id).as_bytes(), store::encode(&addon)?)?;
        Ok(addon)
    }

    /// Seeding seam for the payment subsystem; the marketplace core
    /// itself never debits or credits.
    pub fn upsert_wallet(&self, user_id: &str, balance: i64) -> Result<Wallet, MarketError> {
        let wallet = Wallet {
            user_id: user_id.to_string(),
            balance,
        };
        self.db
            .insert(keys::wallet(user_id).as_bytes(), store::encode(&wallet)?)?;
        Ok(wallet)
    }

    pub fn wallet(&self, user_id: &str) -> Result<Option<Wallet>, MarketError> {
        store::get(&self.db, &keys::wallet(user_id))
    }

    // --- financial gate ---

    fn ensure_cleaner_can_take_work(&self, cleaner: &CleanerProfile) -> Result<(), MarketError> {
        if !cleaner.is_active {
            return Err(MarketError::InvalidState(format!(
                "cleaner {} is inactive",
                cleaner.id
            )));
        }
        let balance = self.wallet(&cleaner.id)?.map(|w| w.balance).unwrap_or(0);
        if finance::should_block_cleaner(balance, self.policy.finance.debt_limit) {
            debug!(cleaner = %cleaner.id, balance, "cleaner blocked by debt limit");
            return Err(MarketError::InvalidState(format!(
                "cleaner {} is over the debt limit",
                cleaner.id
            )));
        }
        Ok(())
    }

    // --- booking lifecycle ---

    /// Create a booking in `Requested`, assigned to the offering's
    /// cleaner, together with its creation event and audit record.
    pub fn create_booking(&self, draft: BookingDraft) -> Result<Booking, MarketError> {
        let parts = draft.validate()?;

        let client = self.get_client(&parts.client_user_id)?;
        if !client.is_active {
            return Err(MarketError::InvalidState(format!(
                "client {} is inactive",
                client.id
            )));
        }

        let offering: ServiceOffering = store::require(
            &self.db,
            &keys::offering(&parts.offering_id),
            "offering",
            &parts.offering_id,
        )?;
        if !offering.is_active {
            return Err(MarketError::InvalidState(format!(
                "offering {} is inactive",
                offering.id
            )));
        }

        let mut addons = Vec::with_capacity(parts.addon_ids.len());
        for addon_id in &parts.addon_ids {
            let addon: Addon = store::require(&self.db, &keys::addon(addon_id), "addon", addon_id)?;
            if addon.offering_id != offering.id {
                return Err(MarketError::InvalidState(format!(
                    "addon {} does not extend offering {}",
                    addon.id, offering.id
                )));
            }
            if !addon.is_active {
                return Err(MarketError::InvalidState(format!(
                    "addon {} is inactive",
                    addon.id
                )));
            }
            addons.push(addon);
        }

        let cleaner = self.get_cleaner(&offering.cleaner_user_id)?;
        self.ensure_cleaner_can_take_work(&cleaner)?;

        let now = TimeStamp::now();
        if parts.scheduled_at <= now {
            return Err(MarketError::InvalidState(
                "scheduled time is in the past".into(),
            ));
        }

        let addon_total = catalog::addon_total(&addons);
        let booking_id = utils::new_uuid_to_bech32("booking_")?;
        let reference_code = utils::reference_code(&booking_id);
        let booking = Booking {
            id: booking_id,
            reference_code: reference_code.clone(),
            client_user_id: parts.client_user_id,
            cleaner_user_id: Some(cleaner.id.clone()),
            offering_id: offering.id.clone(),
            addon_ids: parts.addon_ids,
            scheduled_at: parts.scheduled_at,
            location: parts.location,
            base_price: offering.base_price,
            addon_total,
            total_price: offering.base_price + addon_total,
            status: BookingStatus::Requested,
            created_at: now.clone(),
            updated_at: now,
        };

        let creator = Actor::client(&booking.client_user_id);
        let event = BookingEvent::new(
            &booking.id,
            &creator,
            BookingEventKind::Created { reference_code },
            BTreeMap::new(),
        )?;
        let audit = AuditRecord::new(
            &booking.id,
            &booking.client_user_id,
            AuditAction::BookingCreated,
            None,
            Some(BookingStatus::Requested.as_str().to_string()),
            None,
        )?;

        let writes = vec![
            (keys::booking(&booking.id), store::encode(&booking)?),
            (
                keys::booking_event(&booking.id, &event.id),
                store::encode(&event)?,
            ),
            (
                keys::booking_by_client(&booking.client_user_id, &booking.id),
                store::encode(&booking.id)?,
            ),
            (
                keys::booking_by_cleaner(&cleaner.id, &booking.id),
                store::encode(&booking.id)?,
            ),
            (keys::audit(&booking.id, &audit.id), store::encode(&audit)?),
        ];
        store::commit(
            &self.db,
            Some((keys::booking(&booking.id), None)),
            writes,
            Vec::new(),
        )?;

        info!(
            booking = %booking.id,
            client = %booking.client_user_id,
            cleaner = %cleaner.id,
            total = booking.total_price,
            "booking created"
        );
        Ok(booking)
    }

    fn load_booking_guarded(&self, booking_id: &str) -> Result<(Vec<u8>, Booking), MarketError> {
        let key = keys::booking(booking_id);
        let bytes = store::get_raw(&self.db, &key)?
            .ok_or_else(|| MarketError::not_found("booking", booking_id))?;
        let booking = store::decode(&bytes)?;
        Ok((bytes, booking))
    }

    fn check_ownership(booking: &Booking, actor: &Actor) -> Result<(), MarketError> {
        let owns = match actor.role {
            ActorRole::Admin => true,
            ActorRole::Client => booking.client_user_id == actor.id,
            ActorRole::Cleaner => booking.cleaner_user_id.as_deref() == Some(actor.id.as_str()),
        };
        if owns {
            Ok(())
        } else {
            Err(MarketError::Forbidden(format!(
                "{} {} does not own booking {}",
                actor.role.as_str(),
                actor.id,
                booking.id
            )))
        }
    }

    /// Sole mutator of `Booking::status`. Checks the lifecycle graph,
    /// the (from, to, role) matrix, ownership, and the cancellation
    /// window, then commits booking + event + audit (+ any side-effect
    /// writes from the caller) guarded against concurrent modification.
    fn transition(
        &self,
        booking_id: &str,
        to: BookingStatus,
        actor: &Actor,
        reason: Option<&str>,
        mut meta: BTreeMap<String, String>,
        extra_writes: Vec<(String, Vec<u8>)>,
    ) -> Result<Booking, MarketError> {
        let (old_bytes, mut booking) = self.load_booking_guarded(booking_id)?;
        let from = booking.status;

        if !from.can_transition_to(to) {
            return Err(MarketError::InvalidState(format!(
                "booking {} cannot move from {} to {}",
                booking.id,
                from.as_str(),
                to.as_str()
            )));
        }
        if !booking::role_may_transition(from, to, actor.role) {
            return Err(MarketError::Forbidden(format!(
                "role {} may not move a booking from {} to {}",
                actor.role.as_str(),
                from.as_str(),
                to.as_str()
            )));
        }
        Self::check_ownership(&booking, actor)?;

        let now = TimeStamp::now();
        if to == BookingStatus::Cancelled
            && !actor.is_admin()
            && !self
                .policy
                .cancellation
                .allows(from, &booking.scheduled_at, &now)
        {
            return Err(MarketError::InvalidState(format!(
                "booking {} is inside the cancellation window",
                booking.id
            )));
        }

        // The commission decision is recorded when the job completes;
        // the wallet debit itself belongs to the payment subsystem.
        if to == BookingStatus::Completed {
            if let Some(cleaner_id) = &booking.cleaner_user_id {
                if let Some(cleaner) =
                    store::get::<CleanerProfile>(&self.db, &keys::cleaner(cleaner_id))?
                {
                    let decision = finance::calculate_commission(
                        booking.total_price,
                        cleaner.completed_jobs,
                        self.policy.finance.free_jobs_quota,
                        self.policy.finance.commission_rate,
                    );
                    meta.insert(
                        "commission_amount".into(),
                        decision.commission_amount.to_string(),
                    );
                    meta.insert("is_free_job".into(), decision.is_free_job.to_string());
                }
            }
        }

        booking.status = to;
        booking.updated_at = now;

        let kind = if to == BookingStatus::Cancelled {
            BookingEventKind::Cancelled {
                from,
                reason: reason.unwrap_or_default().to_string(),
            }
        } else {
            BookingEventKind::StatusChanged { from, to }
        };
        let event = BookingEvent::new(&booking.id, actor, kind, meta)?;
        let audit = AuditRecord::new(
            &booking.id,
            &actor.id,
            AuditAction::BookingStatusChanged,
            Some(from.as_str().to_string()),
            Some(to.as_str().to_string()),
            reason.map(str::to_string),
        )?;

        let mut writes = vec![
            (keys::booking(&booking.id), store::encode(&booking)?),
            (
                keys::booking_event(&booking.id, &event.id),
                store::encode(&event)?,
            ),
            (keys::audit(&booking.id, &audit.id), store::encode(&audit)?),
        ];
        writes.extend(extra_writes);
        store::commit(
            &self.db,
            Some((keys::booking(&booking.id), Some(old_bytes))),
            writes,
            Vec::new(),
        )?;

        info!(
            booking = %booking.id,
            from = from.as_str(),
            to = to.as_str(),
            actor = %actor.id,
            "booking status changed"
        );
        Ok(booking)
    }

    pub fn update_booking_status(
        &self,
        booking_id: &str,
        new_status: BookingStatus,
        actor: &Actor,
        meta: BTreeMap<String, String>,
    ) -> Result<Booking, MarketError> {
        self.transition(booking_id, new_status, actor, None, meta, Vec::new())
    }

    /// Late cancels are refused once work has been accepted; a
    /// `Requested` booking may always be cancelled.
    pub fn cancel_booking(
        &self,
        booking_id: &str,
        actor: &Actor,
        reason: &str,
    ) -> Result<Booking, MarketError> {
        self.transition(
            booking_id,
            BookingStatus::Cancelled,
            actor,
            Some(reason),
            BTreeMap::new(),
            Vec::new(),
        )
    }

    /// Client sign-off on a completed job. Optionally leaves the one
    /// review this booking may ever have and refreshes the cleaner's
    /// rating mean; always bumps the cleaner's completed-jobs counter.
    pub fn confirm_booking(
        &self,
        booking_id: &str,
        client: &Actor,
        rating: Option<u8>,
        comment: Option<&str>,
    ) -> Result<Booking, MarketError> {
        let (_, booking) = self.load_booking_guarded(booking_id)?;

        // Status, role, and ownership are all validated by the
        // transition below; here we only assemble the side effects.
        let mut extra_writes = Vec::new();
        if let Some(cleaner_id) = booking.cleaner_user_id.clone() {
            let mut cleaner = self.get_cleaner(&cleaner_id)?;
            cleaner.completed_jobs += 1;

            if let Some(rating) = rating {
                if !review::rating_in_range(rating) {
                    return Err(MarketError::InvalidState(format!(
                        "rating {rating} is out of range"
                    )));
                }
                if store::get_raw(&self.db, &keys::review(booking_id))?.is_none() {
                    let new_review = Review {
                        booking_id: booking.id.clone(),
                        cleaner_user_id: cleaner_id.clone(),
                        client_user_id: booking.client_user_id.clone(),
                        rating,
                        comment: comment.map(str::to_string),
                        created_at: TimeStamp::now(),
                    };
                    let mut reviews: Vec<Review> =
                        store::scan_prefix(&self.db, &keys::review_by_cleaner_prefix(&cleaner_id))?;
                    reviews.push(new_review.clone());
                    cleaner.rating_avg = review::average_rating(&reviews);
                    cleaner.rating_count = reviews.len() as u32;

                    extra_writes.push((keys::review(&booking.id), store::encode(&new_review)?));
                    extra_writes.push((
                        keys::review_by_cleaner(&cleaner_id, &booking.id),
                        store::encode(&new_review)?,
                    ));
                }
            }
            extra_writes.push((keys::cleaner(&cleaner_id), store::encode(&cleaner)?));
        }

        self.transition(
            booking_id,
            BookingStatus::ClientConfirmed,
            client,
            None,
            BTreeMap::new(),
            extra_writes,
        )
    }

    /// Admin-only reassignment while the booking is still `Requested`.
    /// Recorded as an `Assigned` event, deliberately distinct from a
    /// status change.
    pub fn assign_booking_to_cleaner(
        &self,
        booking_id: &str,
        cleaner_id: &str,
        admin: &Actor,
    ) -> Result<Booking, MarketError> {
        if !admin.is_admin() {
            return Err(MarketError::Forbidden(
                "only an admin may reassign a booking".into(),
            ));
        }

        let (old_bytes, mut booking) = self.load_booking_guarded(booking_id)?;
        if booking.status != BookingStatus::Requested {
            return Err(MarketError::InvalidState(format!(
                "booking {} can only be reassigned while requested",
                booking.id
            )));
        }

        let cleaner = self.get_cleaner(cleaner_id)?;
        self.ensure_cleaner_can_take_work(&cleaner)?;

        let previous = booking.cleaner_user_id.clone();
        booking.cleaner_user_id = Some(cleaner.id.clone());
        booking.updated_at = TimeStamp::now();

        let event = BookingEvent::new(
            &booking.id,
            admin,
            BookingEventKind::Assigned {
                previous_cleaner: previous.clone(),
                new_cleaner: cleaner.id.clone(),
            },
            BTreeMap::new(),
        )?;
        let audit = AuditRecord::new(
            &booking.id,
            &admin.id,
            AuditAction::BookingAssigned,
            previous.clone(),
            Some(cleaner.id.clone()),
            None,
        )?;

        let mut writes = vec![
            (keys::booking(&booking.id), store::encode(&booking)?),
            (
                keys::booking_event(&booking.id, &event.id),
                store::encode(&event)?,
            ),
            (
                keys::booking_by_cleaner(&cleaner.id, &booking.id),
                store::encode(&booking.id)?,
            ),
            (keys::audit(&booking.id, &audit.id), store::encode(&audit)?),
        ];
        let mut removes = Vec::new();
        if let Some(prev) = &previous {
            if prev != &cleaner.id {
                removes.push(keys::booking_by_cleaner(prev, &booking.id));
            }
        }
        store::commit(
            &self.db,
            Some((keys::booking(&booking.id), Some(old_bytes))),
            writes,
            removes,
        )?;

        info!(
            booking = %booking.id,
            previous = previous.as_deref().unwrap_or("none"),
            cleaner = %cleaner.id,
            "booking reassigned"
        );
        Ok(booking)
    }

    // --- reads (non-transactional, may trail concurrent writes) ---

    pub fn get_booking(&self, booking_id: &str) -> Result<Booking, MarketError> {
        store::require(&self.db, &keys::booking(booking_id), "booking", booking_id)
    }

    pub fn booking_events(&self, booking_id: &str) -> Result<Vec<BookingEvent>, MarketError> {
        let mut events: Vec<BookingEvent> =
            store::scan_prefix(&self.db, &keys::booking_event_prefix(booking_id))?;
        events.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(events)
    }

    fn bookings_from_index(&self, prefix: &str) -> Result<Vec<Booking>, MarketError> {
        let ids: Vec<String> = store::scan_prefix(&self.db, prefix)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.get_booking(&id)?);
        }
        Ok(out)
    }

    pub fn list_bookings_for_client(&self, client_id: &str) -> Result<Vec<Booking>, MarketError> {
        self.bookings_from_index(&keys::booking_by_client_prefix(client_id))
    }

    pub fn list_bookings_for_cleaner(&self, cleaner_id: &str) -> Result<Vec<Booking>, MarketError> {
        self.bookings_from_index(&keys::booking_by_cleaner_prefix(cleaner_id))
    }

    pub fn audit_trail(&self, entity_id: &str) -> Result<Vec<AuditRecord>, MarketError> {
        let mut records: Vec<AuditRecord> =
            store::scan_prefix(&self.db, &keys::audit_prefix(entity_id))?;
        records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(records)
    }

    // --- fraud flags ---

    pub fn raise_fraud_flag(
        &self,
        admin: &Actor,
        subject_user_id: &str,
        reason: &str,
    ) -> Result<FraudFlag, MarketError> {
        if !admin.is_admin() {
            return Err(MarketError::Forbidden(
                "only an admin may raise a fraud flag".into(),
            ));
        }
        let flag = FraudFlag {
            id: utils::new_uuid_to_bech32("fraud_")?,
            subject_user_id: subject_user_id.to_string(),
            raised_by: admin.id.clone(),
            reason: reason.to_string(),
            created_at: TimeStamp::now(),
        };
        let audit = AuditRecord::new(
            subject_user_id,
            &admin.id,
            AuditAction::FraudFlagRaised,
            None,
            None,
            Some(reason.to_string()),
        )?;
        let writes = vec![
            (
                keys::fraud_flag(subject_user_id, &flag.id),
                store::encode(&flag)?,
            ),
            (keys::audit(subject_user_id, &audit.id), store::encode(&audit)?),
        ];
        store::commit(&self.db, None, writes, Vec::new())?;
        info!(subject = subject_user_id, admin = %admin.id, "fraud flag raised");
        Ok(flag)
    }

    pub fn fraud_flags_for(&self, subject_user_id: &str) -> Result<Vec<FraudFlag>, MarketError> {
        let mut flags: Vec<FraudFlag> =
            store::scan_prefix(&self.db, &keys::fraud_flag_prefix(subject_user_id))?;
        flags.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(flags)
    }
}
