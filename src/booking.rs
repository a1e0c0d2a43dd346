//! Booking entity, lifecycle graph, and transition authorization

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::actor::ActorRole;
use crate::error::MarketError;
use crate::time::TimeStamp;

/// Lifecycle states. `ClientConfirmed` and `Cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[n(0)]
    Requested,
    #[n(1)]
    Accepted,
    #[n(2)]
    OnTheWay,
    #[n(3)]
    Arrived,
    #[n(4)]
    Completed,
    #[n(5)]
    ClientConfirmed,
    #[n(6)]
    Cancelled,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::OnTheWay => "on_the_way",
            Self::Arrived => "arrived",
            Self::Completed => "completed",
            Self::ClientConfirmed => "client_confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ClientConfirmed | Self::Cancelled)
    }

    /// Legal edges of the lifecycle graph. Cancellation is an edge from
    /// every non-terminal state; the timing policy is enforced separately.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Self::Requested, Self::Accepted)
                | (Self::Accepted, Self::OnTheWay)
                | (Self::OnTheWay, Self::Arrived)
                | (Self::Arrived, Self::Completed)
                | (Self::Completed, Self::ClientConfirmed)
        )
    }
}

/// Role permissions per forward transition, consulted once per call.
/// Ownership (the client owns the booking, the cleaner is its assignee)
/// is a separate check in the service layer.
const TRANSITION_ROLES: &[(BookingStatus, BookingStatus, &[ActorRole])] = &[
    (
        BookingStatus::Requested,
        BookingStatus::Accepted,
        &[ActorRole::Cleaner, ActorRole::Admin],
    ),
    (
        BookingStatus::Accepted,
        BookingStatus::OnTheWay,
        &[ActorRole::Cleaner, ActorRole::Admin],
    ),
    (
        BookingStatus::OnTheWay,
        BookingStatus::Arrived,
        &[ActorRole::Cleaner, ActorRole::Admin],
    ),
    (
        BookingStatus::Arrived,
        BookingStatus::Completed,
        &[ActorRole::Cleaner, ActorRole::Admin],
    ),
    (
        BookingStatus::Completed,
        BookingStatus::ClientConfirmed,
        &[ActorRole::Client, ActorRole::Admin],
    ),
];

/// Whether `role` may drive the `from -> to` edge. Every participant
/// role may request a cancel; the window policy and ownership checks
/// gate the rest.
pub fn role_may_transition(from: BookingStatus, to: BookingStatus, role: ActorRole) -> bool {
    if to == BookingStatus::Cancelled {
        return !from.is_terminal();
    }
    TRANSITION_ROLES
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .is_some_and(|(_, _, roles)| roles.contains(&role))
}

/// Late-cancel guard. A booking still in `Requested` may always be
/// cancelled; once work has been accepted a cancel needs at least
/// `min_notice` before the scheduled start. Admins bypass this.
#[derive(Debug, Clone)]
pub struct CancellationPolicy {
    pub min_notice: Duration,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            min_notice: Duration::hours(2),
        }
    }
}

impl CancellationPolicy {
    pub fn allows(&self, status: BookingStatus, scheduled_at: &TimeStamp, now: &TimeStamp) -> bool {
        if status == BookingStatus::Requested {
            return true;
        }
        scheduled_at.to_datetime_utc() - now.to_datetime_utc() >= self.min_notice
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct Location {
    #[n(0)]
    pub lat: f64,
    #[n(1)]
    pub lng: f64,
    #[n(2)]
    pub address: String,
}

/// A scheduled service engagement. Never hard-deleted; `cleaner_user_id`
/// changes only through admin reassignment while still `Requested`.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct Booking {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub reference_code: String,
    #[n(2)]
    pub client_user_id: String,
    #[n(3)]
    pub cleaner_user_id: Option<String>,
    #[n(4)]
    pub offering_id: String,
    #[n(5)]
    pub addon_ids: Vec<String>,
    #[n(6)]
    pub scheduled_at: TimeStamp,
    #[n(7)]
    pub location: Location,
    #[n(8)]
    pub base_price: u64,
    #[n(9)]
    pub addon_total: u64,
    #[n(10)]
    pub total_price: u64,
    #[n(11)]
    pub status: BookingStatus,
    #[n(12)]
    pub created_at: TimeStamp,
    #[n(13)]
    pub updated_at: TimeStamp,
}

/// Client-supplied booking request, built up with chained setters.
/// Field presence is validated here; referential checks (offering
/// exists, addons belong to it, cleaner passes the gate) stay with the
/// service.
#[derive(Debug, Default)]
pub struct BookingDraft {
    client_user_id: Option<String>,
    offering_id: Option<String>,
    addon_ids: Vec<String>,
    scheduled_at: Option<TimeStamp>,
    location: Option<Location>,
}

pub(crate) struct DraftParts {
    pub client_user_id: String,
    pub offering_id: String,
    pub addon_ids: Vec<String>,
    pub scheduled_at: TimeStamp,
    pub location: Location,
}

impl BookingDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn client(mut self, id: impl Into<String>) -> Self {
        self.client_user_id = Some(id.into());
        self
    }
    pub fn offering(mut self, id: impl Into<String>) -> Self {
        self.offering_id = Some(id.into());
        self
    }
    pub fn addon(mut self, id: impl Into<String>) -> Self {
        self.addon_ids.push(id.into());
        self
    }
    pub fn scheduled_at(mut self, at: TimeStamp) -> Self {
        self.scheduled_at = Some(at);
        self
    }
    pub fn location(mut self, lat: f64, lng: f64, address: impl Into<String>) -> Self {
        self.location = Some(Location {
            lat,
            lng,
            address: address.into(),
        });
        self
    }

    pub(crate) fn validate(self) -> Result<DraftParts, MarketError> {
        let client_user_id = self
            .client_user_id
            .ok_or_else(|| MarketError::InvalidState("booking draft has no client".into()))?;
        let offering_id = self
            .offering_id
            .ok_or_else(|| MarketError::InvalidState("booking draft has no offering".into()))?;
        let scheduled_at = self
            .scheduled_at
            .ok_or_else(|| MarketError::InvalidState("booking draft has no scheduled time".into()))?;
        let location = self
            .location
            .ok_or_else(|| MarketError::InvalidState("booking draft has no location".into()))?;

        Ok(DraftParts {
            client_user_id,
            offering_id,
            addon_ids: self.addon_ids,
            scheduled_at,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for next in [
            BookingStatus::Requested,
            BookingStatus::Accepted,
            BookingStatus::Cancelled,
            BookingStatus::ClientConfirmed,
        ] {
            assert!(!BookingStatus::ClientConfirmed.can_transition_to(next));
            assert!(!BookingStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn forward_edges_follow_the_graph() {
        assert!(BookingStatus::Requested.can_transition_to(BookingStatus::Accepted));
        assert!(BookingStatus::Arrived.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Requested.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Accepted));
    }

    #[test]
    fn clients_cannot_drive_cleaner_progress_edges() {
        assert!(!role_may_transition(
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            ActorRole::Client
        ));
        assert!(role_may_transition(
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            ActorRole::Cleaner
        ));
        assert!(role_may_transition(
            BookingStatus::Accepted,
            BookingStatus::OnTheWay,
            ActorRole::Admin
        ));
    }

    #[test]
    fn only_client_or_admin_confirm() {
        assert!(role_may_transition(
            BookingStatus::Completed,
            BookingStatus::ClientConfirmed,
            ActorRole::Client
        ));
        assert!(!role_may_transition(
            BookingStatus::Completed,
            BookingStatus::ClientConfirmed,
            ActorRole::Cleaner
        ));
    }

    #[test]
    fn requested_booking_is_always_cancellable() {
        let policy = CancellationPolicy::default();
        let now = TimeStamp::from_ymd_hms(2025, 5, 10, 9, 0, 0);
        let in_thirty_minutes = TimeStamp::from_ymd_hms(2025, 5, 10, 9, 30, 0);

        assert!(policy.allows(BookingStatus::Requested, &in_thirty_minutes, &now));
    }

    #[test]
    fn accepted_booking_blocks_late_cancels() {
        let policy = CancellationPolicy::default();
        let now = TimeStamp::from_ymd_hms(2025, 5, 10, 9, 0, 0);
        let in_thirty_minutes = TimeStamp::from_ymd_hms(2025, 5, 10, 9, 30, 0);
        let tomorrow = TimeStamp::from_ymd_hms(2025, 5, 11, 9, 0, 0);

        assert!(!policy.allows(BookingStatus::Accepted, &in_thirty_minutes, &now));
        assert!(policy.allows(BookingStatus::Accepted, &tomorrow, &now));
    }

    #[test]
    fn draft_without_location_fails_validation() {
        let draft = BookingDraft::new()
            .client("client_test")
            .offering("offering_test")
            .scheduled_at(TimeStamp::from_ymd_hms(2025, 5, 10, 9, 0, 0));

        assert!(matches!(
            draft.validate(),
            Err(MarketError::InvalidState(_))
        ));
    }
}
