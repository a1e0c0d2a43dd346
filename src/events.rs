//! Append-only booking event trail
//!
//! One event per mutation, written in the same atomic commit as the
//! booking itself. Kinds are explicit: an assignment is never encoded
//! as a status change, so downstream consumers can tell the two apart
//! without comparing old/new fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorRole};
use crate::booking::BookingStatus;
use crate::error::MarketError;
use crate::time::TimeStamp;
use crate::utils;

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BookingEventKind {
    #[n(0)]
    Created {
        #[n(0)]
        reference_code: String,
    },
    #[n(1)]
    StatusChanged {
        #[n(0)]
        from: BookingStatus,
        #[n(1)]
        to: BookingStatus,
    },
    #[n(2)]
    Assigned {
        #[n(0)]
        previous_cleaner: Option<String>,
        #[n(1)]
        new_cleaner: String,
    },
    #[n(3)]
    Cancelled {
        #[n(0)]
        from: BookingStatus,
        #[n(1)]
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct BookingEvent {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub booking_id: String,
    #[n(2)]
    pub actor_id: String,
    #[n(3)]
    pub actor_role: ActorRole,
    #[n(4)]
    pub recorded_at: TimeStamp,
    #[n(5)]
    pub kind: BookingEventKind,
    #[n(6)]
    pub meta: BTreeMap<String, String>,
}

impl BookingEvent {
    pub fn new(
        booking_id: impl Into<String>,
        actor: &Actor,
        kind: BookingEventKind,
        meta: BTreeMap<String, String>,
    ) -> Result<Self, MarketError> {
        Ok(Self {
            id: utils::new_uuid_to_bech32("event_")?,
            booking_id: booking_id.into(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            recorded_at: TimeStamp::now(),
            kind,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_cbor_roundtrip() {
        let actor = Actor::admin("admin_test");
        let mut meta = BTreeMap::new();
        meta.insert("reason".to_string(), "client no-show".to_string());

        let original = BookingEvent::new(
            "booking_test",
            &actor,
            BookingEventKind::Cancelled {
                from: BookingStatus::Accepted,
                reason: "client no-show".into(),
            },
            meta,
        )
        .unwrap();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: BookingEvent = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }
}
