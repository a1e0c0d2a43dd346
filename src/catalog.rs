//! Service offerings and their addons

use serde::{Deserialize, Serialize};

use crate::time::TimeStamp;

/// A bookable service published by a cleaner. Prices are integers in
/// minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct ServiceOffering {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub cleaner_user_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub base_price: u64,
    #[n(4)]
    pub is_active: bool,
    #[n(5)]
    pub created_at: TimeStamp,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct Addon {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub offering_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub price: u64,
    #[n(4)]
    pub is_active: bool,
}

pub fn addon_total(addons: &[Addon]) -> u64 {
    addons.iter().map(|a| a.price).sum()
}
