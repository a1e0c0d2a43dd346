//! Client and cleaner profiles plus the consulted-only wallet

use serde::{Deserialize, Serialize};

use crate::time::TimeStamp;

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct ClientProfile {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub display_name: String,
    #[n(2)]
    pub is_active: bool,
    #[n(3)]
    pub created_at: TimeStamp,
}

/// `is_verified` is a cached projection over the cleaner's verification
/// documents; it is recomputed after every document review and only
/// otherwise writable through the explicit admin override.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct CleanerProfile {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub display_name: String,
    #[n(2)]
    pub is_active: bool,
    #[n(3)]
    pub is_verified: bool,
    #[n(4)]
    pub completed_jobs: u32,
    #[n(5)]
    pub rating_avg: f64,
    #[n(6)]
    pub rating_count: u32,
    #[n(7)]
    pub created_at: TimeStamp,
}

/// Balance in minor currency units. The marketplace core only reads it
/// (financial gate); debits and credits belong to the payment subsystem.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct Wallet {
    #[n(0)]
    pub user_id: String,
    #[n(1)]
    pub balance: i64,
}
