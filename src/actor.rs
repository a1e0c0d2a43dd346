//! Acting identities passed into every operation

use serde::{Deserialize, Serialize};

/// Role under which an actor is exercising an operation. Authorization
/// is decided per (transition, role) pair, never per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[n(0)]
    Client,
    #[n(1)]
    Cleaner,
    #[n(2)]
    Admin,
}

impl ActorRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Cleaner => "cleaner",
            Self::Admin => "admin",
        }
    }
}

/// Identity + role of the caller, as resolved by the (out of scope)
/// authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
    pub fn client(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Client)
    }
    pub fn cleaner(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Cleaner)
    }
    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Admin)
    }
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
