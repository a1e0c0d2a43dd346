/// Typed failures surfaced by every marketplace operation. Mapping these
/// onto transport status codes is the caller's job.
#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage failure")]
    Storage(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
