//! Storage codec and atomic-commit helpers
//!
//! Entities live in one sled keyspace under namespaced string keys and
//! are encoded with CBOR. Mutations go through `commit`, which applies
//! every write in a single sled transaction; an optional guard pins the
//! expected current bytes of the primary key, so check-then-write
//! operations cannot be raced by a concurrent writer.

use sled::Db;
use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::error::MarketError;

pub(crate) mod keys {
    pub fn client(id: &str) -> String {
        format!("client/{id}")
    }
    pub fn cleaner(id: &str) -> String {
        format!("cleaner/{id}")
    }
    pub fn wallet(user_id: &str) -> String {
        format!("wallet/{user_id}")
    }
    pub fn offering(id: &str) -> String {
        format!("offering/{id}")
    }
    pub fn addon(id: &str) -> String {
        format!("addon/{id}")
    }
    pub fn booking(id: &str) -> String {
        format!("booking/{id}")
    }
    pub fn booking_event(booking_id: &str, event_id: &str) -> String {
        format!("bkevent/{booking_id}/{event_id}")
    }
    pub fn booking_event_prefix(booking_id: &str) -> String {
        format!("bkevent/{booking_id}/")
    }
    pub fn booking_by_client(client_id: &str, booking_id: &str) -> String {
        format!("bkclient/{client_id}/{booking_id}")
    }
    pub fn booking_by_client_prefix(client_id: &str) -> String {
        format!("bkclient/{client_id}/")
    }
    pub fn booking_by_cleaner(cleaner_id: &str, booking_id: &str) -> String {
        format!("bkcleaner/{cleaner_id}/{booking_id}")
    }
    pub fn booking_by_cleaner_prefix(cleaner_id: &str) -> String {
        format!("bkcleaner/{cleaner_id}/")
    }
    // Disputes are keyed by booking id: the key itself is the
    // one-dispute-per-booking uniqueness constraint.
    pub fn dispute(booking_id: &str) -> String {
        format!("dispute/{booking_id}")
    }
    pub fn dispute_prefix() -> String {
        "dispute/".to_string()
    }
    pub fn dispute_id_index(dispute_id: &str) -> String {
        format!("disputeid/{dispute_id}")
    }
    pub fn document(cleaner_id: &str, document_id: &str) -> String {
        format!("doc/{cleaner_id}/{document_id}")
    }
    pub fn document_prefix(cleaner_id: &str) -> String {
        format!("doc/{cleaner_id}/")
    }
    pub fn document_id_index(document_id: &str) -> String {
        format!("docid/{document_id}")
    }
    pub fn review(booking_id: &str) -> String {
        format!("review/{booking_id}")
    }
    pub fn review_by_cleaner(cleaner_id: &str, booking_id: &str) -> String {
        format!("rvcleaner/{cleaner_id}/{booking_id}")
    }
    pub fn review_by_cleaner_prefix(cleaner_id: &str) -> String {
        format!("rvcleaner/{cleaner_id}/")
    }
    pub fn audit(entity_id: &str, audit_id: &str) -> String {
        format!("audit/{entity_id}/{audit_id}")
    }
    pub fn audit_prefix(entity_id: &str) -> String {
        format!("audit/{entity_id}/")
    }
    pub fn fraud_flag(subject_user_id: &str, flag_id: &str) -> String {
        format!("fraud/{subject_user_id}/{flag_id}")
    }
    pub fn fraud_flag_prefix(subject_user_id: &str) -> String {
        format!("fraud/{subject_user_id}/")
    }
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, MarketError> {
    minicbor::to_vec(value).map_err(|e| MarketError::Codec(e.to_string()))
}

pub(crate) fn decode<T>(bytes: &[u8]) -> Result<T, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| MarketError::Codec(e.to_string()))
}

pub(crate) fn get_raw(db: &Db, key: &str) -> Result<Option<Vec<u8>>, MarketError> {
    Ok(db.get(key)?.map(|ivec| ivec.to_vec()))
}

pub(crate) fn get<T>(db: &Db, key: &str) -> Result<Option<T>, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match db.get(key)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn require<T>(
    db: &Db,
    key: &str,
    entity: &'static str,
    id: &str,
) -> Result<T, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    get(db, key)?.ok_or_else(|| MarketError::not_found(entity, id))
}

pub(crate) fn scan_prefix<T>(db: &Db, prefix: &str) -> Result<Vec<T>, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut out = Vec::new();
    for item in db.scan_prefix(prefix.as_bytes()) {
        let (_, value) = item?;
        out.push(decode(&value)?);
    }
    Ok(out)
}

/// Expected current bytes of the guarded key: `None` asserts absence.
pub(crate) type Guard = (String, Option<Vec<u8>>);

/// Apply `writes` and `removes` in one atomic transaction. When a guard
/// is supplied and the key no longer holds the expected bytes, nothing
/// is written and the commit fails with `Conflict`.
pub(crate) fn commit(
    db: &Db,
    guard: Option<Guard>,
    writes: Vec<(String, Vec<u8>)>,
    removes: Vec<String>,
) -> Result<(), MarketError> {
    let result = db.transaction(|tx| {
        if let Some((key, expected)) = &guard {
            let current = tx.get(key.as_bytes())?;
            let unchanged = match (&current, expected) {
                (Some(cur), Some(exp)) => cur.as_ref() == exp.as_slice(),
                (None, None) => true,
                _ => false,
            };
            if !unchanged {
                return Err(ConflictableTransactionError::Abort(MarketError::Conflict(
                    format!("entity at {key} was modified concurrently"),
                )));
            }
        }
        for (key, value) in &writes {
            tx.insert(key.as_bytes(), value.clone())?;
        }
        for key in &removes {
            tx.remove(key.as_bytes())?;
        }
        Ok(())
    });

    match result {
        Ok(()) => Ok(()),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(MarketError::Storage(e)),
    }
}
