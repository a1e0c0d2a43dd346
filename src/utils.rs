//! Identifier generation and human-facing reference codes

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::MarketError;

/// Construct a unique, time-ordered id and encode it with bech32 under
/// the given human-readable prefix, e.g. `booking_1q...`.
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, MarketError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| MarketError::Codec(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| MarketError::Codec(e.to_string()))?;
    Ok(encode)
}

/// Short reference code printed on receipts and read out over the phone.
/// Derived from the booking id, so regenerating it is deterministic.
pub fn reference_code(booking_id: &str) -> String {
    let digest = sha256::digest(booking_id);
    format!("BK-{}", digest[..8].to_ascii_uppercase())
}
