//! UTC timestamp newtype shared by every entity in the crate

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    /// Fixture helper; panics when the components are out of range.
    pub fn from_ymd_hms(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::now();

        let encoding = minicbor::to_vec(&original).unwrap();
        let decoded: TimeStamp = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::from_ymd_hms(2025, 3, 1, 9, 0, 0);
        let later = TimeStamp::from_ymd_hms(2025, 3, 1, 11, 0, 0);

        assert!(earlier < later);
    }
}
