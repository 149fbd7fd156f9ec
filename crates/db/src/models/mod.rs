mod flight;
mod landing_zone;

pub use flight::FlightRow;
pub use landing_zone::LandingZoneRow;

use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .unwrap_or_default()
}

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
