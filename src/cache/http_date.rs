//! IMF-fixdate helpers for `Last-Modified` and `If-Modified-Since`.

use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::FormatItem, macros::format_description,
};

const HTTP_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Parse an HTTP date into a unix timestamp.
pub fn parse(value: &str) -> Option<i64> {
    PrimitiveDateTime::parse(value.trim(), HTTP_DATE)
        .ok()
        .map(|datetime| datetime.assume_utc().unix_timestamp())
}

/// Format a unix timestamp as an HTTP date.
pub fn format(timestamp: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()?
        .format(HTTP_DATE)
        .ok()
}
