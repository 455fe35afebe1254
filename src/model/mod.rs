pub mod account;
pub mod article;
pub mod session;
pub mod ticket;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::DeskError;

/// Parse a backend timestamp. Accepts RFC 3339 and the zone-less
/// `timestamp without time zone` form, which is taken as UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, DeskError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(DeskError::Parse(format!("invalid timestamp '{raw}'")))
}

/// A user reference as the backend hands it out: either a bare display
/// name, or an expanded `users` row.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserRef {
    Name(String),
    Row {
        #[serde(default, alias = "full_name")]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
    },
}

impl UserRef {
    pub(crate) fn display_name(self) -> Option<String> {
        match self {
            UserRef::Name(n) => Some(n).filter(|n| !n.trim().is_empty()),
            UserRef::Row { name, email } => name.filter(|n| !n.trim().is_empty()).or(email),
        }
    }
}

/// Deserialize a `serde_json::Value` row into a typed row struct, tagging
/// failures with the collection they came from.
pub(crate) fn decode_row<T: serde::de::DeserializeOwned>(
    entity: &str,
    row: &serde_json::Value,
) -> Result<T, DeskError> {
    T::deserialize(row).map_err(|e| DeskError::Parse(format!("{entity} row: {e}")))
}
