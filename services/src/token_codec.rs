//! Portable session descriptor exchanged with the scanning client.
//!
//! The descriptor travels through the attendee's device, so [`decode`] only
//! checks structure. Anything decoded must be re-validated against the
//! session store before it is trusted.

use chrono::{DateTime, TimeZone, Utc};
use db::models::{attendance_session::Model as AttendanceSession, class};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::AttendanceError;
use crate::geo::Coordinates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub session_token: String,
    pub class_id: i64,
    pub class_name: String,
    pub location: Coordinates,
    pub expires_at: DateTime<Utc>,
}

impl SessionDescriptor {
    /// Compact JSON form, suitable for embedding in a QR code.
    pub fn to_wire(&self) -> String {
        json!({
            "sessionToken": self.session_token,
            "classId": self.class_id,
            "className": self.class_name,
            "location": { "lat": self.location.lat, "lng": self.location.lng },
            "expiresAt": self.expires_at.to_rfc3339(),
        })
        .to_string()
    }
}

/// Builds the descriptor for a session that is valid at `now`.
pub fn encode(
    session: &AttendanceSession,
    class: &class::Model,
    now: DateTime<Utc>,
) -> Result<SessionDescriptor, AttendanceError> {
    if !session.is_valid(now) || session.class_id != class.id {
        return Err(AttendanceError::InvalidSessionState);
    }

    Ok(SessionDescriptor {
        session_token: session.token.clone(),
        class_id: class.id,
        class_name: class.name.clone(),
        location: Coordinates {
            lat: class.latitude,
            lng: class.longitude,
        },
        expires_at: session.expires_at,
    })
}

fn malformed(reason: impl Into<String>) -> AttendanceError {
    AttendanceError::MalformedDescriptor(reason.into())
}

fn required<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a Value, AttendanceError> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(malformed(format!("missing field `{key}`"))),
        Some(v) => Ok(v),
    }
}

fn parse_expiry(v: &Value) -> Result<DateTime<Utc>, AttendanceError> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| malformed("`expiresAt` is not an RFC 3339 timestamp")),
        // epoch milliseconds, as emitted by JavaScript clients
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| malformed("`expiresAt` is not a valid epoch timestamp")),
        _ => Err(malformed("`expiresAt` must be a string or number")),
    }
}

/// Parses and structurally validates a raw descriptor.
///
/// The expiry may lie in the past; freshness is the session store's call.
pub fn decode(raw: &str) -> Result<SessionDescriptor, AttendanceError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| malformed("not valid JSON"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("descriptor must be a JSON object"))?;

    let session_token = required(obj, "sessionToken")?
        .as_str()
        .filter(|s| !s.is_empty() && s.trim() == *s)
        .ok_or_else(|| malformed("`sessionToken` must be a non-empty string without surrounding whitespace"))?
        .to_owned();

    let class_id = required(obj, "classId")?
        .as_i64()
        .ok_or_else(|| malformed("`classId` must be an integer"))?;

    let class_name = required(obj, "className")?
        .as_str()
        .ok_or_else(|| malformed("`className` must be a string"))?
        .to_owned();

    let location = required(obj, "location")?
        .as_object()
        .ok_or_else(|| malformed("`location` must be an object"))?;
    let lat = required(location, "lat")?
        .as_f64()
        .ok_or_else(|| malformed("`location.lat` must be a number"))?;
    let lng = required(location, "lng")?
        .as_f64()
        .ok_or_else(|| malformed("`location.lng` must be a number"))?;
    let location = Coordinates::new(lat, lng)
        .map_err(|_| malformed("`location` coordinates out of range"))?;

    let expires_at = parse_expiry(required(obj, "expiresAt")?)?;

    Ok(SessionDescriptor {
        session_token,
        class_id,
        class_name,
        location,
        expires_at,
    })
}
