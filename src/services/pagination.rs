//! Keyset pagination: opaque continuation tokens and the query fragments
//! that consume them.
//!
//! Listings sort by `(sort timestamp DESC, id DESC)`. A token marks the last
//! row of the previous page, and the next page starts strictly below it:
//!
//! ```text
//! ts < cursor.ts OR (ts = cursor.ts AND id < cursor.id)
//! ```
//!
//! Tokens are base64url (no padding) over a small versioned JSON payload.
//! They are not signed; they only mark a position.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, sqlite::Sqlite};
use thiserror::Error;
use uuid::Uuid;

const CURSOR_VERSION: u8 = 1;

/// Bounds and default for a listing's page size.
#[derive(Debug, Clone, Copy)]
pub struct LimitSpec {
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

pub const PHOTO_PAGE: LimitSpec = LimitSpec {
    min: 1,
    max: 100,
    default: 25,
};

pub const ALBUM_PAGE: LimitSpec = LimitSpec {
    min: 1,
    max: 100,
    default: 25,
};

pub const ALBUM_PHOTO_PAGE: LimitSpec = LimitSpec {
    min: 1,
    max: 100,
    default: 24,
};

impl LimitSpec {
    /// Resolve a raw `limit` query value.
    ///
    /// Missing, non-numeric and out-of-range input all yield the default.
    pub fn resolve(&self, raw: Option<&str>) -> i64 {
        raw.map(str::trim)
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| (self.min..=self.max).contains(n))
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor is not valid base64url")]
    Encoding,
    #[error("cursor payload is malformed")]
    Payload,
    #[error("cursor version {0} is not supported")]
    Version(u8),
}

/// Position of the last row on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub ts: DateTime<Utc>,
    pub id: Uuid,
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    v: u8,
    /// Unix microseconds.
    t: i64,
    id: Uuid,
}

impl Cursor {
    pub fn new(ts: DateTime<Utc>, id: Uuid) -> Self {
        Self { ts, id }
    }

    pub fn encode(&self) -> String {
        let payload = CursorPayload {
            v: CURSOR_VERSION,
            t: self.ts.timestamp_micros(),
            id: self.id,
        };
        // Serializing a struct of plain scalars cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CursorError::Encoding)?;
        let payload: CursorPayload =
            serde_json::from_slice(&bytes).map_err(|_| CursorError::Payload)?;
        if payload.v != CURSOR_VERSION {
            return Err(CursorError::Version(payload.v));
        }
        let ts = DateTime::<Utc>::from_timestamp_micros(payload.t).ok_or(CursorError::Payload)?;
        Ok(Self { ts, id: payload.id })
    }

    /// Decode an optional query value; blank means "first page".
    pub fn parse_param(raw: Option<&str>) -> Result<Option<Self>, CursorError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(token) => Self::decode(token).map(Some),
        }
    }
}

/// One page of a keyset listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty when no further page can exist.
    pub next_cursor: String,
}

impl<T> Page<T> {
    /// Build a page, emitting a cursor from the last row only when the page
    /// came back full.
    pub fn from_rows(items: Vec<T>, limit: i64, key: impl Fn(&T) -> Cursor) -> Self {
        let next_cursor = match items.last() {
            Some(last) if items.len() as i64 == limit => key(last).encode(),
            _ => String::new(),
        };
        Self { items, next_cursor }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// Append the strictly-below-cursor boundary for the given columns.
pub fn push_after_cursor(
    builder: &mut QueryBuilder<'_, Sqlite>,
    ts_col: &str,
    id_col: &str,
    cursor: &Cursor,
) {
    builder.push(format!(" AND ({ts_col} < "));
    builder.push_bind(cursor.ts);
    builder.push(format!(" OR ({ts_col} = "));
    builder.push_bind(cursor.ts);
    builder.push(format!(" AND {id_col} < "));
    builder.push_bind(cursor.id);
    builder.push("))");
}

/// Append the ordering and limit every keyset listing shares.
pub fn push_order_and_limit(
    builder: &mut QueryBuilder<'_, Sqlite>,
    ts_col: &str,
    id_col: &str,
    limit: i64,
) {
    builder.push(format!(" ORDER BY {ts_col} DESC, {id_col} DESC LIMIT "));
    builder.push_bind(limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cursor_round_trips() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 12).unwrap()
            + chrono::Duration::microseconds(123_456);
        let id = Uuid::new_v4();
        let token = Cursor::new(ts, id).encode();

        assert!(!token.contains('='));
        assert!(!token.contains('+') && !token.contains('/'));
        assert_eq!(Cursor::decode(&token).unwrap(), Cursor::new(ts, id));
    }

    #[test]
    fn cursor_round_trips_pre_epoch() {
        let ts = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap();
        let id = Uuid::nil();
        let decoded = Cursor::decode(&Cursor::new(ts, id).encode()).unwrap();
        assert_eq!(decoded.ts, ts);
        assert_eq!(decoded.id, id);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(Cursor::decode("***"), Err(CursorError::Encoding));
        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert_eq!(Cursor::decode(&not_json), Err(CursorError::Payload));
        let wrong_shape = URL_SAFE_NO_PAD.encode(r#"{"v":1,"t":"soon"}"#);
        assert_eq!(Cursor::decode(&wrong_shape), Err(CursorError::Payload));
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let token = URL_SAFE_NO_PAD
            .encode(format!(r#"{{"v":2,"t":0,"id":"{}"}}"#, Uuid::nil()).as_bytes());
        assert_eq!(Cursor::decode(&token), Err(CursorError::Version(2)));
    }

    #[test]
    fn blank_cursor_param_means_first_page() {
        assert_eq!(Cursor::parse_param(None), Ok(None));
        assert_eq!(Cursor::parse_param(Some("  ")), Ok(None));
        assert!(Cursor::parse_param(Some("!!")).is_err());
    }

    #[test]
    fn limit_falls_back_to_default() {
        assert_eq!(PHOTO_PAGE.resolve(None), 25);
        assert_eq!(PHOTO_PAGE.resolve(Some("10")), 10);
        assert_eq!(PHOTO_PAGE.resolve(Some("100")), 100);
        assert_eq!(PHOTO_PAGE.resolve(Some("0")), 25);
        assert_eq!(PHOTO_PAGE.resolve(Some("101")), 25);
        assert_eq!(PHOTO_PAGE.resolve(Some("ten")), 25);
        assert_eq!(ALBUM_PHOTO_PAGE.resolve(Some("-3")), 24);
    }

    #[test]
    fn short_page_has_no_cursor() {
        let now = Utc::now();
        let rows = vec![(now, Uuid::new_v4())];
        let page = Page::from_rows(rows.clone(), 2, |r| Cursor::new(r.0, r.1));
        assert!(page.next_cursor.is_empty());

        let full = Page::from_rows(rows, 1, |r| Cursor::new(r.0, r.1));
        assert!(!full.next_cursor.is_empty());
    }
}
