//! Record to row conversion.
//!
//! Each decoded request knows its kind and flattens itself into bind values
//! in the column order of its table.

use chrono::{DateTime, SecondsFormat};
use prost_types::Timestamp;
use sea_query::Value;
use thiserror::Error;

use crate::proto::{BeaconRequest, CspRequest, HttpRequest, RepoRequest};
use crate::storage::{EventKind, Result, StorageError};

/// A record that can be stored in its kind's table.
pub trait Record: Send + 'static {
    const KIND: EventKind;

    /// Consume the record, producing one value per column.
    fn into_values(self) -> Result<Vec<Value>>;
}

/// An instant chrono cannot represent.
#[derive(Debug, Error)]
#[error("timestamp out of range: seconds={seconds}, nanos={nanos}")]
struct TimestampOutOfRange {
    seconds: i64,
    nanos: i32,
}

/// Format an instant as RFC 3339 in UTC. A missing instant becomes NULL.
///
/// An unrepresentable instant fails the same way a value the database
/// refuses would: as an insert error for `kind`.
fn instant(kind: EventKind, ts: Option<Timestamp>) -> Result<Value> {
    let Some(ts) = ts else {
        return Ok(Value::String(None));
    };

    let out_of_range = || StorageError::Insert {
        kind,
        source: sqlx::Error::Encode(Box::new(TimestampOutOfRange {
            seconds: ts.seconds,
            nanos: ts.nanos,
        })),
    };
    let nanos = u32::try_from(ts.nanos).map_err(|_| out_of_range())?;
    let dt = DateTime::from_timestamp(ts.seconds, nanos).ok_or_else(out_of_range)?;

    Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true).into())
}

impl Record for HttpRequest {
    const KIND: EventKind = EventKind::HttpAccess;

    fn into_values(self) -> Result<Vec<Value>> {
        Ok(vec![
            instant(Self::KIND, self.timestamp)?,
            self.method.into(),
            self.domain.into(),
            self.path.into(),
            self.remote.into(),
            self.user_agent.into(),
            self.referrer.into(),
        ])
    }
}

impl Record for CspRequest {
    const KIND: EventKind = EventKind::CspViolation;

    fn into_values(self) -> Result<Vec<Value>> {
        Ok(vec![
            instant(Self::KIND, self.timestamp)?,
            self.remote.into(),
            self.user_agent.into(),
            self.referrer.into(),
            self.enforce.to_string().into(),
            self.blocked_uri.into(),
            self.source_file.into(),
            self.document_uri.into(),
            self.violated_directive.into(),
            self.effective_directive.into(),
            self.line_number.into(),
            self.status_code.into(),
        ])
    }
}

impl Record for BeaconRequest {
    const KIND: EventKind = EventKind::Beacon;

    fn into_values(self) -> Result<Vec<Value>> {
        Ok(vec![
            self.duration_ms.into(),
            self.src_page.into(),
            self.dst_page.into(),
            self.remote.into(),
            self.user_agent.into(),
            self.referrer.into(),
        ])
    }
}

impl Record for RepoRequest {
    const KIND: EventKind = EventKind::RepoStar;

    fn into_values(self) -> Result<Vec<Value>> {
        Ok(vec![
            instant(Self::KIND, self.timestamp)?,
            self.owner.into(),
            self.repo.into(),
        ])
    }
}
