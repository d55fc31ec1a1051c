use crate::event_data::EventData;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Argument map of a trace event. Insertion order is preserved.
pub type Args = Map<String, Value>;

/// The `id` of an async or object event. Producers emit either a hex string
/// (`"0x1f"`) or a plain number.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawId {
    String(String),
    Number(u64),
    Signed(i64),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::String(s) => f.write_str(s),
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Signed(n) => write!(f, "{}", n),
        }
    }
}

/// One trace event exactly as it appears on the wire. Timestamps are in
/// microseconds.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct RawEvent {
    #[serde(rename = "cat", default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    pub ph: String,
    #[serde(default)]
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub tid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawId>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unknown phase `{ph}` on event `{name}`")]
    UnknownPhase { name: String, ph: String },
    #[error("async event `{name}` ({phase}) has no `id`")]
    MissingAsyncId { name: String, phase: Phase },
}

/// A raw event whose phase code has been decoded and whose id has been
/// normalized. This is what the model ingests.
#[derive(Clone, PartialEq, Debug)]
pub struct Payload {
    pub category: String,
    pub name: String,
    pub phase: Phase,
    pub pid: i64,
    pub tid: i64,
    /// Microseconds, as on the wire.
    pub ts: f64,
    pub dur: Option<f64>,
    pub args: Option<Args>,
    pub id: Option<String>,
}

impl Payload {
    pub fn decode(raw: RawEvent) -> Result<Payload, DecodeError> {
        let phase = match Phase::from_code(&raw.ph) {
            Some(phase) => phase,
            None => {
                return Err(DecodeError::UnknownPhase {
                    name: raw.name,
                    ph: raw.ph,
                })
            }
        };

        let id = raw.id.map(|id| id.to_string());

        if phase.is_async() && id.is_none() {
            return Err(DecodeError::MissingAsyncId {
                name: raw.name,
                phase,
            });
        }

        Ok(Payload {
            category: raw.category,
            name: raw.name,
            phase,
            pid: raw.pid,
            tid: raw.tid,
            ts: raw.ts,
            dur: raw.dur,
            args: raw.args,
            id,
        })
    }

    /// Start time in milliseconds.
    pub fn start_time(&self) -> f64 {
        self.ts / 1000.0
    }

    /// End time in milliseconds for payloads that carry a duration.
    pub fn end_time(&self) -> Option<f64> {
        self.dur.map(|dur| (self.ts + dur) / 1000.0)
    }

    /// The key that correlates the steps of one async chain.
    pub fn async_key(&self) -> Option<String> {
        self.id.as_ref().map(|id| format!("{}.{}", self.name, id))
    }

    pub fn data(&self) -> EventData {
        EventData::decode(&self.name, self.phase, self.args.as_ref())
    }
}
