//! Decoding definitions for trace-event payloads.
//!
//! A trace is a flat JSON stream of [`RawEvent`]s. [`Payload::decode`] turns
//! one of them into a [`Payload`] with a decoded [`Phase`] and a normalized
//! async id; [`Payload::data`] gives the typed view of the arguments of the
//! event names that carry structure the model depends on.
//!
//! Trace files are read with [`read_trace_file`], which accepts both the bare
//! array form and the `{"traceEvents": [...]}` object form, gzip-compressed
//! or not.

use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::Path;

pub mod event_data;
pub mod phase;
pub mod raw_event;

pub use crate::event_data::{stack_trace, CallFrame, EventData};
pub use crate::phase::Phase;
pub use crate::raw_event::{Args, DecodeError, Payload, RawEvent, RawId};

/// Category the devtools session metadata events are recorded under.
pub const DEVTOOLS_METADATA_CATEGORY: &str = "disabled-by-default-devtools.timeline";

pub const TRACING_STARTED_IN_PAGE_EVENT: &str = "TracingStartedInPage";
pub const TRACING_SESSION_ID_FOR_WORKER_EVENT: &str = "TracingSessionIdForWorker";

pub const PROCESS_SORT_INDEX_EVENT: &str = "process_sort_index";
pub const PROCESS_NAME_EVENT: &str = "process_name";
pub const THREAD_SORT_INDEX_EVENT: &str = "thread_sort_index";
pub const THREAD_NAME_EVENT: &str = "thread_name";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceFile {
    Array(Vec<Value>),
    Object {
        #[serde(rename = "traceEvents")]
        trace_events: Vec<Value>,
    },
}

/// Parses the contents of a trace file. Only the outer shape has to be
/// valid: events that don't decode are logged and skipped.
pub fn parse_trace(data: &[u8]) -> Result<Vec<RawEvent>, serde_json::Error> {
    let file: TraceFile = serde_json::from_slice(data)?;
    let values = match file {
        TraceFile::Array(values) => values,
        TraceFile::Object { trace_events } => trace_events,
    };

    let mut events = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawEvent>(value) {
            Ok(event) => events.push(event),
            Err(e) => log::warn!("Skipping malformed trace event #{}: {}", index, e),
        }
    }
    Ok(events)
}

pub fn read_trace_file(path: &Path) -> Result<Vec<RawEvent>, Box<dyn Error + Send + Sync>> {
    let data = fs::read(path).map_err(|e| format!("Could not read `{}`: {}", path.display(), e))?;

    let data = if data.starts_with(&GZIP_MAGIC) {
        let mut decompressed = Vec::new();
        GzDecoder::new(&data[..]).read_to_end(&mut decompressed)?;
        decompressed
    } else {
        data
    };

    parse_trace(&data).map_err(|e| {
        From::from(format!(
            "`{}` is not a trace-event file: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_file_shapes() {
        let array = br#"[{"name":"a","ph":"B","ts":1,"pid":1,"tid":2}]"#;
        let object = br#"{"traceEvents":[{"name":"a","ph":"B","ts":1,"pid":1,"tid":2}],"metadata":{}}"#;

        let a = parse_trace(array).unwrap();
        let b = parse_trace(object).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].name, "a");
        assert_eq!(a[0].tid, 2);
    }

    #[test]
    fn malformed_events_are_skipped() {
        let data = br#"[
            {"name":"a","ph":"B","ts":1,"pid":1,"tid":2},
            {"name":"no phase","ts":2,"pid":1,"tid":2},
            {"name":"b","ph":"S","ts":3,"pid":1,"tid":2,"id":-4},
            "not an event",
            {"name":"c","ph":"E","ts":"late","pid":1,"tid":2},
            {"name":"a","ph":"E","ts":5,"pid":1,"tid":2}
        ]"#;

        let events = parse_trace(data).unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert_eq!(events[1].id, Some(RawId::Signed(-4)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_trace(b"{\"foo\": 1}").is_err());
        assert!(parse_trace(b"not json").is_err());
    }
}
