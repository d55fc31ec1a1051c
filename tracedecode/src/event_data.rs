use crate::phase::Phase;
use crate::raw_event::Args;
use crate::{
    PROCESS_NAME_EVENT, PROCESS_SORT_INDEX_EVENT, THREAD_NAME_EVENT, THREAD_SORT_INDEX_EVENT,
    TRACING_SESSION_ID_FOR_WORKER_EVENT, TRACING_STARTED_IN_PAGE_EVENT,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed view of the `args` of the event names the model treats specially.
/// Everything else is `Opaque` and only reachable through the raw args map.
#[derive(Clone, PartialEq, Debug)]
pub enum EventData {
    ProcessName { name: String },
    ProcessSortIndex { sort_index: i64 },
    ThreadName { name: String },
    ThreadSortIndex { sort_index: i64 },
    TracingStartedInPage {
        session_id: Option<String>,
        page: Option<String>,
    },
    TracingSessionIdForWorker {
        session_id: Option<String>,
        worker_thread_id: Option<i64>,
    },
    Snapshot { snapshot: Option<Value> },
    Opaque,
}

impl EventData {
    pub fn decode(name: &str, phase: Phase, args: Option<&Args>) -> EventData {
        if phase == Phase::Metadata {
            return match name {
                PROCESS_NAME_EVENT => EventData::ProcessName {
                    name: string_arg(args, "name").unwrap_or_default(),
                },
                PROCESS_SORT_INDEX_EVENT => EventData::ProcessSortIndex {
                    sort_index: int_arg(args, "sort_index").unwrap_or(0),
                },
                THREAD_NAME_EVENT => EventData::ThreadName {
                    name: string_arg(args, "name").unwrap_or_default(),
                },
                THREAD_SORT_INDEX_EVENT => EventData::ThreadSortIndex {
                    sort_index: int_arg(args, "sort_index").unwrap_or(0),
                },
                _ => EventData::Opaque,
            };
        }

        if phase == Phase::SnapshotObject {
            return EventData::Snapshot {
                snapshot: args.and_then(|args| args.get("snapshot")).cloned(),
            };
        }

        match name {
            TRACING_STARTED_IN_PAGE_EVENT => EventData::TracingStartedInPage {
                session_id: session_id_arg(args),
                page: string_arg(args, "page").or_else(|| data_string_arg(args, "page")),
            },
            TRACING_SESSION_ID_FOR_WORKER_EVENT => EventData::TracingSessionIdForWorker {
                session_id: session_id_arg(args),
                worker_thread_id: args
                    .and_then(|args| args.get("data"))
                    .and_then(|data| data.get("workerThreadId"))
                    .and_then(Value::as_i64),
            },
            _ => EventData::Opaque,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            EventData::TracingStartedInPage { session_id, .. }
            | EventData::TracingSessionIdForWorker { session_id, .. } => session_id.as_deref(),
            _ => None,
        }
    }
}

/// One frame of a JavaScript stack trace attached to an event.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallFrame {
    pub function_name: String,
    pub script_id: String,
    pub url: String,
    pub line_number: i64,
    pub column_number: i64,
}

/// Extracts `data.stackTrace` (or `beginData.stackTrace` for events that
/// record it on their begin phase). Frames that don't decode are dropped.
pub fn stack_trace(args: &Args) -> Option<Vec<CallFrame>> {
    let frames = args
        .get("data")
        .and_then(|data| data.get("stackTrace"))
        .or_else(|| args.get("beginData").and_then(|data| data.get("stackTrace")))?
        .as_array()?;

    Some(
        frames
            .iter()
            .filter_map(|frame| serde_json::from_value(frame.clone()).ok())
            .collect(),
    )
}

// Session metadata moved from `args.sessionId` to `args.data.sessionId` at
// some point; accept both.
fn session_id_arg(args: Option<&Args>) -> Option<String> {
    string_arg(args, "sessionId").or_else(|| data_string_arg(args, "sessionId"))
}

fn string_arg(args: Option<&Args>, key: &str) -> Option<String> {
    args?.get(key)?.as_str().map(str::to_owned)
}

fn data_string_arg(args: Option<&Args>, key: &str) -> Option<String> {
    args?.get("data")?.get(key)?.as_str().map(str::to_owned)
}

fn int_arg(args: Option<&Args>, key: &str) -> Option<i64> {
    let value = args?.get(key)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Args {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn metadata_events() {
        let a = args(json!({ "name": "CrRendererMain" }));
        assert_eq!(
            EventData::decode("thread_name", Phase::Metadata, Some(&a)),
            EventData::ThreadName {
                name: "CrRendererMain".into()
            }
        );

        let a = args(json!({ "sort_index": -5 }));
        assert_eq!(
            EventData::decode("process_sort_index", Phase::Metadata, Some(&a)),
            EventData::ProcessSortIndex { sort_index: -5 }
        );
    }

    #[test]
    fn session_id_in_both_places() {
        let flat = args(json!({ "sessionId": "12.3", "page": "0x1" }));
        let nested = args(json!({ "data": { "sessionId": "12.3", "page": "0x1" } }));

        for a in [flat, nested].iter() {
            let data = EventData::decode("TracingStartedInPage", Phase::Instant, Some(a));
            assert_eq!(data.session_id(), Some("12.3"));
            assert_eq!(
                data,
                EventData::TracingStartedInPage {
                    session_id: Some("12.3".into()),
                    page: Some("0x1".into())
                }
            );
        }
    }

    #[test]
    fn worker_session() {
        let a = args(json!({ "data": { "sessionId": "9", "workerThreadId": 31 } }));
        let data = EventData::decode("TracingSessionIdForWorker", Phase::Instant, Some(&a));
        assert_eq!(
            data,
            EventData::TracingSessionIdForWorker {
                session_id: Some("9".into()),
                worker_thread_id: Some(31)
            }
        );
    }

    #[test]
    fn snapshot_without_payload() {
        let a = args(json!({}));
        assert_eq!(
            EventData::decode("cc::LayerTreeHostImpl", Phase::SnapshotObject, Some(&a)),
            EventData::Snapshot { snapshot: None }
        );
    }

    #[test]
    fn unknown_names_are_opaque() {
        assert_eq!(
            EventData::decode("FunctionCall", Phase::Complete, None),
            EventData::Opaque
        );
        assert_eq!(EventData::Opaque.session_id(), None);
    }

    #[test]
    fn stack_trace_from_data_or_begin_data() {
        let a = args(json!({
            "data": { "stackTrace": [
                { "functionName": "f", "url": "a.js", "lineNumber": 3, "columnNumber": 7 },
                { "functionName": "g", "url": "b.js", "lineNumber": 1, "columnNumber": 2, "scriptId": "5" }
            ] }
        }));
        let frames = stack_trace(&a).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function_name, "f");
        assert_eq!(frames[1].script_id, "5");

        let a = args(json!({ "beginData": { "stackTrace": [ { "functionName": "h" } ] } }));
        assert_eq!(stack_trace(&a).unwrap()[0].function_name, "h");

        assert!(stack_trace(&args(json!({ "data": {} }))).is_none());
    }
}
