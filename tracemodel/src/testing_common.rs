use crate::TracingModel;
use serde_json::{json, Value};
use tracedecode::{
    RawEvent, DEVTOOLS_METADATA_CATEGORY, PROCESS_NAME_EVENT, PROCESS_SORT_INDEX_EVENT,
    THREAD_NAME_EVENT, THREAD_SORT_INDEX_EVENT, TRACING_SESSION_ID_FOR_WORKER_EVENT,
    TRACING_STARTED_IN_PAGE_EVENT,
};

const TEST_CATEGORY: &str = "test";

/// A `TraceBuilder` allows for programmatically building trace-event
/// streams. This is useful for writing tests that expect a `TracingModel`
/// with predictable events (and especially timestamps) in it.
///
/// All timestamps are in microseconds, like in a trace file.
#[derive(Default)]
pub struct TraceBuilder {
    events: Vec<RawEvent>,
}

impl TraceBuilder {
    pub fn new() -> TraceBuilder {
        TraceBuilder::default()
    }

    /// Appends an arbitrary payload given as JSON.
    pub fn push(&mut self, payload: Value) -> &mut Self {
        match serde_json::from_value(payload) {
            Ok(event) => self.events.push(event),
            Err(e) => panic!("invalid test payload: {}", e),
        }
        self
    }

    fn event(&mut self, ph: &str, pid: i64, tid: i64, name: &str, ts: u64, args: Value) -> &mut Self {
        self.push(json!({
            "cat": TEST_CATEGORY,
            "name": name,
            "ph": ph,
            "ts": ts,
            "pid": pid,
            "tid": tid,
            "args": args,
        }))
    }

    fn async_event(&mut self, ph: &str, pid: i64, tid: i64, name: &str, id: &str, ts: u64) -> &mut Self {
        self.push(json!({
            "cat": TEST_CATEGORY,
            "name": name,
            "ph": ph,
            "ts": ts,
            "pid": pid,
            "tid": tid,
            "id": id,
            "args": {},
        }))
    }

    /// Record an interval as a Begin/End pair. Provide an `inner` function
    /// for recording nested events.
    pub fn interval<F>(&mut self, pid: i64, tid: i64, name: &str, start: u64, end: u64, inner: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.begin(pid, tid, name, start);
        inner(self);
        self.end(pid, tid, name, end)
    }

    pub fn begin(&mut self, pid: i64, tid: i64, name: &str, ts: u64) -> &mut Self {
        self.event("B", pid, tid, name, ts, json!({}))
    }

    pub fn end(&mut self, pid: i64, tid: i64, name: &str, ts: u64) -> &mut Self {
        self.push(json!({
            "cat": TEST_CATEGORY,
            "name": name,
            "ph": "E",
            "ts": ts,
            "pid": pid,
            "tid": tid,
        }))
    }

    pub fn complete(&mut self, pid: i64, tid: i64, name: &str, ts: u64, dur: u64) -> &mut Self {
        self.push(json!({
            "cat": TEST_CATEGORY,
            "name": name,
            "ph": "X",
            "ts": ts,
            "dur": dur,
            "pid": pid,
            "tid": tid,
            "args": {},
        }))
    }

    pub fn instant(&mut self, pid: i64, tid: i64, name: &str, ts: u64) -> &mut Self {
        self.event("I", pid, tid, name, ts, json!({}))
    }

    pub fn async_begin(&mut self, pid: i64, tid: i64, name: &str, id: &str, ts: u64) -> &mut Self {
        self.async_event("S", pid, tid, name, id, ts)
    }

    pub fn async_step_into(&mut self, pid: i64, tid: i64, name: &str, id: &str, ts: u64) -> &mut Self {
        self.async_event("T", pid, tid, name, id, ts)
    }

    pub fn async_step_past(&mut self, pid: i64, tid: i64, name: &str, id: &str, ts: u64) -> &mut Self {
        self.async_event("p", pid, tid, name, id, ts)
    }

    pub fn async_end(&mut self, pid: i64, tid: i64, name: &str, id: &str, ts: u64) -> &mut Self {
        self.async_event("F", pid, tid, name, id, ts)
    }

    pub fn snapshot(&mut self, pid: i64, tid: i64, name: &str, ts: u64, snapshot: Value) -> &mut Self {
        self.push(json!({
            "cat": TEST_CATEGORY,
            "name": name,
            "ph": "O",
            "ts": ts,
            "pid": pid,
            "tid": tid,
            "id": "0x1",
            "args": { "snapshot": snapshot },
        }))
    }

    /// A `TracingStartedInPage` event announcing `session_id`.
    pub fn session_start(&mut self, pid: i64, tid: i64, session_id: &str, ts: u64) -> &mut Self {
        self.push(json!({
            "cat": DEVTOOLS_METADATA_CATEGORY,
            "name": TRACING_STARTED_IN_PAGE_EVENT,
            "ph": "I",
            "ts": ts,
            "pid": pid,
            "tid": tid,
            "args": { "sessionId": session_id, "page": "0x1" },
        }))
    }

    /// A `TracingSessionIdForWorker` event for a worker running on `tid`.
    pub fn worker_session(&mut self, pid: i64, tid: i64, session_id: &str, ts: u64) -> &mut Self {
        self.push(json!({
            "cat": DEVTOOLS_METADATA_CATEGORY,
            "name": TRACING_SESSION_ID_FOR_WORKER_EVENT,
            "ph": "I",
            "ts": ts,
            "pid": pid,
            "tid": tid,
            "args": { "data": { "sessionId": session_id, "workerThreadId": tid } },
        }))
    }

    pub fn process_name(&mut self, pid: i64, name: &str) -> &mut Self {
        self.event("M", pid, 0, PROCESS_NAME_EVENT, 0, json!({ "name": name }))
    }

    pub fn process_sort_index(&mut self, pid: i64, sort_index: i64) -> &mut Self {
        self.event("M", pid, 0, PROCESS_SORT_INDEX_EVENT, 0, json!({ "sort_index": sort_index }))
    }

    pub fn thread_name(&mut self, pid: i64, tid: i64, name: &str) -> &mut Self {
        self.event("M", pid, tid, THREAD_NAME_EVENT, 0, json!({ "name": name }))
    }

    pub fn thread_sort_index(&mut self, pid: i64, tid: i64, sort_index: i64) -> &mut Self {
        self.event("M", pid, tid, THREAD_SORT_INDEX_EVENT, 0, json!({ "sort_index": sort_index }))
    }

    pub fn into_events(self) -> Vec<RawEvent> {
        self.events
    }

    /// Ingests everything as a single batch and completes the recording.
    pub fn into_model(self) -> TracingModel {
        let mut model = TracingModel::new();
        model.add_events(self.events);
        model.tracing_complete();
        model
    }
}
