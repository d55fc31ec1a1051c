use crate::backing_storage::BackingStorage;
use crate::event::{Event, EventDetail, EventRef, ThreadRef};
use crate::named_object::sort_named;
use crate::process::Process;
use crate::snapshot::{ObjectSnapshot, SnapshotSink};
use crate::thread::Thread;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracedecode::{
    EventData, Payload, Phase, RawEvent, DEVTOOLS_METADATA_CATEGORY,
    TRACING_SESSION_ID_FOR_WORKER_EVENT, TRACING_STARTED_IN_PAGE_EVENT,
};

/// Serialized snapshot payloads above this many bytes go to backing storage.
pub const DEFAULT_SNAPSHOT_DETACH_THRESHOLD: usize = 10_000;

#[derive(Clone, Debug)]
pub struct ModelOptions {
    pub snapshot_detach_threshold: usize,
}

impl Default for ModelOptions {
    fn default() -> ModelOptions {
        ModelOptions {
            snapshot_detach_threshold: DEFAULT_SNAPSHOT_DETACH_THRESHOLD,
        }
    }
}

/// One recording session: every process, thread and event that was ingested
/// since the last [`reset`](TracingModel::reset).
#[derive(Debug)]
pub struct TracingModel {
    options: ModelOptions,
    backing_storage: Option<Arc<BackingStorage>>,
    processes: FxHashMap<i64, Process>,
    minimum_record_time: Option<f64>,
    maximum_record_time: Option<f64>,
    session_id: Option<String>,
    session_main_thread: Option<ThreadRef>,
    page_metadata_events: Vec<EventRef>,
    worker_metadata_events: Vec<EventRef>,
    session_mismatches: Vec<String>,
    raw_events: Vec<RawEvent>,
}

impl Default for TracingModel {
    fn default() -> TracingModel {
        TracingModel::new()
    }
}

impl TracingModel {
    pub fn new() -> TracingModel {
        TracingModel::with_options(ModelOptions::default())
    }

    pub fn with_options(options: ModelOptions) -> TracingModel {
        TracingModel {
            options,
            backing_storage: None,
            processes: FxHashMap::default(),
            minimum_record_time: None,
            maximum_record_time: None,
            session_id: None,
            session_main_thread: None,
            page_metadata_events: Vec::new(),
            worker_metadata_events: Vec::new(),
            session_mismatches: Vec::new(),
            raw_events: Vec::new(),
        }
    }

    /// Large snapshot payloads will be offloaded into `storage`.
    pub fn with_backing_storage(options: ModelOptions, storage: Arc<BackingStorage>) -> TracingModel {
        let mut model = TracingModel::with_options(options);
        model.backing_storage = Some(storage);
        model
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    /// Drops everything recorded so far. Snapshots handed out before the
    /// reset report [`SnapshotError::Detached`](crate::SnapshotError::Detached)
    /// from then on.
    pub fn reset(&mut self) {
        self.processes.clear();
        self.minimum_record_time = None;
        self.maximum_record_time = None;
        self.session_id = None;
        self.session_main_thread = None;
        self.page_metadata_events.clear();
        self.worker_metadata_events.clear();
        self.session_mismatches.clear();
        self.raw_events.clear();

        if let Some(ref storage) = self.backing_storage {
            if let Err(e) = storage.reset() {
                log::error!("Could not reset snapshot storage: {}", e);
            }
        }
    }

    /// Ingests one batch of payloads. Batches must be added in the order
    /// they were recorded.
    pub fn add_events<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = RawEvent>,
    {
        for raw in events {
            self.raw_events.push(raw.clone());

            match Payload::decode(raw) {
                Ok(payload) => self.add_event(payload),
                Err(e) => log::warn!("Skipping trace event: {}", e),
            }
        }

        for process in self.processes.values_mut() {
            process.resolve_async_events();
        }
    }

    fn add_event(&mut self, payload: Payload) {
        let data = payload.data();

        if payload.phase == Phase::Metadata {
            self.apply_metadata(&payload, data);
            return;
        }

        let start_time = payload.start_time();
        if start_time != 0.0 {
            self.minimum_record_time = Some(match self.minimum_record_time {
                Some(min) => min.min(start_time),
                None => start_time,
            });
        }
        let end_time = payload.end_time().unwrap_or(start_time);
        self.maximum_record_time = Some(match self.maximum_record_time {
            Some(max) => max.max(end_time),
            None => end_time,
        });

        if payload.args.is_none() && payload.phase != Phase::End {
            log::warn!(
                "Missing args for {} event {}",
                payload.phase,
                payload.name
            );
        }

        if payload.phase.is_async() {
            self.process_by_id_mut(payload.pid)
                .buffer_async_event(payload);
            return;
        }

        let detail = match data {
            EventData::Snapshot { snapshot } => {
                if snapshot.is_none() {
                    log::warn!("Snapshot event {} has no snapshot argument", payload.name);
                }
                let sink = SnapshotSink {
                    storage: self.backing_storage.clone(),
                    detach_threshold: self.options.snapshot_detach_threshold,
                };
                EventDetail::Snapshot(ObjectSnapshot::new(snapshot, &sink))
            }
            _ => EventDetail::Regular,
        };

        let thread_ref = ThreadRef {
            pid: payload.pid,
            tid: payload.tid,
        };
        let process = self.process_by_id_mut(payload.pid);
        let index = match process.thread_by_id_mut(payload.tid).add_event(&payload, detail) {
            Some(index) => index,
            None => return,
        };
        let event_ref = EventRef {
            thread: thread_ref,
            index,
        };

        if payload.phase == Phase::SnapshotObject {
            process.add_object(&payload.name, event_ref);
        }

        if !has_category(&payload.category, DEVTOOLS_METADATA_CATEGORY) {
            return;
        }
        match payload.name.as_str() {
            TRACING_STARTED_IN_PAGE_EVENT => self.page_metadata_events.push(event_ref),
            TRACING_SESSION_ID_FOR_WORKER_EVENT => self.worker_metadata_events.push(event_ref),
            _ => {}
        }
    }

    fn apply_metadata(&mut self, payload: &Payload, data: EventData) {
        let process = self.process_by_id_mut(payload.pid);
        match data {
            EventData::ProcessName { name } => process.set_name(name),
            EventData::ProcessSortIndex { sort_index } => process.set_sort_index(sort_index),
            EventData::ThreadName { name } => process.thread_by_id_mut(payload.tid).set_name(name),
            EventData::ThreadSortIndex { sort_index } => {
                process.thread_by_id_mut(payload.tid).set_sort_index(sort_index)
            }
            _ => log::debug!("Ignoring metadata event {}", payload.name),
        }
    }

    /// Finalizes the recording: closes async chains that never ended,
    /// settles the session id and computes derived event data.
    pub fn tracing_complete(&mut self) {
        for process in self.processes.values_mut() {
            process.resolve_async_events();
            process.discard_unmatched_async_events();
        }

        let maximum_record_time = self.maximum_record_time();
        for process in self.processes.values_mut() {
            if process.has_open_async_events() {
                log::warn!(
                    "Closing unterminated async events of process {} at {}",
                    process.id(),
                    maximum_record_time
                );
                process.close_open_async_events(maximum_record_time);
            }
        }

        self.process_metadata_events();
        self.compute_self_times();
        self.calculate_warnings();

        if let Some(ref storage) = self.backing_storage {
            if let Err(e) = storage.flush() {
                log::error!("Could not flush snapshot storage: {}", e);
            }
        }
    }

    fn process_metadata_events(&mut self) {
        let mut page_events = self.page_metadata_events.clone();
        page_events.sort_by(|a, b| {
            let a = self.event(*a).map_or(0.0, |e| e.start_time);
            let b = self.event(*b).map_or(0.0, |e| e.start_time);
            a.total_cmp(&b)
        });

        let session_id = match page_events
            .iter()
            .find_map(|event_ref| self.event_session_id(*event_ref))
        {
            Some(session_id) => session_id,
            None => {
                log::error!(
                    "Timeline recording failed: could not determine active recording session"
                );
                return;
            }
        };

        let mut seen = FxHashSet::default();
        let mut mismatches = Vec::new();
        let mut filter = |events: &[EventRef]| -> Vec<EventRef> {
            let mut kept = Vec::with_capacity(events.len());
            for &event_ref in events {
                let id = match self.event_session_id(event_ref) {
                    Some(id) => id,
                    None => {
                        log::debug!("Metadata event without a session id");
                        continue;
                    }
                };
                if id == session_id {
                    kept.push(event_ref);
                } else if seen.insert(id.clone()) {
                    log::warn!(
                        "Metadata events from a different session: {:?} (active session {})",
                        id,
                        session_id
                    );
                    mismatches.push(id);
                }
            }
            kept
        };

        let page_metadata_events = filter(&page_events);
        let worker_metadata_events = filter(&self.worker_metadata_events);

        self.session_main_thread = page_metadata_events.first().map(|event_ref| event_ref.thread);
        self.page_metadata_events = page_metadata_events;
        self.worker_metadata_events = worker_metadata_events;
        self.session_mismatches = mismatches;
        self.session_id = Some(session_id);
    }

    fn event_session_id(&self, event_ref: EventRef) -> Option<String> {
        let event = self.event(event_ref)?;
        EventData::decode(&event.name, event.phase, Some(&event.args))
            .session_id()
            .map(str::to_owned)
    }

    fn process_by_id_mut(&mut self, pid: i64) -> &mut Process {
        self.processes
            .entry(pid)
            .or_insert_with(|| Process::new(pid))
    }

    pub(crate) fn processes_mut(&mut self) -> impl Iterator<Item = &mut Process> + '_ {
        self.processes.values_mut()
    }

    pub fn process_by_id(&self, pid: i64) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> + '_ {
        self.processes.values()
    }

    /// Processes ordered by sort index, then name.
    pub fn sorted_processes(&self) -> Vec<&Process> {
        let mut processes: Vec<&Process> = self.processes.values().collect();
        sort_named(&mut processes);
        processes
    }

    pub fn thread(&self, thread_ref: ThreadRef) -> Option<&Thread> {
        self.process_by_id(thread_ref.pid)?
            .thread_by_id(thread_ref.tid)
    }

    pub fn event(&self, event_ref: EventRef) -> Option<&Event> {
        self.thread(event_ref.thread)?.events().get(event_ref.index)
    }

    /// Earliest non-zero start time, 0 for an empty model.
    pub fn minimum_record_time(&self) -> f64 {
        self.minimum_record_time.unwrap_or(0.0)
    }

    /// Latest start or end time, 0 for an empty model.
    pub fn maximum_record_time(&self) -> f64 {
        self.maximum_record_time.unwrap_or(0.0)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The thread that announced the active session.
    pub fn session_main_thread(&self) -> Option<&Thread> {
        self.thread(self.session_main_thread?)
    }

    pub fn devtools_page_metadata_events(&self) -> &[EventRef] {
        &self.page_metadata_events
    }

    pub fn devtools_worker_metadata_events(&self) -> &[EventRef] {
        &self.worker_metadata_events
    }

    /// Session ids that were seen next to the active one, each reported once.
    pub fn session_mismatches(&self) -> &[String] {
        &self.session_mismatches
    }

    /// Every payload ingested since the last reset, as it was received.
    pub fn raw_events(&self) -> &[RawEvent] {
        &self.raw_events
    }
}

fn has_category(categories: &str, category: &str) -> bool {
    categories.split(',').any(|c| c.trim() == category)
}
