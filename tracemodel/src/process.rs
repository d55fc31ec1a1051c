use crate::event::{Event, EventDetail, EventRef, ThreadRef};
use crate::named_object::{sort_named, NamedObject};
use crate::thread::{AsyncEvent, Thread};
use rustc_hash::FxHashMap;
use std::mem;
use tracedecode::{Payload, Phase};

#[derive(Copy, Clone, Debug)]
struct OpenAsyncEvent {
    tid: i64,
    index: usize,
}

#[derive(Debug)]
pub struct Process {
    id: i64,
    name: String,
    sort_index: Option<i64>,
    threads: FxHashMap<i64, Thread>,
    objects: FxHashMap<String, Vec<EventRef>>,
    // Async payloads seen since the last replay.
    pending_async: Vec<Payload>,
    // Chains that have begun but not ended, keyed by `name.id`.
    open_async: FxHashMap<String, OpenAsyncEvent>,
}

impl Process {
    pub(crate) fn new(id: i64) -> Process {
        Process {
            id,
            name: format!("Process {}", id),
            sort_index: None,
            threads: FxHashMap::default(),
            objects: FxHashMap::default(),
            pending_async: Vec::new(),
            open_async: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_sort_index(&mut self, sort_index: i64) {
        self.sort_index = Some(sort_index);
    }

    pub fn thread_by_id(&self, tid: i64) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    pub(crate) fn thread_by_id_mut(&mut self, tid: i64) -> &mut Thread {
        let pid = self.id;
        self.threads
            .entry(tid)
            .or_insert_with(|| Thread::new(pid, tid))
    }

    pub(crate) fn threads_mut(&mut self) -> impl Iterator<Item = &mut Thread> + '_ {
        self.threads.values_mut()
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> + '_ {
        self.threads.values()
    }

    pub fn sorted_threads(&self) -> Vec<&Thread> {
        let mut threads: Vec<&Thread> = self.threads.values().collect();
        sort_named(&mut threads);
        threads
    }

    pub(crate) fn add_object(&mut self, name: &str, event: EventRef) {
        self.objects.entry(name.to_owned()).or_default().push(event);
    }

    /// Snapshot events recorded under `name`, in ingestion order.
    pub fn objects_by_name(&self, name: &str) -> &[EventRef] {
        self.objects.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sorted_object_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.objects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn buffer_async_event(&mut self, payload: Payload) {
        self.pending_async.push(payload);
    }

    pub fn has_open_async_events(&self) -> bool {
        !self.open_async.is_empty()
    }

    /// Replays the buffered async payloads in timestamp order. Steps of one
    /// chain may come from different threads, so they can only be matched
    /// up once the batch has been seen as a whole. Steps and ends whose
    /// chain has not begun yet stay buffered, since the begin may still
    /// arrive with a later batch.
    pub(crate) fn resolve_async_events(&mut self) {
        let mut pending = mem::take(&mut self.pending_async);
        // `sort_by` is stable: equal timestamps keep their arrival order.
        pending.sort_by(|a, b| a.ts.total_cmp(&b.ts));

        pending.retain(|payload| !self.add_async_event(payload));
        self.pending_async = pending;
    }

    /// Drops the steps and ends that never found their chain.
    pub(crate) fn discard_unmatched_async_events(&mut self) {
        for payload in self.pending_async.drain(..) {
            match payload.async_key() {
                Some(key) => log::warn!("Async {} {} without a matching begin", payload.phase, key),
                None => log::warn!("Async event {} has no id", payload.name),
            }
        }
    }

    /// Returns whether `payload` was consumed. Steps and ends are not
    /// consumed while no chain they could continue is open.
    fn add_async_event(&mut self, payload: &Payload) -> bool {
        let key = match payload.async_key() {
            Some(key) => key,
            None => {
                log::warn!("Async event {} has no id", payload.name);
                return true;
            }
        };

        let thread_ref = ThreadRef {
            pid: self.id,
            tid: payload.tid,
        };
        // The delivering thread is referenced, so it exists even if the
        // step ends up being stored with a chain owned by another thread.
        self.thread_by_id_mut(payload.tid);
        let event = Event::new(payload, thread_ref, EventDetail::Regular);

        match payload.phase {
            Phase::AsyncBegin => {
                if self.open_async.contains_key(&key) {
                    log::warn!("Async event {} has already been started", key);
                    return true;
                }
                let index = self
                    .thread_by_id_mut(payload.tid)
                    .add_async_event(AsyncEvent::new(event));
                self.open_async.insert(
                    key,
                    OpenAsyncEvent {
                        tid: payload.tid,
                        index,
                    },
                );
            }
            Phase::AsyncStepInto | Phase::AsyncStepPast | Phase::AsyncEnd => {
                let open = match self.open_async.get(&key) {
                    Some(&open) => open,
                    None => {
                        log::debug!("Async {} {} waits for its begin", payload.phase, key);
                        return false;
                    }
                };
                let chain = self.thread_by_id_mut(open.tid).async_event_mut(open.index);
                let last = chain.steps().last().map_or(f64::MIN, |step| step.start_time);
                if event.start_time < last {
                    // Recorded before the open chain: it belongs to one
                    // whose begin has not been seen yet.
                    log::debug!("Async {} {} predates the open chain", payload.phase, key);
                    return false;
                }

                if payload.phase == Phase::AsyncEnd {
                    chain.add_step(event);
                    self.open_async.remove(&key);
                    return true;
                }

                let last_phase = chain.last_phase();
                // All steps of one chain are of the same kind: the first
                // step fixes it.
                if last_phase != Phase::AsyncBegin && last_phase != payload.phase {
                    log::warn!(
                        "Async event step phase mismatch: {} at {} ({} after {})",
                        key,
                        event.start_time,
                        payload.phase,
                        last_phase
                    );
                    return true;
                }
                chain.add_step(event);
            }
            phase => log::warn!("{} is not an async phase ({})", phase, key),
        }
        true
    }

    /// Closes every chain that is still open with a synthetic end step at
    /// `time`.
    pub(crate) fn close_open_async_events(&mut self, time: f64) {
        let open: Vec<OpenAsyncEvent> = self.open_async.drain().map(|(_, open)| open).collect();

        for open in open {
            let chain = self.thread_by_id_mut(open.tid).async_event_mut(open.index);
            let end = Event::synthetic_async_end(chain.first(), time);
            chain.add_step(end);
        }
    }
}

impl NamedObject for Process {
    fn name(&self) -> &str {
        &self.name
    }

    fn sort_index(&self) -> Option<i64> {
        self.sort_index
    }
}
