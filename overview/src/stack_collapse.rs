use crate::walker::{everything, for_each_event, EventVisitor};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracemodel::{Event, NamedObject, Thread, TracingModel};

// This state is kept up-to-date while walking one thread.
struct PerThreadState<'c> {
    counters: &'c mut FxHashMap<String, f64>,
    stack_id: String,
    // Length of `stack_id` before each open event was appended.
    prefix_lengths: SmallVec<[usize; 32]>,
    start: Option<f64>,
    end: f64,
    total_event_time: f64,
}

impl<'a, 'c> EventVisitor<'a> for PerThreadState<'c> {
    fn on_start(&mut self, _index: usize, event: &'a Event) {
        let duration = event.duration().unwrap_or(0.0);
        if self.start.is_none() {
            self.start = Some(event.start_time);
        }
        self.end = self.end.max(event.start_time + duration);

        if self.prefix_lengths.is_empty() {
            self.total_event_time += duration;
        } else if let Some(self_time) = self.counters.get_mut(&self.stack_id) {
            // The parent does not spend this time itself.
            *self_time -= duration;
        }

        self.prefix_lengths.push(self.stack_id.len());
        self.stack_id.push(';');
        self.stack_id.push_str(&event.name);

        *self.counters.entry(self.stack_id.clone()).or_default() += duration;
    }

    fn on_end(&mut self, _index: usize, _event: &'a Event) {
        if let Some(length) = self.prefix_lengths.pop() {
            self.stack_id.truncate(length);
        }
    }
}

/// Adds the stacks of one thread to `counters`, in milliseconds of self
/// time. Stacks are rooted at the thread's name and the time between the
/// thread's first and last event that no event accounts for is attributed
/// to the root.
pub fn collapse_thread_stacks(thread: &Thread, counters: &mut FxHashMap<String, f64>) {
    let root = thread.name().to_owned();
    let mut state = PerThreadState {
        counters,
        stack_id: root.clone(),
        prefix_lengths: SmallVec::new(),
        start: None,
        end: f64::NEG_INFINITY,
        total_event_time: 0.0,
    };

    for_each_event(thread.events(), &mut state, everything());

    if let Some(start) = state.start {
        let gaps = (state.end - start - state.total_event_time).max(0.0);
        *state.counters.entry(root).or_default() += gaps;
    }
}

/// Collect a map of all stacks and how many microseconds are spent in each,
/// over every thread of the model. Threads with the same name share their
/// stacks.
pub fn collapse_stacks(model: &TracingModel) -> FxHashMap<String, u64> {
    let mut counters = FxHashMap::default();

    for process in model.processes() {
        for thread in process.threads() {
            collapse_thread_stacks(thread, &mut counters);
        }
    }

    counters
        .into_iter()
        .map(|(stack, millis)| (stack, (millis * 1000.0).round().max(0.0) as u64))
        .collect()
}
