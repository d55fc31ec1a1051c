use crate::snapshot::ObjectSnapshot;
use tracedecode::{stack_trace, Args, CallFrame, Payload, Phase};

/// Identifies a thread inside a [`TracingModel`](crate::TracingModel).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ThreadRef {
    pub pid: i64,
    pub tid: i64,
}

/// Identifies an event in a thread's chronological event list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct EventRef {
    pub thread: ThreadRef,
    pub index: usize,
}

#[derive(Clone, Debug)]
pub enum EventDetail {
    Regular,
    Snapshot(ObjectSnapshot),
}

#[derive(Clone, Debug)]
pub struct Event {
    pub category: String,
    pub name: String,
    pub phase: Phase,
    /// Milliseconds.
    pub start_time: f64,
    end_time: Option<f64>,
    pub args: Args,
    pub id: Option<String>,
    pub thread: ThreadRef,
    pub stack_trace: Option<Vec<CallFrame>>,
    pub initiator: Option<EventRef>,
    pub warning: Option<String>,
    /// Duration minus the duration of direct children. Filled in by
    /// [`TracingModel::compute_self_times`](crate::TracingModel::compute_self_times).
    pub self_time: f64,
    pub detail: EventDetail,
}

impl Event {
    pub(crate) fn new(payload: &Payload, thread: ThreadRef, detail: EventDetail) -> Event {
        let args = payload.args.clone().unwrap_or_default();
        let mut event = Event {
            category: payload.category.clone(),
            name: payload.name.clone(),
            phase: payload.phase,
            start_time: payload.start_time(),
            end_time: None,
            stack_trace: stack_trace(&args),
            args,
            id: payload.id.clone(),
            thread,
            initiator: None,
            warning: None,
            self_time: 0.0,
            detail,
        };

        if let Some(end_time) = payload.end_time() {
            event.set_end_time(end_time);
        }

        event
    }

    /// An end step made up when a recording stops while an async chain is
    /// still open.
    pub(crate) fn synthetic_async_end(begin: &Event, time: f64) -> Event {
        Event {
            category: begin.category.clone(),
            name: begin.name.clone(),
            phase: Phase::AsyncEnd,
            start_time: time,
            end_time: None,
            args: Args::new(),
            id: begin.id.clone(),
            thread: begin.thread,
            stack_trace: None,
            initiator: None,
            warning: None,
            self_time: 0.0,
            detail: EventDetail::Regular,
        }
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end_time| end_time - self.start_time)
    }

    /// Sets the end time once. Ends before the start are rejected and
    /// logged; the event stays open.
    pub fn set_end_time(&mut self, end_time: f64) {
        if end_time < self.start_time {
            log::error!(
                "Event out of order: {} ends at {} before it starts at {}",
                self.name,
                end_time,
                self.start_time
            );
            return;
        }
        if let Some(existing) = self.end_time {
            log::error!(
                "End time of {} set twice ({} and {})",
                self.name,
                existing,
                end_time
            );
            return;
        }
        self.end_time = Some(end_time);
    }

    /// Closes a Begin event with the matching End payload.
    pub(crate) fn complete(&mut self, payload: &Payload) {
        if let Some(ref end_args) = payload.args {
            for (name, value) in end_args {
                if self.args.contains_key(name) {
                    log::warn!(
                        "Same argument name ({}) is used for begin and end phases of {}",
                        name,
                        self.name
                    );
                }
                self.args.insert(name.clone(), value.clone());
            }
            if self.stack_trace.is_none() {
                self.stack_trace = stack_trace(&self.args);
            }
        }
        self.set_end_time(payload.start_time());
    }

    /// Returns true if the time interval of `self` completely contains the
    /// time interval (or instant) of `other`.
    pub fn contains(&self, other: &Event) -> bool {
        let self_end = match self.end_time {
            Some(end) => end,
            None => return false,
        };
        let other_end = other.end_time.unwrap_or(other.start_time);
        self.start_time <= other.start_time && other_end <= self_end
    }

    pub fn as_snapshot(&self) -> Option<&ObjectSnapshot> {
        match self.detail {
            EventDetail::Snapshot(ref snapshot) => Some(snapshot),
            EventDetail::Regular => None,
        }
    }
}
