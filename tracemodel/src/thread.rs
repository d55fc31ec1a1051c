use crate::event::{Event, EventDetail, ThreadRef};
use crate::named_object::NamedObject;
use tracedecode::{Payload, Phase};

/// One logical asynchronous operation: the AsyncBegin event followed by its
/// steps, in replay order. The first step spans the whole chain once it is
/// closed.
#[derive(Clone, Debug)]
pub struct AsyncEvent {
    steps: Vec<Event>,
}

impl AsyncEvent {
    pub(crate) fn new(begin: Event) -> AsyncEvent {
        AsyncEvent { steps: vec![begin] }
    }

    pub fn steps(&self) -> &[Event] {
        &self.steps
    }

    pub fn first(&self) -> &Event {
        &self.steps[0]
    }

    pub fn name(&self) -> &str {
        &self.first().name
    }

    pub fn start_time(&self) -> f64 {
        self.first().start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.first().end_time()
    }

    pub fn is_closed(&self) -> bool {
        self.steps.last().map(|step| step.phase) == Some(Phase::AsyncEnd)
    }

    pub(crate) fn last_phase(&self) -> Phase {
        self.steps[self.steps.len() - 1].phase
    }

    pub(crate) fn add_step(&mut self, step: Event) {
        if step.phase == Phase::AsyncEnd {
            let end_time = step.start_time;
            self.steps[0].set_end_time(end_time);
        }
        self.steps.push(step);
    }
}

#[derive(Debug)]
pub struct Thread {
    pid: i64,
    id: i64,
    name: String,
    sort_index: Option<i64>,
    events: Vec<Event>,
    // Indices into `events` of the Begin events still waiting for their End.
    stack: Vec<usize>,
    async_events: Vec<AsyncEvent>,
}

impl Thread {
    pub(crate) fn new(pid: i64, id: i64) -> Thread {
        Thread {
            pid,
            id,
            name: format!("Thread {}", id),
            sort_index: None,
            events: Vec::new(),
            stack: Vec::new(),
            async_events: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn thread_ref(&self) -> ThreadRef {
        ThreadRef {
            pid: self.pid,
            tid: self.id,
        }
    }

    /// Chronological (ingestion order) event list.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    /// Async chains that began on this thread.
    pub fn async_events(&self) -> &[AsyncEvent] {
        &self.async_events
    }

    /// Begin events that have not seen their End yet.
    pub fn open_events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.stack.iter().map(move |&index| &self.events[index])
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_sort_index(&mut self, sort_index: i64) {
        self.sort_index = Some(sort_index);
    }

    /// Ingests one non-async payload. Returns the index of the new event,
    /// or `None` if the payload only updated existing state (an End) or was
    /// dropped.
    pub(crate) fn add_event(&mut self, payload: &Payload, detail: EventDetail) -> Option<usize> {
        if payload.phase == Phase::End {
            // Quietly ignore unbalanced close events, the recording may
            // have started in the middle of an interval.
            let open_index = self.stack.pop()?;
            let open = &mut self.events[open_index];
            if open.name != payload.name || open.category != payload.category {
                log::warn!(
                    "Open/close event mismatch: {} ({}) vs. {} ({}) at {}",
                    open.name,
                    open.category,
                    payload.name,
                    payload.category,
                    payload.start_time()
                );
            }
            open.complete(payload);
            return None;
        }

        let event = Event::new(payload, self.thread_ref(), detail);

        if let Some(last) = self.events.last() {
            if last.start_time > event.start_time {
                log::warn!(
                    "Event is out of order: {} at {} follows {} at {}",
                    event.name,
                    event.start_time,
                    last.name,
                    last.start_time
                );
            }
        }

        let index = self.events.len();
        if payload.phase == Phase::Begin {
            self.stack.push(index);
        }
        self.events.push(event);
        Some(index)
    }

    pub(crate) fn add_async_event(&mut self, event: AsyncEvent) -> usize {
        self.async_events.push(event);
        self.async_events.len() - 1
    }

    pub(crate) fn async_event_mut(&mut self, index: usize) -> &mut AsyncEvent {
        &mut self.async_events[index]
    }
}

impl NamedObject for Thread {
    fn name(&self) -> &str {
        &self.name
    }

    fn sort_index(&self) -> Option<i64> {
        self.sort_index
    }
}
