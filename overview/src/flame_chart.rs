use crate::walker::{everything, for_each_event, EventVisitor};
use serde::Serialize;
use tracemodel::{Event, EventRef, NamedObject, Thread, ThreadRef, TracingModel};

/// What a flame chart entry was made from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySource {
    /// The title row of a thread.
    Header {
        #[serde(skip)]
        thread: ThreadRef,
    },
    Event {
        #[serde(skip)]
        event: EventRef,
    },
    /// An async chain, by its index in [`Thread::async_events`].
    AsyncEvent {
        #[serde(skip)]
        thread: ThreadRef,
        index: usize,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct FlameChartEntry {
    pub title: String,
    pub level: usize,
    pub start_time: f64,
    /// Zero for instant events.
    pub duration: f64,
    pub source: EntrySource,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FlameChartData {
    pub entries: Vec<FlameChartEntry>,
    /// The deepest level any entry is on.
    pub max_level: usize,
}

impl FlameChartData {
    /// Number of rows needed to show every entry.
    pub fn level_count(&self) -> usize {
        if self.entries.is_empty() {
            0
        } else {
            self.max_level + 1
        }
    }

    pub fn entries_at_level(&self, level: usize) -> impl Iterator<Item = &FlameChartEntry> + '_ {
        self.entries.iter().filter(move |entry| entry.level == level)
    }

    fn push(&mut self, entry: FlameChartEntry) {
        self.max_level = self.max_level.max(entry.level);
        self.entries.push(entry);
    }
}

struct SyncRows<'d> {
    data: &'d mut FlameChartData,
    thread: ThreadRef,
    base_level: usize,
    depth: usize,
    max_depth: usize,
}

impl<'d> SyncRows<'d> {
    fn push(&mut self, index: usize, event: &Event, duration: f64) {
        let level = self.base_level + self.depth;
        self.max_depth = self.max_depth.max(self.depth + 1);
        self.data.push(FlameChartEntry {
            title: event.name.clone(),
            level,
            start_time: event.start_time,
            duration,
            source: EntrySource::Event {
                event: EventRef {
                    thread: self.thread,
                    index,
                },
            },
        });
    }
}

impl<'a, 'd> EventVisitor<'a> for SyncRows<'d> {
    fn on_start(&mut self, index: usize, event: &'a Event) {
        self.push(index, event, event.duration().unwrap_or(0.0));
        self.depth += 1;
    }

    fn on_end(&mut self, _index: usize, _event: &'a Event) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn on_instant(&mut self, index: usize, event: &'a Event, _parent: Option<&'a Event>) {
        self.push(index, event, 0.0);
    }
}

/// Lays out every thread of the model, in display order, as a block of
/// rows: a header row, the synchronous events by nesting depth, and then the
/// async chains packed onto as few rows as possible. Threads without any
/// events are left out.
pub fn flame_chart_data(model: &TracingModel) -> FlameChartData {
    let mut data = FlameChartData::default();
    let mut level = 0;

    for process in model.sorted_processes() {
        for thread in process.sorted_threads() {
            if thread.events().is_empty() && thread.async_events().is_empty() {
                continue;
            }
            level = append_thread(&mut data, model, process.name(), thread, level);
        }
    }

    data
}

/// Appends the rows of `thread` starting at `level` and returns the first
/// level after them.
fn append_thread(
    data: &mut FlameChartData,
    model: &TracingModel,
    process_name: &str,
    thread: &Thread,
    level: usize,
) -> usize {
    let start_time = model.minimum_record_time();
    data.push(FlameChartEntry {
        title: format!("{} / {}", process_name, thread.name()),
        level,
        start_time,
        duration: model.maximum_record_time() - start_time,
        source: EntrySource::Header {
            thread: thread.thread_ref(),
        },
    });

    let mut rows = SyncRows {
        data: &mut *data,
        thread: thread.thread_ref(),
        base_level: level + 1,
        depth: 0,
        max_depth: 0,
    };
    for_each_event(thread.events(), &mut rows, everything());
    let async_level = level + 1 + rows.max_depth;

    // End time of the last chain on each async row.
    let mut row_ends: Vec<f64> = Vec::new();
    let mut chains: Vec<usize> = (0..thread.async_events().len()).collect();
    chains.sort_by(|&a, &b| {
        let a = thread.async_events()[a].start_time();
        let b = thread.async_events()[b].start_time();
        a.total_cmp(&b)
    });

    for index in chains {
        let chain = &thread.async_events()[index];
        let start = chain.start_time();
        let end = chain.end_time().unwrap_or_else(|| model.maximum_record_time());

        let row = match row_ends.iter().position(|&row_end| row_end <= start) {
            Some(row) => {
                row_ends[row] = end;
                row
            }
            None => {
                row_ends.push(end);
                row_ends.len() - 1
            }
        };

        data.push(FlameChartEntry {
            title: chain.name().to_owned(),
            level: async_level + row,
            start_time: start,
            duration: (end - start).max(0.0),
            source: EntrySource::AsyncEvent {
                thread: thread.thread_ref(),
                index,
            },
        });
    }

    async_level + row_ends.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracemodel::testing_common::TraceBuilder;

    fn rows(data: &FlameChartData) -> Vec<(usize, &str)> {
        data.entries
            .iter()
            .map(|entry| (entry.level, entry.title.as_str()))
            .collect()
    }

    #[test]
    fn levels() {
        let mut b = TraceBuilder::new();
        b.process_name(1, "Renderer");
        b.thread_name(1, 1, "Main");
        b.thread_sort_index(1, 1, 0);
        b.thread_name(1, 2, "Worker");
        b.interval(1, 1, "Task", 1000, 9000, |b| {
            b.interval(1, 1, "FunctionCall", 2000, 8000, |b| {
                b.instant(1, 1, "Mark", 3000);
            });
        });
        b.async_begin(1, 1, "Load", "1", 1000);
        b.async_end(1, 1, "Load", "1", 4000);
        b.async_begin(1, 1, "Fetch", "2", 2000);
        b.async_end(1, 1, "Fetch", "2", 6000);
        b.async_begin(1, 1, "Decode", "3", 5000);
        b.async_end(1, 1, "Decode", "3", 7000);
        b.complete(1, 2, "Parse", 2000, 1000);
        let model = b.into_model();

        let data = flame_chart_data(&model);
        assert_eq!(
            rows(&data),
            vec![
                (0, "Renderer / Main"),
                (1, "Task"),
                (2, "FunctionCall"),
                (3, "Mark"),
                (4, "Load"),
                (5, "Fetch"),
                (4, "Decode"),
                (6, "Renderer / Worker"),
                (7, "Parse"),
            ]
        );
        assert_eq!(data.max_level, 7);
        assert_eq!(data.level_count(), 8);
        assert_eq!(data.entries_at_level(4).count(), 2);

        let task = &data.entries[1];
        assert_eq!(task.duration, 8.0);
        let event_ref = match task.source {
            EntrySource::Event { event } => event,
            ref other => panic!("unexpected source {:?}", other),
        };
        assert_eq!(model.event(event_ref).unwrap().name, "Task");

        assert_eq!(data.entries[3].duration, 0.0);
        assert_eq!(data.entries[5].duration, 4.0);
    }

    #[test]
    fn threads_without_events_are_skipped() {
        let mut b = TraceBuilder::new();
        b.thread_name(1, 1, "Idle");
        b.complete(1, 2, "Work", 1000, 1000);
        let model = b.into_model();

        let data = flame_chart_data(&model);
        assert_eq!(rows(&data), vec![(0, "Process 1 / Thread 2"), (1, "Work")]);
    }

    #[test]
    fn empty_model() {
        let data = flame_chart_data(&TraceBuilder::new().into_model());
        assert!(data.entries.is_empty());
        assert_eq!(data.level_count(), 0);
    }
}
