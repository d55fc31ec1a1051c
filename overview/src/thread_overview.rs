use crate::category::TimelineCategory;
use crate::cpu_overview::{main_thread, OverviewOptions};
use crate::dithering::Dithering;
use crate::walker::{everything, for_each_event, EventVisitor};
use serde::Serialize;
use smallvec::SmallVec;
use std::hash::Hash;
use tracemodel::{Event, NamedObject, Thread, ThreadRef, TracingModel};

/// A run of whole pixels painted in one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryBar<C> {
    pub category: C,
    pub start: i64,
    pub end: i64,
}

/// The bars of one background thread.
#[derive(Clone, Debug, Serialize)]
pub struct ThreadStrip<C> {
    #[serde(skip)]
    pub thread: ThreadRef,
    pub name: String,
    pub bars: Vec<CategoryBar<C>>,
}

struct StripVisitor<G, C> {
    dithering: Dithering<C>,
    categorize: G,
    stack: SmallVec<[C; 16]>,
    time_offset: f64,
    scale: f64,
    last_x: f64,
    bars: Vec<CategoryBar<C>>,
}

impl<G, C> StripVisitor<G, C>
where
    C: Eq + Hash + Clone,
{
    fn append(&mut self, category: C, position: f64) {
        if let Some(bar) = self
            .dithering
            .append_interval(category.clone(), self.last_x, position)
        {
            self.bars.push(CategoryBar {
                category,
                start: bar.start,
                end: bar.end,
            });
        }
        self.last_x = position;
    }
}

impl<'a, G, C> EventVisitor<'a> for StripVisitor<G, C>
where
    G: Fn(&Event) -> C,
    C: Eq + Hash + Clone,
{
    fn on_start(&mut self, _index: usize, event: &'a Event) {
        let position = (event.start_time - self.time_offset) * self.scale;
        match self.stack.last().cloned() {
            Some(active) => self.append(active, position),
            None => self.last_x = position,
        }
        self.stack.push((self.categorize)(event));
    }

    fn on_end(&mut self, _index: usize, event: &'a Event) {
        let (Some(category), Some(end_time)) = (self.stack.pop(), event.end_time()) else {
            return;
        };
        let position = (end_time - self.time_offset) * self.scale;
        self.append(category, position);
    }
}

/// Paints one thread onto a strip `options.width` pixels wide.
pub fn thread_strip<C, G>(
    model: &TracingModel,
    thread: &Thread,
    options: &OverviewOptions,
    categorize: G,
) -> ThreadStrip<C>
where
    C: Eq + Hash + Clone,
    G: Fn(&Event) -> C,
{
    let time_offset = model.minimum_record_time();
    let span = model.maximum_record_time() - time_offset;
    let scale = if span > 0.0 { options.width / span } else { 0.0 };

    let mut visitor = StripVisitor {
        dithering: Dithering::new(),
        categorize,
        stack: SmallVec::new(),
        time_offset,
        scale,
        last_x: 0.0,
        bars: Vec::new(),
    };
    for_each_event(thread.events(), &mut visitor, everything());

    ThreadStrip {
        thread: thread.thread_ref(),
        name: thread.name().to_owned(),
        bars: visitor.bars,
    }
}

/// One strip per thread other than the main thread, in display order.
pub fn background_thread_strips(
    model: &TracingModel,
    options: &OverviewOptions,
) -> Vec<ThreadStrip<TimelineCategory>> {
    let main = main_thread(model).map(Thread::thread_ref);

    model
        .sorted_processes()
        .into_iter()
        .flat_map(|process| process.sorted_threads())
        .filter(|thread| Some(thread.thread_ref()) != main && !thread.events().is_empty())
        .map(|thread| thread_strip(model, thread, options, TimelineCategory::for_event))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracemodel::testing_common::TraceBuilder;

    fn options(width: f64) -> OverviewOptions {
        OverviewOptions {
            width,
            ..OverviewOptions::default()
        }
    }

    #[test]
    fn nested_events_share_the_strip() {
        let mut b = TraceBuilder::new();
        b.session_start(1, 1, "S", 1000);
        b.complete(1, 1, "Task", 9000, 2000);
        b.thread_name(1, 2, "Compositor");
        b.interval(1, 2, "FunctionCall", 2000, 8000, |b| {
            b.interval(1, 2, "Paint", 4000, 6000, |_| {});
        });
        let model = b.into_model();

        // 1 px per ms, starting at 1 ms.
        let strips = background_thread_strips(&model, &options(10.0));
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].name, "Compositor");
        assert_eq!(
            strips[0].bars,
            vec![
                CategoryBar { category: TimelineCategory::Scripting, start: 1, end: 3 },
                CategoryBar { category: TimelineCategory::Painting, start: 3, end: 5 },
                CategoryBar { category: TimelineCategory::Scripting, start: 5, end: 7 },
            ]
        );
    }

    #[test]
    fn short_events_are_not_lost() {
        let mut b = TraceBuilder::new();
        b.session_start(1, 1, "S", 0);
        b.complete(1, 1, "Task", 1000, 99000);
        for i in 0..4 {
            b.complete(1, 2, "Paint", 10000 + i * 10000, 500);
        }
        let model = b.into_model();

        // 1 px per ms, each Paint is half a pixel wide. A gap tops up the
        // half pixel owed before it, and the next Paint pays that back, so
        // the two pixels of real width are painted as two pixels.
        let strips = background_thread_strips(&model, &options(99.0));
        let painted: i64 = strips[0].bars.iter().map(|bar| bar.end - bar.start).sum();
        assert_eq!(painted, 2);
        assert!(strips[0].bars.iter().all(|bar| bar.category == TimelineCategory::Painting));
    }

    #[test]
    fn main_thread_is_excluded() {
        let mut b = TraceBuilder::new();
        b.session_start(1, 1, "S", 1000);
        b.complete(1, 1, "Task", 1000, 2000);
        let model = b.into_model();

        assert!(background_thread_strips(&model, &options(10.0)).is_empty());
        let main = model.session_main_thread().unwrap();
        let strip = thread_strip(&model, main, &options(10.0), |_| "busy");
        assert_eq!(strip.bars, vec![CategoryBar { category: "busy", start: 0, end: 10 }]);
    }
}
