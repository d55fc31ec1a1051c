use smallvec::SmallVec;
use std::ops::Range;
use tracemodel::Event;

/// Receives the events of one thread in nesting order from
/// [`for_each_event`]. `index` is the position of the event in the slice
/// being walked.
pub trait EventVisitor<'a> {
    fn on_start(&mut self, index: usize, event: &'a Event);
    fn on_end(&mut self, index: usize, event: &'a Event);

    /// Events without a duration. `parent` is the innermost interval that
    /// is open at that point.
    fn on_instant(&mut self, _index: usize, _event: &'a Event, _parent: Option<&'a Event>) {}
}

/// Walks a chronological event list, reporting intervals as they open and
/// close. Intervals that overlap `window` are visited whole; async and flow
/// events are skipped.
pub fn for_each_event<'a, V>(events: &'a [Event], visitor: &mut V, window: Range<f64>)
where
    V: EventVisitor<'a>,
{
    let mut stack: SmallVec<[(usize, &'a Event); 32]> = SmallVec::new();

    for (index, event) in events.iter().enumerate() {
        if event.end_time().unwrap_or(event.start_time) < window.start {
            continue;
        }
        if event.start_time >= window.end {
            break;
        }
        if event.phase.is_async() || event.phase.is_flow() {
            continue;
        }

        while let Some(&(top_index, top)) = stack.last() {
            match top.end_time() {
                Some(end_time) if end_time <= event.start_time => {
                    stack.pop();
                    visitor.on_end(top_index, top);
                }
                _ => break,
            }
        }

        match event.duration() {
            Some(duration) if duration > 0.0 => {
                visitor.on_start(index, event);
                stack.push((index, event));
            }
            _ => visitor.on_instant(index, event, stack.last().map(|&(_, parent)| parent)),
        }
    }

    while let Some((top_index, top)) = stack.pop() {
        visitor.on_end(top_index, top);
    }
}

/// The whole time range.
pub fn everything() -> Range<f64> {
    f64::NEG_INFINITY..f64::INFINITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracemodel::testing_common::TraceBuilder;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl<'a> EventVisitor<'a> for Recorder {
        fn on_start(&mut self, _index: usize, event: &'a Event) {
            self.0.push(format!("+{}", event.name));
        }

        fn on_end(&mut self, _index: usize, event: &'a Event) {
            self.0.push(format!("-{}", event.name));
        }

        fn on_instant(&mut self, index: usize, event: &'a Event, parent: Option<&'a Event>) {
            let parent = parent.map_or("", |p| p.name.as_str());
            self.0.push(format!("!{}@{}#{}", event.name, parent, index));
        }
    }

    fn walk(b: TraceBuilder, window: Range<f64>) -> Vec<String> {
        let model = b.into_model();
        let events = model.process_by_id(1).unwrap().thread_by_id(1).unwrap().events();
        let mut recorder = Recorder::default();
        for_each_event(events, &mut recorder, window);
        recorder.0
    }

    #[test]
    fn nesting_order() {
        let mut b = TraceBuilder::new();
        b.interval(1, 1, "a", 1000, 5000, |b| {
            b.interval(1, 1, "b", 2000, 3000, |_| {});
            b.instant(1, 1, "m", 4000);
        });
        b.complete(1, 1, "c", 6000, 1000);
        b.async_begin(1, 1, "async", "1", 6500);

        assert_eq!(
            walk(b, everything()),
            vec!["+a", "+b", "-b", "!m@a#2", "-a", "+c", "-c"]
        );
    }

    #[test]
    fn unclosed_and_zero_length_events_are_instants() {
        let mut b = TraceBuilder::new();
        b.complete(1, 1, "zero", 1000, 0);
        b.begin(1, 1, "open", 2000);

        assert_eq!(walk(b, everything()), vec!["!zero@#0", "!open@#1"]);
    }

    #[test]
    fn window() {
        let mut b = TraceBuilder::new();
        b.complete(1, 1, "before", 1000, 1000);
        b.complete(1, 1, "overlapping", 2500, 2000);
        b.complete(1, 1, "inside", 5000, 1000);
        b.complete(1, 1, "after", 9000, 1000);

        assert_eq!(
            walk(b, 3.0..8.0),
            vec!["+overlapping", "-overlapping", "+inside", "-inside"]
        );
    }
}
