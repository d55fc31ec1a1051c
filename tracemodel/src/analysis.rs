use crate::event::{Event, EventRef};
use crate::TracingModel;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracedecode::Phase;

const FORCED_LAYOUT_WARNING: &str = "Forced synchronous layout is a possible performance bottleneck.";

impl TracingModel {
    /// Fills in [`Event::self_time`] for every interval event: its duration
    /// minus the durations of its direct children.
    ///
    /// A thread's events are walked in start-time order, so a parent is
    /// always seen before its children. The walk keeps a stack of the
    /// intervals that are still open at the current event:
    ///
    /// ```ignore
    ///      <--e2-->   <--e3-->
    ///  <-----------e1----------->
    /// ```
    ///
    /// When `e3` is reached, `e2` no longer contains it and is popped, which
    /// leaves `e1` on top of the stack as the parent of `e3`. The parent's
    /// self time is reduced by the child's full duration; grandchildren are
    /// accounted for within the child.
    pub(crate) fn compute_self_times(&mut self) {
        for process in self.processes_mut() {
            for thread in process.threads_mut() {
                let events = thread.events_mut();
                let parents = parent_indices(events);

                for event in events.iter_mut() {
                    event.self_time = event.duration().unwrap_or(0.0);
                }
                for (index, parent) in parents.iter().enumerate() {
                    if let (Some(parent), Some(duration)) = (*parent, events[index].duration()) {
                        events[parent].self_time -= duration;
                    }
                }
            }
        }
    }

    /// Flags layouts that were forced by script, and links events to the
    /// event that caused them (timer installs, animation frame requests and
    /// resource requests).
    pub(crate) fn calculate_warnings(&mut self) {
        for process in self.processes_mut() {
            for thread in process.threads_mut() {
                let events = thread.events_mut();
                let parents = parent_indices(events);

                for index in 0..events.len() {
                    if events[index].name != "Layout" {
                        continue;
                    }
                    let mut ancestor = parents[index];
                    while let Some(parent) = ancestor {
                        if is_script_event(&events[parent]) {
                            events[index].warning = Some(FORCED_LAYOUT_WARNING.to_string());
                            break;
                        }
                        ancestor = parents[parent];
                    }
                }
            }

            let mut links = Vec::new();
            for thread in process.threads() {
                let thread_ref = thread.thread_ref();
                for (index, event) in thread.events().iter().enumerate() {
                    if let Some(link) = initiator_link(event) {
                        let event_ref = EventRef {
                            thread: thread_ref,
                            index,
                        };
                        links.push((event.start_time, event_ref, link));
                    }
                }
            }
            links.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut sources = FxHashMap::<(&'static str, String), EventRef>::default();
            let mut initiators = Vec::new();
            for (_, event_ref, link) in links {
                match link {
                    Link::Source(kind, id) => {
                        sources.insert((kind, id), event_ref);
                    }
                    Link::Target(kind, id) => {
                        if let Some(&source) = sources.get(&(kind, id)) {
                            initiators.push((event_ref, source));
                        }
                    }
                }
            }

            for (target, source) in initiators {
                let thread = process.thread_by_id_mut(target.thread.tid);
                if let Some(event) = thread.events_mut().get_mut(target.index) {
                    event.initiator = Some(source);
                }
            }
        }
    }

    /// Aggregates the recorded intervals by event name.
    pub fn perform_analysis(&self) -> AnalysisResults {
        let mut event_data = FxHashMap::<&str, EventSummary>::default();

        for process in self.processes() {
            for thread in process.threads() {
                for event in thread.events() {
                    let duration = match event.duration() {
                        Some(duration) => duration,
                        None => continue,
                    };
                    let data = event_data
                        .entry(event.name.as_str())
                        .or_insert_with(|| EventSummary::new(event.name.clone()));
                    data.time += duration;
                    data.self_time += event.self_time;
                    data.invocation_count += 1;
                }
            }
        }

        let mut event_data: Vec<EventSummary> = event_data.into_values().collect();
        event_data.sort_by(|a, b| {
            b.self_time
                .total_cmp(&a.self_time)
                .then_with(|| a.name.cmp(&b.name))
        });

        AnalysisResults {
            event_data,
            total_time: self.maximum_record_time() - self.minimum_record_time(),
        }
    }
}

/// For each event, the index of the innermost interval on the same thread
/// that contains it.
fn parent_indices(events: &[Event]) -> Vec<Option<usize>> {
    // Of events starting together the longest comes first, so it can be
    // the parent of the others whatever order they arrived in.
    let end = |event: &Event| event.end_time().unwrap_or(event.start_time);
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|&a, &b| {
        events[a]
            .start_time
            .total_cmp(&events[b].start_time)
            .then_with(|| end(&events[b]).total_cmp(&end(&events[a])))
    });

    let mut parents = vec![None; events.len()];
    let mut stack: Vec<usize> = Vec::new();

    for index in order {
        let event = &events[index];

        // Pop all events from the stack that are not parents of the
        // current event.
        while let Some(&top) = stack.last() {
            if events[top].contains(event) {
                break;
            }
            stack.pop();
        }

        parents[index] = stack.last().copied();

        if matches!(event.phase, Phase::Begin | Phase::Complete) && event.end_time().is_some() {
            stack.push(index);
        }
    }

    parents
}

fn is_script_event(event: &Event) -> bool {
    event.name == "EvaluateScript" || event.name == "FunctionCall"
}

enum Link {
    Source(&'static str, String),
    Target(&'static str, String),
}

fn initiator_link(event: &Event) -> Option<Link> {
    let data_id = |key: &str| -> Option<String> {
        match event.args.get("data")?.get(key)? {
            Value::String(id) => Some(id.clone()),
            Value::Null => None,
            id => Some(id.to_string()),
        }
    };

    Some(match event.name.as_str() {
        "TimerInstall" => Link::Source("timer", data_id("timerId")?),
        "TimerFire" => Link::Target("timer", data_id("timerId")?),
        "RequestAnimationFrame" => Link::Source("animation-frame", data_id("id")?),
        "FireAnimationFrame" => Link::Target("animation-frame", data_id("id")?),
        "ResourceSendRequest" => Link::Source("request", data_id("requestId")?),
        "ResourceReceiveResponse" | "ResourceReceivedData" | "ResourceFinish" => {
            Link::Target("request", data_id("requestId")?)
        }
        _ => return None,
    })
}

/// Per-name totals for one recording. Times are in milliseconds.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AnalysisResults {
    /// Sorted by self time, largest first.
    pub event_data: Vec<EventSummary>,
    pub total_time: f64,
}

impl AnalysisResults {
    pub fn event_data_by_name(&self, name: &str) -> Option<&EventSummary> {
        self.event_data.iter().find(|data| data.name == name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EventSummary {
    pub name: String,
    pub time: f64,
    pub self_time: f64,
    pub invocation_count: usize,
}

impl EventSummary {
    pub fn new(name: String) -> EventSummary {
        EventSummary {
            name,
            ..Self::default()
        }
    }
}

#[rustfmt::skip]
#[cfg(test)]
mod tests {
    use crate::testing_common::TraceBuilder;
    use serde_json::json;

    #[test]
    fn total_time_and_nesting() {
        let mut b = TraceBuilder::new();

        b.interval(1, 1, "q1", 100_000, 200_000, |b| {
            b.interval(1, 1, "q2", 110_000, 190_000, |b| {
                b.interval(1, 1, "q3", 120_000, 180_000, |_| {});
            });
        });

        let results = b.into_model().perform_analysis();

        assert_eq!(results.total_time, 100.0);

        // 10ms in the beginning and 10ms in the end
        assert_eq!(results.event_data_by_name("q1").unwrap().self_time, 20.0);
        // 10ms in the beginning and 10ms in the end, again
        assert_eq!(results.event_data_by_name("q2").unwrap().self_time, 20.0);
        // 60ms of uninterupted self-time
        assert_eq!(results.event_data_by_name("q3").unwrap().self_time, 60.0);

        assert_eq!(results.event_data_by_name("q1").unwrap().invocation_count, 1);
        assert_eq!(results.event_data_by_name("q3").unwrap().invocation_count, 1);
        assert_eq!(results.event_data[0].name, "q3");
    }

    #[test]
    fn siblings_and_complete_events() {
        //      <--e2-->   <--e3-->
        //  <-----------e1----------->
        let mut b = TraceBuilder::new();
        b.complete(1, 1, "e1", 1000, 9000);
        b.complete(1, 1, "e2", 2000, 2000);
        b.complete(1, 1, "e3", 5000, 3000);

        let model = b.into_model();
        let events = model.process_by_id(1).unwrap().thread_by_id(1).unwrap().events();
        assert_eq!(events[0].self_time, 4.0);
        assert_eq!(events[1].self_time, 2.0);
        assert_eq!(events[2].self_time, 3.0);
    }

    #[test]
    fn child_recorded_before_parent_with_same_start() {
        let mut b = TraceBuilder::new();
        b.complete(1, 1, "child", 1000, 2000);
        b.complete(1, 1, "parent", 1000, 5000);
        b.instant(1, 1, "mark", 1000);

        let model = b.into_model();
        let events = model.process_by_id(1).unwrap().thread_by_id(1).unwrap().events();
        assert_eq!(events[0].name, "child");
        assert_eq!(events[0].self_time, 2.0);
        assert_eq!(events[1].name, "parent");
        assert_eq!(events[1].self_time, 3.0);
    }

    #[test]
    fn same_event_multiple_times() {
        let mut b = TraceBuilder::new();
        b.interval(1, 1, "e", 0, 1_000_000, |b| {
            b.interval(1, 1, "e", 100_000, 900_000, |_| {});
        });
        b.interval(1, 1, "e", 2_000_000, 3_000_000, |_| {});

        let results = b.into_model().perform_analysis();
        let data = results.event_data_by_name("e").unwrap();
        assert_eq!(data.invocation_count, 3);
        assert_eq!(data.time, 2800.0);
        assert_eq!(data.self_time, 2000.0);
    }

    #[test]
    fn threads_are_independent() {
        let mut b = TraceBuilder::new();
        b.interval(1, 1, "a", 0, 1_000_000, |_| {});
        b.interval(1, 2, "b", 100_000, 200_000, |_| {});

        let results = b.into_model().perform_analysis();
        assert_eq!(results.event_data_by_name("a").unwrap().self_time, 1000.0);
        assert_eq!(results.event_data_by_name("b").unwrap().self_time, 100.0);
    }

    #[test]
    fn instants_and_open_intervals_have_no_time() {
        let mut b = TraceBuilder::new();
        b.interval(1, 1, "a", 1000, 2000, |b| {
            b.instant(1, 1, "mark", 1500);
        });
        b.begin(1, 1, "open", 3000);

        let results = b.into_model().perform_analysis();
        assert_eq!(results.event_data_by_name("a").unwrap().self_time, 1.0);
        assert!(results.event_data_by_name("mark").is_none());
        assert!(results.event_data_by_name("open").is_none());
    }

    #[test]
    fn forced_layout_warning() {
        let mut b = TraceBuilder::new();
        b.interval(1, 1, "FunctionCall", 0, 1000, |b| {
            b.interval(1, 1, "RecalculateStyles", 100, 500, |b| {
                b.interval(1, 1, "Layout", 200, 300, |_| {});
            });
        });
        b.interval(1, 1, "Layout", 2000, 2500, |_| {});

        let model = b.into_model();
        let events = model.process_by_id(1).unwrap().thread_by_id(1).unwrap().events();
        assert_eq!(events[2].name, "Layout");
        assert!(events[2].warning.is_some());
        assert_eq!(events[3].name, "Layout");
        assert!(events[3].warning.is_none());
    }

    #[test]
    fn initiators() {
        let mut b = TraceBuilder::new();
        b.push(json!({ "name": "TimerInstall", "ph": "I", "ts": 1000, "pid": 1, "tid": 1, "args": { "data": { "timerId": 7 } } }));
        b.push(json!({ "name": "ResourceSendRequest", "ph": "I", "ts": 1500, "pid": 1, "tid": 1, "args": { "data": { "requestId": "r1" } } }));
        b.push(json!({ "name": "TimerFire", "ph": "X", "ts": 2000, "dur": 100, "pid": 1, "tid": 1, "args": { "data": { "timerId": 7 } } }));
        b.push(json!({ "name": "ResourceFinish", "ph": "I", "ts": 3000, "pid": 1, "tid": 2, "args": { "data": { "requestId": "r1" } } }));
        b.push(json!({ "name": "TimerFire", "ph": "X", "ts": 4000, "dur": 100, "pid": 1, "tid": 1, "args": { "data": { "timerId": 8 } } }));

        let model = b.into_model();
        let main = model.process_by_id(1).unwrap().thread_by_id(1).unwrap();
        let fire = &main.events()[2];
        let install = model.event(fire.initiator.unwrap()).unwrap();
        assert_eq!(install.name, "TimerInstall");
        assert!(main.events()[3].initiator.is_none());

        let finish = &model.process_by_id(1).unwrap().thread_by_id(2).unwrap().events()[0];
        assert_eq!(model.event(finish.initiator.unwrap()).unwrap().name, "ResourceSendRequest");
    }
}
