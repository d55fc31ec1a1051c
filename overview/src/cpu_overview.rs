use crate::category::{CategoryIndex, TimelineCategory};
use crate::quantizer::Quantizer;
use crate::walker::{everything, for_each_event, EventVisitor};
use serde::Serialize;
use smallvec::SmallVec;
use std::hash::Hash;
use tracemodel::{Event, NamedObject, Thread, TracingModel};

pub const DEFAULT_OVERVIEW_WIDTH: f64 = 1000.0;
pub const DEFAULT_QUANT_PX: f64 = 4.0;

/// Geometry of the overview strips.
#[derive(Copy, Clone, Debug)]
pub struct OverviewOptions {
    /// Width of the strip in pixels.
    pub width: f64,
    /// Width of one CPU sample in pixels.
    pub quant_px: f64,
}

impl Default for OverviewOptions {
    fn default() -> OverviewOptions {
        OverviewOptions {
            width: DEFAULT_OVERVIEW_WIDTH,
            quant_px: DEFAULT_QUANT_PX,
        }
    }
}

/// Stacked category utilization of the main thread, one sample per
/// `quant_px` pixels.
#[derive(Clone, Debug, Serialize)]
pub struct CpuOverview<C> {
    pub categories: Vec<C>,
    pub start_time: f64,
    pub quant_px: f64,
    /// Milliseconds covered by one sample.
    pub quant_duration: f64,
    /// Time spent per category, indexed like `categories`.
    pub samples: Vec<Vec<f64>>,
}

impl<C> CpuOverview<C> {
    /// The share of sample `sample` that was spent in the category at
    /// `category`, in `0.0..=1.0`.
    pub fn utilization(&self, sample: usize, category: usize) -> f64 {
        self.samples
            .get(sample)
            .and_then(|counters| counters.get(category))
            .map_or(0.0, |time| time / self.quant_duration)
    }
}

/// The thread the CPU strip is drawn for: the one that started the
/// recording session, or failing that the busiest thread.
pub fn main_thread(model: &TracingModel) -> Option<&Thread> {
    if let Some(thread) = model.session_main_thread() {
        return Some(thread);
    }

    let mut busiest: Option<&Thread> = None;
    for process in model.sorted_processes() {
        for thread in process.sorted_threads() {
            if busiest.map_or(true, |b| thread.events().len() > b.events().len()) {
                busiest = Some(thread);
            }
        }
    }
    busiest.filter(|thread| !thread.events().is_empty())
}

struct CpuVisitor<'i, F, G, C>
where
    F: FnMut(&[f64]),
{
    quantizer: Quantizer<F>,
    index: &'i CategoryIndex<C>,
    categorize: G,
    stack: SmallVec<[usize; 16]>,
}

impl<'a, 'i, F, G, C> EventVisitor<'a> for CpuVisitor<'i, F, G, C>
where
    F: FnMut(&[f64]),
    G: Fn(&Event) -> C,
    C: Copy + Eq + Hash,
{
    fn on_start(&mut self, _index: usize, event: &'a Event) {
        let active = self.stack.last().copied().unwrap_or(self.index.idle_index());
        self.quantizer.append_interval(event.start_time, active);
        self.stack.push(self.index.index_of((self.categorize)(event)));
    }

    fn on_end(&mut self, _index: usize, event: &'a Event) {
        let active = self.stack.pop().unwrap_or(self.index.idle_index());
        if let Some(end_time) = event.end_time() {
            self.quantizer.append_interval(end_time, active);
        }
    }
}

/// Resamples the main thread into fixed-width CPU samples using the
/// default timeline categories.
pub fn cpu_overview(
    model: &TracingModel,
    options: &OverviewOptions,
) -> Option<CpuOverview<TimelineCategory>> {
    let index = CategoryIndex::default();
    cpu_overview_with(model, options, &index, TimelineCategory::for_event)
}

/// Like [`cpu_overview`], with the categories and the mapping from events
/// to categories supplied by the caller. Returns `None` if there is no
/// main thread or the recording is empty.
pub fn cpu_overview_with<C, G>(
    model: &TracingModel,
    options: &OverviewOptions,
    index: &CategoryIndex<C>,
    categorize: G,
) -> Option<CpuOverview<C>>
where
    C: Copy + Eq + Hash,
    G: Fn(&Event) -> C,
{
    let thread = main_thread(model)?;
    let start_time = model.minimum_record_time();
    let span = model.maximum_record_time() - start_time;
    if span <= 0.0 || options.width <= 0.0 || options.quant_px <= 0.0 {
        return None;
    }

    let scale = options.width / span;
    let quant_duration = options.quant_px / scale;
    if quant_duration <= 0.0 {
        return None;
    }
    log::debug!(
        "CPU overview of {} with {} ms per sample",
        thread.name(),
        quant_duration
    );

    let mut samples = Vec::new();
    {
        let quantizer = Quantizer::new(start_time, quant_duration, |counters: &[f64]| {
            let mut sample = counters.to_vec();
            sample.resize(index.len(), 0.0);
            samples.push(sample);
        });
        let mut visitor = CpuVisitor {
            quantizer,
            index,
            categorize,
            stack: SmallVec::new(),
        };
        for_each_event(thread.events(), &mut visitor, everything());

        // Kick out the last bucket.
        visitor
            .quantizer
            .append_interval(start_time + span + quant_duration, index.idle_index());
    }

    Some(CpuOverview {
        categories: index.categories().to_vec(),
        start_time,
        quant_px: options.quant_px,
        quant_duration,
        samples,
    })
}
