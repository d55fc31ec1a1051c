//! This crate turns a [`TracingModel`](tracemodel::TracingModel) into the
//! data behind timeline overviews: fixed-width samples, whole-pixel bars
//! and flame chart rows.
//!
//! # Resampling
//!
//! A [`Quantizer`] cuts a piecewise-constant category signal into buckets of
//! equal duration. A [`Dithering`] maps back-to-back intervals given in
//! fractional pixels onto whole pixels without losing short intervals.
//!
//! # Providers
//!
//! [`cpu_overview()`] samples the main thread into stacked category
//! utilization, [`background_thread_strips()`] paints the other threads as
//! category bars, [`flame_chart_data()`] assigns every event a row, and
//! [`collapse_stacks()`] folds threads into `a;b;c` stacks for flame graphs.
//! All of them walk events with [`for_each_event()`].

mod category;
mod cpu_overview;
mod dithering;
mod flame_chart;
mod quantizer;
mod stack_collapse;
mod thread_overview;
mod walker;

pub use crate::category::{CategoryIndex, TimelineCategory};
pub use crate::cpu_overview::{
    cpu_overview, cpu_overview_with, main_thread, CpuOverview, OverviewOptions,
    DEFAULT_OVERVIEW_WIDTH, DEFAULT_QUANT_PX,
};
pub use crate::dithering::{Bar, Dithering};
pub use crate::flame_chart::{flame_chart_data, EntrySource, FlameChartData, FlameChartEntry};
pub use crate::quantizer::Quantizer;
pub use crate::stack_collapse::{collapse_stacks, collapse_thread_stacks};
pub use crate::thread_overview::{background_thread_strips, thread_strip, CategoryBar, ThreadStrip};
pub use crate::walker::{everything, for_each_event, EventVisitor};
