//! This crate builds a process/thread/event model from a stream of
//! trace-event payloads.
//!
//! # Building a model
//!
//! The main entry point is the [`TracingModel`] struct. A recording is fed
//! into it in batches with [`TracingModel::add_events()`] and finalized with
//! [`TracingModel::tracing_complete()`]. Producers that deliver a trace in
//! chunks can use a [`Loader`], which also reports whether an active
//! recording session could be found.
//!
//! Ingestion never fails: anomalies in the stream (unbalanced Begin/End
//! pairs, out-of-order timestamps, broken async chains, events from other
//! sessions) are logged through the `log` crate and recovered from.
//!
//! # Reading a model
//!
//! [`TracingModel::sorted_processes()`] and [`Process::sorted_threads()`]
//! return the processes and threads in display order. Each [`Thread`] holds
//! its events in ingestion order and the async chains that began on it.
//! Events refer to each other through [`EventRef`] handles that are resolved
//! with [`TracingModel::event()`].

mod analysis;
mod backing_storage;
mod event;
mod loader;
mod named_object;
mod process;
mod snapshot;
pub mod testing_common;
mod thread;
mod tracing_model;

pub use crate::analysis::{AnalysisResults, EventSummary};
pub use crate::backing_storage::{BackingStorage, StorageRange};
pub use crate::event::{Event, EventDetail, EventRef, ThreadRef};
pub use crate::loader::{LoadError, Loader};
pub use crate::named_object::{compare_named, sort_named, NamedObject};
pub use crate::process::Process;
pub use crate::snapshot::{ObjectSnapshot, SnapshotError, SnapshotRequest};
pub use crate::thread::{AsyncEvent, Thread};
pub use crate::tracing_model::{ModelOptions, TracingModel, DEFAULT_SNAPSHOT_DETACH_THRESHOLD};
