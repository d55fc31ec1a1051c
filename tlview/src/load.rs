use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracedecode::read_trace_file;
use tracemodel::{BackingStorage, LoadError, Loader, ModelOptions, TracingModel, DEFAULT_SNAPSHOT_DETACH_THRESHOLD};

#[derive(Args, Debug)]
pub struct LoadOpt {
    /// Trace file: a JSON array of trace events or an object with a
    /// `traceEvents` array, optionally gzip-compressed
    pub file: PathBuf,

    /// Feed the model this many events at a time instead of all at once
    #[clap(long = "chunk-size")]
    pub chunk_size: Option<usize>,

    /// Keep large object snapshots in this file instead of in memory
    #[clap(long = "backing-file")]
    pub backing_file: Option<PathBuf>,

    /// Snapshots larger than this many bytes are moved to backing storage
    #[clap(long = "snapshot-threshold", default_value_t = DEFAULT_SNAPSHOT_DETACH_THRESHOLD)]
    pub snapshot_threshold: usize,
}

pub fn load_model(opt: &LoadOpt) -> Result<TracingModel, Box<dyn Error + Send + Sync>> {
    let events = read_trace_file(&opt.file)?;
    log::info!("Read {} events from {}", events.len(), opt.file.display());

    let options = ModelOptions {
        snapshot_detach_threshold: opt.snapshot_threshold,
    };
    let storage = match opt.backing_file {
        Some(ref path) => BackingStorage::from_path(path)
            .map_err(|e| format!("Could not create `{}`: {}", path.display(), e))?,
        None => BackingStorage::new_in_memory(),
    };
    let mut model = TracingModel::with_backing_storage(options, Arc::new(storage));

    let chunk_size = opt.chunk_size.unwrap_or(events.len()).max(1);
    let mut loader = Loader::new(&mut model);
    for chunk in events.chunks(chunk_size) {
        loader.load_next_chunk(chunk.to_vec());
    }

    match loader.finish() {
        Ok(()) => {}
        // Recordings made without the timeline metadata are still useful.
        Err(LoadError::NoSession) => log::warn!("{}", LoadError::NoSession),
    }

    Ok(model)
}
