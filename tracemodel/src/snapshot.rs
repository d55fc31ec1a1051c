use crate::backing_storage::{BackingStorage, ReadError, StorageRange};
use serde_json::Value;
use std::io;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot has no payload")]
    NotFound,
    #[error("snapshot storage was discarded")]
    Detached,
    #[error("could not parse snapshot payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("could not read snapshot payload: {0}")]
    Io(#[from] io::Error),
}

impl SnapshotError {
    fn from_read(e: ReadError) -> Self {
        match e {
            ReadError::StaleGeneration => SnapshotError::Detached,
            ReadError::OutOfBounds => SnapshotError::NotFound,
            ReadError::Io(e) => SnapshotError::Io(e),
        }
    }
}

/// Decides where the payload of a new snapshot lives.
#[derive(Clone, Debug)]
pub(crate) struct SnapshotSink {
    pub storage: Option<Arc<BackingStorage>>,
    pub detach_threshold: usize,
}

#[derive(Clone, Debug)]
enum SnapshotObject {
    Missing,
    InMemory(Value),
    Detached {
        storage: Arc<BackingStorage>,
        location: StorageRange,
    },
}

/// The object payload of a `SnapshotObject` event. Large payloads are kept
/// in a [`BackingStorage`] and only parsed again when asked for.
#[derive(Clone, Debug)]
pub struct ObjectSnapshot {
    object: SnapshotObject,
}

impl ObjectSnapshot {
    pub(crate) fn new(snapshot: Option<Value>, sink: &SnapshotSink) -> ObjectSnapshot {
        let value = match snapshot {
            Some(value) => value,
            None => {
                return ObjectSnapshot {
                    object: SnapshotObject::Missing,
                }
            }
        };

        let storage = match sink.storage {
            Some(ref storage) => storage,
            None => {
                return ObjectSnapshot {
                    object: SnapshotObject::InMemory(value),
                }
            }
        };

        let serialized = match serde_json::to_vec(&value) {
            Ok(serialized) => serialized,
            Err(e) => {
                log::warn!("Could not serialize snapshot payload: {}", e);
                return ObjectSnapshot {
                    object: SnapshotObject::InMemory(value),
                };
            }
        };

        if serialized.len() <= sink.detach_threshold {
            return ObjectSnapshot {
                object: SnapshotObject::InMemory(value),
            };
        }

        match storage.append(&serialized) {
            Ok(location) => ObjectSnapshot {
                object: SnapshotObject::Detached {
                    storage: storage.clone(),
                    location,
                },
            },
            Err(e) => {
                log::warn!("Could not offload snapshot payload, keeping it in memory: {}", e);
                ObjectSnapshot {
                    object: SnapshotObject::InMemory(value),
                }
            }
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.object, SnapshotObject::Detached { .. })
    }

    pub fn has_payload(&self) -> bool {
        !matches!(self.object, SnapshotObject::Missing)
    }

    /// Returns the payload, reading it back from storage if it was detached.
    pub fn object(&self) -> Result<Value, SnapshotError> {
        match self.object {
            SnapshotObject::Missing => Err(SnapshotError::NotFound),
            SnapshotObject::InMemory(ref value) => Ok(value.clone()),
            SnapshotObject::Detached {
                ref storage,
                ref location,
            } => hydrate(storage, location),
        }
    }

    /// Like [`object`](Self::object), but a detached payload is read and
    /// parsed on a separate thread. The returned request yields the result.
    pub fn request_object(&self) -> SnapshotRequest {
        let (sender, receiver) = mpsc::channel();

        match self.object {
            SnapshotObject::Detached {
                ref storage,
                ref location,
            } => {
                let storage = storage.clone();
                let location = location.clone();
                thread::spawn(move || {
                    // The receiver may be gone already, nothing to do then.
                    let _ = sender.send(hydrate(&storage, &location));
                });
            }
            _ => {
                let _ = sender.send(self.object());
            }
        }

        SnapshotRequest { receiver }
    }
}

fn hydrate(storage: &BackingStorage, location: &StorageRange) -> Result<Value, SnapshotError> {
    let bytes = storage.read(location).map_err(SnapshotError::from_read)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// A pending snapshot read started by [`ObjectSnapshot::request_object`].
#[derive(Debug)]
pub struct SnapshotRequest {
    receiver: mpsc::Receiver<Result<Value, SnapshotError>>,
}

impl SnapshotRequest {
    /// Blocks until the payload has been read.
    pub fn wait(self) -> Result<Value, SnapshotError> {
        self.receiver
            .recv()
            .unwrap_or(Err(SnapshotError::Detached))
    }

    /// Returns the result if the read has finished, `None` otherwise.
    pub fn poll(&self) -> Option<Result<Value, SnapshotError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(SnapshotError::Detached)),
        }
    }
}
