use crate::TracingModel;
use thiserror::Error;
use tracedecode::RawEvent;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoadError {
    #[error("could not determine active recording session")]
    NoSession,
}

/// Feeds a [`TracingModel`] from a producer that delivers the trace in
/// chunks. The first chunk starts a new recording; [`finish`](Loader::finish)
/// must be called once all chunks were delivered.
#[derive(Debug)]
pub struct Loader<'a> {
    model: &'a mut TracingModel,
    first_chunk: bool,
}

impl<'a> Loader<'a> {
    pub fn new(model: &'a mut TracingModel) -> Loader<'a> {
        Loader {
            model,
            first_chunk: true,
        }
    }

    pub fn load_next_chunk<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = RawEvent>,
    {
        if self.first_chunk {
            self.model.reset();
            self.first_chunk = false;
        }
        self.model.add_events(events);
    }

    /// Finalizes the model. The model keeps whatever timeline could be
    /// built even when this returns an error.
    pub fn finish(self) -> Result<(), LoadError> {
        if self.first_chunk {
            self.model.reset();
        }
        self.model.tracing_complete();

        match self.model.session_id() {
            Some(_) => Ok(()),
            None => Err(LoadError::NoSession),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_common::TraceBuilder;

    #[test]
    fn first_chunk_resets() {
        let mut model = TracingModel::new();
        let mut b = TraceBuilder::new();
        b.instant(9, 9, "stale", 1_000);
        model.add_events(b.into_events());

        let mut b = TraceBuilder::new();
        b.session_start(1, 1, "S", 5_000);
        let mut loader = Loader::new(&mut model);
        loader.load_next_chunk(b.into_events());
        loader.finish().unwrap();

        assert!(model.process_by_id(9).is_none());
        assert_eq!(model.session_id(), Some("S"));
        assert_eq!(model.minimum_record_time(), 5.0);
    }

    #[test]
    fn missing_session_is_reported() {
        let mut model = TracingModel::new();
        let mut b = TraceBuilder::new();
        b.interval(1, 1, "a", 1_000, 2_000, |_| {});

        let mut loader = Loader::new(&mut model);
        loader.load_next_chunk(b.into_events());
        let err = loader.finish().unwrap_err();

        assert_eq!(err, LoadError::NoSession);
        assert_eq!(err.to_string(), "could not determine active recording session");
        // The timeline is still there.
        assert_eq!(model.process_by_id(1).unwrap().thread_by_id(1).unwrap().events().len(), 1);
    }

    #[test]
    fn no_chunks_means_empty_model() {
        let mut model = TracingModel::new();
        let mut b = TraceBuilder::new();
        b.instant(1, 1, "old", 1_000);
        model.add_events(b.into_events());

        let result = Loader::new(&mut model).finish();
        assert_eq!(result, Err(LoadError::NoSession));
        assert_eq!(model.processes().count(), 0);
    }
}
