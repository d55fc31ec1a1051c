use std::fmt;

/// The single-character `ph` code classifying the temporal shape of a trace
/// event.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Phase {
    Begin,
    End,
    Complete,
    Instant,
    AsyncBegin,
    AsyncStepInto,
    AsyncStepPast,
    AsyncEnd,
    FlowBegin,
    FlowStep,
    FlowEnd,
    Metadata,
    Counter,
    Sample,
    CreateObject,
    SnapshotObject,
    DeleteObject,
}

impl Phase {
    pub fn from_code(code: &str) -> Option<Phase> {
        let phase = match code {
            "B" => Phase::Begin,
            "E" => Phase::End,
            "X" => Phase::Complete,
            // Older producers emit a capital `I` for instant events.
            "i" | "I" => Phase::Instant,
            "S" => Phase::AsyncBegin,
            "T" => Phase::AsyncStepInto,
            "p" => Phase::AsyncStepPast,
            "F" => Phase::AsyncEnd,
            "s" => Phase::FlowBegin,
            "t" => Phase::FlowStep,
            "f" => Phase::FlowEnd,
            "M" => Phase::Metadata,
            "C" => Phase::Counter,
            "P" => Phase::Sample,
            "N" => Phase::CreateObject,
            "O" => Phase::SnapshotObject,
            "D" => Phase::DeleteObject,
            _ => return None,
        };
        Some(phase)
    }

    pub fn code(self) -> &'static str {
        match self {
            Phase::Begin => "B",
            Phase::End => "E",
            Phase::Complete => "X",
            Phase::Instant => "i",
            Phase::AsyncBegin => "S",
            Phase::AsyncStepInto => "T",
            Phase::AsyncStepPast => "p",
            Phase::AsyncEnd => "F",
            Phase::FlowBegin => "s",
            Phase::FlowStep => "t",
            Phase::FlowEnd => "f",
            Phase::Metadata => "M",
            Phase::Counter => "C",
            Phase::Sample => "P",
            Phase::CreateObject => "N",
            Phase::SnapshotObject => "O",
            Phase::DeleteObject => "D",
        }
    }

    pub fn is_async(self) -> bool {
        matches!(
            self,
            Phase::AsyncBegin | Phase::AsyncStepInto | Phase::AsyncStepPast | Phase::AsyncEnd
        )
    }

    pub fn is_async_step(self) -> bool {
        matches!(self, Phase::AsyncStepInto | Phase::AsyncStepPast)
    }

    pub fn is_flow(self) -> bool {
        matches!(self, Phase::FlowBegin | Phase::FlowStep | Phase::FlowEnd)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
