use std::fmt;

/// Progress of one orchestration cycle. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CycleStage {
    Idle,
    ManifestLoaded,
    PayloadBuilt,
    ResponseReceived,
    ResponseParsed,
    BackedUp,
    FileWritten,
    ManifestSaved,
}

impl CycleStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ManifestLoaded => "manifest_loaded",
            Self::PayloadBuilt => "payload_built",
            Self::ResponseReceived => "response_received",
            Self::ResponseParsed => "response_parsed",
            Self::BackedUp => "backed_up",
            Self::FileWritten => "file_written",
            Self::ManifestSaved => "manifest_saved",
        }
    }

    /// Cancellation is honored only while nothing on disk has changed.
    pub fn is_cancellable(self) -> bool {
        self <= Self::ResponseParsed
    }
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
