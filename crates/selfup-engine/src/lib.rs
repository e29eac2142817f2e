mod cancel;
mod cycle;
mod stage;

pub use cancel::CancellationFlag;
pub use cycle::{AppliedUpgrade, CycleError, CycleReport, Orchestrator};
pub use stage::CycleStage;
