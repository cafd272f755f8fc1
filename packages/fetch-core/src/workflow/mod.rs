pub mod model;
pub mod recorder;
pub mod replayer;

pub use model::{Importance, StepAction, Workflow, WorkflowStatus, WorkflowStep};
pub use recorder::Recorder;
pub use replayer::{substitute, BrowseInvoker, ReplayResult, Replayer, StepOutcome, VarValue};
