pub mod assembler;
pub mod chat;
pub mod driver;
pub mod progress;
pub mod suggestions;
pub mod timer;

pub use assembler::{MessageAssembler, ToolUpdate};
pub use chat::{ChatError, ChatSession, ChatSnapshot, TurnOutcome, ViewEvent};
pub use driver::FlowDriver;
pub use progress::{ContentLengthEstimator, ProgressEstimator};
pub use suggestions::extract_suggestions;
pub use timer::TurnTimer;
