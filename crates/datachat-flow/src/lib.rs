pub mod machine;
pub mod policy;
pub mod route;
pub mod step;

pub use machine::FlowStateMachine;
pub use policy::{LoopDecision, LoopPolicy, ToolLoopPolicy};
pub use route::{classify_route, route_template};
pub use step::{apply, transition, StepAction, TransitionError};
