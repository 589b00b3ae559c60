pub mod flow;
pub mod message;
pub mod turn;

pub use flow::*;
pub use message::*;
pub use turn::*;
