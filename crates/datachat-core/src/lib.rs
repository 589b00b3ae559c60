pub mod bus;
pub mod id;

pub use bus::{Bus, SharedBus, SubscriptionId};
