pub mod bus;
pub mod ws;

pub use bus::{LiveBus, LiveEvent};
