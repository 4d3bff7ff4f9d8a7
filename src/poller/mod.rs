mod controller;
mod loop_worker;

pub use controller::{PollerController, PollerSetup};
pub use loop_worker::DEFAULT_POLL_INTERVAL;
