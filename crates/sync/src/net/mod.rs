mod simulator;
mod stats;

pub use simulator::NetworkSimulator;
pub use stats::{BandwidthTracker, LinkStats};
