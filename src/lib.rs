//! Facade over the timelapser workspace crates.

pub use common;
pub use telemetry;
pub use timelapse_node;
