pub mod cameras;
pub mod config;
pub mod naming;
pub mod validation;

pub use cameras::{AuthSpec, CameraConfig, CameraIdentity, CommandMode};
pub use config::{example_config, AppConfig};
pub use naming::to_path_segment;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
