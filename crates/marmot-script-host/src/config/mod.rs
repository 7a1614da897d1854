pub mod host_config;
pub mod paths;

pub use host_config::{HostConfig, ScriptSelection};
pub use paths::ProjectPaths;
