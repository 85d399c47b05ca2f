// Node module - configuration, runtime and in-process networks

mod config;
mod network;
mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use network::LocalNetwork;
pub use runtime::Node;
