pub mod config;
pub mod error;
pub mod notify;
pub mod types;

pub use config::{SessionConfig, SolrSettings};
pub use error::{ConfigError, ConfigResult};
pub use notify::{BufferNotifier, Level, Notifier, TracingNotifier};
pub use types::*;
