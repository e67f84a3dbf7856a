pub mod config;
pub mod error;
pub mod types;

pub use config::OwllyConfig;
pub use error::{OwllyError, Result};
pub use types::{ChannelLogs, EnabledEvents, LogEvent, Message, OpenAIModel, Persona, Role};
