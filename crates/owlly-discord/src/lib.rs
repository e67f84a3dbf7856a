pub mod adapter;
pub mod chat;
pub mod collect;
pub mod commands;
pub mod context;
pub mod embed;
pub mod error;
pub mod handler;
pub mod logs;
pub mod send;
pub mod threads;

pub use adapter::DiscordAdapter;
pub use context::AppContext;
pub use error::DiscordError;
