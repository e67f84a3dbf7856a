//! Thread session derivation.
//!
//! A conversation has no row in any database. Its persona, model and system
//! message are re-derived on every event from two things the chat platform
//! already stores: the thread name and the thread's starter message. This
//! crate holds that derivation plus the assembly of the completion request,
//! all as pure functions over plain snapshot types.

pub mod assemble;
pub mod models;
pub mod personas;
pub mod session;
pub mod starter;
pub mod template;
pub mod threads;
pub mod tokens;

pub use assemble::{Budget, HistoryKind, HistoryMessage, LastMessage};
pub use models::ModelCatalog;
pub use personas::PersonaRegistry;
pub use session::{Session, SessionReconstructor, StarterMessage, ThreadSnapshot};
pub use tokens::{CharEstimate, Tiktoken, Tokenizer};
