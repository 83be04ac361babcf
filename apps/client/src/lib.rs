//! Direct-messaging client core.
//!
//! Views (`Roster`, `ChatView`) subscribe to a [`gateway::Gateway`] and
//! render from the latest snapshot; the [`store::SessionStore`] carries the
//! signed-in user and the selected peer between them.

pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod messaging;
pub mod notify;
pub mod observability;
pub mod presence;
pub mod roster;
pub mod store;

pub use chat_proto as proto;

pub use app::ChatApp;
pub use config::ClientConfig;
pub use error::{AppError, AppErrorCode, AppResult};
pub use gateway::{Gateway, MemoryGateway};
