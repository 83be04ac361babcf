//! Conversation message list and the input box that feeds it.

pub mod composer;
pub mod stream;

pub use composer::{Composer, SendOutcome};
pub use stream::{normalize, Alignment, Bubble, MessageStream};
