//! Conversational memory and recall
//!
//! A user teaches facts ("my favorite color is blue", or by answering an
//! assistant question) and later asks for them back ("what's my favorite
//! color?"). Turns that are neither are handed to a language model with the
//! known facts embedded in its system directive.

pub mod classifier;
pub mod resolver;
mod service;
pub mod store;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

pub use service::{ChatService, ReplyBody, TurnError, TurnRequest, DEFAULT_HISTORY_LIMIT};
pub use store::DatabaseStorage;
