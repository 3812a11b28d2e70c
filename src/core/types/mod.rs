//! Core domain types
//!
//! Wire-format-agnostic request/response/message shapes shared by the
//! dispatcher and every provider adapter.

pub mod chat;
pub mod content;
pub mod context;
pub mod message;
pub mod tools;

pub use chat::*;
pub use content::*;
pub use context::*;
pub use message::*;
pub use tools::*;
