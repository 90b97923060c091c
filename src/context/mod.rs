//! Conversation context management
//!
//! Owns per-conversation message histories with:
//! - Token budget enforcement (FIFO truncation of non-system messages)
//! - Corruption recovery (a log that fails to parse resets to empty)
//! - Per-context write serialization

pub mod manager;
pub mod models;
pub mod token_estimator;

pub use manager::ContextManager;
pub use models::{ContextSummary, Message, MessageRole};
pub use token_estimator::{TokenEstimator, TiktokenEstimator, WordBasedEstimator};
