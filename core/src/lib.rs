// Core of the guessing-game backend:
// - Configuration loading
// - Shared error types
// - Request/response data structures
// - Prompt construction and reply-contract decoding
// - Completion service client
// - Dialogue turn processing

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

pub mod prompt;
pub mod reply;

// Export client module - completion service client
pub mod client;
pub use client::{CompletionClient, OpenRouterClient};

// Export turn module - the dialogue turn processor
pub mod turn;
pub use turn::TurnProcessor;
