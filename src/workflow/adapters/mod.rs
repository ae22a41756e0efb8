//! Adapters for the workflow ports.

pub mod console;
pub mod retry;

pub use console::ConsolePrompt;
pub use retry::RetryingModelClient;
