pub mod chat_stream;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod prompt;
pub mod session;
pub mod streamer;
pub mod transcript;
