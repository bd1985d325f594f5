//! Terminal presentation for interactive sessions.
//!
//! - [`chat_loop`]: reads input lines, dispatches them through
//!   [`crate::commands`] and runs model turns via [`crate::core::streamer`].
//! - [`live`]: the inline viewport that shows a reply while it streams.
//! - [`render`]: scrollback output for tables, tool results and finished turns.
//!
//! This layer only presents; [`crate::core`] owns session state.

pub mod chat_loop;
pub mod live;
pub mod render;
