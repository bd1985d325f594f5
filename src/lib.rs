//! termpal is a terminal assistant that streams replies from a remote
//! language model and runs local inspection tools on its behalf.
//!
//! The crate is organized in layers:
//! - [`tools`] defines tools, the registry that catalogues them and the
//!   executor that validates, permission-checks and runs every invocation.
//! - [`commands`] parses `/command` lines and maps them to handlers or tools.
//! - [`nlp`] maps plain-language phrases onto tool invocations.
//! - [`core`] owns the session, configuration, conversation history and the
//!   streaming turn machine that talks to the model.
//! - [`ui`] runs the interactive loop and draws the live reply view.
//! - [`api`] holds the chat and model-listing wire payloads.
//!
//! The binary routes through [`cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod nlp;
pub mod tools;
pub mod ui;
pub mod utils;
