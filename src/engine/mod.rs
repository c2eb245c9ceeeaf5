//! Command-line surface: argument parsing, settings layering, handlers, terminal progress.

pub mod arg_parser;
pub mod cli;
pub mod handlers;
pub mod progress;

pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::{handle_run, setup_settings};
pub use handlers::{handle_ask, handle_courses, handle_ingest, handle_serve};
