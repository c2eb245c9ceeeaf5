pub mod config;
pub mod env;
pub mod lectern_toml;
pub mod logger;

pub use config::*;
pub use env::{apply_env, apply_env_with, load_dotenv};
pub use lectern_toml::{LecternToml, apply_file_to_settings, load_lectern_toml};
pub use logger::setup_logging;
