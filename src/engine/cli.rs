//! CLI entry: build layered settings, then dispatch to the subcommand handler.

use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::Settings;
use crate::engine::arg_parser::{Cli, Commands, CommonArgs};
use crate::engine::handlers::{handle_ask, handle_courses, handle_ingest, handle_serve};
use crate::utils::{apply_env, apply_file_to_settings, load_dotenv, load_lectern_toml, setup_logging};

/// Defaults → `lectern.toml` → environment (after `.env`) → flags.
pub fn setup_settings(common: &CommonArgs) -> Settings {
    let dir = common.config_dir.as_deref().unwrap_or(Path::new("."));
    let mut settings = Settings::default();
    if let Some(file) = load_lectern_toml(dir) {
        apply_file_to_settings(&file, &mut settings);
    }
    load_dotenv(dir);
    apply_env(&mut settings);
    apply_common_args(common, &mut settings);
    settings
}

/// Flags win over every other layer.
pub fn apply_common_args(common: &CommonArgs, settings: &mut Settings) {
    if let Some(mode) = common.mode {
        settings.mode = mode;
    }
    if let Some(dir) = &common.runs_dir {
        settings.runs_dir = dir.clone();
    }
    if let Some(dir) = &common.scripts_dir {
        settings.scripts_dir = dir.clone();
    }
    if let Some(bin) = &common.python_bin {
        settings.python_bin = Some(bin.clone());
    }
    if let Some(db) = &common.mongo_db {
        settings.mongo_db = db.clone();
    }
    if let Some(coll) = &common.mongo_collection {
        settings.mongo_collection = coll.clone();
    }
    if let Some(n) = common.merge_size {
        settings.merge_size = n;
    }
    settings.cleanup |= common.cleanup;
    settings.verbose |= common.verbose;
}

pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.common.verbose);
    let mut settings = setup_settings(&cli.common);
    debug!(
        "{} CONFIG: mode={} runs_dir={} scripts_dir={} db={} storage={}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        settings.mode,
        settings.runs_dir.display(),
        settings.scripts_dir.display(),
        settings.mongo_db,
        if settings.mongo_uri.is_some() { "set" } else { "unset" }
    );

    match &cli.command {
        Commands::Serve {
            bind,
            workers,
            max_upload_bytes,
        } => {
            if let Some(b) = bind {
                settings.bind = b.clone();
            }
            if let Some(w) = workers {
                settings.workers = *w;
            }
            if let Some(m) = max_upload_bytes {
                settings.max_upload_bytes = *m;
            }
            handle_serve(settings)
        }
        Commands::Ingest {
            video,
            title,
            number,
            course,
        } => handle_ingest(settings, video, title, number, course.as_deref()),
        Commands::Courses => handle_courses(settings),
        Commands::Ask { course, question } => handle_ask(settings, course, question),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunMode;

    #[test]
    fn flags_override_settings() {
        let common = CommonArgs {
            mode: Some(RunMode::Blocking),
            merge_size: Some(9),
            cleanup: true,
            ..Default::default()
        };
        let mut settings = Settings::default();
        apply_common_args(&common, &mut settings);
        assert_eq!(settings.mode, RunMode::Blocking);
        assert_eq!(settings.merge_size, 9);
        assert!(settings.cleanup);
        assert_eq!(settings.mongo_db, "rag_basic");
    }
}
