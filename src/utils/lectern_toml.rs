//! Load `lectern.toml` from a directory and layer it over the built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{RunMode, Settings};
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct LecternToml {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    pipeline: PipelineSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    bind: Option<String>,
    workers: Option<usize>,
    runs_dir: Option<PathBuf>,
    max_upload_bytes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSection {
    scripts_dir: Option<PathBuf>,
    python_bin: Option<String>,
    mongo_db: Option<String>,
    mongo_collection: Option<String>,
    mode: Option<RunMode>,
    merge_size: Option<u32>,
    cleanup: Option<bool>,
    probe_timeout_secs: Option<u64>,
}

/// Load `lectern.toml` from `dir`. `None` when the file is missing; a malformed file is logged
/// and ignored.
pub fn load_lectern_toml(dir: &Path) -> Option<LecternToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_lectern_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_lectern_toml(s: &str) -> Result<LecternToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite a settings field from the file when present.
macro_rules! apply_file_opt {
    ($section:expr, $settings:expr, $field:ident) => {
        if let Some(v) = $section.$field.clone() {
            $settings.$field = v;
        }
    };
}

/// Apply file values over `settings`. Only fields present in the file change.
pub fn apply_file_to_settings(file: &LecternToml, settings: &mut Settings) {
    let server = &file.server;
    apply_file_opt!(server, settings, bind);
    apply_file_opt!(server, settings, workers);
    apply_file_opt!(server, settings, runs_dir);
    apply_file_opt!(server, settings, max_upload_bytes);

    let pipeline = &file.pipeline;
    apply_file_opt!(pipeline, settings, scripts_dir);
    if let Some(bin) = &pipeline.python_bin {
        settings.python_bin = Some(bin.clone());
    }
    apply_file_opt!(pipeline, settings, mongo_db);
    apply_file_opt!(pipeline, settings, mongo_collection);
    apply_file_opt!(pipeline, settings, mode);
    apply_file_opt!(pipeline, settings, merge_size);
    apply_file_opt!(pipeline, settings, cleanup);
    if let Some(secs) = pipeline.probe_timeout_secs {
        settings.probe_timeout = Duration::from_secs(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_present_fields_change() {
        let file = parse_lectern_toml(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [pipeline]
            mode = "blocking"
            cleanup = true
            "#,
        )
        .unwrap();
        let mut settings = Settings::default();
        apply_file_to_settings(&file, &mut settings);
        assert_eq!(settings.bind, "0.0.0.0:8080");
        assert_eq!(settings.mode, RunMode::Blocking);
        assert!(settings.cleanup);
        assert_eq!(settings.workers, Settings::default().workers);
        assert_eq!(settings.mongo_db, "rag_basic");
    }

    #[test]
    fn unknown_mode_is_an_error() {
        assert!(parse_lectern_toml("[pipeline]\nmode = \"later\"\n").is_err());
    }
}
