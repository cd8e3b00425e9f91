use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::session::SessionData;

lazy_static! {
    /// Names written by [`save_model_config`]: `MODEL_yyyymmddHHMMSS.json`
    static ref MODEL_FILE_RE: Regex = Regex::new(r"^MODEL_\d{14}\.json$").unwrap();
}

/// A saved fitting/function configuration
///
/// `fitting_config` and `functions` are kept as opaque JSON; this crate only
/// stores them and hands them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub timestamp: String,
    pub feature_csv_path: String,
    pub target_csv_path: String,
    #[serde(default)]
    pub fitting_method: Option<String>,
    #[serde(default)]
    pub fitting_config: JsonValue,
    #[serde(default)]
    pub functions: JsonValue,
}

/// Body of a save request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    #[serde(rename = "fittingConfig", default)]
    pub fitting_config: Option<JsonValue>,
    #[serde(rename = "fittingMethod", default)]
    pub fitting_method: Option<String>,
    #[serde(default)]
    pub functions: Option<JsonValue>,
}

/// What a successful load returns to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedConfig {
    pub fitting_config: JsonValue,
    pub fitting_method: Option<String>,
    pub functions: JsonValue,
}

/// An empty payload: null, false, 0, "", [] or {}
fn is_empty_payload(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
    }
}

/// Resolve `.` and `..` without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Absolute, normalized form of a path
fn canonical_form(path: &str) -> Result<PathBuf> {
    Ok(normalize_path(&std::path::absolute(path)?))
}

/// The file name a save at `now` writes to
pub fn model_file_name(now: &DateTime<Local>) -> String {
    format!("MODEL_{}.json", now.format("%Y%m%d%H%M%S"))
}

/// Write the configuration next to the others in `dir`
///
/// The currently loaded CSV paths are stored in absolute form so a later
/// load can check it is being applied to the same data.
///
/// # Returns
/// * The file name and full path of the written file
///
/// # Errors
/// * `MalformedConfig` if `fittingConfig` or `functions` is missing or empty
/// * `MissingFile` if either CSV has not been uploaded
/// * `Io` if the file cannot be written
pub fn save_model_config(
    dir: &Path,
    session: &SessionData,
    request: SaveRequest,
    now: DateTime<Local>,
) -> Result<(String, PathBuf)> {
    let (fitting_config, functions) = match (request.fitting_config, request.functions) {
        (Some(c), Some(f)) if !is_empty_payload(&c) && !is_empty_payload(&f) => (c, f),
        _ => {
            return Err(PipelineError::MalformedConfig(
                "No model configuration data received.".to_string(),
            ));
        }
    };

    let (feature, target) = session.dataset_paths().ok_or_else(|| {
        PipelineError::MissingFile(
            "Feature or Target CSV files not loaded. Cannot save configuration.".to_string(),
        )
    })?;

    let config = ModelConfig {
        timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        feature_csv_path: canonical_form(feature)?.to_string_lossy().to_string(),
        target_csv_path: canonical_form(target)?.to_string_lossy().to_string(),
        fitting_method: request.fitting_method,
        fitting_config,
        functions,
    };

    fs::create_dir_all(dir)?;
    let filename = model_file_name(&now);
    let path = dir.join(&filename);
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| PipelineError::MalformedConfig(e.to_string()))?;
    fs::write(&path, json)?;

    info!("saved model configuration {}", path.display());
    Ok((filename, path))
}

/// Read a saved configuration and check it matches the loaded CSV files
///
/// # Errors
/// * `MalformedConfig` if the name is empty or not a plain file name, or the
///   file is not valid configuration JSON
/// * `ConfigNotFound` if no such file exists
/// * `MissingFile` if either CSV has not been uploaded
/// * `ConfigMismatch` if the stored CSV paths differ from the loaded ones
pub fn load_model_config(dir: &Path, session: &SessionData, filename: &str) -> Result<LoadedConfig> {
    if filename.is_empty() {
        return Err(PipelineError::MalformedConfig(
            "No JSON file name provided.".to_string(),
        ));
    }
    let plain = Path::new(filename)
        .file_name()
        .is_some_and(|name| name == filename);
    if !plain {
        return Err(PipelineError::MalformedConfig(format!(
            "Invalid JSON file name: {filename}"
        )));
    }

    let path = dir.join(filename);
    if !path.is_file() {
        return Err(PipelineError::ConfigNotFound(path.display().to_string()));
    }

    let (feature, target) = session.dataset_paths().ok_or_else(|| {
        PipelineError::MissingFile(
            "Feature or Target CSV files are not currently loaded. Please load them first."
                .to_string(),
        )
    })?;

    let text = fs::read_to_string(&path)?;
    let config: ModelConfig = serde_json::from_str(&text).map_err(|e| {
        PipelineError::MalformedConfig(format!("Invalid JSON format in the selected file: {e}"))
    })?;

    let same_feature = canonical_form(&config.feature_csv_path)? == canonical_form(feature)?;
    let same_target = canonical_form(&config.target_csv_path)? == canonical_form(target)?;
    if !(same_feature && same_target) {
        warn!(
            "path mismatch during model load: stored feature {}, current feature {}; stored target {}, current target {}",
            config.feature_csv_path, feature, config.target_csv_path, target
        );
        return Err(PipelineError::ConfigMismatch);
    }

    info!("loaded model configuration {}", path.display());
    Ok(LoadedConfig {
        fitting_config: config.fitting_config,
        fitting_method: config.fitting_method,
        functions: config.functions,
    })
}

/// Saved configuration file names in `dir`, newest first
pub fn list_model_configs(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| MODEL_FILE_RE.is_match(name))
        .collect();

    // The timestamp in the name sorts chronologically
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 6, 7, 8, secs).unwrap()
    }

    fn session(feature: &Path, target: &Path) -> SessionData {
        let mut data = SessionData::default();
        data.feature_filepath = Some(feature.to_string_lossy().to_string());
        data.target_filepath = Some(target.to_string_lossy().to_string());
        data
    }

    fn request() -> SaveRequest {
        SaveRequest {
            fitting_config: Some(json!({ "A": { "T": "linear" } })),
            fitting_method: Some("product".to_string()),
            functions: Some(json!([{ "name": "f1", "expr": "a*x+b" }])),
        }
    }

    #[test]
    fn save_then_load_round_trips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let data = session(&dir.path().join("f.csv"), &dir.path().join("t.csv"));

        let (name, path) = save_model_config(dir.path(), &data, request(), at(9)).unwrap();
        assert_eq!(name, "MODEL_20240506070809.json");
        assert!(path.is_file());

        let loaded = load_model_config(dir.path(), &data, &name).unwrap();
        assert_eq!(loaded.fitting_config, json!({ "A": { "T": "linear" } }));
        assert_eq!(loaded.functions, json!([{ "name": "f1", "expr": "a*x+b" }]));
        assert_eq!(loaded.fitting_method.as_deref(), Some("product"));
    }

    #[test]
    fn load_with_other_csvs_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let saved_with = session(&dir.path().join("f.csv"), &dir.path().join("t.csv"));
        let (name, _) = save_model_config(dir.path(), &saved_with, request(), at(1)).unwrap();

        let now_loaded = session(&dir.path().join("f2.csv"), &dir.path().join("t.csv"));
        assert!(matches!(
            load_model_config(dir.path(), &now_loaded, &name),
            Err(PipelineError::ConfigMismatch)
        ));
    }

    #[test]
    fn equivalent_paths_match_after_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let saved_with = session(&dir.path().join("f.csv"), &dir.path().join("t.csv"));
        let (name, _) = save_model_config(dir.path(), &saved_with, request(), at(2)).unwrap();

        let roundabout = session(
            &dir.path().join("sub").join("..").join("f.csv"),
            &dir.path().join(".").join("t.csv"),
        );
        assert!(load_model_config(dir.path(), &roundabout, &name).is_ok());
    }

    #[test]
    fn save_requires_payload_and_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let data = session(&dir.path().join("f.csv"), &dir.path().join("t.csv"));

        let mut empty = request();
        empty.functions = Some(json!([]));
        assert!(matches!(
            save_model_config(dir.path(), &data, empty, at(3)),
            Err(PipelineError::MalformedConfig(_))
        ));

        assert!(matches!(
            save_model_config(dir.path(), &SessionData::default(), request(), at(3)),
            Err(PipelineError::MissingFile(_))
        ));
    }

    #[test]
    fn load_rejects_bad_names_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = session(&dir.path().join("f.csv"), &dir.path().join("t.csv"));

        assert!(matches!(
            load_model_config(dir.path(), &data, ""),
            Err(PipelineError::MalformedConfig(_))
        ));
        assert!(matches!(
            load_model_config(dir.path(), &data, "../MODEL_1.json"),
            Err(PipelineError::MalformedConfig(_))
        ));
        assert!(matches!(
            load_model_config(dir.path(), &data, "MODEL_00000000000000.json"),
            Err(PipelineError::ConfigNotFound(_))
        ));

        fs::write(dir.path().join("MODEL_20000101000000.json"), "{not json").unwrap();
        assert!(matches!(
            load_model_config(dir.path(), &data, "MODEL_20000101000000.json"),
            Err(PipelineError::MalformedConfig(_))
        ));
    }

    #[test]
    fn listing_is_newest_first_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = session(&dir.path().join("f.csv"), &dir.path().join("t.csv"));
        save_model_config(dir.path(), &data, request(), at(1)).unwrap();
        save_model_config(dir.path(), &data, request(), at(5)).unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let names = list_model_configs(dir.path()).unwrap();
        assert_eq!(
            names,
            vec!["MODEL_20240506070805.json", "MODEL_20240506070801.json"]
        );
        assert!(list_model_configs(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("../a/..")), PathBuf::from(".."));
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
    }
}
