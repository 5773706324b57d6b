use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::bindings::{Binding, ValueKind};

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct BindingEntry {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub store: Option<String>,
    #[serde(alias = "storage_key")]
    pub data_key: Option<String>,
    pub version_key: Option<String>,
    pub version: Option<String>,
    #[serde(alias = "refresh")]
    pub refresh_policy: Option<String>,
    pub decimals: Option<u8>,
    pub negative_class: Option<String>,
    pub neutral_markers: Option<Vec<String>>,
    pub bindings: Option<Vec<BindingEntry>>,
    pub global_name: Option<String>,
    pub year_keyword: Option<String>,
    pub period_term: Option<String>,
    pub period_label: Option<String>,
    pub default_headcount: Option<f64>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
}

impl ConfigFile {
    /// Converts the `bindings:` entries, rejecting unknown kinds.
    pub fn extra_bindings(&self) -> Result<Vec<Binding>, String> {
        self.bindings
            .iter()
            .flatten()
            .map(|entry| {
                let kind = match entry.kind.as_deref() {
                    None => ValueKind::Money,
                    Some(raw) => ValueKind::parse(raw).ok_or_else(|| {
                        format!(
                            "invalid kind '{raw}' for binding '{}', expected money, count, text or rows",
                            entry.id
                        )
                    })?,
                };
                Ok(Binding::path(&entry.id, &entry.path, kind))
            })
            .collect()
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_dir() -> Option<PathBuf> {
    Some(home_dir()?.join(".kpibind"))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(default_config_dir()?.join("config.yml"))
}

pub fn default_store_path() -> Option<PathBuf> {
    Some(default_config_dir()?.join("storage.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn default_config_yaml() -> String {
    r#"# kpibind config
#
# Location (default):
#   ~/.kpibind/config.yml

# Storage file standing in for the browser's local storage
# store: ~/.kpibind/storage.json

# Cache keys
data_key: lidea_db_v1
version_key: lidea_version
# version: v9-binding-table

# When the source dataset overwrites the cache: always, if-absent, if-stale
refresh_policy: always

# Formatting
decimals: 0
negative_class: text-negative
neutral_markers:
  - lucro
  - receita
  - profit
  - revenue

# Extra fields bound by dotted path (kind: money, count, text, rows)
bindings: []
#  - id: val-ebitda
#    path: contabil.resumo.ebitda
#    kind: money

# Database script
global_name: LIDEA_DATA

# Spreadsheet ingest
year_keyword: "2025"
period_term: "06-2025"
# period_label: Spreadsheet Sync
# default_headcount: 0

# Output
output_format: text
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_yaml_parses() {
        let cfg: ConfigFile = serde_yaml::from_str(&default_config_yaml()).unwrap();
        assert_eq!(cfg.data_key.as_deref(), Some("lidea_db_v1"));
        assert_eq!(cfg.refresh_policy.as_deref(), Some("always"));
        assert_eq!(cfg.decimals, Some(0));
        assert_eq!(cfg.neutral_markers.unwrap().len(), 4);
        assert!(cfg.bindings.unwrap().is_empty());
    }

    #[test]
    fn missing_config_allowed_or_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yml");
        assert!(load_config(&path, true).is_ok());
        let err = load_config(&path, false).unwrap_err();
        assert!(err.contains("config file not found"));
    }

    #[test]
    fn writes_default_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");
        assert!(ensure_default_config_file(&path).unwrap());
        assert!(!ensure_default_config_file(&path).unwrap());
        assert!(load_config(&path, false).is_ok());
    }

    #[test]
    fn converts_binding_entries() {
        let cfg: ConfigFile = serde_yaml::from_str(
            "bindings:\n  - id: val-ebitda\n    path: contabil.resumo.ebitda\n  - id: val-obs\n    path: legal.obs\n    kind: text\n",
        )
        .unwrap();
        let bindings = cfg.extra_bindings().unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].id, "val-obs");

        let bad: ConfigFile =
            serde_yaml::from_str("bindings:\n  - id: x\n    path: a.b\n    kind: pie\n").unwrap();
        assert!(bad.extra_bindings().unwrap_err().contains("invalid kind 'pie'"));
    }
}
