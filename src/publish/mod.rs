use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::dataset::script::{render_database_script, ScriptError};
use crate::dataset::Dataset;

pub const DEFAULT_SCRIPT_NAME: &str = "lidea_db.js";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to list {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Script(#[from] ScriptError),
}

#[derive(Clone, Debug, Default)]
pub struct PatchSummary {
    pub scanned: usize,
    pub patched: Vec<PathBuf>,
}

/// Writes the dataset as a database script (or plain JSON when the target
/// ends in `.json`).
pub fn write_dataset(path: &Path, dataset: &Dataset, global_name: &str) -> Result<(), PublishError> {
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let contents = if is_json {
        serde_json::to_string_pretty(dataset)
            .map_err(|source| ScriptError::Json { source })?
    } else {
        render_database_script(dataset, global_name)?
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| PublishError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
    }
    std::fs::write(path, contents).map_err(|source| PublishError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Drops inline `<script>` blocks that read page storage directly. Those
/// blocks predate the binder and would race it on load.
pub fn strip_legacy_cache_scripts(html: &str) -> String {
    let Ok(re) = Regex::new(r"(?is)<script>(.*?)</script>") else {
        return html.to_string();
    };
    re.replace_all(html, |caps: &regex::Captures| {
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if body.contains("localStorage.getItem") {
            String::new()
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}

/// Adds `<script src>` tags before `</body>` unless the page already
/// references the first script.
pub fn inject_scripts(html: &str, prefix: &str, scripts: &[String]) -> Option<String> {
    let first = scripts.first()?;
    if html.contains(first.as_str()) {
        return None;
    }
    let at = html.rfind("</body>")?;
    let tags: String = scripts
        .iter()
        .map(|s| format!("<script src=\"{prefix}{s}\"></script>"))
        .collect();
    let mut out = String::with_capacity(html.len() + tags.len());
    out.push_str(&html[..at]);
    out.push_str(&tags);
    out.push_str(&html[at..]);
    Some(out)
}

/// Returns the patched page, or `None` when nothing changed.
pub fn patch_page(html: &str, prefix: &str, scripts: &[String]) -> Option<String> {
    let stripped = strip_legacy_cache_scripts(html);
    match inject_scripts(&stripped, prefix, scripts) {
        Some(out) => Some(out),
        None if stripped != html => Some(stripped),
        None => None,
    }
}

/// Patches every `.html` file below `root`. Script paths are made relative
/// to each page's directory depth.
pub fn patch_pages(root: &Path, scripts: &[String]) -> Result<PatchSummary, PublishError> {
    let mut summary = PatchSummary::default();
    let mut pages = Vec::new();
    collect_pages(root, 0, &mut pages)?;
    for (path, depth) in pages {
        summary.scanned += 1;
        let html = std::fs::read_to_string(&path).map_err(|source| PublishError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let prefix = if depth == 0 {
            "./".to_string()
        } else {
            "../".repeat(depth)
        };
        if let Some(patched) = patch_page(&html, &prefix, scripts) {
            std::fs::write(&path, patched).map_err(|source| PublishError::Write {
                path: path.display().to_string(),
                source,
            })?;
            debug!("patched {}", path.display());
            summary.patched.push(path);
        }
    }
    Ok(summary)
}

fn collect_pages(dir: &Path, depth: usize, out: &mut Vec<(PathBuf, usize)>) -> Result<(), PublishError> {
    let entries = std::fs::read_dir(dir).map_err(|source| PublishError::ReadDir {
        path: dir.display().to_string(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    for path in paths {
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_pages(&path, depth + 1, out)?;
        } else if path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false)
        {
            out.push((path, depth));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts() -> Vec<String> {
        vec![DEFAULT_SCRIPT_NAME.to_string()]
    }

    #[test]
    fn strips_only_storage_reading_blocks() {
        let html = "<script>var a = 1;</script><script>\nconst db = JSON.parse(localStorage.getItem('k'));\n</script><script src=\"x.js\"></script>";
        assert_eq!(
            strip_legacy_cache_scripts(html),
            "<script>var a = 1;</script><script src=\"x.js\"></script>"
        );
    }

    #[test]
    fn injects_once_before_body_close() {
        let html = "<html><body><p id=\"val-lucro\"></p></body></html>";
        let patched = patch_page(html, "../", &scripts()).unwrap();
        assert_eq!(
            patched,
            "<html><body><p id=\"val-lucro\"></p><script src=\"../lidea_db.js\"></script></body></html>"
        );
        assert!(patch_page(&patched, "../", &scripts()).is_none());
    }

    #[test]
    fn patches_tree_with_relative_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Modulos")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<body></body>").unwrap();
        std::fs::write(dir.path().join("Modulos").join("dre.html"), "<body></body>").unwrap();
        std::fs::write(dir.path().join("notes.md"), "<body></body>").unwrap();

        let summary = patch_pages(dir.path(), &scripts()).unwrap();
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.patched.len(), 2);
        let nested = std::fs::read_to_string(dir.path().join("Modulos").join("dre.html")).unwrap();
        assert!(nested.contains("src=\"../lidea_db.js\""));
        let top = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(top.contains("src=\"./lidea_db.js\""));

        assert!(patch_pages(dir.path(), &scripts()).unwrap().patched.is_empty());
    }

    #[test]
    fn writes_script_or_json() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Dataset::default();
        write_dataset(&dir.path().join("db.js"), &ds, "LIDEA_DATA").unwrap();
        write_dataset(&dir.path().join("db.json"), &ds, "LIDEA_DATA").unwrap();
        let js = std::fs::read_to_string(dir.path().join("db.js")).unwrap();
        assert!(js.starts_with("const LIDEA_DATA = {"));
        let json = std::fs::read_to_string(dir.path().join("db.json")).unwrap();
        assert_eq!(json.trim(), "{}");
    }
}
