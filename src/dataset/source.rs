use std::path::Path;

use thiserror::Error;

use super::script::{self, ScriptError};
use super::Dataset;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read dataset source: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dataset JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid database script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: ScriptError,
    },
}

/// Reads a source dataset from either a plain JSON snapshot or a database
/// script declaring `global_name`.
pub fn load_source(path: &Path, global_name: &str) -> Result<Dataset, SourceError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: display.clone(),
        source,
    })?;
    parse_source(&text, global_name).map_err(|e| match e {
        ParseFailure::Json(source) => SourceError::Json {
            path: display,
            source,
        },
        ParseFailure::Script(source) => SourceError::Script {
            path: display,
            source,
        },
    })
}

enum ParseFailure {
    Json(serde_json::Error),
    Script(ScriptError),
}

fn parse_source(text: &str, global_name: &str) -> Result<Dataset, ParseFailure> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(ParseFailure::Json);
    }
    script::parse_database_script(text, global_name).map_err(ParseFailure::Script)
}
