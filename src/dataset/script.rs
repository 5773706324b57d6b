use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::Dataset;

pub const DEFAULT_GLOBAL_NAME: &str = "LIDEA_DATA";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("no declaration of '{name}' found in database script")]
    MissingDeclaration { name: String },

    #[error("declaration of '{name}' is not followed by an object literal")]
    NotAnObject { name: String },

    #[error("object literal for '{name}' is not terminated")]
    Unterminated { name: String },

    #[error("invalid dataset JSON in database script: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
}

/// Renders the dataset as the `const NAME = {...};` script the dashboard
/// pages include before the binder runs.
pub fn render_database_script(dataset: &Dataset, global_name: &str) -> Result<String, ScriptError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    dataset
        .serialize(&mut ser)
        .map_err(|source| ScriptError::Json { source })?;
    let json = String::from_utf8_lossy(&buf);
    Ok(format!("const {global_name} = {json};\n"))
}

/// Extracts the object literal assigned to `global_name` and parses it.
/// Anything after the literal (storage fallbacks and the like) is ignored.
pub fn parse_database_script(text: &str, global_name: &str) -> Result<Dataset, ScriptError> {
    let pattern = format!(r"\b(?:const|let|var)\s+{}\s*=\s*", regex::escape(global_name));
    let missing = || ScriptError::MissingDeclaration {
        name: global_name.to_string(),
    };
    let re = Regex::new(&pattern).map_err(|_| missing())?;
    let decl = re.find(text).ok_or_else(missing)?;
    let rest = &text[decl.end()..];
    if !rest.starts_with('{') {
        return Err(ScriptError::NotAnObject {
            name: global_name.to_string(),
        });
    }
    let end = object_literal_end(rest).ok_or_else(|| ScriptError::Unterminated {
        name: global_name.to_string(),
    })?;
    serde_json::from_str(&rest[..end]).map_err(|source| ScriptError::Json { source })
}

// Byte offset one past the brace closing the literal that starts at 0.
fn object_literal_end(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
