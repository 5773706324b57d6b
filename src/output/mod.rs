use serde::Serialize;
use serde_json::Value;

use crate::loader::CacheWrite;
use crate::render::{FieldReport, RenderOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One bound page, as printed after `render` or `run`.
#[derive(Clone, Debug, Serialize)]
pub struct PageRecord {
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_version: Option<String>,
    pub written: usize,
    pub fields: Vec<FieldReport>,
}

pub fn build_page_record(page: &str, cache: Option<CacheWrite>, outcome: &RenderOutcome) -> PageRecord {
    let cache = cache.map(|c| c.label().to_string());
    match outcome {
        RenderOutcome::Rendered(report) => PageRecord {
            page: page.to_string(),
            cache,
            status: "rendered".to_string(),
            reason: None,
            table_version: Some(report.table_version.clone()),
            written: report.written(),
            fields: report.fields.clone(),
        },
        RenderOutcome::Skipped(reason) => PageRecord {
            page: page.to_string(),
            cache,
            status: "skipped".to_string(),
            reason: Some(reason.to_string()),
            table_version: None,
            written: 0,
            fields: Vec::new(),
        },
    }
}

fn kv_line(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!(":: {:<10}: {}\n", label, value));
}

fn field_text(field: &FieldReport) -> String {
    if field.text.starts_with("<tr>") {
        return format!("<{} rows>", field.text.matches("<tr>").count());
    }
    field.text.clone()
}

pub fn render_page_text(record: &PageRecord) -> Vec<u8> {
    let mut out = String::new();
    kv_line(&mut out, "page", &record.page);
    if let Some(cache) = record.cache.as_deref() {
        kv_line(&mut out, "cache", cache);
    }
    match record.reason.as_deref() {
        Some(reason) => kv_line(&mut out, "status", &format!("{} ({reason})", record.status)),
        None => kv_line(
            &mut out,
            "status",
            &format!("{} ({}/{} fields)", record.status, record.written, record.fields.len()),
        ),
    }
    if let Some(version) = record.table_version.as_deref() {
        kv_line(&mut out, "table", version);
    }
    let width = record.fields.iter().map(|f| f.id.len()).max().unwrap_or(0);
    if !record.fields.is_empty() {
        out.push('\n');
    }
    for field in record.fields.iter() {
        let mut line = format!("{:<width$}  {}", field.id, field_text(field));
        if !field.written {
            line.push_str("  (no element)");
        } else if field.negative {
            line.push_str("  [negative]");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_page(format: OutputFormat, record: &PageRecord) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_page_text(record),
        OutputFormat::Json => render_json(record),
    }
}

/// Label/value pairs for commands that report a handful of facts
/// (`load`, `ingest`, `patch`, `show`).
pub fn render_summary(format: OutputFormat, pairs: &[(&str, Value)]) -> Vec<u8> {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for (label, value) in pairs {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => "-".to_string(),
                    Value::Array(items) => items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => other.to_string(),
                };
                kv_line(&mut out, label, &text);
            }
            out.into_bytes()
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, Value> = pairs
                .iter()
                .map(|(label, value)| (label.to_string(), value.clone()))
                .collect();
            render_json(&Value::Object(map))
        }
    }
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"{}".to_vec());
    out.push(b'\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderReport, SkipReason};
    use serde_json::json;

    fn rendered() -> RenderOutcome {
        RenderOutcome::Rendered(RenderReport {
            table_version: "v9".to_string(),
            fields: vec![
                FieldReport {
                    id: "val-receita".to_string(),
                    text: "R$ 38.621.925".to_string(),
                    written: true,
                    negative: false,
                },
                FieldReport {
                    id: "val-deducoes".to_string(),
                    text: "-R$ 3.599.009".to_string(),
                    written: true,
                    negative: true,
                },
                FieldReport {
                    id: "tbl-dre".to_string(),
                    text: "<tr><td>a</td></tr><tr><td>b</td></tr>".to_string(),
                    written: false,
                    negative: false,
                },
            ],
            icons_refreshed: false,
        })
    }

    #[test]
    fn parses_formats() {
        assert_eq!(OutputFormat::parse(" JSON "), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn text_lists_fields() {
        let record = build_page_record("index.html", Some(CacheWrite::Written), &rendered());
        let text = String::from_utf8(render_page_text(&record)).unwrap();
        assert!(text.contains(":: cache     : written"));
        assert!(text.contains("rendered (2/3 fields)"));
        assert!(text.contains("val-receita   R$ 38.621.925\n"));
        assert!(text.contains("-R$ 3.599.009  [negative]"));
        assert!(text.contains("<2 rows>  (no element)"));
    }

    #[test]
    fn skipped_record_has_reason() {
        let outcome = RenderOutcome::Skipped(SkipReason::NoData);
        let record = build_page_record("index.html", None, &outcome);
        let json: Value = serde_json::from_slice(&render_page(OutputFormat::Json, &record)).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "no cached dataset");
        assert!(json.get("cache").is_none());
    }

    #[test]
    fn summary_in_both_formats() {
        let pairs = [("store", json!("s.json")), ("patched", json!(["a.html", "b.html"]))];
        let text = String::from_utf8(render_summary(OutputFormat::Text, &pairs)).unwrap();
        assert_eq!(text, ":: store     : s.json\n:: patched   : a.html, b.html\n");
        let json: Value = serde_json::from_slice(&render_summary(OutputFormat::Json, &pairs)).unwrap();
        assert_eq!(json["patched"][1], "b.html");
    }
}
