use log::{debug, info, warn};
use serde::Serialize;

use crate::bindings::{BindingTable, FieldValue};
use crate::dataset::{Dataset, LineItem, MissingSection};
use crate::format::{self, CurrencyFormat};
use crate::page::{IconRenderer, Page};

pub const DEFAULT_NEGATIVE_CLASS: &str = "text-negative";
pub const DEFAULT_NEUTRAL_MARKERS: &[&str] = &["lucro", "receita", "profit", "revenue"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
    Missing(MissingSection),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => f.write_str("no cached dataset"),
            Self::Missing(section) => write!(f, "{section}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldReport {
    pub id: String,
    pub text: String,
    pub written: bool,
    pub negative: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderReport {
    pub table_version: String,
    pub fields: Vec<FieldReport>,
    pub icons_refreshed: bool,
}

impl RenderReport {
    pub fn written(&self) -> usize {
        self.fields.iter().filter(|f| f.written).count()
    }

    pub fn missing_elements(&self) -> impl Iterator<Item = &FieldReport> {
        self.fields.iter().filter(|f| !f.written)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    Rendered(RenderReport),
    Skipped(SkipReason),
}

impl RenderOutcome {
    pub fn report(&self) -> Option<&RenderReport> {
        match self {
            Self::Rendered(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Renderer {
    pub currency: CurrencyFormat,
    pub negative_class: String,
    pub neutral_markers: Vec<String>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            currency: CurrencyFormat::default(),
            negative_class: DEFAULT_NEGATIVE_CLASS.to_string(),
            neutral_markers: DEFAULT_NEUTRAL_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl Renderer {
    /// Binds `dataset` into `page`.
    ///
    /// Nothing is written when there is no dataset or when any binding hits a
    /// missing section. Bindings whose element is absent from the page are
    /// reported as not written and otherwise ignored.
    pub fn render(
        &self,
        dataset: Option<&Dataset>,
        table: &BindingTable,
        page: &mut dyn Page,
        icons: Option<&mut dyn IconRenderer>,
    ) -> RenderOutcome {
        let Some(dataset) = dataset else {
            debug!("no cached dataset, render skipped");
            return RenderOutcome::Skipped(SkipReason::NoData);
        };
        let resolved = match table.resolve(dataset) {
            Ok(resolved) => resolved,
            Err(section) => {
                warn!("render skipped: {section}");
                return RenderOutcome::Skipped(SkipReason::Missing(section));
            }
        };

        let mut fields = Vec::with_capacity(resolved.len());
        for (binding, value) in resolved {
            let id = binding.id.as_str();
            let negative = value.numeric().map(|v| v < 0.0).unwrap_or(false);
            let (text, written) = match &value {
                FieldValue::Rows(items) => {
                    let html = self.rows_html(items);
                    let written = page.set_html(id, &html);
                    (html, written)
                }
                other => {
                    let text = self.format_value(other);
                    let written = page.set_text(id, &text);
                    (text, written)
                }
            };
            if written {
                self.apply_style(page, id, negative);
                debug!("{id} <- {text}");
            } else {
                debug!("{id}: element not on page");
            }
            fields.push(FieldReport {
                id: id.to_string(),
                text,
                written,
                negative,
            });
        }

        let icons_refreshed = match icons {
            Some(icons) => {
                icons.refresh();
                true
            }
            None => false,
        };

        let report = RenderReport {
            table_version: table.version.clone(),
            fields,
            icons_refreshed,
        };
        info!(
            "rendered {} of {} fields (table {})",
            report.written(),
            report.fields.len(),
            report.table_version
        );
        RenderOutcome::Rendered(report)
    }

    pub fn format_value(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Money(v) => self.currency.money(*v),
            FieldValue::Count(v) => format::count(*v),
            FieldValue::Text(v) => format::text(v.as_deref()),
            FieldValue::Rows(items) => self.rows_html(items),
        }
    }

    /// One `<tr>` per line item; negative amounts carry the negative class.
    pub fn rows_html(&self, items: &[LineItem]) -> String {
        let mut out = String::new();
        for item in items {
            let amount = self.currency.money(Some(item.value));
            let cell = if item.value < 0.0 {
                format!(
                    "<td class=\"{}\">{}</td>",
                    format::escape_html(&self.negative_class),
                    format::escape_html(&amount)
                )
            } else {
                format!("<td>{}</td>", format::escape_html(&amount))
            };
            out.push_str(&format!(
                "<tr><td>{}</td>{}</tr>",
                format::escape_html(&item.label),
                cell
            ));
        }
        out
    }

    fn apply_style(&self, page: &mut dyn Page, id: &str, negative: bool) {
        if negative {
            page.add_class(id, &self.negative_class);
        } else if self.is_neutral(id) {
            page.remove_class(id, &self.negative_class);
        }
    }

    fn is_neutral(&self, id: &str) -> bool {
        let id = id.to_lowercase();
        self.neutral_markers
            .iter()
            .any(|marker| !marker.is_empty() && id.contains(&marker.to_lowercase()))
    }
}
