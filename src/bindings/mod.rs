use serde_json::Value;

use crate::dataset::{Dataset, LineItem, MissingSection};

/// Version marker of [`BindingTable::standard`]. Cached snapshots written
/// under a different marker are considered stale by the `if-stale` policy.
pub const TABLE_VERSION: &str = "v9-binding-table";

/// A value pulled out of the dataset for one element, before formatting.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Money(Option<f64>),
    Count(Option<f64>),
    Text(Option<String>),
    Rows(Vec<LineItem>),
}

impl FieldValue {
    /// The number driving the negative-value style, if the field has one.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Self::Money(v) | Self::Count(v) => *v,
            Self::Text(_) | Self::Rows(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Money,
    Count,
    Text,
    Rows,
}

impl ValueKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "money" | "currency" | "brl" => Some(Self::Money),
            "count" | "number" | "int" => Some(Self::Count),
            "text" | "string" => Some(Self::Text),
            "rows" | "table" | "items" => Some(Self::Rows),
            _ => None,
        }
    }
}

pub type Extractor = fn(&Dataset) -> Result<FieldValue, MissingSection>;

#[derive(Clone)]
pub enum Source {
    /// Typed access through the dataset's section accessors.
    Extract(Extractor),
    /// Dotted path into the snapshot's JSON (`contabil.resumo.receita_bruta`).
    Path { path: String, kind: ValueKind },
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extract(_) => f.write_str("Extract(..)"),
            Self::Path { path, kind } => f
                .debug_struct("Path")
                .field("path", path)
                .field("kind", kind)
                .finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub id: String,
    pub source: Source,
}

impl Binding {
    pub fn extract(id: &str, extractor: Extractor) -> Self {
        Self {
            id: id.to_string(),
            source: Source::Extract(extractor),
        }
    }

    pub fn path(id: &str, path: &str, kind: ValueKind) -> Self {
        Self {
            id: id.to_string(),
            source: Source::Path {
                path: path.to_string(),
                kind,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct BindingTable {
    pub version: String,
    pub bindings: Vec<Binding>,
}

impl BindingTable {
    /// Every element id the dashboard pages have used, mapped to its value.
    pub fn standard() -> Self {
        let bindings = vec![
            Binding::extract("val-receita", |d| {
                Ok(FieldValue::Money(d.summary()?.gross_revenue))
            }),
            Binding::extract("kpi-receita", |d| {
                Ok(FieldValue::Money(d.summary()?.gross_revenue))
            }),
            Binding::extract("val-deducoes", |d| {
                Ok(FieldValue::Money(d.summary()?.deductions))
            }),
            Binding::extract("val-receita-liquida", |d| {
                Ok(FieldValue::Money(d.summary()?.net_revenue_or_derived()))
            }),
            Binding::extract("val-lucro", |d| {
                Ok(FieldValue::Money(d.summary()?.operating_profit))
            }),
            Binding::extract("kpi-lucro", |d| {
                Ok(FieldValue::Money(d.summary()?.operating_profit))
            }),
            Binding::extract("val-lucro-liquido", |d| {
                Ok(FieldValue::Money(d.summary()?.net_profit))
            }),
            Binding::extract("val-impostos", |d| {
                Ok(FieldValue::Money(d.fiscal()?.total_taxes))
            }),
            Binding::extract("kpi-impostos", |d| {
                Ok(FieldValue::Money(d.fiscal()?.total_taxes))
            }),
            Binding::extract("val-regime", |d| {
                Ok(FieldValue::Text(d.fiscal()?.regime.clone()))
            }),
            Binding::extract("val-headcount", |d| {
                Ok(FieldValue::Count(d.personnel()?.headcount))
            }),
            Binding::extract("kpi-headcount", |d| {
                Ok(FieldValue::Count(d.personnel()?.headcount))
            }),
            Binding::extract("val-admissoes", |d| {
                Ok(FieldValue::Count(d.personnel()?.hires))
            }),
            Binding::extract("val-demissoes", |d| {
                Ok(FieldValue::Count(d.personnel()?.terminations))
            }),
            Binding::extract("val-ativo", |d| {
                Ok(FieldValue::Money(d.accounting()?.total_assets))
            }),
            Binding::extract("val-passivo", |d| {
                Ok(FieldValue::Money(d.accounting()?.total_liabilities))
            }),
            // legal is optional: older snapshots never carried it
            Binding::extract("val-legal-status", |d| {
                Ok(FieldValue::Text(d.legal().ok().and_then(|l| l.status.clone())))
            }),
            Binding::extract("val-pendencias", |d| {
                Ok(FieldValue::Count(d.legal().ok().and_then(|l| l.pending_issues)))
            }),
            Binding::extract("tbl-dre", |d| {
                Ok(FieldValue::Rows(d.accounting()?.income_statement.clone()))
            }),
            Binding::extract("tbl-balanco", |d| {
                Ok(FieldValue::Rows(d.accounting()?.balance_sheet.clone()))
            }),
        ];
        Self {
            version: TABLE_VERSION.to_string(),
            bindings,
        }
    }

    /// Appends configured bindings. An extra binding reusing an id replaces
    /// the existing one in place.
    pub fn with_extra(mut self, extra: Vec<Binding>) -> Self {
        for binding in extra {
            match self.bindings.iter_mut().find(|b| b.id == binding.id) {
                Some(existing) => *existing = binding,
                None => self.bindings.push(binding),
            }
        }
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.id.as_str())
    }

    /// Resolves every binding up front. The first missing section aborts the
    /// whole table so nothing is rendered from a partial snapshot.
    pub fn resolve<'a>(
        &'a self,
        dataset: &Dataset,
    ) -> Result<Vec<(&'a Binding, FieldValue)>, MissingSection> {
        let mut json: Option<Value> = None;
        let mut out = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings.iter() {
            let value = match &binding.source {
                Source::Extract(extract) => extract(dataset)?,
                Source::Path { path, kind } => {
                    let root = json.get_or_insert_with(|| dataset.to_json_value());
                    resolve_path(root, path, *kind)?
                }
            };
            out.push((binding, value));
        }
        Ok(out)
    }
}

/// Walks a dotted path. Every intermediate segment must be an object; the
/// leaf may be absent, which yields an empty value.
pub fn resolve_path(root: &Value, path: &str, kind: ValueKind) -> Result<FieldValue, MissingSection> {
    let segments: Vec<&str> = path
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Err(MissingSection::Path(path.to_string()));
    };

    let mut node = root;
    for (depth, segment) in parents.iter().enumerate() {
        node = match node.get(*segment) {
            Some(next) if next.is_object() => next,
            _ => return Err(MissingSection::Path(segments[..=depth].join("."))),
        };
    }
    if !node.is_object() {
        return Err(MissingSection::Path(path.to_string()));
    }

    let leaf_value = node.get(*leaf).filter(|v| !v.is_null());
    Ok(match kind {
        ValueKind::Money => FieldValue::Money(leaf_value.and_then(Value::as_f64)),
        ValueKind::Count => FieldValue::Count(leaf_value.and_then(Value::as_f64)),
        ValueKind::Text => FieldValue::Text(leaf_value.map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ValueKind::Rows => FieldValue::Rows(
            leaf_value
                .cloned()
                .and_then(|v| serde_json::from_value::<Vec<LineItem>>(v).ok())
                .unwrap_or_default(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_resolution_follows_js_property_semantics() {
        let root = json!({"contabil": {"resumo": {"receita_bruta": 10.0}}});
        assert_eq!(
            resolve_path(&root, "contabil.resumo.receita_bruta", ValueKind::Money).unwrap(),
            FieldValue::Money(Some(10.0))
        );
        assert_eq!(
            resolve_path(&root, "contabil.resumo.lucro", ValueKind::Money).unwrap(),
            FieldValue::Money(None)
        );
        assert_eq!(
            resolve_path(&root, "contabil.balanco.total", ValueKind::Money).unwrap_err(),
            MissingSection::Path("contabil.balanco".to_string())
        );
        assert_eq!(
            resolve_path(&root, "fiscal.total", ValueKind::Money).unwrap_err(),
            MissingSection::Path("fiscal".to_string())
        );
    }

    #[test]
    fn extra_bindings_replace_or_append() {
        let table = BindingTable::standard().with_extra(vec![
            Binding::path("val-receita", "contabil.resumo.receita_liquida", ValueKind::Money),
            Binding::path("val-periodo", "meta_info.periodo", ValueKind::Text),
        ]);
        let standard_len = BindingTable::standard().bindings.len();
        assert_eq!(table.bindings.len(), standard_len + 1);
        assert!(matches!(
            table.bindings[0].source,
            Source::Path { .. }
        ));
        assert_eq!(table.ids().last(), Some("val-periodo"));
    }

    #[test]
    fn standard_table_requires_core_sections() {
        let table = BindingTable::standard();
        let err = table.resolve(&Dataset::default()).unwrap_err();
        assert_eq!(err, MissingSection::Accounting);
    }

    #[test]
    fn rows_and_text_from_paths() {
        let root = json!({"x": {"items": [{"label": "A", "value": -1.5}], "n": 3}});
        assert_eq!(
            resolve_path(&root, "x.items", ValueKind::Rows).unwrap(),
            FieldValue::Rows(vec![LineItem::new("A", -1.5)])
        );
        assert_eq!(
            resolve_path(&root, "x.n", ValueKind::Text).unwrap(),
            FieldValue::Text(Some("3".to_string()))
        );
        assert!(ValueKind::parse("table") == Some(ValueKind::Rows));
    }
}
