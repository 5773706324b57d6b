pub mod script;
pub mod source;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// A top-level (or nested) part of the dataset a binding needed but did not find.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MissingSection {
    #[error("missing section 'contabil'")]
    Accounting,

    #[error("missing section 'contabil.resumo'")]
    Summary,

    #[error("missing section 'fiscal'")]
    Fiscal,

    #[error("missing section 'dp'")]
    Personnel,

    #[error("missing section 'legal'")]
    Legal,

    #[error("missing path '{0}'")]
    Path(String),
}

/// The KPI snapshot cached by the loader and read back by the renderer.
///
/// Field names on the wire are the ones the dashboard pages have always
/// stored, so snapshots written by older tooling keep deserializing.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_info: Option<MetaInfo>,
    #[serde(rename = "contabil", default, skip_serializing_if = "Option::is_none")]
    pub accounting: Option<Accounting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal: Option<Fiscal>,
    #[serde(rename = "dp", default, skip_serializing_if = "Option::is_none")]
    pub personnel: Option<Personnel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal: Option<Legal>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MetaInfo {
    #[serde(rename = "periodo", default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(rename = "atualizacao", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Accounting {
    #[serde(rename = "resumo", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(rename = "ativo", default, skip_serializing_if = "Option::is_none")]
    pub total_assets: Option<f64>,
    #[serde(rename = "passivo", default, skip_serializing_if = "Option::is_none")]
    pub total_liabilities: Option<f64>,
    #[serde(rename = "dre", default, skip_serializing_if = "Vec::is_empty")]
    pub income_statement: Vec<LineItem>,
    #[serde(rename = "balanco", default, skip_serializing_if = "Vec::is_empty")]
    pub balance_sheet: Vec<LineItem>,
}

/// Headline income-statement figures.
///
/// `deductions` is stored signed: a deduction of 3.599.009,10 is `-3599009.10`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Summary {
    #[serde(rename = "receita_bruta", default, skip_serializing_if = "Option::is_none")]
    pub gross_revenue: Option<f64>,
    #[serde(rename = "deducoes", default, skip_serializing_if = "Option::is_none")]
    pub deductions: Option<f64>,
    #[serde(rename = "receita_liquida", default, skip_serializing_if = "Option::is_none")]
    pub net_revenue: Option<f64>,
    #[serde(rename = "lucro_operacional", default, skip_serializing_if = "Option::is_none")]
    pub operating_profit: Option<f64>,
    #[serde(rename = "lucro_liquido", default, skip_serializing_if = "Option::is_none")]
    pub net_profit: Option<f64>,
}

impl Summary {
    /// Net revenue, falling back to `gross + deductions` when no precomputed
    /// value is present. Deductions are already negative, so this adds.
    pub fn net_revenue_or_derived(&self) -> Option<f64> {
        if self.net_revenue.is_some() {
            return self.net_revenue;
        }
        match (self.gross_revenue, self.deductions) {
            (None, None) => None,
            (gross, deductions) => Some(gross.unwrap_or(0.0) + deductions.unwrap_or(0.0)),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Fiscal {
    #[serde(rename = "total_impostos", alias = "impostos", default, skip_serializing_if = "Option::is_none")]
    pub total_taxes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regime: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Personnel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headcount: Option<f64>,
    #[serde(rename = "admissoes", default, skip_serializing_if = "Option::is_none")]
    pub hires: Option<f64>,
    #[serde(rename = "demissoes", default, skip_serializing_if = "Option::is_none")]
    pub terminations: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Legal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "pendencias", default, skip_serializing_if = "Option::is_none")]
    pub pending_issues: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct LineItem {
    pub label: String,
    pub value: f64,
}

impl LineItem {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

impl Dataset {
    pub fn accounting(&self) -> Result<&Accounting, MissingSection> {
        self.accounting.as_ref().ok_or(MissingSection::Accounting)
    }

    pub fn fiscal(&self) -> Result<&Fiscal, MissingSection> {
        self.fiscal.as_ref().ok_or(MissingSection::Fiscal)
    }

    pub fn personnel(&self) -> Result<&Personnel, MissingSection> {
        self.personnel.as_ref().ok_or(MissingSection::Personnel)
    }

    pub fn legal(&self) -> Result<&Legal, MissingSection> {
        self.legal.as_ref().ok_or(MissingSection::Legal)
    }

    pub fn summary(&self) -> Result<&Summary, MissingSection> {
        self.accounting()?.summary()
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Accounting {
    pub fn summary(&self) -> Result<&Summary, MissingSection> {
        self.summary.as_ref().ok_or(MissingSection::Summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_snapshot_with_wire_names() {
        let raw = r#"{
            "contabil": {
                "resumo": {"receita_bruta": 38621924.56, "lucro_operacional": 15637292.45},
                "ativo": 51000000.0,
                "dre": [{"label": "(-) Deduções", "value": -3599009.10}]
            },
            "fiscal": {"total_impostos": 3438234.30, "regime": "Lucro Real"},
            "dp": {"headcount": 142},
            "legal": {"status": "Regular", "pendencias": 1}
        }"#;
        let ds: Dataset = serde_json::from_str(raw).unwrap();
        let summary = ds.summary().unwrap();
        assert_eq!(summary.gross_revenue, Some(38621924.56));
        assert_eq!(ds.accounting().unwrap().income_statement.len(), 1);
        assert_eq!(ds.personnel().unwrap().headcount, Some(142.0));
        assert_eq!(ds.legal().unwrap().status.as_deref(), Some("Regular"));
    }

    #[test]
    fn missing_sections_are_typed() {
        let ds = Dataset::default();
        assert_eq!(ds.accounting().unwrap_err(), MissingSection::Accounting);
        assert_eq!(ds.summary().unwrap_err(), MissingSection::Accounting);

        let ds = Dataset {
            accounting: Some(Accounting::default()),
            ..Default::default()
        };
        assert_eq!(ds.summary().unwrap_err(), MissingSection::Summary);
        assert_eq!(ds.fiscal().unwrap_err(), MissingSection::Fiscal);
    }

    #[test]
    fn derived_net_adds_signed_deductions() {
        let summary = Summary {
            gross_revenue: Some(38621924.56),
            deductions: Some(-3599009.10),
            ..Default::default()
        };
        let net = summary.net_revenue_or_derived().unwrap();
        assert!((net - 35022915.46).abs() < 1e-6);
    }

    #[test]
    fn precomputed_net_wins() {
        let summary = Summary {
            gross_revenue: Some(100.0),
            deductions: Some(-10.0),
            net_revenue: Some(95.0),
            ..Default::default()
        };
        assert_eq!(summary.net_revenue_or_derived(), Some(95.0));
        assert_eq!(Summary::default().net_revenue_or_derived(), None);
    }

    #[test]
    fn legacy_tax_key_is_accepted() {
        let ds: Dataset = serde_json::from_str(r#"{"fiscal": {"impostos": 10.5}}"#).unwrap();
        assert_eq!(ds.fiscal().unwrap().total_taxes, Some(10.5));
    }
}
