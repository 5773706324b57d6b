mod sheet;

use std::path::{Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;

use crate::dataset::{Accounting, Dataset, Fiscal, Legal, MetaInfo, Personnel, Summary};

pub use sheet::{parse_currency, Sheet};

pub const DEFAULT_YEAR_KEYWORD: &str = "2025";
pub const DEFAULT_PERIOD_TERM: &str = "06-2025";
pub const DEFAULT_PERIOD_LABEL: &str = "Spreadsheet Sync";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to list sheets in {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read sheet {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read workbook {path}: {source}")]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("no spreadsheets found in {path}")]
    NoSheets { path: String },
}

#[derive(Clone, Debug)]
pub struct IngestOptions {
    /// Header text identifying the amount column (usually the fiscal year).
    pub year_keyword: String,
    /// Row label of the monthly tax total in fiscal sheets.
    pub period_term: String,
    pub period_label: String,
    pub default_headcount: Option<f64>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            year_keyword: DEFAULT_YEAR_KEYWORD.to_string(),
            period_term: DEFAULT_PERIOD_TERM.to_string(),
            period_label: DEFAULT_PERIOD_LABEL.to_string(),
            default_headcount: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Extraction {
    pub dataset: Dataset,
    pub log: Vec<String>,
    pub matched_sheets: usize,
}

const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Lists the workbooks and `.csv` exports under `path` (or `path` itself
/// when it is a file), sorted by name, skipping office lock files (`~$...`).
pub fn list_sheet_files(path: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries = std::fs::read_dir(path).map_err(|source| IngestError::ReadDir {
        path: path.display().to_string(),
        source,
    })?;
    let files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_sheet_file(p))
        .sorted()
        .collect();
    if files.is_empty() {
        return Err(IngestError::NoSheets {
            path: path.display().to_string(),
        });
    }
    Ok(files)
}

fn is_sheet_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    !name.starts_with("~$") && (is_workbook(path) || extension(path) == "csv")
}

fn is_workbook(path: &Path) -> bool {
    WORKBOOK_EXTENSIONS.contains(&extension(path).as_str())
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Reads one input file: every tab of a workbook, or a single `.csv` export.
pub fn read_sheet_file(path: &Path) -> Result<Vec<Sheet>, IngestError> {
    if is_workbook(path) {
        Sheet::read_workbook(path)
    } else {
        Sheet::read(path).map(|sheet| vec![sheet])
    }
}

/// Builds a dataset from exported worksheets, stamped with the local time.
pub fn extract_dataset(sheets: &[Sheet], options: &IngestOptions) -> Extraction {
    let now = chrono::Local::now();
    extract_dataset_at(
        sheets,
        options,
        &now.format("%d/%m/%Y %H:%M").to_string(),
        &now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    )
}

/// Sheets are classified by name (and, for the income statement, content);
/// a sheet may feed several sections. Amounts only overwrite the zeroed
/// defaults when found, so later sheets win over earlier ones.
pub fn extract_dataset_at(
    sheets: &[Sheet],
    options: &IngestOptions,
    updated_at: &str,
    timestamp: &str,
) -> Extraction {
    let year = options.year_keyword.as_str();
    let mut summary = Summary {
        gross_revenue: Some(0.0),
        operating_profit: Some(0.0),
        ..Default::default()
    };
    let mut accounting = Accounting {
        total_assets: Some(0.0),
        total_liabilities: Some(0.0),
        ..Default::default()
    };
    let mut fiscal = Fiscal {
        total_taxes: Some(0.0),
        regime: None,
    };
    let mut personnel = Personnel {
        headcount: Some(options.default_headcount.unwrap_or(0.0)),
        ..Default::default()
    };

    let mut log = vec![format!("processing {} sheets", sheets.len())];
    let mut matched = 0usize;

    for sheet in sheets {
        let upper = sheet.name.to_uppercase();
        let has = |markers: &[&str]| markers.iter().any(|m| upper.contains(m));
        let mut hit = false;

        let revenue = sheet.find_value("RECEITA BRUTA OPERACIONAL", year);
        if has(&["DRE", "RESULTADO"]) || revenue > 0.0 {
            let profit = sheet.find_value("LUCRO LIQUIDO OPERACIONAL", year);
            let deductions = first_nonzero(sheet, &["DEDUCOES DA RECEITA", "DEDUÇÕES DA RECEITA"], year);
            if revenue > 0.0 {
                summary.gross_revenue = Some(revenue);
                log.push(format!("income statement found in sheet '{}'", sheet.name));
                hit = true;
            }
            // profit may legitimately be negative
            if profit != 0.0 {
                summary.operating_profit = Some(profit);
            }
            if deductions != 0.0 {
                summary.deductions = Some(-deductions.abs());
            }
            let items: Vec<_> = sheet
                .line_items(year)
                .into_iter()
                .map(|mut item| {
                    if is_deduction(&item.label) {
                        item.value = -item.value.abs();
                    }
                    item
                })
                .collect();
            if !items.is_empty() {
                accounting.income_statement = items;
            }
        }

        if has(&["ATIVO"]) {
            let assets = first_nonzero(sheet, &["A T I V O", "TOTAL DO ATIVO"], year);
            if assets > 0.0 {
                accounting.total_assets = Some(assets);
                accounting.balance_sheet.extend(sheet.line_items(year));
                log.push(format!("assets found in sheet '{}'", sheet.name));
                hit = true;
            }
        }

        if has(&["PASSIVO"]) {
            let liabilities = first_nonzero(sheet, &["P A S S I V O", "TOTAL DO PASSIVO"], year);
            if liabilities > 0.0 {
                accounting.total_liabilities = Some(liabilities);
                accounting.balance_sheet.extend(sheet.line_items(year));
                log.push(format!("liabilities found in sheet '{}'", sheet.name));
                hit = true;
            }
        }

        if has(&["IMPOSTO", "FISCAL", "FATURAMENTO"]) {
            let taxes = first_nonzero(
                sheet,
                &[options.period_term.as_str(), "Total de Impostos"],
                year,
            );
            if taxes > 0.0 {
                fiscal.total_taxes = Some(taxes);
                log.push(format!("taxes found in sheet '{}'", sheet.name));
                hit = true;
            }
        }

        if has(&["RH", "PESSOAL"]) {
            let headcount = first_nonzero(sheet, &["Headcount", "Total Colaboradores"], year);
            if headcount > 0.0 {
                personnel.headcount = Some(headcount.round());
                log.push(format!("headcount found in sheet '{}'", sheet.name));
                hit = true;
            }
        }

        if hit {
            matched += 1;
        } else {
            log.push(format!("sheet '{}' matched no section", sheet.name));
        }
    }

    accounting.summary = Some(summary);
    let dataset = Dataset {
        timestamp: Some(timestamp.to_string()),
        meta_info: Some(MetaInfo {
            period: Some(options.period_label.clone()),
            updated_at: Some(updated_at.to_string()),
        }),
        accounting: Some(accounting),
        fiscal: Some(fiscal),
        personnel: Some(personnel),
        legal: Some(Legal {
            status: Some("Regular".to_string()),
            pending_issues: None,
        }),
    };
    Extraction {
        dataset,
        log,
        matched_sheets: matched,
    }
}

/// Income statement rows such as `(-) DEDUCOES DA RECEITA`.
fn is_deduction(label: &str) -> bool {
    label.trim_start().starts_with("(-)") || label.to_uppercase().contains("DEDU")
}

fn first_nonzero(sheet: &Sheet, terms: &[&str], year: &str) -> f64 {
    terms
        .iter()
        .map(|term| sheet.find_value(term, year))
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}
