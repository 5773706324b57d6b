use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::dataset::LineItem;

use super::IngestError;

/// One worksheet, either a workbook tab or a delimited export. The first
/// non-empty record is the header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn read(path: &Path) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::from_delimited(&name, &text))
    }

    /// Every tab of an `.xlsx`/`.xls`/`.ods` workbook, in workbook order,
    /// each named after its tab.
    pub fn read_workbook(path: &Path) -> Result<Vec<Self>, IngestError> {
        let workbook_error = |source: calamine::Error| IngestError::Workbook {
            path: path.display().to_string(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(workbook_error)?;
            let rows = range
                .rows()
                .map(|row| row.iter().map(cell_text).collect())
                .collect();
            sheets.push(Self::from_rows(&name, rows));
        }
        Ok(sheets)
    }

    pub fn from_rows(name: &str, rows: Vec<Vec<String>>) -> Self {
        let mut records = rows
            .into_iter()
            .filter(|row| row.iter().any(|f| !f.trim().is_empty()));
        let headers = records.next().unwrap_or_default();
        Self {
            name: name.to_string(),
            headers,
            rows: records.collect(),
        }
    }

    /// Parses `;`, `,` or tab separated text, whichever dominates the first
    /// line. Quoted fields may contain delimiters, doubled quotes and newlines.
    pub fn from_delimited(name: &str, text: &str) -> Self {
        let text = text.trim_start_matches('\u{feff}');
        let delimiter = detect_delimiter(text.lines().next().unwrap_or_default());
        Self::from_rows(name, parse_records(text, delimiter))
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Locates `term` anywhere in the data rows (case-insensitive, first hit
    /// in row order) and returns the amount on that row. The amount column is
    /// the first header mentioning `year_keyword`, otherwise the third column,
    /// otherwise the second. Returns 0.0 when nothing matches.
    pub fn find_value(&self, term: &str, year_keyword: &str) -> f64 {
        let Some(row) = self.find_row(term) else {
            return 0.0;
        };
        match self.value_column(year_keyword) {
            Some(col) => row.get(col).map(|cell| parse_currency(cell)).unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// Rows with a label in the first column and a non-zero amount.
    pub fn line_items(&self, year_keyword: &str) -> Vec<LineItem> {
        let Some(col) = self.value_column(year_keyword) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| {
                let label = row.first()?.trim();
                let raw = row.get(col)?.trim();
                if label.is_empty() || raw.is_empty() {
                    return None;
                }
                let value = parse_currency(raw);
                (value != 0.0).then(|| LineItem::new(label, value))
            })
            .collect()
    }

    fn find_row(&self, term: &str) -> Option<&Vec<String>> {
        let needle = term.to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.rows
            .iter()
            .find(|row| row.iter().any(|cell| cell.to_lowercase().contains(&needle)))
    }

    fn value_column(&self, year_keyword: &str) -> Option<usize> {
        if !year_keyword.is_empty() {
            if let Some(idx) = self.headers.iter().position(|h| h.contains(year_keyword)) {
                return Some(idx);
            }
        }
        match self.width() {
            w if w > 2 => Some(2),
            w if w > 1 => Some(1),
            _ => None,
        }
    }
}

/// Cleans a spreadsheet amount: `"R$ 1.200,50"` is `1200.5`.
///
/// Only digits, `,` `.` and `-` are kept. With a comma present, dots are
/// thousands separators and the comma is the decimal mark. Without one, a
/// trailing dot followed by one or two digits is a decimal point and any
/// other dot is a thousands separator. Unparsable input is 0.0.
pub fn parse_currency(value: &str) -> f64 {
    let kept: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if kept.is_empty() {
        return 0.0;
    }
    let normalized = if kept.contains(',') {
        kept.replace('.', "").replace(',', ".")
    } else {
        match kept.rfind('.') {
            Some(idx) if (1..=2).contains(&(kept.len() - idx - 1)) => {
                let (int_part, frac_part) = kept.split_at(idx);
                format!("{}{}", int_part.replace('.', ""), frac_part)
            }
            _ => kept.replace('.', ""),
        }
    };
    normalized.parse::<f64>().unwrap_or(0.0)
}

/// Numeric cells are written with a decimal comma so `parse_currency`
/// never mistakes the decimal point for a thousands separator.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) => f.to_string().replace('.', ","),
        other => other.to_string(),
    }
}

fn detect_delimiter(first_line: &str) -> char {
    [';', '\t', ',']
        .into_iter()
        .max_by_key(|d| first_line.matches(*d).count())
        .filter(|d| first_line.contains(*d))
        .unwrap_or(';')
}

fn parse_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }
        match ch {
            '"' if field.is_empty() => in_quotes = true,
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if record.iter().any(|f| !f.trim().is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        if record.iter().any(|f| !f.trim().is_empty()) {
            records.push(record);
        }
    }
    records
}
