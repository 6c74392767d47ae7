//! Reading list text and extracted tables (CSV or spreadsheet).

use crate::error::{AnalyzerError, Result};
use crate::models::{MasterEntry, OptionEntry};
use calamine::{open_workbook_auto, Reader};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ORDER: &[&str] = &["optno", "optn. no", "order", "option no"];
const COLLEGE_CODE: &[&str] = &["coll", "college code"];
const COLLEGE_NAME: &[&str] = &["college name"];
const PLACE: &[&str] = &["place"];
const DISTRICT: &[&str] = &["dist", "district"];
const COURSE_CODE: &[&str] = &["crs", "course code"];
const FEE_TYPE: &[&str] = &["fee", "fee type", "course fee per annum (rs)"];
const COURSE_NAME: &[&str] = &["course name"];
const COURSE_TYPE: &[&str] = &["course type"];
const SEAT_TYPE: &[&str] = &["type"];

/// Read the text of an allotment list.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| AnalyzerError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// One row of a distribution table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCount {
    pub values: Vec<String>,
    pub count: usize,
    /// Share of the counted rows, rounded to two decimal places.
    pub percentage: Decimal,
}

/// `count / total * 100`, two decimal places.
fn percentage(count: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(count as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64))
        .round_dp(2)
        .normalize()
}

/// A header row plus string cells, as produced by table extraction.
#[derive(Debug, Clone)]
pub struct Table {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped because their width did not match the header.
    pub dropped_rows: usize,
}

impl Table {
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Self::from_csv(path),
            Some("xlsx" | "xlsm" | "xls" | "ods") => Self::from_workbook(path, sheet),
            _ => Err(AnalyzerError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let content = read_text(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| AnalyzerError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }
        Self::from_rows(path.to_path_buf(), rows)
    }

    pub fn from_workbook(path: &Path, sheet: Option<&str>) -> Result<Self> {
        let workbook_error = |message: String| AnalyzerError::Workbook {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;
        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| AnalyzerError::EmptyTable {
                    path: path.to_path_buf(),
                })?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| workbook_error(format!("sheet '{}': {}", sheet_name, e)))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect())
            .collect();

        debug!(sheet = %sheet_name, "read workbook sheet");
        Self::from_rows(path.to_path_buf(), rows)
    }

    /// First non-empty row is the header. Repeated header rows and rows of
    /// the wrong width are dropped.
    pub fn from_rows(source: PathBuf, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()));
        let headers = rows
            .next()
            .ok_or_else(|| AnalyzerError::EmptyTable {
                path: source.clone(),
            })?;

        let mut kept = Vec::new();
        let mut dropped_rows = 0;
        for row in rows {
            if row == headers {
                continue;
            }
            if row.len() != headers.len() {
                dropped_rows += 1;
                continue;
            }
            kept.push(row);
        }

        if dropped_rows > 0 {
            warn!(
                source = %source.display(),
                dropped = dropped_rows,
                "dropped rows that do not match the header width"
            );
        }

        Ok(Self {
            source,
            headers,
            rows: kept,
            dropped_rows,
        })
    }

    /// Index of the first header matching one of `aliases`, ignoring case.
    pub fn column_index(&self, aliases: &[&str]) -> Option<usize> {
        self.headers.iter().position(|header| {
            let header = header.trim().to_lowercase();
            aliases.iter().any(|alias| header == *alias)
        })
    }

    fn require_column(&self, aliases: &[&str]) -> Result<usize> {
        self.column_index(aliases)
            .ok_or_else(|| AnalyzerError::MissingColumn {
                column: aliases[0].to_uppercase(),
                path: self.source.clone(),
            })
    }

    /// Distribution of the values of one column, or of the value
    /// combinations of several, most frequent first. Rows where every
    /// selected cell is empty are not counted.
    pub fn value_counts(&self, columns: &[&str]) -> Result<Vec<ValueCount>> {
        let indices = columns
            .iter()
            .map(|column| {
                let wanted = column.trim().to_lowercase();
                self.require_column(&[wanted.as_str()])
            })
            .collect::<Result<Vec<_>>>()?;

        let mut counts: HashMap<Vec<&str>, usize> = HashMap::new();
        for row in &self.rows {
            let values: Vec<&str> = indices.iter().map(|&i| row[i].as_str()).collect();
            if values.iter().any(|value| !value.is_empty()) {
                *counts.entry(values).or_insert(0) += 1;
            }
        }

        let total: usize = counts.values().sum();
        let mut counts: Vec<ValueCount> = counts
            .into_iter()
            .map(|(values, count)| ValueCount {
                values: values.into_iter().map(str::to_string).collect(),
                count,
                percentage: percentage(count, total),
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.values.cmp(&b.values)));
        Ok(counts)
    }

    pub fn option_entries(&self) -> Result<Vec<OptionEntry>> {
        let college_code = self.require_column(COLLEGE_CODE)?;
        let course_code = self.require_column(COURSE_CODE)?;
        let order = self.column_index(ORDER);
        let college_name = self.column_index(COLLEGE_NAME);
        let place = self.column_index(PLACE);
        let district = self.column_index(DISTRICT);
        let fee_type = self.column_index(FEE_TYPE);

        let cell = |row: &[String], index: Option<usize>| {
            index.map(|i| row[i].clone()).unwrap_or_default()
        };

        Ok(self
            .rows
            .iter()
            .map(|row| OptionEntry {
                order: order.and_then(|i| parse_order(&row[i])),
                college_code: row[college_code].clone(),
                college_name: cell(row, college_name),
                place: cell(row, place),
                district: cell(row, district),
                course_code: row[course_code].clone(),
                fee_type: cell(row, fee_type),
            })
            .collect())
    }

    pub fn master_entries(&self) -> Result<Vec<MasterEntry>> {
        let college_code = self.require_column(COLLEGE_CODE)?;
        let course_code = self.require_column(COURSE_CODE)?;
        let course_name = self.column_index(COURSE_NAME);
        let course_type = self.column_index(COURSE_TYPE);
        let seat_type = self.column_index(SEAT_TYPE);
        let named = [
            Some(college_code),
            Some(course_code),
            course_name,
            course_type,
            seat_type,
        ];

        let optional = |row: &[String], index: Option<usize>| {
            index
                .map(|i| row[i].clone())
                .filter(|value| !value.is_empty())
        };

        Ok(self
            .rows
            .iter()
            .map(|row| MasterEntry {
                college_code: row[college_code].clone(),
                course_code: row[course_code].clone(),
                course_name: optional(row, course_name),
                course_type: optional(row, course_type),
                seat_type: optional(row, seat_type),
                extra: self
                    .headers
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !named.contains(&Some(*i)))
                    .map(|(i, header)| (header.clone(), row[i].clone()))
                    .collect::<BTreeMap<_, _>>(),
            })
            .collect())
    }
}

/// Option numbers may arrive as `12` or, from spreadsheets, `12.0`.
fn parse_order(cell: &str) -> Option<u32> {
    let cell = cell.trim();
    if let Ok(order) = cell.parse::<u32>() {
        return Some(order);
    }
    let value = cell.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= 0.0 && value <= f64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    }
}
