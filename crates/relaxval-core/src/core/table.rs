use crate::core::catalog::{Category, StructureEntry, Subcategory};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

pub const KEY_COLUMNS: [&str; 4] = ["protein", "category", "subcategory", "model"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Table is missing required column '{0}'")]
    MissingColumn(String),
}

/// One scalar cell of a metric row.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl MetricValue {
    /// A float rounded to `places` decimals; non-finite values become Missing.
    pub fn rounded(value: f64, places: i32) -> Self {
        if !value.is_finite() {
            return MetricValue::Missing;
        }
        let scale = 10f64.powi(places);
        MetricValue::Float((value * scale).round() / scale)
    }

    pub fn from_option(value: Option<f64>, places: i32) -> Self {
        value.map_or(MetricValue::Missing, |v| Self::rounded(v, places))
    }

    pub fn count(value: usize) -> Self {
        MetricValue::Int(value as i64)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, MetricValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            MetricValue::Int(i) => Some(*i as f64),
            MetricValue::Float(f) => Some(*f),
            MetricValue::Text(_) | MetricValue::Missing => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetricValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Reads a CSV cell back into the value that was written.
    pub fn parse_cell(cell: &str) -> Self {
        match cell {
            "" => MetricValue::Missing,
            "True" | "true" => MetricValue::Bool(true),
            "False" | "false" => MetricValue::Bool(false),
            _ => {
                if let Ok(i) = cell.parse::<i64>() {
                    MetricValue::Int(i)
                } else if let Ok(v) = cell.parse::<f64>() {
                    MetricValue::Float(v)
                } else {
                    MetricValue::Text(cell.to_string())
                }
            }
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Bool(true) => f.write_str("True"),
            MetricValue::Bool(false) => f.write_str("False"),
            MetricValue::Int(i) => write!(f, "{}", i),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Missing => Ok(()),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Bool(b) => serializer.serialize_bool(*b),
            MetricValue::Int(i) => serializer.serialize_i64(*i),
            MetricValue::Float(v) => serializer.serialize_f64(*v),
            MetricValue::Text(s) => serializer.serialize_str(s),
            MetricValue::Missing => serializer.serialize_none(),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// An ordered list of named metric values for one structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    fields: Vec<(String, MetricValue)>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding only the four key columns of `entry`.
    pub fn keyed(entry: &StructureEntry) -> Self {
        let mut record = Self::new();
        record.set("protein", MetricValue::Text(entry.protein.clone()));
        record.set("category", MetricValue::Text(entry.category.to_string()));
        record.set("subcategory", MetricValue::Text(entry.subcategory.to_string()));
        record.set("model", MetricValue::Text(entry.model.clone()));
        record
    }

    /// Sets `name`, replacing an existing value in place or appending a new column.
    pub fn set(&mut self, name: &str, value: impl Into<MetricValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(MetricValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(MetricValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends the columns of `other` that this record does not have yet.
    pub fn merge(&mut self, other: &MetricRecord) {
        for (name, value) in other.iter() {
            if self.get(name).is_none() {
                self.fields.push((name.to_string(), value.clone()));
            }
        }
    }

    /// Keeps the key columns plus the named ones, in the record's own order.
    pub fn project(&self, keep: impl Fn(&str) -> bool) -> MetricRecord {
        MetricRecord {
            fields: self
                .fields
                .iter()
                .filter(|(n, _)| KEY_COLUMNS.contains(&n.as_str()) || keep(n))
                .cloned()
                .collect(),
        }
    }

    pub fn key(&self) -> (String, String, String, String) {
        let text = |name: &str| self.text(name).unwrap_or_default().to_string();
        (text("protein"), text("category"), text("subcategory"), text("model"))
    }
}

impl<S: Into<String>> FromIterator<(S, MetricValue)> for MetricRecord {
    fn from_iter<I: IntoIterator<Item = (S, MetricValue)>>(iter: I) -> Self {
        let mut record = MetricRecord::new();
        for (name, value) in iter {
            let name: String = name.into();
            record.set(&name, value);
        }
        record
    }
}

impl Serialize for MetricRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn collect_header(records: &[MetricRecord], leading: &[&str]) -> Vec<String> {
    let mut header: Vec<String> = leading.iter().map(|s| s.to_string()).collect();
    for record in records {
        for (name, _) in record.iter() {
            if !header.iter().any(|h| h == name) {
                header.push(name.to_string());
            }
        }
    }
    header
}

/// Union of all column names: key columns first, then the rest in first-seen order.
pub fn union_header(records: &[MetricRecord]) -> Vec<String> {
    collect_header(records, &KEY_COLUMNS)
}

fn write_with_header<W: Write>(
    records: &[MetricRecord],
    header: &[String],
    writer: W,
) -> Result<(), TableError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header)?;
    for record in records {
        let row: Vec<String> = header
            .iter()
            .map(|h| record.get(h).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_records<W: Write>(records: &[MetricRecord], writer: W) -> Result<(), TableError> {
    write_with_header(records, &union_header(records), writer)
}

fn create_with_parents(path: &Path) -> Result<BufWriter<File>, TableError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

pub fn write_records_csv(path: &Path, records: &[MetricRecord]) -> Result<(), TableError> {
    write_records(records, create_with_parents(path)?)
}

/// Writes rows that are not keyed by structure, such as statistics tables.
/// Columns appear in first-seen order.
pub fn write_summary_csv(path: &Path, records: &[MetricRecord]) -> Result<(), TableError> {
    write_with_header(records, &collect_header(records, &[]), create_with_parents(path)?)
}

pub fn write_records_json(path: &Path, records: &[MetricRecord]) -> Result<(), TableError> {
    let mut writer = create_with_parents(path)?;
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// A CSV table loaded for analysis. Cells are kept as text and parsed on access.
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MetricTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_records(records: &[MetricRecord]) -> Self {
        let columns = union_header(records);
        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).map(|v| v.to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |idx| Row { table: self, idx })
    }

    /// Ensures the four key columns are present.
    pub fn require_keys(&self) -> Result<(), TableError> {
        for key in KEY_COLUMNS {
            if !self.has_column(key) {
                return Err(TableError::MissingColumn(key.to_string()));
            }
        }
        Ok(())
    }

    /// Non-key columns with at least one numeric cell, in table order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !KEY_COLUMNS.contains(&c.as_str()))
            .filter(|c| self.rows().any(|row| row.number(c).is_some()))
            .cloned()
            .collect()
    }

    /// Outer join on the key columns. Rows keep first-seen order and a column
    /// already present keeps the value of the earlier table.
    pub fn join(tables: &[MetricTable]) -> MetricTable {
        let mut columns: Vec<String> = KEY_COLUMNS.iter().map(|s| s.to_string()).collect();
        for table in tables {
            for c in &table.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }

        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for table in tables {
            for row in table.rows() {
                let key: Vec<String> = KEY_COLUMNS
                    .iter()
                    .map(|k| row.text(k).unwrap_or_default().to_string())
                    .collect();
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    let mut fresh = vec![String::new(); columns.len()];
                    fresh[..KEY_COLUMNS.len()].clone_from_slice(&key);
                    rows.push(fresh);
                    rows.len() - 1
                });
                for (ci, c) in table.columns.iter().enumerate() {
                    if let Some(target) = columns.iter().position(|x| x == c) {
                        let cell = &table.rows[row.idx][ci];
                        if rows[slot][target].is_empty() && !cell.is_empty() {
                            rows[slot][target] = cell.clone();
                        }
                    }
                }
            }
        }
        MetricTable { columns, rows }
    }
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a MetricTable,
    idx: usize,
}

impl<'a> Row<'a> {
    /// Non-empty cell text.
    pub fn text(&self, column: &str) -> Option<&'a str> {
        let ci = self.table.column_index(column)?;
        let cell = self.table.rows[self.idx].get(ci)?.as_str();
        (!cell.is_empty()).then_some(cell)
    }

    /// Numeric value of a cell; booleans read as 1 and 0.
    pub fn number(&self, column: &str) -> Option<f64> {
        let cell = self.text(column)?;
        match cell {
            "True" | "true" => Some(1.0),
            "False" | "false" => Some(0.0),
            _ => cell.parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn protein(&self) -> &'a str {
        self.text("protein").unwrap_or_default()
    }

    pub fn model(&self) -> &'a str {
        self.text("model").unwrap_or_default()
    }

    pub fn category(&self) -> Option<Category> {
        self.text("category")?.parse().ok()
    }

    pub fn subcategory(&self) -> Option<Subcategory> {
        self.text("subcategory")?.parse().ok()
    }

    /// The row as a record; key columns stay text.
    pub fn to_record(&self) -> MetricRecord {
        self.table
            .columns
            .iter()
            .zip(&self.table.rows[self.idx])
            .map(|(column, cell)| {
                let value = if KEY_COLUMNS.contains(&column.as_str()) {
                    MetricValue::Text(cell.clone())
                } else {
                    MetricValue::parse_cell(cell)
                };
                (column.as_str(), value)
            })
            .collect()
    }

    /// Whether this row is the unrelaxed reference of its category.
    pub fn is_baseline(&self) -> bool {
        match (self.category(), self.subcategory()) {
            (Some(category), Some(sub)) => sub == Subcategory::baseline_for(category),
            _ => false,
        }
    }
}
