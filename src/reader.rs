use std::collections::HashSet;
use std::io::Cursor;

use anyhow::{anyhow, Context};
use calamine::{Data, DataType, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::files::{FileRole, UploadedFile};
use crate::models::{
    AcademicRecord, ActivityLog, ActivityRecord, RecordType, Roster, Row, Student, StudentId,
};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Csv,
    Workbook,
}

impl SpreadsheetFormat {
    pub fn detect(filename: &str) -> Result<Self> {
        let lowered = filename.to_lowercase();
        if lowered.ends_with(".csv") {
            Ok(SpreadsheetFormat::Csv)
        } else if lowered.ends_with(".xlsx") || lowered.ends_with(".xls") {
            Ok(SpreadsheetFormat::Workbook)
        } else {
            Err(AnalysisError::UnsupportedFileType {
                filename: filename.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    fn require_columns(&self, role: FileRole, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.has_column(name)) {
            Some(missing) => Err(AnalysisError::MissingColumn {
                role,
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }
}

pub fn decode(file: &UploadedFile) -> Result<Table> {
    let table = match SpreadsheetFormat::detect(&file.filename)? {
        SpreadsheetFormat::Csv => decode_csv(&file.content),
        SpreadsheetFormat::Workbook => decode_workbook(&file.content),
    }
    .with_context(|| format!("failed to decode {}", file.filename))
    .map_err(AnalysisError::unexpected)?;

    debug!(
        filename = %file.filename,
        columns = table.columns.len(),
        rows = table.rows.len(),
        "decoded spreadsheet"
    );
    Ok(table)
}

fn decode_csv(content: &[u8]) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (index, column) in columns.iter().enumerate() {
            let cell = record.get(index).map(infer_cell).unwrap_or(Value::Null);
            row.insert(column.clone(), cell);
        }
        rows.push(row);
    }

    Ok(Table { columns, rows })
}

fn decode_workbook(content: &[u8]) -> anyhow::Result<Table> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(content.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))??;

    let mut sheet_rows = range.rows();
    let columns: Vec<String> = match sheet_rows.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect(),
        None => return Ok(Table::default()),
    };

    let rows = sheet_rows
        .map(|cells| {
            let mut row = Row::new();
            for (index, column) in columns.iter().enumerate() {
                let cell = cells.get(index).map(workbook_cell).unwrap_or(Value::Null);
                row.insert(column.clone(), cell);
            }
            row
        })
        .collect();

    Ok(Table { columns, rows })
}

fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Int(value) => Value::from(*value),
        Data::Float(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
        Data::Bool(value) => Value::Bool(*value),
        Data::String(value) if value.trim().is_empty() => Value::Null,
        Data::String(value) => Value::String(value.trim().to_string()),
        Data::DateTimeIso(value) | Data::DurationIso(value) => Value::String(value.clone()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|value| Value::String(value.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

pub fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Value::from(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(value) {
            return Value::Number(number);
        }
    }
    Value::String(trimmed.to_string())
}

pub fn cell_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Some(int.to_string());
            }
            match number.as_f64() {
                Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => {
                    Some((float as i64).to_string())
                }
                _ => Some(number.to_string()),
            }
        }
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => cell_key(other),
    }
}

fn cell_number(value: &Value) -> std::result::Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Some(number)),
            Ok(_) => Err(format!("`{text}` is not a finite number")),
            Err(_) => Err(format!("`{text}` is not a number")),
        },
        other => Err(format!("`{other}` is not a number")),
    }
}

fn cell_integer(value: &Value) -> std::result::Result<Option<i64>, String> {
    match cell_number(value)? {
        None => Ok(None),
        Some(number) if number.fract() == 0.0 => Ok(Some(number as i64)),
        Some(number) => Err(format!("`{number}` is not a whole number")),
    }
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn cell_timestamp(value: &Value) -> std::result::Result<Option<NaiveDateTime>, String> {
    match cell_text(value) {
        None => Ok(None),
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| format!("`{text}` is not a recognized date")),
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn line_of(index: usize) -> usize {
    index + 2
}

pub fn read_roster(table: &Table) -> Result<Roster> {
    let role = FileRole::Students;
    table.require_columns(role, &["student_id"])?;
    let has_semester = table.has_column("semester");

    let mut seen = HashSet::new();
    let mut students = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        let student_id = cell_key(field(row, "student_id"))
            .map(StudentId::new)
            .ok_or_else(|| AnalysisError::invalid_value(role, line_of(index), "missing student_id"))?;
        if !seen.insert(student_id.clone()) {
            return Err(AnalysisError::invalid_value(
                role,
                line_of(index),
                format!("duplicate student_id `{student_id}`"),
            ));
        }

        students.push(Student {
            semester: cell_key(field(row, "semester")),
            student_id,
            fields: row.clone(),
        });
    }

    Ok(Roster {
        students,
        has_semester,
    })
}

pub fn read_academic_records(table: &Table) -> Result<Vec<AcademicRecord>> {
    let role = FileRole::AcademicRecords;
    table.require_columns(role, &["student_id", "score", "attempt_number"])?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        let Some(student_id) = cell_key(field(row, "student_id")) else {
            continue;
        };
        let invalid = |reason: String| AnalysisError::invalid_value(role, line_of(index), reason);

        records.push(AcademicRecord {
            student_id: StudentId::new(student_id),
            score: cell_number(field(row, "score")).map_err(invalid)?,
            attempt_number: cell_integer(field(row, "attempt_number")).map_err(invalid)?,
        });
    }

    Ok(records)
}

pub fn read_activity_records(table: &Table) -> Result<ActivityLog> {
    let role = FileRole::ActivityRecords;
    table.require_columns(role, &["student_id", "record_type", "status"])?;
    let has_semester = table.has_column("semester");

    let mut records = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        let Some(student_id) = cell_key(field(row, "student_id")) else {
            continue;
        };
        let record_type = cell_text(field(row, "record_type")).unwrap_or_default();
        let date = cell_timestamp(field(row, "date"))
            .map_err(|reason| AnalysisError::invalid_value(role, line_of(index), reason))?;

        records.push(ActivityRecord {
            student_id: StudentId::new(student_id),
            record_type: RecordType::parse(&record_type),
            status: cell_text(field(row, "status")),
            date,
            semester: cell_key(field(row, "semester")),
        });
    }

    Ok(ActivityLog {
        records,
        has_semester,
    })
}
