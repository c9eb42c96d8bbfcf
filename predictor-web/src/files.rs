//! Tabular upload formats: CSV and XLSX
//!
//! Reading types every cell ([`Cell::infer`] for CSV, the workbook's own cell
//! types for XLSX). Writing produces the same format the table came from.

use calamine::{open_workbook, Data, Reader, Xlsx};
use predictor_common::{Cell, Error, Result, Table};
use rust_xlsxwriter::Workbook;
use std::path::Path;

/// Supported upload format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// `.csv` or `.xlsx` (case-insensitive); anything else is rejected
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx") => Ok(FileFormat::Xlsx),
            _ => Err(Error::Validation(format!(
                "unsupported file type '{}': expected .csv or .xlsx",
                filename
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
        }
    }
}

/// Reduce a client-supplied name to a bare file name
///
/// Directory components are dropped and quotes removed so the result is safe
/// both on disk and inside a `Content-Disposition` header.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| *c != '"' && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn read_table(path: &Path, format: FileFormat) -> Result<Table> {
    match format {
        FileFormat::Csv => read_csv(path),
        FileFormat::Xlsx => read_xlsx(path),
    }
}

pub fn write_table(path: &Path, format: FileFormat, table: &Table) -> Result<()> {
    match format {
        FileFormat::Csv => write_csv(path, table),
        FileFormat::Xlsx => write_xlsx(path, table),
    }
}

fn format_error(format: FileFormat, e: impl std::fmt::Display) -> Error {
    Error::FileFormat(format!("{}: {}", format.extension(), e))
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| format_error(FileFormat::Csv, e))?;

    let columns = reader
        .headers()
        .map_err(|e| format_error(FileFormat::Csv, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record.map_err(|e| format_error(FileFormat::Csv, e))?;
        table.push_row(record.iter().map(Cell::infer).collect())?;
    }

    Ok(table)
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| format_error(FileFormat::Csv, e))?;

    writer
        .write_record(table.columns())
        .map_err(|e| format_error(FileFormat::Csv, e))?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .map_err(|e| format_error(FileFormat::Csv, e))?;
    }
    writer.flush()?;

    Ok(())
}

/// First worksheet only; the first row is the header
fn read_xlsx(path: &Path) -> Result<Table> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e| format_error(FileFormat::Xlsx, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| format_error(FileFormat::Xlsx, "workbook has no worksheets"))?
        .map_err(|e| format_error(FileFormat::Xlsx, e))?;

    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect(),
        None => Vec::new(),
    };

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(data_to_cell).collect())?;
    }

    Ok(table)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::Int(i) => Cell::Integer(*i),
        // Workbooks store every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Cell::Integer(*f as i64)
        }
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if dt.is_datetime() => Cell::Text(iso_datetime(value)),
            // Durations keep Excel's fractional day count
            _ => Cell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Dates without a time of day print as `YYYY-MM-DD`
fn iso_datetime(value: chrono::NaiveDateTime) -> String {
    if value.time() == chrono::NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

fn write_xlsx(path: &Path, table: &Table) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| format_error(FileFormat::Xlsx, e);

    for (col, name) in table.columns().iter().enumerate() {
        worksheet
            .write_string(0, col as u16, name.as_str())
            .map_err(xlsx_err)?;
    }

    for (idx, row) in table.rows().iter().enumerate() {
        let r = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Null => continue,
                Cell::Bool(b) => worksheet.write_boolean(r, c, *b).map_err(xlsx_err)?,
                Cell::Integer(i) => worksheet.write_number(r, c, *i as f64).map_err(xlsx_err)?,
                Cell::Float(f) => worksheet.write_number(r, c, *f).map_err(xlsx_err)?,
                Cell::Text(s) => worksheet.write_string(r, c, s.as_str()).map_err(xlsx_err)?,
            };
        }
    }

    workbook.save(path).map_err(xlsx_err)?;
    Ok(())
}
