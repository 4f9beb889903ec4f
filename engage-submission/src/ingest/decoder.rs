//! Format decoder
//!
//! Turns uploaded bytes into a lazy, single-pass sequence of [`RowRecord`]s.
//! Knows nothing about templates or storage.
//!
//! Header policy: the first record (first sheet row) is the header. Header
//! cells are trimmed, a leading BOM is ignored, trailing empty cells are
//! dropped. Empty interior or duplicate headers make the file malformed.
//!
//! Each record carries its physical 1-based position in the source (header
//! = 1). Rows whose every cell is blank are skipped but keep their position.

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use engage_common::config::IngestConfig;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Compound File Binary header used by legacy `.xls` workbooks
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    MalformedInput(String),

    #[error("File has more than {limit} data rows")]
    RowLimitExceeded { limit: usize },
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Xlsx,
    Xls,
    Csv,
    Tsv,
}

impl FileFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "csv" => Some(FileFormat::Csv),
            "tsv" => Some(FileFormat::Tsv),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xls => "xls",
            FileFormat::Csv => "csv",
            FileFormat::Tsv => "tsv",
        }
    }

    pub fn is_spreadsheet(self) -> bool {
        matches!(self, FileFormat::Xlsx | FileFormat::Xls)
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of `filename`, without the dot
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Decide the format of an upload from its name and content
///
/// A recognized extension declares the format and must be in the allowed
/// set; declared spreadsheets must carry a matching container signature.
/// Anything else is sniffed, and only spreadsheet containers are
/// recognizable that way.
pub fn detect_format(filename: &str, bytes: &[u8], config: &IngestConfig) -> Result<FileFormat, DecodeError> {
    let extension = file_extension(filename);

    if let Some(format) = extension.as_deref().and_then(FileFormat::from_extension) {
        if !config.is_extension_allowed(format.as_str()) {
            return Err(DecodeError::UnsupportedFormat(format!(
                "File type .{} is not accepted",
                format
            )));
        }
        if format.is_spreadsheet() && !container_matches(format, bytes) {
            return Err(DecodeError::MalformedInput(format!(
                "File content is not a valid .{} workbook",
                format
            )));
        }
        return Ok(format);
    }

    let sniffed = match infer::get(bytes).map(|kind| kind.extension()) {
        Some("xlsx") => Some(FileFormat::Xlsx),
        Some("xls") => Some(FileFormat::Xls),
        _ if bytes.starts_with(&OLE_SIGNATURE) => Some(FileFormat::Xls),
        _ => None,
    };

    match sniffed {
        Some(format) if config.is_extension_allowed(format.as_str()) => Ok(format),
        _ => Err(DecodeError::UnsupportedFormat(match extension {
            Some(ext) => format!("File type .{} is not supported", ext),
            None => "Could not determine the file type".to_string(),
        })),
    }
}

fn container_matches(format: FileFormat, bytes: &[u8]) -> bool {
    let sniffed = infer::get(bytes).map(|kind| kind.extension());
    match format {
        // Some writers produce workbooks that only sniff as a plain zip
        FileFormat::Xlsx => matches!(sniffed, Some("xlsx") | Some("zip")),
        FileFormat::Xls => sniffed == Some("xls") || bytes.starts_with(&OLE_SIGNATURE),
        FileFormat::Csv | FileFormat::Tsv => true,
    }
}

/// Raw cell value as found in the source file
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Spreadsheet error marker such as `#DIV/0!`
    Error(String),
}

impl CellValue {
    /// Empty, or text made only of whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Document encoding of the value, unmodified
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::Null,
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => number_to_json(*f),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            CellValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            CellValue::Error(e) => Value::String(e.clone()),
        }
    }

    /// Display text of a present value (`None` for blanks and error cells)
    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        match self {
            CellValue::Text(s) => Some(s.trim().to_string()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(match number_to_json(*f) {
                Value::Number(n) => n.to_string(),
                _ => f.to_string(),
            }),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            CellValue::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            CellValue::Empty | CellValue::Error(_) => None,
        }
    }
}

/// Largest integer magnitude an f64 holds exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// JSON number, integral values as integers; non-finite as null
pub fn number_to_json(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// One data row: header names paired with raw values
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    row_number: u32,
    headers: Arc<[String]>,
    values: Vec<CellValue>,
}

impl RowRecord {
    /// `values` is padded with empties or cut to the header count
    pub fn new(row_number: u32, headers: Arc<[String]>, mut values: Vec<CellValue>) -> Self {
        values.resize(headers.len(), CellValue::Empty);
        Self {
            row_number,
            headers,
            values,
        }
    }

    /// 1-based physical position in the source file
    pub fn row_number(&self) -> u32 {
        self.row_number
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|i| &self.values[i])
    }

    /// Cells in header order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

enum RowSource {
    Delimited {
        records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
        delimiter: u8,
    },
    Sheet {
        range: Range<Data>,
        /// Next range row to read (0 is the header)
        next: usize,
        /// Physical row number of range row 0
        first_row: u32,
    },
}

/// Streaming row reader for one uploaded file
pub struct RowDecoder {
    headers: Arc<[String]>,
    source: RowSource,
    max_rows: usize,
    data_rows: usize,
    finished: bool,
}

impl std::fmt::Debug for RowDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowDecoder")
            .field("headers", &self.headers)
            .field("data_rows", &self.data_rows)
            .field("finished", &self.finished)
            .finish()
    }
}

impl RowDecoder {
    /// Open `bytes` as `format` and read the header row
    pub fn open(bytes: Vec<u8>, format: FileFormat, max_rows: usize) -> Result<Self, DecodeError> {
        let (headers, source) = match format {
            FileFormat::Csv => open_delimited(bytes, b',')?,
            FileFormat::Tsv => open_delimited(bytes, b'\t')?,
            FileFormat::Xlsx => {
                let workbook = Xlsx::new(Cursor::new(bytes))
                    .map_err(|e| DecodeError::MalformedInput(format!("Could not open workbook: {}", e)))?;
                open_sheet(workbook)?
            }
            FileFormat::Xls => {
                let workbook = Xls::new(Cursor::new(bytes))
                    .map_err(|e| DecodeError::MalformedInput(format!("Could not open workbook: {}", e)))?;
                open_sheet(workbook)?
            }
        };

        Ok(Self {
            headers,
            source,
            max_rows,
            data_rows: 0,
            finished: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_raw(&mut self) -> Option<Result<(u32, Vec<CellValue>), DecodeError>> {
        match &mut self.source {
            RowSource::Delimited { records, delimiter } => {
                let record = match records.next()? {
                    Ok(record) => record,
                    Err(e) => return Some(Err(csv_error(e))),
                };
                if let Err(e) = check_terminated(records, &record, *delimiter) {
                    return Some(Err(e));
                }
                let row_number = record
                    .position()
                    .map(|p| p.line() as u32)
                    .unwrap_or(0);
                let values = record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::Text(field.to_string())
                        }
                    })
                    .collect();
                Some(Ok((row_number, values)))
            }
            RowSource::Sheet {
                range,
                next,
                first_row,
            } => {
                if *next >= range.height() {
                    return None;
                }
                let row = *next;
                *next += 1;
                let values = (0..range.width())
                    .map(|col| convert_cell(range.get((row, col))))
                    .collect();
                Some(Ok((*first_row + row as u32, values)))
            }
        }
    }
}

impl Iterator for RowDecoder {
    type Item = Result<RowRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let (row_number, mut values) = match self.next_raw() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Some(Ok(raw)) => raw,
            };

            if values.len() > self.headers.len() {
                if values[self.headers.len()..].iter().any(|v| !v.is_blank()) {
                    self.finished = true;
                    return Some(Err(DecodeError::MalformedInput(format!(
                        "Row {} has more values than header columns",
                        row_number
                    ))));
                }
                values.truncate(self.headers.len());
            }

            if values.iter().all(CellValue::is_blank) {
                continue;
            }

            self.data_rows += 1;
            if self.data_rows > self.max_rows {
                self.finished = true;
                return Some(Err(DecodeError::RowLimitExceeded {
                    limit: self.max_rows,
                }));
            }

            return Some(Ok(RowRecord::new(row_number, Arc::clone(&self.headers), values)));
        }
    }
}

fn open_delimited(bytes: Vec<u8>, delimiter: u8) -> Result<(Arc<[String]>, RowSource), DecodeError> {
    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(Cursor::new(bytes))
        .into_records();

    let header = match records.next() {
        None => return Err(DecodeError::MalformedInput("File has no header row".to_string())),
        Some(Err(e)) => return Err(csv_error(e)),
        Some(Ok(record)) => record,
    };
    check_terminated(&records, &header, delimiter)?;

    let headers = build_headers(header.iter().map(str::to_string).collect())?;
    Ok((headers, RowSource::Delimited { records, delimiter }))
}

/// Reject a record that swallowed the rest of the input in an open quote
///
/// The csv reader accepts an unterminated quoted field and runs it to EOF,
/// so only a record that ends at EOF needs rescanning.
fn check_terminated(
    records: &csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    record: &csv::StringRecord,
    delimiter: u8,
) -> Result<(), DecodeError> {
    let Some(position) = record.position() else {
        return Ok(());
    };
    let bytes = records.reader().get_ref().get_ref();
    if (records.reader().position().byte() as usize) < bytes.len() {
        return Ok(());
    }
    let start = (position.byte() as usize).min(bytes.len());
    if ends_inside_quotes(&bytes[start..], delimiter) {
        return Err(DecodeError::MalformedInput(format!(
            "Could not read line {}: unterminated quoted field",
            position.line()
        )));
    }
    Ok(())
}

/// Whether `span` ends inside a quoted field
///
/// A quote opens a field only at field start; `""` inside quotes is an
/// escaped quote. Quotes in the middle of an unquoted field are literal.
fn ends_inside_quotes(span: &[u8], delimiter: u8) -> bool {
    let mut in_quotes = false;
    let mut field_start = true;
    let mut just_closed = false;

    for &b in span {
        if in_quotes {
            if b == b'"' {
                in_quotes = false;
                just_closed = true;
            }
            continue;
        }
        if b == b'"' && (field_start || just_closed) {
            in_quotes = true;
            field_start = false;
            just_closed = false;
            continue;
        }
        just_closed = false;
        field_start = b == delimiter || b == b'\n' || b == b'\r';
    }

    in_quotes
}

fn open_sheet<R>(mut workbook: R) -> Result<(Arc<[String]>, RowSource), DecodeError>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let range = match workbook.worksheet_range_at(0) {
        None => return Err(DecodeError::MalformedInput("Workbook has no worksheets".to_string())),
        Some(Err(e)) => {
            return Err(DecodeError::MalformedInput(format!("Could not read worksheet: {}", e)))
        }
        Some(Ok(range)) => range,
    };

    let first_row = match range.start() {
        Some((row, _)) if !range.is_empty() => row + 1,
        _ => return Err(DecodeError::MalformedInput("File has no header row".to_string())),
    };

    let header_cells = (0..range.width())
        .map(|col| match range.get((0, col)) {
            None | Some(Data::Empty) => String::new(),
            Some(Data::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
        .collect();
    let headers = build_headers(header_cells)?;

    Ok((
        headers,
        RowSource::Sheet {
            range,
            next: 1,
            first_row,
        },
    ))
}

fn build_headers(cells: Vec<String>) -> Result<Arc<[String]>, DecodeError> {
    let mut headers: Vec<String> = cells
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            let cell = if i == 0 {
                cell.trim_start_matches('\u{feff}').to_string()
            } else {
                cell
            };
            cell.trim().to_string()
        })
        .collect();

    while headers.last().is_some_and(|h| h.is_empty()) {
        headers.pop();
    }
    if headers.is_empty() {
        return Err(DecodeError::MalformedInput("File has no header row".to_string()));
    }
    if let Some(pos) = headers.iter().position(String::is_empty) {
        return Err(DecodeError::MalformedInput(format!(
            "Header in column {} is empty",
            pos + 1
        )));
    }

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(DecodeError::MalformedInput(format!("Duplicate header: {}", header)));
        }
    }

    Ok(headers.into())
}

fn csv_error(err: csv::Error) -> DecodeError {
    let line = err.position().map(|p| p.line());
    let detail = match err.kind() {
        csv::ErrorKind::Utf8 { .. } => "text is not valid UTF-8".to_string(),
        _ => err.to_string(),
    };
    match line {
        Some(line) => DecodeError::MalformedInput(format!("Could not read line {}: {}", line, detail)),
        None => DecodeError::MalformedInput(format!("Could not read delimited text: {}", detail)),
    }
}

fn convert_cell(cell: Option<&Data>) -> CellValue {
    match cell {
        None | Some(Data::Empty) => CellValue::Empty,
        Some(Data::String(s)) if s.is_empty() => CellValue::Empty,
        Some(Data::String(s)) => CellValue::Text(s.clone()),
        Some(Data::Int(i)) => CellValue::Int(*i),
        Some(Data::Float(f)) => CellValue::Float(*f),
        Some(Data::Bool(b)) => CellValue::Bool(*b),
        Some(Data::DateTime(dt)) => match dt.as_datetime() {
            Some(value) if dt.is_datetime() => date_or_datetime(value),
            // Durations carry no calendar meaning
            _ => CellValue::Float(dt.as_f64()),
        },
        Some(Data::DateTimeIso(s)) => parse_iso(s),
        Some(Data::DurationIso(s)) => CellValue::Text(s.clone()),
        Some(Data::Error(e)) => CellValue::Error(e.to_string()),
    }
}

fn date_or_datetime(value: NaiveDateTime) -> CellValue {
    if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 {
        CellValue::Date(value.date())
    } else {
        CellValue::DateTime(value)
    }
}

fn parse_iso(s: &str) -> CellValue {
    if let Ok(value) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return date_or_datetime(value);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return CellValue::Date(date);
    }
    CellValue::Text(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_csv(text: &str) -> Result<Vec<RowRecord>, DecodeError> {
        RowDecoder::open(text.as_bytes().to_vec(), FileFormat::Csv, 100)?.collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_reads_header_and_rows() {
        let rows = decode_csv("submission_date,department, category \n2024-01-15,Sales,Survey\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].headers(), &["submission_date", "department", "category"]);
        assert_eq!(rows[0].row_number(), 2);
        assert_eq!(rows[0].get("category"), Some(&text("Survey")));
    }

    #[test]
    fn test_blank_rows_skipped_but_keep_positions() {
        let rows = decode_csv("a,b\n1,2\n,\n  ,\t\n\n3,4\n").unwrap();
        let numbers: Vec<u32> = rows.iter().map(RowRecord::row_number).collect();
        assert_eq!(numbers, vec![2, 6]);
    }

    #[test]
    fn test_multiline_quoted_field_advances_line_numbers() {
        let rows = decode_csv("a,b\n\"line one\nline two\",x\ny,z\n").unwrap();
        assert_eq!(rows[0].row_number(), 2);
        assert_eq!(rows[0].get("a"), Some(&text("line one\nline two")));
        assert_eq!(rows[1].row_number(), 4);
    }

    #[test]
    fn test_bom_is_ignored() {
        let rows = decode_csv("\u{feff}name,count\nx,1\n").unwrap();
        assert_eq!(rows[0].headers()[0], "name");
    }

    #[test]
    fn test_duplicate_header_is_malformed() {
        let err = decode_csv("a,b,a\n1,2,3\n").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput(ref m) if m.contains("Duplicate header")));
    }

    #[test]
    fn test_interior_empty_header_is_malformed() {
        assert!(matches!(decode_csv("a,,c\n1,2,3\n"), Err(DecodeError::MalformedInput(_))));
    }

    #[test]
    fn test_trailing_empty_headers_dropped() {
        let rows = decode_csv("a,b,,\n1,2,,\n").unwrap();
        assert_eq!(rows[0].headers(), &["a", "b"]);
    }

    #[test]
    fn test_no_header_is_malformed() {
        assert!(matches!(decode_csv(""), Err(DecodeError::MalformedInput(_))));
        assert!(matches!(decode_csv(",,\n1,2,3\n"), Err(DecodeError::MalformedInput(_))));
    }

    #[test]
    fn test_extra_values_are_malformed() {
        let mut decoder = RowDecoder::open(b"a,b\n1,2\n1,2,3\n4,5\n".to_vec(), FileFormat::Csv, 100).unwrap();
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(decoder.next(), Some(Err(DecodeError::MalformedInput(_)))));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_missing_trailing_values_read_as_empty() {
        let rows = decode_csv("a,b,c\n1\n").unwrap();
        assert_eq!(rows[0].get("b"), Some(&CellValue::Empty));
        assert_eq!(rows[0].get("c"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_row_limit_reported_once() {
        let mut decoder = RowDecoder::open(b"a\n1\n\n2\n3\n4\n".to_vec(), FileFormat::Csv, 2).unwrap();
        assert!(decoder.next().unwrap().is_ok());
        assert!(decoder.next().unwrap().is_ok());
        assert_eq!(decoder.next(), Some(Err(DecodeError::RowLimitExceeded { limit: 2 })));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_exactly_at_limit_is_fine() {
        let rows: Result<Vec<_>, _> = RowDecoder::open(b"a\n1\n2\n".to_vec(), FileFormat::Csv, 2)
            .unwrap()
            .collect();
        assert_eq!(rows.unwrap().len(), 2);
    }

    #[test]
    fn test_tsv() {
        let rows: Vec<RowRecord> = RowDecoder::open(b"a\tb\nx,y\tz\n".to_vec(), FileFormat::Tsv, 10)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].get("a"), Some(&text("x,y")));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let bytes = b"a,b\n\xff\xfe,1\n".to_vec();
        let result: Result<Vec<_>, _> = RowDecoder::open(bytes, FileFormat::Csv, 10).unwrap().collect();
        assert!(matches!(result, Err(DecodeError::MalformedInput(_))));
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        let err = decode_csv("a,b\n\"unterminated,1\n2,3\n").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedInput("Could not read line 2: unterminated quoted field".to_string())
        );

        // Earlier rows still decode before the failure
        let mut decoder = RowDecoder::open(b"a,b\n1,2\n3,\"open\n".to_vec(), FileFormat::Csv, 10).unwrap();
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(decoder.next(), Some(Err(DecodeError::MalformedInput(_)))));
        assert!(decoder.next().is_none());

        assert!(matches!(decode_csv("\"a,b\n1,2\n"), Err(DecodeError::MalformedInput(_))));
    }

    #[test]
    fn test_terminated_quotes_at_end_of_input() {
        let rows = decode_csv("a,b\n\"say \"\"hi\"\"\",5\" pipe\n\"x,y\",z").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("a"), Some(&text("say \"hi\"")));
        assert_eq!(rows[0].get("b"), Some(&text("5\" pipe")));
        assert_eq!(rows[1].get("a"), Some(&text("x,y")));
    }

    #[test]
    fn test_quote_scanner() {
        assert!(ends_inside_quotes(b"\"open,1\n2,3\n", b','));
        assert!(!ends_inside_quotes(b"\"a\"\"b\",c\n", b','));
        assert!(!ends_inside_quotes(b"5\" pipe,x\n", b','));
        assert!(ends_inside_quotes(b"x\t\"tab open", b'\t'));
    }

    #[test]
    fn test_detect_format() {
        let config = IngestConfig::default();
        assert_eq!(detect_format("data.CSV", b"a,b", &config), Ok(FileFormat::Csv));
        assert_eq!(detect_format("data.tsv", b"a\tb", &config), Ok(FileFormat::Tsv));
        assert!(matches!(
            detect_format("data.json", b"{}", &config),
            Err(DecodeError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            detect_format("data", b"a,b", &config),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_declared_spreadsheet_must_match_signature() {
        let config = IngestConfig::default();
        assert!(matches!(
            detect_format("report.xlsx", b"a,b\n1,2\n", &config),
            Err(DecodeError::MalformedInput(_))
        ));
        assert!(matches!(
            detect_format("report.xls", b"plain text", &config),
            Err(DecodeError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_disallowed_extension_is_unsupported() {
        let config = IngestConfig {
            allowed_extensions: vec!["csv".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            detect_format("data.tsv", b"a\tb", &config),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_cell_json_encoding() {
        assert_eq!(CellValue::Float(3.0).to_json(), serde_json::json!(3));
        assert_eq!(CellValue::Float(2.5).to_json(), serde_json::json!(2.5));
        assert_eq!(CellValue::Empty.to_json(), Value::Null);
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(CellValue::Date(date).to_json(), serde_json::json!("2024-03-09"));
        let dt = date.and_hms_opt(14, 5, 0).unwrap();
        assert_eq!(CellValue::DateTime(dt).to_json(), serde_json::json!("2024-03-09T14:05:00"));
    }
}
