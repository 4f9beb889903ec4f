//! Upload fixtures
//!
//! Files are built in memory: CSV as text, XLSX with rust_xlsxwriter.

use axum::http::request::Builder;
use engage_common::api::{CallerIdentity, ROLE_HEADER, USER_HEADER};
use engage_common::models::UserRole;
use engage_submission::ingest::SubmittedFile;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use uuid::Uuid;

pub const MULTIPART_BOUNDARY: &str = "engage-test-boundary";

pub fn staff() -> CallerIdentity {
    CallerIdentity::new(Uuid::new_v4(), UserRole::Staff)
}

pub fn admin() -> CallerIdentity {
    CallerIdentity::new(Uuid::new_v4(), UserRole::Admin)
}

pub fn public_user() -> CallerIdentity {
    CallerIdentity::new(Uuid::new_v4(), UserRole::Public)
}

/// Attach gateway identity headers to a request
pub fn with_identity(builder: Builder, caller: &CallerIdentity) -> Builder {
    builder
        .header(USER_HEADER, caller.user_id.to_string())
        .header(ROLE_HEADER, caller.role.as_str())
}

/// CSV upload from header and data lines
pub fn csv_file(name: &str, lines: &[&str]) -> SubmittedFile {
    let mut text = lines.join("\n");
    text.push('\n');
    SubmittedFile::new(name, text)
}

#[derive(Debug, Clone)]
pub enum XlsxCell {
    Text(&'static str),
    Number(f64),
    Date(u16, u8, u8),
    Blank,
}

/// Single-sheet workbook: header row then data rows
pub fn xlsx_file(name: &str, headers: &[&str], rows: &[Vec<XlsxCell>]) -> SubmittedFile {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    {
        let worksheet = workbook.add_worksheet();
        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            let excel_row = (r + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    XlsxCell::Text(text) => {
                        worksheet.write_string(excel_row, col, *text).unwrap();
                    }
                    XlsxCell::Number(value) => {
                        worksheet.write_number(excel_row, col, *value).unwrap();
                    }
                    XlsxCell::Date(year, month, day) => {
                        let date = ExcelDateTime::from_ymd(*year, *month, *day).unwrap();
                        worksheet
                            .write_datetime_with_format(excel_row, col, &date, &date_format)
                            .unwrap();
                    }
                    XlsxCell::Blank => {}
                }
            }
        }
    }
    let bytes = workbook.save_to_buffer().unwrap();
    SubmittedFile::new(name, bytes)
}

/// multipart/form-data body with a `file` part and optional `template_id`
pub fn multipart_body(filename: &str, bytes: &[u8], template_id: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(id) = template_id {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"template_id\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, id
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            MULTIPART_BOUNDARY, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

    body
}
