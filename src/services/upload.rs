//! Term lists from uploaded files.

use std::io::Cursor;

use axum::extract::Multipart;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

use crate::response::AppError;
use crate::validation::clean_terms;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("could not read spreadsheet: {0}")]
    Spreadsheet(String),
    #[error("file is not valid UTF-8 text")]
    Encoding,
    #[error("no valid words found in the file")]
    NoValidWords,
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        let code = match value {
            UploadError::Unsupported(_) => "UNSUPPORTED_FILE",
            UploadError::NoValidWords => "NO_VALID_WORDS",
            UploadError::Spreadsheet(_) | UploadError::Encoding => "INVALID_FILE",
        };
        AppError::bad_request(code, &value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Spreadsheet,
}

fn detect_kind(filename: &str, content_type: &str) -> Option<FileKind> {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if content_type == XLSX_CONTENT_TYPE || extension == "xlsx" {
        return Some(FileKind::Spreadsheet);
    }
    if matches!(content_type.as_str(), "text/plain" | "text/csv")
        || matches!(extension.as_str(), "txt" | "csv")
    {
        return Some(FileKind::Text);
    }
    None
}

/// Cleaned, de-duplicated, lower-cased terms from a text or `.xlsx` upload.
pub fn parse_term_file(filename: &str, content_type: &str, bytes: &[u8]) -> Result<Vec<String>, UploadError> {
    let raw = match detect_kind(filename, content_type) {
        Some(FileKind::Text) => text_terms(bytes)?,
        Some(FileKind::Spreadsheet) => spreadsheet_terms(bytes)?,
        None => {
            let shown = if content_type.is_empty() { filename } else { content_type };
            return Err(UploadError::Unsupported(shown.to_string()));
        }
    };

    let terms = clean_terms(raw);
    if terms.is_empty() {
        return Err(UploadError::NoValidWords);
    }
    Ok(terms)
}

fn text_terms(bytes: &[u8]) -> Result<Vec<String>, UploadError> {
    let text = std::str::from_utf8(bytes).map_err(|_| UploadError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(text
        .split(|c: char| c == '\n' || c == '\r' || c == ',')
        .map(str::to_string)
        .collect())
}

fn spreadsheet_terms(bytes: &[u8]) -> Result<Vec<String>, UploadError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e: calamine::XlsxError| UploadError::Spreadsheet(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(UploadError::Spreadsheet(e.to_string())),
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .flat_map(|row| row.iter())
        .filter_map(|cell| match cell {
            Data::String(s) => Some(s.clone()),
            Data::Int(i) => Some(i.to_string()),
            Data::Float(f) => Some(f.to_string()),
            _ => None,
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub subject: Option<String>,
}

impl UploadForm {
    /// Reads a `file` part and an optional `subject` text part; other parts are ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!(error = %e, "multipart read failed");
            AppError::bad_request("INVALID_MULTIPART", &e.body_text())
        })? {
            match field.name() {
                Some("file") => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::bad_request("INVALID_MULTIPART", &e.body_text()))?;
                    form.file = Some(UploadedFile {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                Some("subject") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::bad_request("INVALID_MULTIPART", &e.body_text()))?;
                    form.subject = Some(text.trim().to_string()).filter(|s| !s.is_empty());
                }
                _ => {}
            }
        }
        Ok(form)
    }

    pub fn terms(&self) -> Result<Vec<String>, AppError> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| AppError::bad_request("VALIDATION_ERROR", "A file is required"))?;
        Ok(parse_term_file(&file.filename, &file.content_type, &file.bytes)?)
    }

    pub fn require_subject(&self) -> Result<&str, AppError> {
        self.subject
            .as_deref()
            .ok_or_else(|| AppError::bad_request("VALIDATION_ERROR", "Subject and file are required"))
    }
}
