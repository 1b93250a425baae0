//! Upload normalizer: CSV and spreadsheets into the same row list.
//!
//! Both input formats end up as a [`ParsedSheet`]: the header row plus one
//! [`RawRow`] per populated data line, so a single validation path serves
//! both. Spreadsheet cells in the CPF column that were typed as numbers get
//! their leading zeros back; nothing else here knows about persons.

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::io::Cursor;
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::models::{Column, RawRow};

/// Lines starting with this marker are template notes, not data.
pub const NOTE_MARKER: char = '#';

/// Result of normalizing an upload
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    /// Column headers, in file order
    pub headers: Vec<String>,
    /// Populated data rows, in file order
    pub rows: Vec<RawRow>,
    /// Encoding the text was decoded with (`"utf-8"`, `"windows-1252"`, or `"xlsx"`)
    pub encoding: &'static str,
}

/// Kind of upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// Pick the format from a file name extension.
    pub fn from_file_name(name: &str) -> ParseResult<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(Self::Spreadsheet),
            _ => Err(ParseError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Guess the format from the leading bytes (zip or OLE2 container → spreadsheet).
    pub fn sniff(bytes: &[u8]) -> Self {
        const ZIP: &[u8] = b"PK\x03\x04";
        const OLE2: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

        if bytes.starts_with(ZIP) || bytes.starts_with(OLE2) {
            Self::Spreadsheet
        } else {
            Self::Csv
        }
    }
}

/// Normalize an upload, choosing the parser from the file name when given.
pub fn parse_upload(bytes: &[u8], file_name: Option<&str>) -> ParseResult<ParsedSheet> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let format = match file_name {
        Some(name) => SourceFormat::from_file_name(name)?,
        None => SourceFormat::sniff(bytes),
    };

    match format {
        SourceFormat::Csv => parse_csv_bytes(bytes),
        SourceFormat::Spreadsheet => parse_spreadsheet(bytes),
    }
}

/// Normalize a file on disk.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<ParsedSheet> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    parse_upload(&bytes, name)
}

// =============================================================================
// CSV
// =============================================================================

/// Decode bytes as UTF-8 (BOM stripped), falling back to Windows-1252.
pub fn decode_content(bytes: &[u8]) -> (String, &'static str) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), "utf-8"),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            (text.into_owned(), "windows-1252")
        }
    }
}

/// Parse CSV bytes.
pub fn parse_csv_bytes(bytes: &[u8]) -> ParseResult<ParsedSheet> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }
    let (content, encoding) = decode_content(bytes);
    let mut sheet = parse_csv_str(&content)?;
    sheet.encoding = encoding;
    Ok(sheet)
}

/// Parse CSV text. Line 1 is the header row.
///
/// # Example
/// ```ignore
/// use cadastro::parser::parse_csv_str;
///
/// let sheet = parse_csv_str("Nome,CPF\nAna,11144477735").unwrap();
/// assert_eq!(sheet.rows.len(), 1);
/// assert_eq!(sheet.rows[0].get("Nome"), Some("Ana"));
/// ```
pub fn parse_csv_str(content: &str) -> ParseResult<ParsedSheet> {
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    // `lines()` splits on both "\n" and "\r\n"
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());

    let header_line = lines.next().ok_or(ParseError::EmptyFile)?;
    let headers = split_csv_line(header_line);

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let rows = lines
        .map(split_csv_line)
        .filter(|cells| !is_blank(cells) && !is_note(cells))
        .map(|cells| RawRow::from_cells(&headers, cells))
        .collect();

    Ok(ParsedSheet {
        headers,
        rows,
        encoding: "utf-8",
    })
}

/// Split one CSV line on commas, honouring double-quoted sections.
///
/// A `"` toggles the quoted state and is dropped; commas inside quotes are
/// kept. Cells are trimmed.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());

    cells
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.is_empty())
}

fn is_note(cells: &[String]) -> bool {
    cells
        .first()
        .is_some_and(|first| first.starts_with(NOTE_MARKER))
}

// =============================================================================
// Spreadsheets
// =============================================================================

/// Parse the first worksheet of an `.xlsx`/`.xls`/`.ods` workbook.
pub fn parse_spreadsheet(bytes: &[u8]) -> ParseResult<ParsedSheet> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Spreadsheet("no worksheet found".to_string()))?
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let mut lines = range.rows();

    let headers = lines
        .by_ref()
        .map(|row| render_row(row, None))
        .find(|cells| !is_blank(cells))
        .ok_or(ParseError::EmptyFile)?;
    let national_id = headers.iter().position(|h| Column::NationalId.matches(h));

    let rows = lines
        .map(|row| render_row(row, national_id))
        .filter(|cells| !is_blank(cells) && !is_note(cells))
        .map(|cells| RawRow::from_cells(&headers, cells))
        .collect();

    Ok(ParsedSheet {
        headers,
        rows,
        encoding: "xlsx",
    })
}

fn render_row(row: &[Data], national_id: Option<usize>) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(i, cell)| {
            if Some(i) == national_id {
                national_id_cell(cell)
            } else {
                cell_to_string(cell)
            }
        })
        .collect()
}

/// A CPF typed as a number loses its leading zeros; put them back.
fn national_id_cell(cell: &Data) -> String {
    let text = cell_to_string(cell);
    let numeric = matches!(cell, Data::Int(_) | Data::Float(_));

    if numeric && (9..11).contains(&text.len()) && text.bytes().all(|b| b.is_ascii_digit()) {
        format!("{:0>11}", text)
    } else {
        text
    }
}

/// Render a cell the way it would appear in an equivalent CSV.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // CPF and phone columns are often typed as numbers
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string().trim().to_string(),
    }
}
