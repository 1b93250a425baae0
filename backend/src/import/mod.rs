//! Bulk person import.
//!
//! Combines the upload normalizer, the row validator and the person store:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ CSV / XLSX  │────▶│  Normalizer │────▶│  Validator  │────▶│ create person│
//! │   bytes     │     │ (RawRow[])  │     │ (per row)   │     │  or RowError │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────────────┘
//! ```
//!
//! Rows are processed strictly in file order: CPF duplicate detection and
//! line numbers both depend on what came before.
//!
//! # Example
//!
//! ```rust,ignore
//! use cadastro::import::{import_bytes, ImportOptions};
//!
//! let result = import_bytes(&bytes, Some("people.csv"), ImportOptions::default(), &service).await;
//! println!("{} of {} imported", result.success, result.total);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::logs::{log_error, log_info, log_row_error, log_success, log_warning};
use crate::error::{ImportError, RowRejection, StoreResult};
use crate::models::{PersonCreationRequest, RawRow};
use crate::parser::{parse_file, parse_upload};
use crate::validation::{validate_row, CpfLedger, PersonDirectory};

/// Line number of the first data row (the header is line 1).
pub const FIRST_DATA_LINE: usize = 2;

/// How many row errors are echoed to the log stream per import.
const LOGGED_ERRORS: usize = 5;

/// Creates a validated person.
#[async_trait]
pub trait PersonCreator: Send + Sync {
    async fn create_person(&self, request: PersonCreationRequest) -> StoreResult<()>;
}

/// Failure policy for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportMode {
    /// Keep every valid row, report the rest.
    #[default]
    BestEffort,
    /// Validate everything first; commit nothing if any row is invalid.
    Strict,
}

impl ImportMode {
    /// Map the upload's `partialImport` flag (true = best effort).
    pub fn from_partial_flag(partial: bool) -> Self {
        if partial {
            Self::BestEffort
        } else {
            Self::Strict
        }
    }
}

/// Options for an import
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImportOptions {
    pub mode: ImportMode,
}

impl ImportOptions {
    pub fn strict() -> Self {
        Self {
            mode: ImportMode::Strict,
        }
    }
}

/// A rejected row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based file line; 0 for whole-file failures
    pub line: usize,
    pub message: String,
    /// The row as uploaded, for the corrected-rows export
    pub original_values: RawRow,
}

impl RowError {
    pub fn new(line: usize, message: impl Into<String>, original_values: RawRow) -> Self {
        Self {
            line,
            message: message.into(),
            original_values,
        }
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Data rows found in the file
    pub total: usize,
    /// Persons created
    pub success: usize,
    /// Rows rejected
    pub errors: usize,
    /// One entry per rejected row, in file order
    pub details: Vec<RowError>,
}

impl ImportResult {
    fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// A file that could not be processed at all: one line-0 error, nothing counted.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            total: 0,
            success: 0,
            errors: 1,
            details: vec![RowError::new(0, message, RawRow::default())],
        }
    }

    /// `total == 0 && errors >= 1` means the file itself was rejected.
    pub fn is_fatal(&self) -> bool {
        self.total == 0 && self.errors >= 1
    }

    /// Every row was either imported or rejected.
    pub fn is_complete(&self) -> bool {
        self.success + self.errors == self.total
    }

    fn reject(&mut self, error: RowError) {
        self.errors += 1;
        self.details.push(error);
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Import an upload; unreadable files become [`ImportResult::fatal`].
pub async fn import_bytes<S>(
    bytes: &[u8],
    file_name: Option<&str>,
    options: ImportOptions,
    people: &S,
) -> ImportResult
where
    S: PersonDirectory + PersonCreator + ?Sized,
{
    match try_import_bytes(bytes, file_name, options, people).await {
        Ok(result) => result,
        Err(e) => {
            log_error(e.to_string());
            ImportResult::fatal(e.to_string())
        }
    }
}

/// Import an upload, returning whole-file failures as errors.
pub async fn try_import_bytes<S>(
    bytes: &[u8],
    file_name: Option<&str>,
    options: ImportOptions,
    people: &S,
) -> Result<ImportResult, ImportError>
where
    S: PersonDirectory + PersonCreator + ?Sized,
{
    log_info(format!(
        "📖 Reading {} ({} bytes)...",
        file_name.unwrap_or("upload"),
        bytes.len()
    ));
    let sheet = parse_upload(bytes, file_name)?;
    log_success(format!(
        "{} rows, {} columns ({})",
        sheet.rows.len(),
        sheet.headers.len(),
        sheet.encoding
    ));

    Ok(import_rows(sheet.rows, options, people).await)
}

/// Import a file on disk.
pub async fn import_file<S>(
    path: &Path,
    options: ImportOptions,
    people: &S,
) -> Result<ImportResult, ImportError>
where
    S: PersonDirectory + PersonCreator + ?Sized,
{
    let sheet = parse_file(path)?;
    Ok(import_rows(sheet.rows, options, people).await)
}

/// Import already-normalized rows.
pub async fn import_rows<S>(rows: Vec<RawRow>, options: ImportOptions, people: &S) -> ImportResult
where
    S: PersonDirectory + PersonCreator + ?Sized,
{
    let result = match options.mode {
        ImportMode::BestEffort => {
            log_info("⚙️  Importing row by row (partial import allowed)...");
            import_best_effort(&rows, people).await
        }
        ImportMode::Strict => {
            log_info("⚙️  Validating all rows before importing...");
            import_strict(&rows, people).await
        }
    };

    print_summary(&result);
    result
}

// =============================================================================
// Modes
// =============================================================================

/// Validate and create each row in turn; failures are recorded and skipped.
async fn import_best_effort<S>(rows: &[RawRow], people: &S) -> ImportResult
where
    S: PersonDirectory + PersonCreator + ?Sized,
{
    let mut result = ImportResult::with_total(rows.len());
    let mut ledger = CpfLedger::new();

    for (line, row) in numbered(rows) {
        let outcome = match validate_row(row, &mut ledger, people).await {
            Ok(request) => create(people, request).await,
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(()) => result.success += 1,
            Err(reason) => result.reject(RowError::new(line, reason.to_string(), row.clone())),
        }
    }

    result
}

/// Validate every row without creating anything; commit only a clean batch.
///
/// During the commit pass the first creation failure stops the batch, so
/// the result may cover fewer than `total` rows.
async fn import_strict<S>(rows: &[RawRow], people: &S) -> ImportResult
where
    S: PersonDirectory + PersonCreator + ?Sized,
{
    let mut result = ImportResult::with_total(rows.len());
    let mut ledger = CpfLedger::new();
    let mut accepted = Vec::with_capacity(rows.len());

    for (line, row) in numbered(rows) {
        match validate_row(row, &mut ledger, people).await {
            Ok(request) => accepted.push((line, row, request)),
            Err(reason) => result.reject(RowError::new(line, reason.to_string(), row.clone())),
        }
    }

    if result.errors > 0 {
        log_warning(format!(
            "{} invalid rows, nothing imported",
            result.errors
        ));
        return result;
    }

    for (line, row, request) in accepted {
        if let Err(reason) = create(people, request).await {
            result.reject(RowError::new(line, reason.to_string(), row.clone()));
            log_warning(format!("Import stopped at line {}", line));
            break;
        }
        result.success += 1;
    }

    result
}

async fn create<S>(people: &S, request: PersonCreationRequest) -> Result<(), RowRejection>
where
    S: PersonCreator + ?Sized,
{
    people
        .create_person(request)
        .await
        .map_err(|e| RowRejection::Creation(e.to_string()))
}

fn numbered(rows: &[RawRow]) -> impl Iterator<Item = (usize, &RawRow)> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| (i + FIRST_DATA_LINE, row))
}

fn print_summary(result: &ImportResult) {
    if result.errors == 0 {
        log_success(format!("All {} rows imported", result.success));
        return;
    }

    log_success(format!("Imported: {}", result.success));
    log_error(format!("Rejected: {}", result.errors));
    for error in result.details.iter().take(LOGGED_ERRORS) {
        log_row_error(error.line, error.message.clone());
    }
    if !result.is_complete() {
        log_warning(format!(
            "{} rows were not processed",
            result.total - result.success - result.errors
        ));
    }
}
