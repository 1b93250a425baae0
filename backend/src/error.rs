//! Error types for the person registry.
//!
//! This module defines one error type per layer:
//!
//! - [`ParseError`] - unreadable uploads (fatal for an import)
//! - [`RowRejection`] - why a single imported row was refused
//! - [`StoreError`] - person repository and service failures
//! - [`CacheError`] - cache backend and serialization failures
//! - [`ExportError`] - CSV rendering failures
//! - [`ImportError`] - top-level import failures
//! - [`ConfigError`] - environment configuration problems
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Upload Parsing Errors
// =============================================================================

/// Errors while turning an uploaded file into rows.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing to read.
    #[error("File is empty")]
    EmptyFile,

    /// The first line carries no column names.
    #[error("No header row found")]
    NoHeaders,

    /// The workbook could not be opened or has no worksheet.
    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    /// Extension is neither CSV nor a spreadsheet.
    #[error("Unsupported file type: {0} (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),
}

// =============================================================================
// Row Rejections
// =============================================================================

/// Reason a single row was not imported.
///
/// The `Display` text is what ends up in the import report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("Name is required")]
    NameRequired,

    #[error("National ID is required")]
    NationalIdRequired,

    #[error("Invalid national ID: '{0}'")]
    InvalidNationalId(String),

    #[error("National ID already registered: {0}")]
    NationalIdRegistered(String),

    #[error("Duplicate national ID in file: {0}")]
    DuplicateNationalId(String),

    #[error("Birth date is required")]
    BirthDateRequired,

    #[error("Invalid birth date: '{0}'")]
    InvalidBirthDate(String),

    #[error("Invalid email: '{0}'")]
    InvalidEmail(String),

    #[error("Invalid sex value: '{0}'")]
    InvalidSex(String),

    /// The duplicate lookup itself failed.
    #[error("Could not check national ID: {0}")]
    Lookup(String),

    /// The person store refused the record.
    #[error("Could not create person: {0}")]
    Creation(String),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the person repository and service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No person with that id.
    #[error("Person not found: {0}")]
    NotFound(String),

    /// Unique CPF constraint.
    #[error("National ID already registered: {0}")]
    DuplicateNationalId(String),

    /// Domain validation failed.
    #[error("Invalid value for field '{field}': {message}")]
    Invalid { field: String, message: String },

    /// Backend could not be reached.
    #[error("Person store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors from the key/value cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Value could not be (de)serialized.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend failure.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while rendering CSV output.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Failures that abort a whole import.
///
/// Per-row problems never show up here; they are collected as
/// [`crate::import::RowError`] entries instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Upload could not be parsed.
    #[error("Could not process file: {0}")]
    Parse(#[from] ParseError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: String, value: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP layer errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Import error.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Store error.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for upload parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
