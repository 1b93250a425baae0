//! # Cadastro - person registry with bulk CSV/Excel import
//!
//! CRUD for person records (with embedded address) plus a bulk import that
//! validates every row and reports the rejected ones.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Parser    │────▶│ Validation  │────▶│   People    │
//! │   upload    │     │  (RawRow)   │     │ (CPF, date) │     │ (store+cache│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                              ▲                  │
//!                              └──── Export ◀─────┘ (rejected rows, template)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadastro::{import_bytes, ImportOptions, PersonService};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let people = PersonService::in_memory(Duration::from_secs(300));
//!     let bytes = std::fs::read("pessoas.csv").unwrap();
//!     let result = import_bytes(&bytes, Some("pessoas.csv"), ImportOptions::default(), &people).await;
//!     println!("Imported {} of {}", result.success, result.total);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Domain models (RawRow, Person, Address, Sex)
//! - [`parser`] - CSV / spreadsheet normalization
//! - [`validation`] - CPF checksum, birth dates, row validation
//! - [`import`] - Batch import orchestration
//! - [`export`] - Template, rejected rows and person CSV
//! - [`people`] - Person CRUD service and repository
//! - [`cache`] - TTL key/value cache
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod config;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Import / export
pub mod import;
pub mod export;

// Storage
pub mod people;
pub mod cache;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CacheError,
    ConfigError,
    ExportError,
    ImportError,
    ParseError,
    RowRejection,
    ServerError,
    StoreError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Address,
    Column,
    Person,
    PersonCreationRequest,
    RawRow,
    Sex,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content,
    parse_csv_bytes,
    parse_csv_str,
    parse_file,
    parse_spreadsheet,
    parse_upload,
    split_csv_line,
    ParsedSheet,
    SourceFormat,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    format_cpf,
    is_valid_cpf,
    normalize_cpf,
    parse_birth_date,
    validate_row,
    CpfLedger,
    PersonDirectory,
};

// =============================================================================
// Re-exports - Import / export
// =============================================================================

pub use import::{
    import_bytes,
    import_file,
    import_rows,
    try_import_bytes,
    ImportMode,
    ImportOptions,
    ImportResult,
    PersonCreator,
    RowError,
};

pub use export::{export_error_rows, export_people, generate_template};

// =============================================================================
// Re-exports - Storage
// =============================================================================

pub use people::{
    ListQuery,
    MemoryPersonRepository,
    Page,
    PersonRepository,
    PersonService,
};

pub use cache::{CacheStore, JsonCache, MemoryCache};

pub use config::Config;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
