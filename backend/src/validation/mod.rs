//! Row validation for person imports.
//!
//! Turns one [`RawRow`] into a [`PersonCreationRequest`] or a
//! [`RowRejection`]. Checks run in a fixed order and the first failure wins:
//!
//! 1. name present
//! 2. CPF present
//! 3. CPF checksum ([`cpf`])
//! 4. CPF not already stored ([`PersonDirectory`])
//! 5. CPF not already accepted earlier in the same file ([`CpfLedger`])
//! 6. birth date present
//! 7. birth date in an accepted layout ([`date`])
//! 8. email, if given, contains `@`
//! 9. sex, if given, is a known code
//!
//! # Example
//!
//! ```rust,ignore
//! use cadastro::validation::{validate_row, CpfLedger};
//!
//! let mut ledger = CpfLedger::new();
//! match validate_row(&row, &mut ledger, &directory).await {
//!     Ok(request) => println!("ok: {}", request.name),
//!     Err(reason) => println!("rejected: {}", reason),
//! }
//! ```

pub mod cpf;
pub mod date;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::{RowRejection, StoreResult};
use crate::models::{Address, Column, PersonCreationRequest, RawRow, Sex};

pub use cpf::{format_cpf, is_valid_cpf, normalize_cpf};
pub use date::{parse_birth_date, ACCEPTED_DATE_FORMATS};

/// Lookup of CPFs that are already stored.
#[async_trait]
pub trait PersonDirectory: Send + Sync {
    /// `national_id` is the normalized 11-digit CPF.
    async fn exists_by_national_id(&self, national_id: &str) -> StoreResult<bool>;
}

/// CPFs accepted so far in one import. Lives for a single batch.
#[derive(Debug, Default)]
pub struct CpfLedger {
    seen: HashSet<String>,
}

impl CpfLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, national_id: &str) -> bool {
        self.seen.contains(national_id)
    }

    /// Returns `false` if the CPF was already registered.
    pub fn register(&mut self, national_id: impl Into<String>) -> bool {
        self.seen.insert(national_id.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Validate one row. On success the CPF is added to `ledger`.
pub async fn validate_row<D>(
    row: &RawRow,
    ledger: &mut CpfLedger,
    directory: &D,
) -> Result<PersonCreationRequest, RowRejection>
where
    D: PersonDirectory + ?Sized,
{
    let name = row.field(Column::Name).ok_or(RowRejection::NameRequired)?;

    let raw_cpf = row
        .field(Column::NationalId)
        .ok_or(RowRejection::NationalIdRequired)?;

    let national_id = normalize_cpf(raw_cpf)
        .filter(|_| is_valid_cpf(raw_cpf))
        .ok_or_else(|| RowRejection::InvalidNationalId(raw_cpf.to_string()))?;

    let registered = directory
        .exists_by_national_id(&national_id)
        .await
        .map_err(|e| RowRejection::Lookup(e.to_string()))?;
    if registered {
        return Err(RowRejection::NationalIdRegistered(raw_cpf.to_string()));
    }

    if ledger.contains(&national_id) {
        return Err(RowRejection::DuplicateNationalId(raw_cpf.to_string()));
    }

    let raw_birth = row
        .field(Column::BirthDate)
        .ok_or(RowRejection::BirthDateRequired)?;
    let birth_date = parse_birth_date(raw_birth)
        .ok_or_else(|| RowRejection::InvalidBirthDate(raw_birth.to_string()))?;

    let email = row.field(Column::Email);
    if let Some(email) = email {
        if !email.contains('@') {
            return Err(RowRejection::InvalidEmail(email.to_string()));
        }
    }

    let sex = match row.field(Column::Sex) {
        Some(code) => {
            Some(Sex::parse(code).ok_or_else(|| RowRejection::InvalidSex(code.to_string()))?)
        }
        None => None,
    };

    ledger.register(national_id.clone());

    let owned = |c: Column| row.field(c).map(str::to_string);
    Ok(PersonCreationRequest {
        name: name.to_string(),
        email: email.map(str::to_string),
        national_id,
        birth_date,
        phone: owned(Column::Phone),
        place_of_birth: owned(Column::PlaceOfBirth),
        nationality: owned(Column::Nationality),
        sex,
        address: Address::from_row(row),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::NaiveDate;

    /// Directory with a fixed set of stored CPFs.
    struct Stored(Vec<&'static str>);

    #[async_trait]
    impl PersonDirectory for Stored {
        async fn exists_by_national_id(&self, national_id: &str) -> StoreResult<bool> {
            Ok(self.0.contains(&national_id))
        }
    }

    struct Offline;

    #[async_trait]
    impl PersonDirectory for Offline {
        async fn exists_by_national_id(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().copied().collect()
    }

    fn ana() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Nome", "Ana"),
            ("Email", "ana@x.com"),
            ("CPF", "111.444.777-35"),
            ("DataNascimento", "1990-01-01"),
        ]
    }

    async fn check(pairs: &[(&str, &str)]) -> Result<PersonCreationRequest, RowRejection> {
        validate_row(&row(pairs), &mut CpfLedger::new(), &Stored(vec![])).await
    }

    #[tokio::test]
    async fn test_valid_row() {
        let mut pairs = ana();
        pairs.extend([("Sexo", "F"), ("Cidade", "Recife"), ("Telefone", "81 99999-0000")]);

        let mut ledger = CpfLedger::new();
        let request = validate_row(&row(&pairs), &mut ledger, &Stored(vec![]))
            .await
            .unwrap();

        assert_eq!(request.name, "Ana");
        assert_eq!(request.national_id, "11144477735");
        assert_eq!(request.birth_date, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        assert_eq!(request.sex, Some(Sex::Feminino));
        assert_eq!(request.phone.as_deref(), Some("81 99999-0000"));
        assert_eq!(request.address.unwrap().city.as_deref(), Some("Recife"));
        assert!(ledger.contains("11144477735"));
    }

    #[tokio::test]
    async fn test_name_required() {
        let err = check(&[("Nome", "  "), ("CPF", "")]).await.unwrap_err();
        assert_eq!(err, RowRejection::NameRequired);
    }

    #[tokio::test]
    async fn test_national_id_required() {
        let err = check(&[("Nome", "Ana"), ("DataNascimento", "x")]).await.unwrap_err();
        assert_eq!(err, RowRejection::NationalIdRequired);
    }

    #[tokio::test]
    async fn test_invalid_national_id() {
        let err = check(&[("Nome", "Ana"), ("CPF", "123.456.789-00")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid national ID: '123.456.789-00'");
    }

    #[tokio::test]
    async fn test_already_registered() {
        let err = validate_row(&row(&ana()), &mut CpfLedger::new(), &Stored(vec!["11144477735"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RowRejection::NationalIdRegistered("111.444.777-35".into())
        );
    }

    #[tokio::test]
    async fn test_duplicate_in_file_across_punctuation() {
        let mut ledger = CpfLedger::new();
        ledger.register("11144477735");

        let err = validate_row(&row(&ana()), &mut ledger, &Stored(vec![]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate national ID in file"));
    }

    #[tokio::test]
    async fn test_store_check_precedes_ledger_check() {
        let mut ledger = CpfLedger::new();
        ledger.register("11144477735");

        let err = validate_row(&row(&ana()), &mut ledger, &Stored(vec!["11144477735"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RowRejection::NationalIdRegistered(_)));
    }

    #[tokio::test]
    async fn test_birth_date_checks() {
        let err = check(&[("Nome", "Ana"), ("CPF", "11144477735")]).await.unwrap_err();
        assert_eq!(err, RowRejection::BirthDateRequired);

        let err = check(&[
            ("Nome", "Ana"),
            ("CPF", "11144477735"),
            ("DataNascimento", "01-1990-01"),
        ])
        .await
        .unwrap_err();
        assert_eq!(err, RowRejection::InvalidBirthDate("01-1990-01".into()));
    }

    #[tokio::test]
    async fn test_invalid_email() {
        let mut pairs = ana();
        pairs[1] = ("Email", "ana.x.com");
        let err = check(&pairs).await.unwrap_err();
        assert_eq!(err, RowRejection::InvalidEmail("ana.x.com".into()));
    }

    #[tokio::test]
    async fn test_invalid_sex() {
        let mut pairs = ana();
        pairs.push(("Sexo", "Z"));
        let err = check(&pairs).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid sex value: 'Z'");
    }

    #[tokio::test]
    async fn test_rejected_row_not_registered() {
        let mut pairs = ana();
        pairs[1] = ("Email", "bad");
        let mut ledger = CpfLedger::new();

        assert!(validate_row(&row(&pairs), &mut ledger, &Stored(vec![])).await.is_err());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_rejects_row() {
        let err = validate_row(&row(&ana()), &mut CpfLedger::new(), &Offline)
            .await
            .unwrap_err();
        assert!(matches!(err, RowRejection::Lookup(_)));
    }
}
