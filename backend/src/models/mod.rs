//! Domain models for the person registry.
//!
//! - [`RawRow`] - one uploaded row, header → cell, in file order
//! - [`Column`] - the known import columns and their accepted header spellings
//! - [`PersonCreationRequest`] - a validated, typed person
//! - [`Person`] - a stored person
//! - [`Address`], [`Sex`] - embedded value types

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Raw rows
// =============================================================================

/// One uploaded row: column header → raw cell value, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(IndexMap<String, String>);

impl RawRow {
    /// Build a row from headers and cell values.
    ///
    /// Missing trailing cells become empty strings; surplus cells are dropped.
    pub fn from_cells(headers: &[String], cells: Vec<String>) -> Self {
        let mut cells = cells.into_iter();
        let map = headers
            .iter()
            .map(|h| (h.clone(), cells.next().unwrap_or_default()))
            .collect();
        Self(map)
    }

    /// Exact lookup by header.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.0.get(header).map(String::as_str)
    }

    /// Tolerant lookup of a known column.
    ///
    /// Matches any accepted spelling of the column, ignoring case, accents
    /// and punctuation. Blank cells read as `None`.
    pub fn field(&self, column: Column) -> Option<&str> {
        self.0
            .iter()
            .find(|(header, _)| column.matches(header))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Like [`RawRow::field`], but returns the cell exactly as written.
    /// Whitespace-only cells still read as `None`.
    pub fn raw_field(&self, column: Column) -> Option<&str> {
        self.0
            .iter()
            .find(|(header, _)| column.matches(header))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Known import/export columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    Email,
    NationalId,
    BirthDate,
    Phone,
    PlaceOfBirth,
    Nationality,
    Sex,
    PostalCode,
    Street,
    Number,
    Complement,
    Neighborhood,
    City,
    State,
}

impl Column {
    /// All columns, in template order.
    pub const ALL: [Column; 15] = [
        Column::Name,
        Column::Email,
        Column::NationalId,
        Column::BirthDate,
        Column::Phone,
        Column::PlaceOfBirth,
        Column::Nationality,
        Column::Sex,
        Column::PostalCode,
        Column::Street,
        Column::Number,
        Column::Complement,
        Column::Neighborhood,
        Column::City,
        Column::State,
    ];

    /// Header written to templates and exports.
    pub fn header(self) -> &'static str {
        match self {
            Column::Name => "Nome",
            Column::Email => "Email",
            Column::NationalId => "CPF",
            Column::BirthDate => "DataNascimento",
            Column::Phone => "Telefone",
            Column::PlaceOfBirth => "Naturalidade",
            Column::Nationality => "Nacionalidade",
            Column::Sex => "Sexo",
            Column::PostalCode => "CEP",
            Column::Street => "Logradouro",
            Column::Number => "Numero",
            Column::Complement => "Complemento",
            Column::Neighborhood => "Bairro",
            Column::City => "Cidade",
            Column::State => "Estado",
        }
    }

    /// Accepted header spellings, already normalized.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Name => &["nome", "name", "nomecompleto", "fullname"],
            Column::Email => &["email", "correioeletronico"],
            Column::NationalId => &["cpf", "nationalid", "documento"],
            Column::BirthDate => &[
                "datanascimento",
                "datadenascimento",
                "nascimento",
                "birthdate",
                "dateofbirth",
            ],
            Column::Phone => &["telefone", "phone", "celular"],
            Column::PlaceOfBirth => &["naturalidade", "placeofbirth"],
            Column::Nationality => &["nacionalidade", "nationality"],
            Column::Sex => &["sexo", "sex", "genero", "gender"],
            Column::PostalCode => &["cep", "postalcode", "zipcode"],
            Column::Street => &["logradouro", "endereco", "rua", "street"],
            Column::Number => &["numero", "number"],
            Column::Complement => &["complemento", "complement"],
            Column::Neighborhood => &["bairro", "neighborhood"],
            Column::City => &["cidade", "municipio", "city"],
            Column::State => &["estado", "uf", "state"],
        }
    }

    /// Whether `header` is one of this column's spellings.
    pub fn matches(self, header: &str) -> bool {
        let key = normalize_header(header);
        self.aliases().contains(&key.as_str())
    }

    /// Whether the column must be filled for a row to be imported.
    pub fn is_required(self) -> bool {
        matches!(self, Column::Name | Column::NationalId | Column::BirthDate)
    }
}

/// Lowercase, strip accents and drop everything that is not a letter or digit.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .map(fold_accent)
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}

// =============================================================================
// Value types
// =============================================================================

/// Sex as recorded in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Masculino,
    Feminino,
    Outro,
}

impl Sex {
    /// Parse a sex code or name.
    ///
    /// Accepts the single-letter codes, the Portuguese and English names and
    /// the numeric codes 1–3, ignoring case and accents.
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_header(value).as_str() {
            "m" | "masculino" | "male" | "1" => Some(Sex::Masculino),
            "f" | "feminino" | "female" | "2" => Some(Sex::Feminino),
            "o" | "outro" | "other" | "3" => Some(Sex::Outro),
            _ => None,
        }
    }

    /// Single-letter code used in exports.
    pub fn code(self) -> &'static str {
        match self {
            Sex::Masculino => "M",
            Sex::Feminino => "F",
            Sex::Outro => "O",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sex::Masculino => "Masculino",
            Sex::Feminino => "Feminino",
            Sex::Outro => "Outro",
        };
        f.write_str(name)
    }
}

/// Embedded postal address. Every part is optional and unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Address {
    /// Copy the address columns of a row verbatim; `None` when all of them are blank.
    pub fn from_row(row: &RawRow) -> Option<Self> {
        let owned = |c: Column| row.raw_field(c).map(str::to_string);
        let address = Self {
            postal_code: owned(Column::PostalCode),
            street: owned(Column::Street),
            number: owned(Column::Number),
            complement: owned(Column::Complement),
            neighborhood: owned(Column::Neighborhood),
            city: owned(Column::City),
            state: owned(Column::State),
        };
        (!address.is_empty()).then_some(address)
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.postal_code,
            &self.street,
            &self.number,
            &self.complement,
            &self.neighborhood,
            &self.city,
            &self.state,
        ]
        .iter()
        .all(|part| part.is_none())
    }
}

// =============================================================================
// Persons
// =============================================================================

/// A validated person, ready to be stored.
///
/// `national_id` holds the 11 CPF digits without punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonCreationRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub national_id: String,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub address: Option<Address>,
}

/// A stored person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub national_id: String,
    pub birth_date: NaiveDate,
    pub phone: Option<String>,
    pub place_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub sex: Option<Sex>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// New person with a fresh id.
    pub fn new(request: PersonCreationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            email: request.email,
            national_id: request.national_id,
            birth_date: request.birth_date,
            phone: request.phone,
            place_of_birth: request.place_of_birth,
            nationality: request.nationality,
            sex: request.sex,
            address: request.address,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every editable field, keeping id and creation time.
    pub fn apply(&mut self, request: PersonCreationRequest) {
        self.name = request.name;
        self.email = request.email;
        self.national_id = request.national_id;
        self.birth_date = request.birth_date;
        self.phone = request.phone;
        self.place_of_birth = request.place_of_birth;
        self.nationality = request.nationality;
        self.sex = request.sex;
        self.address = request.address;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_row_pads_missing_cells() {
        let row = RawRow::from_cells(&headers(&["a", "b", "c"]), vec!["1".into()]);
        assert_eq!(row.get("a"), Some("1"));
        assert_eq!(row.get("b"), Some(""));
        assert_eq!(row.get("c"), Some(""));
    }

    #[test]
    fn test_row_drops_surplus_cells() {
        let row = RawRow::from_cells(
            &headers(&["a"]),
            vec!["1".into(), "2".into(), "3".into()],
        );
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_field_lookup_is_tolerant() {
        let row: RawRow = [
            ("NOME", " Ana "),
            ("Data de Nascimento", "1990-01-01"),
            ("e-mail", ""),
        ]
        .into_iter()
        .collect();

        assert_eq!(row.field(Column::Name), Some("Ana"));
        assert_eq!(row.field(Column::BirthDate), Some("1990-01-01"));
        assert_eq!(row.field(Column::Email), None);
        assert_eq!(row.field(Column::NationalId), None);
    }

    #[test]
    fn test_accented_headers() {
        assert!(Column::Number.matches("Número"));
        assert!(Column::Nationality.matches("Nacionalidade"));
        assert!(Column::City.matches("Município"));
    }

    #[test]
    fn test_row_serializes_in_header_order() {
        let row: RawRow = [("Nome", "Ana"), ("CPF", "1"), ("Email", "")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Nome":"Ana","CPF":"1","Email":""}"#);
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("m"), Some(Sex::Masculino));
        assert_eq!(Sex::parse("Feminino"), Some(Sex::Feminino));
        assert_eq!(Sex::parse("3"), Some(Sex::Outro));
        assert_eq!(Sex::parse("X"), None);
    }

    #[test]
    fn test_address_absent_when_blank() {
        let row: RawRow = [("Nome", "Ana"), ("CEP", " ")].into_iter().collect();
        assert!(Address::from_row(&row).is_none());

        let row: RawRow = [("Cidade", "Recife")].into_iter().collect();
        let address = Address::from_row(&row).unwrap();
        assert_eq!(address.city.as_deref(), Some("Recife"));
    }

    #[test]
    fn test_address_copied_verbatim() {
        let row: RawRow = [("Complemento", " Apto 12 "), ("Cidade", "Recife")]
            .into_iter()
            .collect();
        let address = Address::from_row(&row).unwrap();
        assert_eq!(address.complement.as_deref(), Some(" Apto 12 "));
        assert_eq!(row.field(Column::Complement), Some("Apto 12"));
    }
}
