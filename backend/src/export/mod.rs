//! CSV output: import template, rejected-row report and person export.
//!
//! All three use the import column headers, so anything written here can be
//! corrected by hand and uploaded again.

use indexmap::IndexSet;

use crate::error::{ExportError, ExportResult};
use crate::import::ImportResult;
use crate::models::{Column, Person};
use crate::parser::NOTE_MARKER;
use crate::validation::format_cpf;

/// Extra columns appended to the rejected-row report.
pub const LINE_COLUMN: &str = "Linha";
pub const ERROR_COLUMN: &str = "Erro";

/// Example row written under the template header, in [`Column::ALL`] order.
const EXAMPLE_ROW: [&str; 15] = [
    "Maria da Silva",
    "maria@exemplo.com",
    "529.982.247-25",
    "1990-05-20",
    "(11) 98765-4321",
    "São Paulo",
    "Brasileira",
    "F",
    "01310-100",
    "Avenida Paulista",
    "1000",
    "Apto 12",
    "Bela Vista",
    "São Paulo",
    "SP",
];

/// Import template: header, one example row and one `#` notes row.
pub fn generate_template() -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(Column::ALL.iter().map(|c| c.header()))?;
    writer.write_record(EXAMPLE_ROW)?;

    let notes: Vec<String> = Column::ALL
        .iter()
        .enumerate()
        .map(|(i, &column)| {
            let note = column_note(column);
            if i == 0 {
                format!("{} {}", NOTE_MARKER, note)
            } else {
                note.to_string()
            }
        })
        .collect();
    writer.write_record(&notes)?;

    finish(writer)
}

fn column_note(column: Column) -> &'static str {
    match column {
        Column::NationalId => "obrigatório (11 dígitos)",
        Column::BirthDate => "obrigatório (AAAA-MM-DD ou DD/MM/AAAA)",
        Column::Sex => "opcional (M / F / O)",
        Column::Email => "opcional (deve conter @)",
        c if c.is_required() => "obrigatório",
        _ => "opcional",
    }
}

/// Rejected rows as uploaded, plus the line and the reason.
///
/// Columns are the union of the rows' headers in first-seen order. The
/// line-0 entry of a fatal result has no values and is written as such.
pub fn export_error_rows(result: &ImportResult) -> ExportResult<Vec<u8>> {
    let headers: IndexSet<&str> = result
        .details
        .iter()
        .flat_map(|d| d.original_values.headers())
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());

    let header_row: Vec<&str> = headers
        .iter()
        .copied()
        .chain([LINE_COLUMN, ERROR_COLUMN])
        .collect();
    writer.write_record(&header_row)?;

    for detail in &result.details {
        let line = detail.line.to_string();
        let record: Vec<&str> = headers
            .iter()
            .map(|h| detail.original_values.get(h).unwrap_or(""))
            .chain([line.as_str(), detail.message.as_str()])
            .collect();
        writer.write_record(&record)?;
    }

    finish(writer)
}

/// Stored persons in template layout, preceded by an `Id` column.
pub fn export_people(people: &[Person]) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(std::iter::once("Id").chain(Column::ALL.iter().map(|c| c.header())))?;

    for person in people {
        let address = person.address.clone().unwrap_or_default();
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        writer.write_record([
            person.id.to_string(),
            person.name.clone(),
            opt(&person.email),
            format_cpf(&person.national_id),
            person.birth_date.format("%Y-%m-%d").to_string(),
            opt(&person.phone),
            opt(&person.place_of_birth),
            opt(&person.nationality),
            person.sex.map(|s| s.code().to_string()).unwrap_or_default(),
            opt(&address.postal_code),
            opt(&address.street),
            opt(&address.number),
            opt(&address.complement),
            opt(&address.neighborhood),
            opt(&address.city),
            opt(&address.state),
        ])?;
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> ExportResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::RowError;
    use crate::models::{Address, PersonCreationRequest, Sex};
    use crate::parser::parse_csv_bytes;
    use chrono::NaiveDate;

    #[test]
    fn test_template_layout() {
        let bytes = generate_template().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Nome,Email,CPF,DataNascimento"));
        assert!(lines[2].starts_with("# obrigatório"));
    }

    #[test]
    fn test_template_parses_to_one_row() {
        let sheet = parse_csv_bytes(&generate_template().unwrap()).unwrap();

        assert_eq!(sheet.headers.len(), Column::ALL.len());
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].get("CPF"), Some("529.982.247-25"));
    }

    #[test]
    fn test_error_rows_report() {
        let result = ImportResult {
            total: 2,
            success: 0,
            errors: 2,
            details: vec![
                RowError::new(
                    2,
                    "Name is required",
                    [("Nome", ""), ("CPF", "11144477735")].into_iter().collect(),
                ),
                RowError::new(
                    3,
                    "Invalid email: 'x'",
                    [("Nome", "Beto"), ("Email", "x")].into_iter().collect(),
                ),
            ],
        };

        let text = String::from_utf8(export_error_rows(&result).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Nome,CPF,Email,Linha,Erro");
        assert_eq!(lines[1], ",11144477735,,2,Name is required");
        assert_eq!(lines[2], "Beto,,x,3,Invalid email: 'x'");
    }

    #[test]
    fn test_people_export_round_trips_through_parser() {
        let person = Person::new(PersonCreationRequest {
            name: "Ana".into(),
            email: None,
            national_id: "11144477735".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone: None,
            place_of_birth: None,
            nationality: None,
            sex: Some(Sex::Feminino),
            address: Some(Address {
                street: Some("Rua A, 10".into()),
                ..Default::default()
            }),
        });

        let sheet = parse_csv_bytes(&export_people(&[person]).unwrap()).unwrap();
        let row = &sheet.rows[0];

        assert_eq!(row.field(Column::NationalId), Some("111.444.777-35"));
        assert_eq!(row.field(Column::Sex), Some("F"));
        assert_eq!(row.field(Column::Street), Some("Rua A, 10"));
    }
}
