//! Birth date parsing.

use chrono::NaiveDate;

/// Accepted birth date layouts, tried in order. First match wins.
pub const ACCEPTED_DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d", // YYYY-MM-DD
    "%d/%m/%Y", // DD/MM/YYYY
    "%Y/%m/%d", // YYYY/MM/DD
    "%m/%d/%Y", // MM/DD/YYYY
    "%d-%m-%Y", // DD-MM-YYYY
    "%Y.%m.%d", // YYYY.MM.DD
    "%d.%m.%Y", // DD.MM.YYYY
];

/// Parse a birth date against [`ACCEPTED_DATE_FORMATS`].
///
/// Every accepted layout is exactly ten characters with zero-padded parts,
/// so shorter or longer input is rejected before chrono sees it.
pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != 10 {
        return None;
    }

    ACCEPTED_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_all_formats_accepted() {
        let expected = ymd(1990, 1, 15);
        for input in [
            "1990-01-15",
            "15/01/1990",
            "1990/01/15",
            "01/15/1990",
            "15-01-1990",
            "1990.01.15",
            "15.01.1990",
        ] {
            assert_eq!(parse_birth_date(input), Some(expected), "input {input}");
        }
    }

    #[test]
    fn test_day_first_wins_when_ambiguous() {
        assert_eq!(parse_birth_date("01/02/1990"), Some(ymd(1990, 2, 1)));
        // 31 is not a month, so the US layout picks it up
        assert_eq!(parse_birth_date("12/31/1990"), Some(ymd(1990, 12, 31)));
    }

    #[test]
    fn test_rejected_inputs() {
        assert_eq!(parse_birth_date("01-1990-01"), None);
        assert_eq!(parse_birth_date("1990-1-1"), None);
        assert_eq!(parse_birth_date("1990-02-30"), None);
        assert_eq!(parse_birth_date("yesterday"), None);
        assert_eq!(parse_birth_date(""), None);
    }
}
