//! CPF (Brazilian taxpayer number) checksum.

/// Digits of a CPF with the usual punctuation (`.`, `-`, spaces) removed.
///
/// Returns `None` if anything other than digits and punctuation is present.
pub fn normalize_cpf(value: &str) -> Option<String> {
    let mut digits = String::with_capacity(11);
    for c in value.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '.' | '-' | ' ' => {}
            _ => return None,
        }
    }
    Some(digits)
}

/// Check a CPF's two mod-11 check digits.
///
/// # Example
/// ```ignore
/// use cadastro::validation::is_valid_cpf;
///
/// assert!(is_valid_cpf("529.982.247-25"));
/// assert!(!is_valid_cpf("111.111.111-11"));
/// ```
pub fn is_valid_cpf(value: &str) -> bool {
    let Some(digits) = normalize_cpf(value) else {
        return false;
    };
    if digits.len() != 11 {
        return false;
    }

    let d: Vec<u32> = digits.bytes().map(|b| u32::from(b - b'0')).collect();

    // 000.000.000-00, 111.111.111-11, ... pass the arithmetic but are not issued
    if d.iter().all(|&x| x == d[0]) {
        return false;
    }

    check_digit(&d[..9]) == d[9] && check_digit(&d[..10]) == d[10]
}

/// Weighted mod-11 check digit over `digits` (weights run down to 2).
fn check_digit(digits: &[u32]) -> u32 {
    let len = digits.len() as u32;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &digit)| digit * (len + 1 - i as u32))
        .sum();

    match sum % 11 {
        0 | 1 => 0,
        rest => 11 - rest,
    }
}

/// Format 11 digits as `000.000.000-00`. Anything else is returned unchanged.
pub fn format_cpf(digits: &str) -> String {
    if digits.len() != 11 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return digits.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}
