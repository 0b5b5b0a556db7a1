//! INN (taxpayer identification number) checksum validation.
//!
//! Organizations carry a 10-digit INN with one check digit; individual
//! registrants carry a 12-digit INN with two. Both check digits are a weighted
//! sum reduced `mod 11 mod 10`.

const WEIGHTS_10: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
const WEIGHTS_12_FIRST: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const WEIGHTS_12_SECOND: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];

/// Kind of registrant an INN belongs to, derived from its length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnKind {
    /// 10 digits: legal entity
    Organization,
    /// 12 digits: individual entrepreneur or natural person
    Individual,
}

impl std::fmt::Display for InnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InnKind::Organization => write!(f, "organization"),
            InnKind::Individual => write!(f, "individual"),
        }
    }
}

/// Weighted check digit over the leading `weights.len()` digits.
///
/// `digits` must hold at least as many entries as `weights`.
pub fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits
        .iter()
        .zip(weights.iter())
        .map(|(d, w)| d * w)
        .sum();
    sum % 11 % 10
}

fn to_digits(inn: &str) -> Option<Vec<u32>> {
    if !inn.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(inn.bytes().map(|b| u32::from(b - b'0')).collect())
}

/// Validate an INN. Anything that is not exactly 10 or 12 ASCII digits is
/// rejected.
pub fn validate_inn(inn: &str) -> bool {
    let Some(digits) = to_digits(inn) else {
        return false;
    };

    match digits.len() {
        10 => check_digit(&digits, &WEIGHTS_10) == digits[9],
        12 => {
            check_digit(&digits, &WEIGHTS_12_FIRST) == digits[10]
                && check_digit(&digits, &WEIGHTS_12_SECOND) == digits[11]
        }
        _ => false,
    }
}

/// Classify a valid INN by length. Returns `None` if validation fails.
pub fn classify_inn(inn: &str) -> Option<InnKind> {
    if !validate_inn(inn) {
        return None;
    }
    match inn.len() {
        10 => Some(InnKind::Organization),
        _ => Some(InnKind::Individual),
    }
}
