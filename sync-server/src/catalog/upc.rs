//! UPC / GTIN validation

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpcError {
    #[error("UPC is empty")]
    Empty,

    #[error("UPC {0} contains non-digit characters")]
    NotNumeric(String),

    #[error("UPC {0} has unsupported length {1}")]
    BadLength(String, usize),

    #[error("UPC {0} has an invalid check digit")]
    BadCheckDigit(String),
}

/// Trim and validate a GTIN-8/12/13/14, returning the canonical form
///
/// Spellings of one GTIN that only differ in leading zeros collapse to the
/// shortest of their 12, 13 or 14 digit forms, so `0012345678905` and
/// `012345678905` name the same product. GTIN-8 comes out padded to 12.
pub fn normalize_upc(raw: &str) -> Result<String, UpcError> {
    let upc = raw.trim();
    if upc.is_empty() {
        return Err(UpcError::Empty);
    }
    if !upc.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UpcError::NotNumeric(upc.to_string()));
    }
    if !matches!(upc.len(), 8 | 12 | 13 | 14) {
        return Err(UpcError::BadLength(upc.to_string(), upc.len()));
    }
    if !has_valid_check_digit(upc) {
        return Err(UpcError::BadCheckDigit(upc.to_string()));
    }
    Ok(canonical_form(upc))
}

fn canonical_form(upc: &str) -> String {
    let gtin14 = format!("{upc:0>14}");
    let significant = gtin14.trim_start_matches('0').len();
    gtin14[14 - significant.max(12)..].to_string()
}

/// GS1 mod-10: weights 3,1,3,... from the digit left of the check digit
fn has_valid_check_digit(digits: &str) -> bool {
    let bytes = digits.as_bytes();
    let Some((check, body)) = bytes.split_last() else {
        return false;
    };

    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 0 { d * 3 } else { d }
        })
        .sum();

    (10 - sum % 10) % 10 == u32::from(check - b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_codes() {
        assert_eq!(normalize_upc("012345678905").unwrap(), "012345678905");
        assert_eq!(normalize_upc(" 036000291452 ").unwrap(), "036000291452");
        assert_eq!(normalize_upc("96385074").unwrap(), "000096385074");
        assert_eq!(normalize_upc("4006381333931").unwrap(), "4006381333931");
    }

    #[test]
    fn test_zero_padded_spellings_share_one_form() {
        for spelling in ["012345678905", "0012345678905", "00012345678905"] {
            assert_eq!(normalize_upc(spelling).unwrap(), "012345678905");
        }
        assert_eq!(normalize_upc("00000096385074").unwrap(), "000096385074");
        assert_eq!(normalize_upc("04006381333931").unwrap(), "4006381333931");
        assert_eq!(normalize_upc("10012345678902").unwrap(), "10012345678902");
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(normalize_upc("   "), Err(UpcError::Empty));
        assert!(matches!(normalize_upc("01234567890X"), Err(UpcError::NotNumeric(_))));
        assert!(matches!(normalize_upc("12345"), Err(UpcError::BadLength(_, 5))));
        assert!(matches!(
            normalize_upc("012345678901"),
            Err(UpcError::BadCheckDigit(_))
        ));
    }
}
