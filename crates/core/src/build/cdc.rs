//! CDC derivation (SIFEN v150)
//!
//! The CDC is a 44-digit control code: 43 payload digits followed by a
//! module-11 check digit. Payload layout:
//!
//! ```text
//! doc-type(2) issuer-ruc(8) ruc-dv(1) establishment(3) point-of-sale(3)
//! number(7) taxpayer-type(1) issue-date yyyyMMdd(8) emission-type(1)
//! security-code(9)
//! ```
//!
//! Generation is a pure function of its inputs: the same document fields
//! always produce the same CDC, which is what makes rebuilding after a
//! transient failure safe.

use chrono::NaiveDate;
use ekuatia_domain::constants::{CDC_LEN, CDC_PAYLOAD_LEN, SECURITY_CODE_LEN};
use rand::Rng;

/// Normal emission (SIFEN field `iTipEmi`). Contingency emission is not
/// issued by this pipeline.
pub const EMISSION_NORMAL: &str = "1";

/// Inputs of the CDC derivation.
#[derive(Debug, Clone)]
pub struct CdcInput<'a> {
    /// Two-digit document-type catalog code.
    pub document_type: &'a str,
    /// Issuer RUC without check digit.
    pub issuer_ruc: &'a str,
    /// Issuer RUC check digit.
    pub ruc_dv: u8,
    pub establishment: &'a str,
    pub point_of_sale: &'a str,
    pub number: u32,
    /// Taxpayer type code (1 natural, 2 juridical).
    pub taxpayer_type: u8,
    pub issue_date: NaiveDate,
    /// Emission type code, normally [`EMISSION_NORMAL`].
    pub emission_type: &'a str,
    /// Nine-digit security code.
    pub security_code: &'a str,
}

/// Derive the full 44-digit CDC.
pub fn generate(input: &CdcInput<'_>) -> String {
    let mut payload = String::with_capacity(CDC_PAYLOAD_LEN);
    payload.push_str(&clean_and_pad(input.document_type, 2));
    payload.push_str(&clean_and_pad(input.issuer_ruc, 8));
    payload.push_str(&clean_and_pad(&input.ruc_dv.to_string(), 1));
    payload.push_str(&clean_and_pad(input.establishment, 3));
    payload.push_str(&clean_and_pad(input.point_of_sale, 3));
    payload.push_str(&clean_and_pad(&input.number.to_string(), 7));
    payload.push_str(&clean_and_pad(&input.taxpayer_type.to_string(), 1));
    payload.push_str(&input.issue_date.format("%Y%m%d").to_string());
    payload.push_str(&clean_and_pad(input.emission_type, 1));
    payload.push_str(&clean_and_pad(input.security_code, SECURITY_CODE_LEN));

    let dv = check_digit(&payload);
    payload.push(dv);
    payload
}

/// Validate a CDC: 44 digits whose check digit matches the payload.
pub fn validate(cdc: &str) -> bool {
    let digits: String = cdc.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != CDC_LEN {
        return false;
    }
    let (payload, dv) = digits.split_at(CDC_PAYLOAD_LEN);
    dv.chars().next() == Some(check_digit(payload))
}

/// Components extracted from a 44-digit CDC, for display and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdcBreakdown {
    pub document_type: String,
    pub issuer_ruc: String,
    pub ruc_dv: String,
    pub establishment: String,
    pub point_of_sale: String,
    pub number: String,
    pub taxpayer_type: String,
    pub issue_date: String,
    pub emission_type: String,
    pub security_code: String,
    pub check_digit: String,
}

/// Split a CDC into its components. Returns `None` unless the input has
/// exactly 44 digits.
pub fn breakdown(cdc: &str) -> Option<CdcBreakdown> {
    let digits: String = cdc.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != CDC_LEN {
        return None;
    }
    Some(CdcBreakdown {
        document_type: digits[0..2].to_string(),
        issuer_ruc: digits[2..10].to_string(),
        ruc_dv: digits[10..11].to_string(),
        establishment: digits[11..14].to_string(),
        point_of_sale: digits[14..17].to_string(),
        number: digits[17..24].to_string(),
        taxpayer_type: digits[24..25].to_string(),
        issue_date: digits[25..33].to_string(),
        emission_type: digits[33..34].to_string(),
        security_code: digits[34..43].to_string(),
        check_digit: digits[43..44].to_string(),
    })
}

/// Generate a fresh nine-digit security code.
pub fn generate_security_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{value:09}")
}

/// Keep digits only, left-pad with zeros; overlong inputs keep the trailing
/// digits.
pub fn clean_and_pad(value: &str, len: usize) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return "0".repeat(len);
    }
    if digits.len() > len {
        return digits[digits.len() - len..].to_string();
    }
    format!("{digits:0>len$}")
}

/// Module-11 check digit with weights 2..9 cycling from the rightmost digit;
/// remainders 10 and 11 map to 0.
fn check_digit(payload: &str) -> char {
    let mut sum: u32 = 0;
    let mut weight: u32 = 2;
    for ch in payload.chars().rev() {
        let digit = ch.to_digit(10).unwrap_or(0);
        sum += digit * weight;
        weight += 1;
        if weight > 9 {
            weight = 2;
        }
    }
    let mut dv = 11 - (sum % 11);
    if dv >= 10 {
        dv = 0;
    }
    char::from_digit(dv, 10).unwrap_or('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_input() -> CdcInput<'static> {
        CdcInput {
            document_type: "01",
            issuer_ruc: "80012345",
            ruc_dv: 7,
            establishment: "001",
            point_of_sale: "003",
            number: 123,
            taxpayer_type: 2,
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
            emission_type: EMISSION_NORMAL,
            security_code: "123456789",
        }
    }

    #[test]
    fn golden_vector_invoice() {
        let cdc = generate(&invoice_input());
        assert_eq!(cdc, "01800123457001003000012322026031511234567895");
        assert_eq!(cdc.len(), 44);
    }

    #[test]
    fn golden_vector_credit_note() {
        let input = CdcInput {
            document_type: "05",
            issuer_ruc: "4444401",
            ruc_dv: 1,
            establishment: "002",
            point_of_sale: "001",
            number: 54321,
            taxpayer_type: 1,
            issue_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            emission_type: EMISSION_NORMAL,
            security_code: "000000042",
        };
        assert_eq!(generate(&input), "05044444011002001005432112025120110000000424");
    }

    #[test]
    fn generation_is_deterministic() {
        let input = invoice_input();
        assert_eq!(generate(&input), generate(&input));
    }

    #[test]
    fn generated_cdc_validates() {
        assert!(validate(&generate(&invoice_input())));
    }

    #[test]
    fn flipped_check_digit_fails_validation() {
        assert!(!validate("01800123457001003000012322026031511234567896"));
    }

    #[test]
    fn validation_rejects_wrong_lengths() {
        assert!(!validate(""));
        assert!(!validate("0180012345"));
        assert!(!validate("018001234570010030000123220260315112345678955"));
    }

    #[test]
    fn validation_ignores_formatting_separators() {
        assert!(validate("0180 0123 4570 0100 3000 0123 2202 6031 5112 3456 7895"));
    }

    #[test]
    fn breakdown_extracts_components() {
        let cdc = generate(&invoice_input());
        let parts = breakdown(&cdc).unwrap();
        assert_eq!(parts.document_type, "01");
        assert_eq!(parts.issuer_ruc, "80012345");
        assert_eq!(parts.ruc_dv, "7");
        assert_eq!(parts.establishment, "001");
        assert_eq!(parts.point_of_sale, "003");
        assert_eq!(parts.number, "0000123");
        assert_eq!(parts.taxpayer_type, "2");
        assert_eq!(parts.issue_date, "20260315");
        assert_eq!(parts.emission_type, "1");
        assert_eq!(parts.security_code, "123456789");
        assert_eq!(parts.check_digit, "5");
    }

    #[test]
    fn clean_and_pad_handles_edge_cases() {
        assert_eq!(clean_and_pad("", 3), "000");
        assert_eq!(clean_and_pad("AB", 3), "000");
        assert_eq!(clean_and_pad("7", 3), "007");
        assert_eq!(clean_and_pad("80012345-7", 8), "00123457");
        assert_eq!(clean_and_pad("123456789", 7), "3456789");
    }

    #[test]
    fn security_codes_are_nine_digits() {
        for _ in 0..32 {
            let code = generate_security_code();
            assert_eq!(code.len(), 9);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
