//! # Duration Resolver
//!
//! Converts duration expressions like `4`, `8+16`, `4.` or `16..` into
//! seconds, given the active tempo and base unit.
//!
//! ## Grammar
//! An expression is a `+`-separated sum of terms. Each term is an integer
//! note-value denominator (4 = quarter, 8 = eighth, ...) followed by zero or
//! more dots. An empty expression means "one note of the current UNIT".
//!
//! ## Dot Rule
//! Dots are additive, the conventional meaning of dotted notation: each dot
//! adds half of the previous extension, so n dots scale a term by
//! `2 - 2^(-n)` (one dot x1.5, two dots x1.75). The rule applies per term:
//! `8.+16` is a dotted eighth plus a sixteenth.

/// One term of a duration expression: denominator plus dot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurTerm {
    pub denom: u32,
    pub dots: u8,
}

/// Parse a duration expression into its terms.
///
/// Errors are plain strings; the lexer wraps them with the line number.
pub fn parse_terms(expr: &str) -> Result<Vec<DurTerm>, String> {
    let mut terms = Vec::new();
    for part in expr.split('+') {
        let digits_end = part
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(part.len());
        let digits = &part[..digits_end];
        let tail = &part[digits_end..];

        if digits.is_empty() {
            return Err(format!("Missing denominator in duration '{}'", expr));
        }
        if !tail.chars().all(|c| c == '.') {
            return Err(format!("Bad duration term '{}' in '{}'", part, expr));
        }

        let denom: u32 = digits
            .parse()
            .map_err(|_| format!("Bad denominator '{}' in duration '{}'", digits, expr))?;
        if denom == 0 {
            return Err(format!("Zero denominator in duration '{}'", expr));
        }

        terms.push(DurTerm {
            denom,
            dots: tail.len() as u8,
        });
    }
    Ok(terms)
}

/// Scale factor for a dot count: `2 - 2^(-n)`.
fn dot_factor(dots: u8) -> f64 {
    2.0 - 0.5f64.powi(dots as i32)
}

/// Resolve parsed terms to seconds under the given tempo and unit.
///
/// An empty term list falls back to a single undotted note of `unit`.
/// Seconds per whole note is `240 / bpm` (a quarter is `60 / bpm`).
pub fn seconds(terms: &[DurTerm], bpm: f64, unit: u32) -> f64 {
    let whole = 240.0 / bpm;
    if terms.is_empty() {
        return whole / unit as f64;
    }
    terms
        .iter()
        .map(|t| whole / t.denom as f64 * dot_factor(t.dots))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_term() {
        // BPM=120, quarter note: (240/120)/4 = 0.5s
        let terms = parse_terms("4").unwrap();
        assert_eq!(seconds(&terms, 120.0, 8), 0.5);
    }

    #[test]
    fn test_summed_terms() {
        // 8+16 at BPM=120: 0.25 + 0.125
        let terms = parse_terms("8+16").unwrap();
        assert_eq!(seconds(&terms, 120.0, 8), 0.375);
    }

    #[test]
    fn test_empty_expression_uses_unit() {
        // UNIT=8 at BPM=120: eighth note = 0.25s
        assert_eq!(seconds(&[], 120.0, 8), 0.25);
        assert_eq!(seconds(&[], 120.0, 4), 0.5);
    }

    #[test]
    fn test_dots_are_additive() {
        // Dotted quarter at BPM=120: 0.5 * 1.5 = 0.75
        let one = parse_terms("4.").unwrap();
        assert_eq!(seconds(&one, 120.0, 8), 0.75);

        // Double-dotted quarter: 0.5 * 1.75 = 0.875 (not 0.5 * 1.5 * 1.5)
        let two = parse_terms("4..").unwrap();
        assert_eq!(seconds(&two, 120.0, 8), 0.875);
    }

    #[test]
    fn test_dot_binds_to_term() {
        // 8.+16 = dotted eighth + sixteenth = 0.375 + 0.125
        let terms = parse_terms("8.+16").unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0], DurTerm { denom: 8, dots: 1 });
        assert_eq!(terms[1], DurTerm { denom: 16, dots: 0 });
        assert_eq!(seconds(&terms, 120.0, 8), 0.5);
    }

    #[test]
    fn test_sum_matches_per_term_values() {
        let terms = parse_terms("2+4+8+16").unwrap();
        let whole = 240.0 / 90.0;
        let expected = whole / 2.0 + whole / 4.0 + whole / 8.0 + whole / 16.0;
        assert!((seconds(&terms, 90.0, 8) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_expressions_rejected() {
        assert!(parse_terms("x").is_err());
        assert!(parse_terms("4+").is_err());
        assert!(parse_terms("+4").is_err());
        assert!(parse_terms("0").is_err());
        assert!(parse_terms("4x").is_err());
        assert!(parse_terms(".4").is_err());
    }
}
