//! # Score Tokenizer
//!
//! Splits score text into located tokens: header directives, lane switches,
//! and note/chord/rest tokens with duration and attribute suffixes.
//!
//! ## Score format
//! Line-oriented plain text. `#` starts a comment line, `|` is a bar
//! separator and treated as whitespace. Directives may appear anywhere and
//! take effect for all subsequent tokens:
//!
//! ```text
//! BPM=120
//! UNIT=8
//! LOW: C D E | F:4. G:8
//! HIGH: C+E+G:4(mode=strum,st0.01) R:4
//! ```
//!
//! Token grammar: `pitches[:duration][(attrs)]` where pitches are `+`-joined
//! note spellings (`C`, `F#`, `Db5`), duration is a `+`-sum of denominators
//! with optional dots, and attrs are comma-separated `h<secs>`, `st<secs>`,
//! `rep<count>`, `mode=sim|strum`. A bare trailing dot group (`C.`) dots the
//! implicit UNIT note. `R` is a rest.

use crate::duration::{parse_terms, DurTerm};
use crate::error::OcarinaError;
use crate::pitch::Spelling;

/// How the keys of a chord are pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordMode {
    /// All keys go down at the same instant.
    Sim,
    /// Key downs are spread by the stagger interval, guitar-strum style.
    Strum,
}

/// Implicit octave for notes written without an octave digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Low,
    High,
}

impl Lane {
    pub fn octave(self) -> i32 {
        match self {
            Lane::Low => 4,
            Lane::High => 5,
        }
    }
}

/// A header directive. Later directives override earlier ones for all
/// subsequent tokens; there is no lookahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directive {
    Bpm(f64),
    Unit(u32),
    Hold(f64),
    Stagger(f64),
    Rep(u32),
    Mode(ChordMode),
}

/// Duration suffix of a note or rest token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationSpec {
    /// No explicit duration: one note of the current UNIT, possibly dotted.
    Unit { dots: u8 },
    /// Explicit `+`-sum of denominators.
    Terms(Vec<DurTerm>),
}

/// Per-token attribute overrides from a `(...)` suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attrs {
    pub hold: Option<f64>,
    pub stagger: Option<f64>,
    pub rep: Option<u32>,
    pub mode: Option<ChordMode>,
}

/// A note or chord token.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteToken {
    pub pitches: Vec<Spelling>,
    pub duration: DurationSpec,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Directive(Directive),
    Lane(Lane),
    Note(NoteToken),
    Rest(DurationSpec),
}

/// A token with the score line it came from (1-indexed).
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub line: usize,
}

fn parse_err(line: usize, message: String) -> OcarinaError {
    OcarinaError::Parse { line, message }
}

fn parse_directive(key: &str, value: &str, line: usize) -> Result<Directive, OcarinaError> {
    let upper = key.to_ascii_uppercase();
    match upper.as_str() {
        "BPM" | "TEMPO" => {
            let bpm: f64 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad BPM value '{}'", value)))?;
            if bpm <= 0.0 || !bpm.is_finite() {
                return Err(parse_err(line, format!("BPM must be positive, got '{}'", value)));
            }
            Ok(Directive::Bpm(bpm))
        }
        "UNIT" => {
            let unit: u32 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad UNIT value '{}'", value)))?;
            if unit == 0 {
                return Err(parse_err(line, "UNIT must be positive".to_string()));
            }
            Ok(Directive::Unit(unit))
        }
        "HOLD" => {
            let hold: f64 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad HOLD value '{}'", value)))?;
            if hold < 0.0 || !hold.is_finite() {
                return Err(parse_err(line, format!("HOLD must be non-negative, got '{}'", value)));
            }
            Ok(Directive::Hold(hold))
        }
        "STAGGER" => {
            let stagger: f64 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad STAGGER value '{}'", value)))?;
            if stagger < 0.0 || !stagger.is_finite() {
                return Err(parse_err(
                    line,
                    format!("STAGGER must be non-negative, got '{}'", value),
                ));
            }
            Ok(Directive::Stagger(stagger))
        }
        "REP" => {
            let rep: u32 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad REP value '{}'", value)))?;
            if rep == 0 {
                return Err(parse_err(line, "REP must be at least 1".to_string()));
            }
            Ok(Directive::Rep(rep))
        }
        "MODE" => match value.to_ascii_uppercase().as_str() {
            "SIM" => Ok(Directive::Mode(ChordMode::Sim)),
            "STRUM" => Ok(Directive::Mode(ChordMode::Strum)),
            other => Err(parse_err(
                line,
                format!("Bad MODE value '{}'. Expected SIM or STRUM", other),
            )),
        },
        _ => Err(parse_err(line, format!("Unknown directive '{}'", key))),
    }
}

fn parse_attrs(body: &str, line: usize, token: &str) -> Result<Attrs, OcarinaError> {
    let mut attrs = Attrs::default();
    for chunk in body.split(',') {
        let c = chunk.trim();
        if c.is_empty() {
            continue;
        }
        if let Some(value) = c.strip_prefix("mode=") {
            attrs.mode = Some(match value.to_ascii_uppercase().as_str() {
                "SIM" => ChordMode::Sim,
                "STRUM" => ChordMode::Strum,
                other => {
                    return Err(parse_err(
                        line,
                        format!("Bad mode '{}' in '{}'. Expected sim or strum", other, token),
                    ))
                }
            });
        } else if let Some(value) = c.strip_prefix("st") {
            let st: f64 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad stagger '{}' in '{}'", c, token)))?;
            if st < 0.0 || !st.is_finite() {
                return Err(parse_err(
                    line,
                    format!("Stagger must be non-negative in '{}'", token),
                ));
            }
            attrs.stagger = Some(st);
        } else if let Some(value) = c.strip_prefix("rep") {
            let rep: u32 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad repeat '{}' in '{}'", c, token)))?;
            if rep == 0 {
                return Err(parse_err(line, format!("Repeat must be at least 1 in '{}'", token)));
            }
            attrs.rep = Some(rep);
        } else if let Some(value) = c.strip_prefix('h') {
            let hold: f64 = value
                .parse()
                .map_err(|_| parse_err(line, format!("Bad hold '{}' in '{}'", c, token)))?;
            if hold < 0.0 || !hold.is_finite() {
                return Err(parse_err(
                    line,
                    format!("Hold must be non-negative in '{}'", token),
                ));
            }
            attrs.hold = Some(hold);
        } else {
            return Err(parse_err(
                line,
                format!("Unknown attribute '{}' in '{}'. Expected h, st, rep or mode=", c, token),
            ));
        }
    }
    Ok(attrs)
}

fn parse_note_token(raw: &str, line: usize) -> Result<Token, OcarinaError> {
    // Split off the (attrs) suffix first, then the :duration suffix.
    let (head, attrs) = match raw.find('(') {
        Some(open) => {
            let inner = raw[open..]
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| parse_err(line, format!("Unclosed attributes in '{}'", raw)))?;
            (&raw[..open], parse_attrs(inner, line, raw)?)
        }
        None => (raw, Attrs::default()),
    };

    let (notespec, duration) = match head.find(':') {
        Some(colon) => {
            let expr = &head[colon + 1..];
            let terms = parse_terms(expr).map_err(|e| parse_err(line, e))?;
            (&head[..colon], DurationSpec::Terms(terms))
        }
        None => {
            // A bare trailing dot group dots the implicit UNIT note.
            let trimmed = head.trim_end_matches('.');
            let dots = (head.len() - trimmed.len()) as u8;
            (trimmed, DurationSpec::Unit { dots })
        }
    };

    if notespec.is_empty() {
        return Err(parse_err(line, format!("Bad token '{}'", raw)));
    }

    let parts: Vec<&str> = notespec.split('+').collect();
    if parts.iter().any(|p| p.eq_ignore_ascii_case("R")) {
        if parts.len() > 1 {
            return Err(parse_err(
                line,
                format!("Rest cannot be part of a chord in '{}'", raw),
            ));
        }
        return Ok(Token::Rest(duration));
    }

    let mut pitches = Vec::with_capacity(parts.len());
    for part in parts {
        let spelling = Spelling::parse(part)
            .map_err(|e| parse_err(line, format!("{} in token '{}'", e, raw)))?;
        pitches.push(spelling);
    }

    Ok(Token::Note(NoteToken {
        pitches,
        duration,
        attrs,
    }))
}

/// Tokenize a whole score. Comment lines (`#`) are skipped, `|` separates
/// tokens, and every token is tagged with its line number.
pub fn tokenize(source: &str) -> Result<Vec<LocatedToken>, OcarinaError> {
    let mut tokens = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let spaced = trimmed.replace('|', " ");
        for word in spaced.split_whitespace() {
            let token = if word.eq_ignore_ascii_case("LOW") || word.eq_ignore_ascii_case("LOW:") {
                Token::Lane(Lane::Low)
            } else if word.eq_ignore_ascii_case("HIGH") || word.eq_ignore_ascii_case("HIGH:") {
                Token::Lane(Lane::High)
            } else if let Some(eq) = word.find('=').filter(|&eq| {
                eq > 0
                    && word[..eq].chars().all(|c| c.is_ascii_alphabetic())
                    && !word.contains('(')
            }) {
                Token::Directive(parse_directive(&word[..eq], &word[eq + 1..], line)?)
            } else {
                parse_note_token(word, line)?
            };
            tokens.push(LocatedToken { token, line });
        }
    }

    Ok(tokens)
}
