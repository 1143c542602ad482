//! # Pitch Types
//!
//! Chromatic pitch classes, enharmonic normalization, and semitone math.
//!
//! Everything downstream of the tokenizer works with sharp-spelled pitches:
//! `Db4` in a score or mapping file becomes `C#4` before any lookup happens,
//! so flat and sharp spellings of the same note always hit the same mapping
//! entry. `E#`, `B#`, `Cb` and `Fb` normalize across the octave break
//! (`B#4` is `C5`, `Cb4` is `B3`).
//!
//! The semitone reference point is C4 = 0, so `Pitch::semitones` is negative
//! below middle C. Transposition and octave folding are plain arithmetic on
//! that scale.

use std::fmt;

/// One of the 12 chromatic pitch classes, sharp-spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    /// Semitone offset from C within one octave (0-11).
    pub fn semitone(self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::Cs => 1,
            PitchClass::D => 2,
            PitchClass::Ds => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::Fs => 6,
            PitchClass::G => 7,
            PitchClass::Gs => 8,
            PitchClass::A => 9,
            PitchClass::As => 10,
            PitchClass::B => 11,
        }
    }

    /// Pitch class for a semitone count, sharp-spelled.
    pub fn from_semitone(semitone: i32) -> Self {
        match semitone.rem_euclid(12) {
            0 => PitchClass::C,
            1 => PitchClass::Cs,
            2 => PitchClass::D,
            3 => PitchClass::Ds,
            4 => PitchClass::E,
            5 => PitchClass::F,
            6 => PitchClass::Fs,
            7 => PitchClass::G,
            8 => PitchClass::Gs,
            9 => PitchClass::A,
            10 => PitchClass::As,
            11 => PitchClass::B,
            _ => unreachable!(),
        }
    }

    /// Sharp-spelled name ("C", "C#", ...).
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

/// A pitch class plus its octave, e.g. `C#4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub class: PitchClass,
    pub octave: i32,
}

impl Pitch {
    pub fn new(class: PitchClass, octave: i32) -> Self {
        Self { class, octave }
    }

    /// Absolute semitone count with C4 = 0.
    pub fn semitones(self) -> i32 {
        (self.octave - 4) * 12 + self.class.semitone()
    }

    /// Pitch for an absolute semitone count (C4 = 0), sharp-spelled.
    pub fn from_semitones(semitones: i32) -> Self {
        Self {
            class: PitchClass::from_semitone(semitones),
            octave: 4 + semitones.div_euclid(12),
        }
    }

    /// Shift by a signed number of semitones.
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_semitones(self.semitones() + semitones)
    }

    /// Parse a note spelling like `C4`, `f#3`, `Db4`, `B#3`.
    ///
    /// The octave digit is optional; `default_octave` fills it in (this is how
    /// the LOW/HIGH lane default reaches bare note names). Flat spellings are
    /// normalized to sharps, carrying the octave where the spelling crosses
    /// the octave break.
    pub fn parse(raw: &str, default_octave: i32) -> Result<Self, String> {
        Ok(Spelling::parse(raw)?.with_default_octave(default_octave))
    }
}

/// A parsed note spelling whose octave may still be implicit.
///
/// The tokenizer produces these; the compiler fills in the lane's default
/// octave once the surrounding LOW/HIGH state is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spelling {
    /// Semitone offset from the C of the written octave. Can leave 0..12 for
    /// spellings that cross the octave break (`B#` = 12, `Cb` = -1).
    rel_semitone: i32,
    octave: Option<i32>,
}

impl Spelling {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut chars = raw.chars();
        let letter = chars.next().ok_or_else(|| "Empty note name".to_string())?;
        let base = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(format!("Bad note letter '{}'", letter)),
        };

        let rest: &str = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave = if octave_str.is_empty() {
            None
        } else {
            Some(
                octave_str
                    .parse::<i32>()
                    .map_err(|_| format!("Bad octave '{}' in note '{}'", octave_str, raw))?,
            )
        };

        Ok(Self {
            rel_semitone: base + accidental,
            octave,
        })
    }

    /// True if the score wrote an explicit octave digit.
    pub fn has_octave(self) -> bool {
        self.octave.is_some()
    }

    /// Resolve to a concrete pitch, sharp-spelled; `from_semitones`
    /// re-normalizes and carries the octave (B#4 -> C5, Cb4 -> B3).
    pub fn with_default_octave(self, default_octave: i32) -> Pitch {
        let octave = self.octave.unwrap_or(default_octave);
        Pitch::from_semitones((octave - 4) * 12 + self.rel_semitone)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class.name(), self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_note() {
        let p = Pitch::parse("C4", 0).unwrap();
        assert_eq!(p, Pitch::new(PitchClass::C, 4));
        assert_eq!(p.semitones(), 0);
    }

    #[test]
    fn test_parse_uses_default_octave() {
        let p = Pitch::parse("G", 5).unwrap();
        assert_eq!(p, Pitch::new(PitchClass::G, 5));
    }

    #[test]
    fn test_flat_normalizes_to_sharp() {
        let flat = Pitch::parse("Db4", 0).unwrap();
        let sharp = Pitch::parse("C#4", 0).unwrap();
        assert_eq!(flat, sharp);
        assert_eq!(flat.to_string(), "C#4");
    }

    #[test]
    fn test_enharmonic_octave_carry() {
        assert_eq!(Pitch::parse("B#4", 0).unwrap().to_string(), "C5");
        assert_eq!(Pitch::parse("Cb4", 0).unwrap().to_string(), "B3");
        assert_eq!(Pitch::parse("E#4", 0).unwrap().to_string(), "F4");
        assert_eq!(Pitch::parse("Fb4", 0).unwrap().to_string(), "E4");
    }

    #[test]
    fn test_lowercase_accepted() {
        assert_eq!(Pitch::parse("f#3", 0).unwrap().to_string(), "F#3");
    }

    #[test]
    fn test_transpose_round_trip() {
        let p = Pitch::parse("A4", 0).unwrap();
        assert_eq!(p.transpose(12).transpose(-12), p);
        assert_eq!(p.transpose(3).to_string(), "C5");
        assert_eq!(p.transpose(-12).to_string(), "A3");
    }

    #[test]
    fn test_semitones_reference_is_c4() {
        assert_eq!(Pitch::parse("C4", 0).unwrap().semitones(), 0);
        assert_eq!(Pitch::parse("C5", 0).unwrap().semitones(), 12);
        assert_eq!(Pitch::parse("B3", 0).unwrap().semitones(), -1);
    }

    #[test]
    fn test_bad_spellings_rejected() {
        assert!(Pitch::parse("H4", 0).is_err());
        assert!(Pitch::parse("", 0).is_err());
        assert!(Pitch::parse("Cx", 0).is_err());
    }
}
