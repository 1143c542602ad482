//! # Key Mapping
//!
//! Loads the note-to-key table and resolves pitches to physical keys,
//! folding out-of-range notes by whole octaves.
//!
//! ## Mapping file
//! A JSON object from note name (with octave) to a key identifier understood
//! by the input backend:
//!
//! ```json
//! {
//!   "C4": "z", "C#4": "s", "D4": "x",
//!   "C5": "q", "C#5": "2", "D5": "w"
//! }
//! ```
//!
//! Keys may be written with flats (`Db4`); they are normalized to sharp
//! spelling on load, and two spellings of the same pitch are rejected as
//! duplicates. The covered octave range is derived from the loaded keys and
//! drives the folding direction in [`KeyMap::fold`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::OcarinaError;
use crate::pitch::Pitch;

/// Octave-fold hard bound: give up after shifting this many octaves.
const MAX_FOLD_OCTAVES: i32 = 3;

/// The note-to-key table with its covered octave range.
#[derive(Debug, Clone)]
pub struct KeyMap {
    keys: HashMap<Pitch, String>,
    min_octave: i32,
    max_octave: i32,
}

impl KeyMap {
    /// Load a mapping from a JSON file.
    pub fn load(path: &Path) -> Result<Self, OcarinaError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a mapping from JSON text.
    pub fn from_json(text: &str) -> Result<Self, OcarinaError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(text)
            .map_err(|e| OcarinaError::Mapping(format!("Bad mapping file: {}", e)))?;

        let mut keys = HashMap::with_capacity(raw.len());
        let mut min_octave = i32::MAX;
        let mut max_octave = i32::MIN;
        for (name, key) in raw {
            let spelling = crate::pitch::Spelling::parse(&name)
                .map_err(|e| OcarinaError::Mapping(format!("Bad mapping entry '{}': {}", name, e)))?;
            if !spelling.has_octave() {
                return Err(OcarinaError::Mapping(format!(
                    "Mapping entry '{}' is missing its octave",
                    name
                )));
            }
            let pitch = spelling.with_default_octave(0);
            if keys.insert(pitch, key).is_some() {
                return Err(OcarinaError::Mapping(format!(
                    "Duplicate mapping entry for {} (spelled '{}')",
                    pitch, name
                )));
            }
            min_octave = min_octave.min(pitch.octave);
            max_octave = max_octave.max(pitch.octave);
        }

        if keys.is_empty() {
            return Err(OcarinaError::Mapping("Mapping file is empty".to_string()));
        }

        Ok(Self {
            keys,
            min_octave,
            max_octave,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if the exact pitch has a mapped key, without folding.
    pub fn contains(&self, pitch: Pitch) -> bool {
        self.keys.contains_key(&pitch)
    }

    /// Fold a pitch by whole octaves toward the covered range until it hits a
    /// mapped key. A pitch that is already mapped is returned unchanged, so
    /// folding is idempotent in range. Returns `None` when no shift within
    /// the bound lands on a mapping entry.
    pub fn fold(&self, pitch: Pitch) -> Option<Pitch> {
        let mut p = pitch;
        if self.keys.contains_key(&p) {
            return Some(p);
        }
        for _ in 0..MAX_FOLD_OCTAVES {
            if p.octave < self.min_octave {
                p.octave += 1;
            } else if p.octave > self.max_octave {
                p.octave -= 1;
            } else {
                // In the covered range but unmapped; shifting will not help.
                return None;
            }
            if self.keys.contains_key(&p) {
                return Some(p);
            }
        }
        None
    }

    /// Transpose a pitch by `semitones`, fold it into range, and return the
    /// mapped key identifier.
    pub fn resolve(&self, pitch: Pitch, semitones: i32) -> Result<&str, OcarinaError> {
        let shifted = pitch.transpose(semitones);
        let folded = self.fold(shifted).ok_or_else(|| {
            OcarinaError::Mapping(format!(
                "No key mapped for {} (after transpose {:+})",
                shifted, semitones
            ))
        })?;
        // fold() only returns mapped pitches.
        self.keys
            .get(&folded)
            .map(String::as_str)
            .ok_or_else(|| OcarinaError::Mapping(format!("No key mapped for {}", folded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Pitch;

    fn two_octave_map() -> KeyMap {
        KeyMap::from_json(
            r#"{
                "C4": "z", "C#4": "s", "D4": "x", "D#4": "d", "E4": "c",
                "F4": "v", "F#4": "g", "G4": "b", "G#4": "h", "A4": "n",
                "A#4": "j", "B4": "m",
                "C5": "q", "C#5": "2", "D5": "w", "D#5": "3", "E5": "e",
                "F5": "r", "F#5": "5", "G5": "t", "G#5": "6", "A5": "y",
                "A#5": "7", "B5": "u"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_load_and_resolve() {
        let map = two_octave_map();
        assert_eq!(map.len(), 24);
        let c4 = Pitch::parse("C4", 0).unwrap();
        assert_eq!(map.resolve(c4, 0).unwrap(), "z");
    }

    #[test]
    fn test_flat_spelling_resolves_to_sharp_entry() {
        let map = two_octave_map();
        let flat = Pitch::parse("Db4", 0).unwrap();
        let sharp = Pitch::parse("C#4", 0).unwrap();
        assert_eq!(map.resolve(flat, 0).unwrap(), map.resolve(sharp, 0).unwrap());
    }

    #[test]
    fn test_fold_is_idempotent_in_range() {
        let map = two_octave_map();
        let g5 = Pitch::parse("G5", 0).unwrap();
        assert_eq!(map.fold(g5), Some(g5));
    }

    #[test]
    fn test_fold_from_below_and_above() {
        let map = two_octave_map();
        let a2 = Pitch::parse("A2", 0).unwrap();
        assert_eq!(map.fold(a2), Some(Pitch::parse("A4", 0).unwrap()));
        let e7 = Pitch::parse("E7", 0).unwrap();
        assert_eq!(map.fold(e7), Some(Pitch::parse("E5", 0).unwrap()));
    }

    #[test]
    fn test_fold_bound_exceeded() {
        let map = two_octave_map();
        let c0 = Pitch::parse("C0", 0).unwrap();
        assert_eq!(map.fold(c0), None);
        assert!(map.resolve(c0, 0).is_err());
    }

    #[test]
    fn test_transpose_round_trip_through_resolve() {
        let map = two_octave_map();
        let e4 = Pitch::parse("E4", 0).unwrap();
        let up = map.resolve(e4, 12).unwrap().to_string();
        assert_eq!(up, map.resolve(Pitch::parse("E5", 0).unwrap(), 0).unwrap());
        assert_eq!(
            map.resolve(e4.transpose(12), -12).unwrap(),
            map.resolve(e4, 0).unwrap()
        );
    }

    #[test]
    fn test_in_range_but_unmapped_fails() {
        let map = KeyMap::from_json(r#"{"C4": "z", "E4": "c", "G4": "b"}"#).unwrap();
        // D4 sits inside the covered octave but has no key; folding must not
        // invent one from another octave.
        let d4 = Pitch::parse("D4", 0).unwrap();
        assert_eq!(map.fold(d4), None);
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let err = KeyMap::from_json(r#"{"C#4": "s", "Db4": "s"}"#).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_missing_octave_rejected() {
        assert!(KeyMap::from_json(r#"{"C": "z"}"#).is_err());
    }

    #[test]
    fn test_empty_mapping_rejected() {
        assert!(KeyMap::from_json("{}").is_err());
    }
}
