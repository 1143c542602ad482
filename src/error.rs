//! # Error Types
//!
//! This module defines all error types for the ocarina score compiler and player.
//!
//! Parse and mapping errors carry enough location information (line number,
//! offending token or pitch) to point at the spot in the score file that needs
//! fixing. Every parse or mapping problem is fatal at load time: the tool must
//! refuse to start playback rather than glitch mid-performance, because a wrong
//! key pressed into the game window cannot be taken back.
//!
//! ## Error Types
//! - `Parse` - Malformed header directive, token, or duration expression
//! - `Mapping` - Pitch unresolvable within the octave-fold bounds
//! - `Io` - Missing or unreadable score/mapping file
//! - `Xml` - Malformed MusicXML input (converter only)
//! - `Input` - Key-injection backend failure during playback

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcarinaError {
    /// Syntax error in the score text, with the line it occurred on.
    ///
    /// # Example
    /// ```
    /// # use ocarina::OcarinaError;
    /// let err = OcarinaError::Parse {
    ///     line: 3,
    ///     message: "Bad token 'X+Q:4'".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at line 3: Bad token 'X+Q:4'");
    /// ```
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A pitch could not be resolved to any mapped key, even after shifting
    /// it by whole octaves toward the mapping's covered range.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// File could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// MusicXML input could not be parsed (converter).
    #[error("MusicXML error: {0}")]
    Xml(String),

    /// The key-injection backend rejected a press or release.
    #[error("Input error: {0}")]
    Input(String),
}
