pub mod compiler;
pub mod convert;
pub mod duration;
pub mod error;
pub mod lexer;
pub mod mapping;
pub mod pitch;
pub mod player;

pub use compiler::{compile_tokens, CompiledEvent, KeyPress, State};
pub use convert::convert_str;
pub use error::OcarinaError;
pub use lexer::{tokenize, ChordMode, Lane};
pub use mapping::KeyMap;
pub use pitch::{Pitch, PitchClass};
pub use player::{action_timeline, play, EnigoSink, KeySink};

/// Compile score text into playable events.
/// This is the main entry point for the library.
pub fn compile(
    source: &str,
    mapping: &KeyMap,
    transpose: i32,
) -> Result<Vec<CompiledEvent>, OcarinaError> {
    let tokens = lexer::tokenize(source)?;
    compiler::compile_tokens(&tokens, mapping, transpose)
}
