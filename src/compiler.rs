//! # Event Compiler
//!
//! Single left-to-right pass over score tokens, producing the sequence of
//! playable events with absolute start offsets.
//!
//! The pass folds an explicit [`State`] snapshot through the token stream:
//! directives produce the next snapshot and emit nothing, lane tokens switch
//! the implicit octave, and note/chord tokens emit events. Later directives
//! affect only subsequent tokens; there is no lookahead or backtracking.
//!
//! Musical duration and physical key timing are independent: a token's
//! resolved duration is what advances the clock, while hold (key-press
//! length) and stagger (strum spread) only shape the key-down/key-up times
//! inside the event. Hold and stagger exceeding the musical duration is the
//! score author's problem, not validated here.

use crate::duration::{self, DurTerm};
use crate::error::OcarinaError;
use crate::lexer::{Attrs, ChordMode, Directive, DurationSpec, Lane, LocatedToken, Token};
use crate::mapping::KeyMap;

/// Compiler state threaded through the pass. Each directive produces the
/// snapshot used by all subsequent tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    pub bpm: f64,
    pub unit: u32,
    pub hold: f64,
    pub stagger: f64,
    pub rep: u32,
    pub mode: ChordMode,
    pub lane: Lane,
}

impl Default for State {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            unit: 8,
            hold: 0.12,
            stagger: 0.008,
            rep: 1,
            mode: ChordMode::Sim,
            lane: Lane::Low,
        }
    }
}

impl State {
    fn apply(mut self, directive: Directive) -> Self {
        match directive {
            Directive::Bpm(bpm) => self.bpm = bpm,
            Directive::Unit(unit) => self.unit = unit,
            Directive::Hold(hold) => self.hold = hold,
            Directive::Stagger(stagger) => self.stagger = stagger,
            Directive::Rep(rep) => self.rep = rep,
            Directive::Mode(mode) => self.mode = mode,
        }
        self
    }

    fn resolve_duration(&self, spec: &DurationSpec) -> f64 {
        match spec {
            DurationSpec::Unit { dots } => duration::seconds(
                &[DurTerm {
                    denom: self.unit,
                    dots: *dots,
                }],
                self.bpm,
                self.unit,
            ),
            DurationSpec::Terms(terms) => duration::seconds(terms, self.bpm, self.unit),
        }
    }
}

/// One key press inside an event: `offset` seconds after the event start the
/// key goes down, and it is released `hold` seconds after that.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub key: String,
    pub offset: f64,
    pub hold: f64,
}

/// A playable event: one note or chord occurrence, repeats already expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEvent {
    /// Seconds from playback start.
    pub start: f64,
    pub presses: Vec<KeyPress>,
}

/// Compile located tokens into events, resolving every pitch through the
/// mapping (with the global transpose) up front. Any unresolvable pitch
/// fails here, before playback can start.
pub fn compile_tokens(
    tokens: &[LocatedToken],
    mapping: &KeyMap,
    transpose: i32,
) -> Result<Vec<CompiledEvent>, OcarinaError> {
    let mut state = State::default();
    let mut clock = 0.0_f64;
    let mut events = Vec::new();

    for located in tokens {
        match &located.token {
            Token::Directive(directive) => {
                state = state.apply(*directive);
            }
            Token::Lane(lane) => {
                state = State { lane: *lane, ..state };
            }
            Token::Rest(spec) => {
                clock += state.resolve_duration(spec);
            }
            Token::Note(note) => {
                let dur = state.resolve_duration(&note.duration);
                let Attrs { hold, stagger, rep, mode } = note.attrs;
                let hold = hold.unwrap_or(state.hold);
                let stagger = stagger.unwrap_or(state.stagger);
                let rep = rep.unwrap_or(state.rep);
                let mode = mode.unwrap_or(state.mode);

                let mut keys = Vec::with_capacity(note.pitches.len());
                for spelling in &note.pitches {
                    let pitch = spelling.with_default_octave(state.lane.octave());
                    let key = mapping.resolve(pitch, transpose).map_err(|e| {
                        OcarinaError::Mapping(format!("{} (line {})", e, located.line))
                    })?;
                    keys.push(key.to_string());
                }

                // rep expands into sequential events, each occupying the full
                // musical duration; strum bakes the stagger into per-key
                // offsets, sim leaves every key on the event start.
                for r in 0..rep {
                    let presses = keys
                        .iter()
                        .enumerate()
                        .map(|(i, key)| KeyPress {
                            key: key.clone(),
                            offset: match mode {
                                ChordMode::Sim => 0.0,
                                ChordMode::Strum => i as f64 * stagger,
                            },
                            hold,
                        })
                        .collect();
                    events.push(CompiledEvent {
                        start: clock + r as f64 * dur,
                        presses,
                    });
                }
                clock += rep as f64 * dur;
            }
        }
    }

    Ok(events)
}
