//! # Replay Engine
//!
//! Walks the compiled event sequence in time order and issues key presses
//! through a [`KeySink`].
//!
//! Events are flattened into a single key-down/key-up action timeline, stably
//! sorted by time, then executed against a monotonic clock: sleep until each
//! action is due, fire it, move on. The engine never owns the target window's
//! focus; keeping the game focused during the countdown and playback is the
//! user's job.
//!
//! Interruption (Ctrl+C) is checked between actions. Whatever keys are down
//! at that point are released before returning, so an abort never leaves a
//! note droning in the game.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use crate::compiler::CompiledEvent;
use crate::error::OcarinaError;

/// The narrow seam to the OS input backend. Production uses [`EnigoSink`];
/// tests use a recording sink.
pub trait KeySink {
    fn key_down(&mut self, key: &str) -> Result<(), OcarinaError>;
    fn key_up(&mut self, key: &str) -> Result<(), OcarinaError>;
}

/// One entry of the flattened playback timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedAction {
    /// Seconds from playback start.
    pub at: f64,
    pub key: String,
    /// True for key-down, false for key-up.
    pub down: bool,
}

/// Flatten events into a stably time-sorted down/up action list.
///
/// The compiler already emits events in nondecreasing start order; the stable
/// sort only interleaves releases with later presses and never reorders
/// equal-time actions.
pub fn action_timeline(events: &[CompiledEvent]) -> Vec<TimedAction> {
    let mut actions = Vec::with_capacity(events.iter().map(|e| e.presses.len() * 2).sum());
    for event in events {
        for press in &event.presses {
            actions.push(TimedAction {
                at: event.start + press.offset,
                key: press.key.clone(),
                down: true,
            });
            actions.push(TimedAction {
                at: event.start + press.offset + press.hold,
                key: press.key.clone(),
                down: false,
            });
        }
    }
    actions.sort_by(|a, b| a.at.total_cmp(&b.at));
    actions
}

/// Count down before playback so the user can focus the game window.
/// Returns false if interrupted.
pub fn countdown(seconds: u32, interrupted: &AtomicBool) -> bool {
    for i in (1..=seconds).rev() {
        if interrupted.load(Ordering::Relaxed) {
            return false;
        }
        println!("... starting in {}", i);
        thread::sleep(Duration::from_secs(1));
    }
    !interrupted.load(Ordering::Relaxed)
}

/// Play the compiled events through the sink. Checks the interrupt flag
/// between actions and releases every held key on the way out, whether the
/// run completed, was interrupted, or the sink failed.
pub fn play<S: KeySink>(
    events: &[CompiledEvent],
    sink: &mut S,
    interrupted: &AtomicBool,
) -> Result<(), OcarinaError> {
    let timeline = action_timeline(events);
    let start = Instant::now();
    let mut held: Vec<String> = Vec::new();

    let result = run_timeline(&timeline, sink, interrupted, start, &mut held);

    // Best-effort release of anything still down, most recent first.
    for key in held.iter().rev() {
        let _ = sink.key_up(key);
    }

    result
}

fn run_timeline<S: KeySink>(
    timeline: &[TimedAction],
    sink: &mut S,
    interrupted: &AtomicBool,
    start: Instant,
    held: &mut Vec<String>,
) -> Result<(), OcarinaError> {
    for action in timeline {
        if interrupted.load(Ordering::Relaxed) {
            return Ok(());
        }
        let due = Duration::from_secs_f64(action.at.max(0.0));
        let elapsed = start.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
        if action.down {
            sink.key_down(&action.key)?;
            held.push(action.key.clone());
        } else {
            sink.key_up(&action.key)?;
            if let Some(pos) = held.iter().rposition(|k| k == &action.key) {
                held.remove(pos);
            }
        }
    }
    Ok(())
}

/// Key injection through enigo.
pub struct EnigoSink {
    enigo: Enigo,
}

impl EnigoSink {
    pub fn new() -> Result<Self, OcarinaError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| OcarinaError::Input(format!("Cannot open input backend: {}", e)))?;
        Ok(Self { enigo })
    }

    /// Translate a mapping-file key identifier into an enigo key. Single
    /// characters go through as-is; a few common named keys are recognized.
    fn key_for(name: &str) -> Result<Key, OcarinaError> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Key::Unicode(c));
        }
        match name.to_ascii_lowercase().as_str() {
            "space" => Ok(Key::Space),
            "enter" | "return" => Ok(Key::Return),
            "tab" => Ok(Key::Tab),
            "up" => Ok(Key::UpArrow),
            "down" => Ok(Key::DownArrow),
            "left" => Ok(Key::LeftArrow),
            "right" => Ok(Key::RightArrow),
            _ => Err(OcarinaError::Input(format!(
                "Unrecognized key identifier '{}'",
                name
            ))),
        }
    }

    fn send(&mut self, name: &str, direction: Direction) -> Result<(), OcarinaError> {
        let key = Self::key_for(name)?;
        self.enigo
            .key(key, direction)
            .map_err(|e| OcarinaError::Input(format!("Key '{}' failed: {}", name, e)))
    }
}

impl KeySink for EnigoSink {
    fn key_down(&mut self, key: &str) -> Result<(), OcarinaError> {
        self.send(key, Direction::Press)
    }

    fn key_up(&mut self, key: &str) -> Result<(), OcarinaError> {
        self.send(key, Direction::Release)
    }
}
