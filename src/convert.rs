//! # Score Converter
//!
//! Reads a MusicXML (score-partwise) file and emits the plain-text score
//! format the player consumes.
//!
//! Only the first `<part>` is read; the ocarina plays one melody line. Each
//! note or chord becomes one `pitches:duration` token per output line, rests
//! become `R:duration`, and a detected tempo becomes a leading `BPM=` line.
//!
//! Durations are converted from divisions into a `+`-sum of power-of-two
//! note values (1..64). A duration that cannot be written that way (e.g. a
//! triplet) is an error naming the offending value; quantize the source
//! first.
//!
//! With a mapping file, the converter picks the global semitone shift in
//! -24..=24 that lands the most notes directly in the mapping's range, bakes
//! it into the emitted pitches, and octave-folds any stragglers.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::OcarinaError;
use crate::mapping::KeyMap;
use crate::pitch::Pitch;

/// Exact quarter-note length as a reduced fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quarters {
    pub num: u64,
    pub den: u64,
}

impl Quarters {
    fn new(num: u64, den: u64) -> Self {
        let g = gcd(num.max(1), den);
        if num == 0 {
            Self { num: 0, den: 1 }
        } else {
            Self {
                num: num / g,
                den: den / g,
            }
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// One melodic event pulled out of the MusicXML part.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub pitches: Vec<Pitch>,
    pub quarters: Quarters,
    pub rest: bool,
}

/// First-part melody plus the first tempo mark found.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub bpm: Option<f64>,
    pub events: Vec<RawEvent>,
}

#[derive(Default)]
struct NoteBuilder {
    rest: bool,
    chord: bool,
    grace: bool,
    step: Option<char>,
    alter: i32,
    octave: Option<i32>,
    duration: Option<u64>,
}

fn xml_err(message: impl Into<String>) -> OcarinaError {
    OcarinaError::Xml(message.into())
}

/// Pull divisions, tempo, and the first part's notes out of a partwise
/// MusicXML document.
pub fn parse_musicxml(xml: &str) -> Result<ParsedScore, OcarinaError> {
    let mut reader = Reader::from_str(xml);

    let mut divisions: u64 = 1;
    let mut bpm: Option<f64> = None;
    let mut events: Vec<RawEvent> = Vec::new();

    let mut note: Option<NoteBuilder> = None;
    let mut text_target: Vec<u8> = Vec::new();
    let mut parts_seen = 0usize;

    loop {
        match reader.read_event() {
            Err(e) => return Err(xml_err(format!("{} at byte {}", e, reader.buffer_position()))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"part" => {
                        parts_seen += 1;
                        if parts_seen > 1 {
                            break;
                        }
                    }
                    b"note" => note = Some(NoteBuilder::default()),
                    b"sound" => {
                        if bpm.is_none() {
                            bpm = tempo_attr(&e)?;
                        }
                    }
                    // These markers are usually self-closing but `<rest></rest>`
                    // is the same document.
                    b"chord" => {
                        if let Some(n) = note.as_mut() {
                            n.chord = true;
                        }
                    }
                    b"rest" => {
                        if let Some(n) = note.as_mut() {
                            n.rest = true;
                        }
                    }
                    b"grace" => {
                        if let Some(n) = note.as_mut() {
                            n.grace = true;
                        }
                    }
                    _ => {}
                }
                text_target = name.as_ref().to_vec();
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"chord" => {
                        if let Some(n) = note.as_mut() {
                            n.chord = true;
                        }
                    }
                    b"rest" => {
                        if let Some(n) = note.as_mut() {
                            n.rest = true;
                        }
                    }
                    b"grace" => {
                        if let Some(n) = note.as_mut() {
                            n.grace = true;
                        }
                    }
                    b"sound" => {
                        if bpm.is_none() {
                            bpm = tempo_attr(&e)?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| xml_err(format!("Bad text content: {}", e)))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match text_target.as_slice() {
                    b"divisions" => {
                        divisions = text
                            .parse()
                            .map_err(|_| xml_err(format!("Bad <divisions> value '{}'", text)))?;
                        if divisions == 0 {
                            return Err(xml_err("<divisions> must be positive"));
                        }
                    }
                    b"step" => {
                        if let Some(n) = note.as_mut() {
                            n.step = text.chars().next();
                        }
                    }
                    b"alter" => {
                        if let Some(n) = note.as_mut() {
                            // alter can be written "1.0"
                            let alter: f64 = text
                                .parse()
                                .map_err(|_| xml_err(format!("Bad <alter> value '{}'", text)))?;
                            n.alter = alter.round() as i32;
                        }
                    }
                    b"octave" => {
                        if let Some(n) = note.as_mut() {
                            n.octave = Some(
                                text.parse()
                                    .map_err(|_| xml_err(format!("Bad <octave> value '{}'", text)))?,
                            );
                        }
                    }
                    b"duration" => {
                        if let Some(n) = note.as_mut() {
                            n.duration = Some(
                                text.parse().map_err(|_| {
                                    xml_err(format!("Bad <duration> value '{}'", text))
                                })?,
                            );
                        }
                    }
                    b"per-minute" => {
                        if bpm.is_none() {
                            bpm = Some(text.parse().map_err(|_| {
                                xml_err(format!("Bad <per-minute> value '{}'", text))
                            })?);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"note" {
                    if let Some(n) = note.take() {
                        finish_note(n, divisions, &mut events)?;
                    }
                }
                text_target.clear();
            }
            Ok(_) => {}
        }
    }

    Ok(ParsedScore { bpm, events })
}

fn tempo_attr(e: &quick_xml::events::BytesStart<'_>) -> Result<Option<f64>, OcarinaError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_err(format!("Bad <sound> attribute: {}", err)))?;
        if attr.key.as_ref() == b"tempo" {
            let value = attr
                .unescape_value()
                .map_err(|err| xml_err(format!("Bad tempo attribute: {}", err)))?;
            let tempo: f64 = value
                .parse()
                .map_err(|_| xml_err(format!("Bad tempo value '{}'", value)))?;
            return Ok(Some(tempo));
        }
    }
    Ok(None)
}

fn finish_note(
    n: NoteBuilder,
    divisions: u64,
    events: &mut Vec<RawEvent>,
) -> Result<(), OcarinaError> {
    // Grace notes have no duration and no place in a timed score.
    if n.grace {
        return Ok(());
    }
    let duration = match n.duration {
        Some(d) => d,
        None => return Ok(()),
    };
    let quarters = Quarters::new(duration, divisions);

    if n.rest {
        events.push(RawEvent {
            pitches: Vec::new(),
            quarters,
            rest: true,
        });
        return Ok(());
    }

    let step = n.step.ok_or_else(|| xml_err("Note without <step>"))?;
    let octave = n.octave.ok_or_else(|| xml_err("Note without <octave>"))?;
    let base = match step.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        other => return Err(xml_err(format!("Bad <step> value '{}'", other))),
    };
    let pitch = Pitch::from_semitones((octave - 4) * 12 + base + n.alter);

    if n.chord {
        match events.last_mut() {
            Some(prev) if !prev.rest => prev.pitches.push(pitch),
            _ => return Err(xml_err("<chord/> note with no preceding note")),
        }
    } else {
        events.push(RawEvent {
            pitches: vec![pitch],
            quarters,
            rest: false,
        });
    }
    Ok(())
}

const POW2_DENOMS: [u64; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Render a quarter-note length as a `+`-sum of note-value denominators,
/// greedily from the whole note down ("4+8" for a dotted quarter).
pub fn fraction_to_spec(quarters: Quarters) -> Result<String, OcarinaError> {
    let mut num = quarters.num;
    let mut den = quarters.den;
    let mut parts: Vec<String> = Vec::new();

    for d in POW2_DENOMS {
        // A 1/d note is 4/d quarters; num/den >= 4/d iff num*d >= 4*den.
        while num * d >= 4 * den {
            parts.push(d.to_string());
            let reduced = Quarters::new(num * d - 4 * den, den * d);
            num = reduced.num;
            den = reduced.den;
        }
    }

    if num != 0 {
        return Err(xml_err(format!(
            "Cannot represent duration {}/{} quarter notes as power-of-two note values",
            quarters.num, quarters.den
        )));
    }
    if parts.is_empty() {
        return Err(xml_err("Zero-length duration".to_string()));
    }
    Ok(parts.join("+"))
}

/// Pick the semitone shift in -24..=24 that puts the most notes directly in
/// the mapping's range. Ties go first to whole-octave shifts, which keep the
/// written pitch classes intact, then to the smallest magnitude.
pub fn best_transpose(events: &[RawEvent], mapping: &KeyMap) -> i32 {
    let mut best_shift = 0;
    let mut best_score = (0usize, false, i32::MIN);
    for shift in -24..=24i32 {
        let count = events
            .iter()
            .flat_map(|e| e.pitches.iter())
            .filter(|p| mapping.contains(p.transpose(shift)))
            .count();
        let score = (count, shift % 12 == 0, -shift.abs());
        if score > best_score {
            best_score = score;
            best_shift = shift;
        }
    }
    best_shift
}

/// Convert MusicXML text into score text. With a mapping and
/// `auto_transpose`, the best global shift is baked into the pitches and
/// out-of-range notes are octave-folded.
pub fn convert_str(
    xml: &str,
    mapping: Option<&KeyMap>,
    auto_transpose: bool,
) -> Result<String, OcarinaError> {
    let score = parse_musicxml(xml)?;
    let shift = match mapping {
        Some(map) if auto_transpose => best_transpose(&score.events, map),
        _ => 0,
    };

    let mut lines: Vec<String> = Vec::new();
    if let Some(bpm) = score.bpm {
        lines.push(format!("BPM={}", bpm.round() as u32));
    }
    for event in &score.events {
        let spec = fraction_to_spec(event.quarters)?;
        if event.rest {
            lines.push(format!("R:{}", spec));
        } else {
            let names: Vec<String> = event
                .pitches
                .iter()
                .map(|p| {
                    let shifted = p.transpose(shift);
                    let folded = mapping.and_then(|m| m.fold(shifted)).unwrap_or(shifted);
                    folded.to_string()
                })
                .collect();
            lines.push(format!("{}:{}", names.join("+"), spec));
        }
    }

    Ok(lines.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partwise(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list>
    <score-part id="P1"><part-name>Melody</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>2</divisions></attributes>
      {}
    </measure>
  </part>
</score-partwise>"#,
            body
        )
    }

    fn note(step: char, octave: i32, duration: u64) -> String {
        format!(
            "<note><pitch><step>{}</step><octave>{}</octave></pitch><duration>{}</duration></note>",
            step, octave, duration
        )
    }

    #[test]
    fn test_simple_melody() {
        let xml = partwise(&format!("{}{}", note('C', 4, 2), note('D', 4, 2)));
        let out = convert_str(&xml, None, false).unwrap();
        assert_eq!(out, "C4:4\nD4:4\n");
    }

    #[test]
    fn test_tempo_from_sound_element() {
        let xml = partwise(&format!(
            r#"<direction><sound tempo="96"/></direction>{}"#,
            note('C', 4, 2)
        ));
        let out = convert_str(&xml, None, false).unwrap();
        assert!(out.starts_with("BPM=96\n"));
    }

    #[test]
    fn test_alter_normalizes_to_sharp() {
        let xml = partwise(
            "<note><pitch><step>D</step><alter>-1</alter><octave>4</octave></pitch><duration>2</duration></note>",
        );
        let out = convert_str(&xml, None, false).unwrap();
        assert_eq!(out, "C#4:4\n");
    }

    #[test]
    fn test_rest() {
        let xml = partwise(&format!("<note><rest/><duration>4</duration></note>{}", note('E', 4, 2)));
        let out = convert_str(&xml, None, false).unwrap();
        assert_eq!(out, "R:2\nE4:4\n");
    }

    #[test]
    fn test_rest_with_separate_closing_tag() {
        let body = format!(
            "<note><rest></rest><duration>4</duration></note>{}",
            note('E', 4, 2)
        );
        let out = convert_str(&partwise(&body), None, false).unwrap();
        assert_eq!(out, "R:2\nE4:4\n");
    }

    #[test]
    fn test_chord_marker_with_separate_closing_tag() {
        let body = format!(
            "{}<note><chord></chord><pitch><step>E</step><octave>4</octave></pitch><duration>2</duration></note>",
            note('C', 4, 2)
        );
        let out = convert_str(&partwise(&body), None, false).unwrap();
        assert_eq!(out, "C4+E4:4\n");
    }

    #[test]
    fn test_chord_joins_pitches() {
        let body = format!(
            "{}<note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>2</duration></note>",
            note('C', 4, 2)
        );
        let out = convert_str(&partwise(&body), None, false).unwrap();
        assert_eq!(out, "C4+E4:4\n");
    }

    #[test]
    fn test_dotted_duration_becomes_sum() {
        // 3 divisions at divisions=2 is 1.5 quarters: dotted quarter = 4+8
        let xml = partwise(&note('C', 4, 3));
        let out = convert_str(&xml, None, false).unwrap();
        assert_eq!(out, "C4:4+8\n");
    }

    #[test]
    fn test_whole_note_and_breve_sum() {
        // 8 divisions = 4 quarters = whole note
        let xml = partwise(&note('C', 4, 8));
        let out = convert_str(&xml, None, false).unwrap();
        assert_eq!(out, "C4:1\n");
    }

    #[test]
    fn test_unrepresentable_duration_fails() {
        // Triplet-ish: divisions=2, duration 1 is fine (eighth), but
        // divisions=3 style values are not representable.
        let xml = partwise(
            "<attributes><divisions>3</divisions></attributes><note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>",
        );
        let err = convert_str(&xml, None, false).unwrap_err();
        assert!(err.to_string().contains("Cannot represent"));
    }

    #[test]
    fn test_grace_note_skipped() {
        let body = format!(
            "<note><grace/><pitch><step>A</step><octave>4</octave></pitch></note>{}",
            note('C', 4, 2)
        );
        let out = convert_str(&partwise(&body), None, false).unwrap();
        assert_eq!(out, "C4:4\n");
    }

    #[test]
    fn test_fraction_to_spec_values() {
        assert_eq!(fraction_to_spec(Quarters::new(1, 1)).unwrap(), "4");
        assert_eq!(fraction_to_spec(Quarters::new(1, 2)).unwrap(), "8");
        assert_eq!(fraction_to_spec(Quarters::new(7, 4)).unwrap(), "4+8+16");
        assert_eq!(fraction_to_spec(Quarters::new(6, 1)).unwrap(), "1+2");
    }

    #[test]
    fn test_auto_transpose_shifts_into_range() {
        // Mapping covers octave 4 only; melody written an octave up.
        let map = KeyMap::from_json(r#"{"C4": "z", "D4": "x", "E4": "c"}"#).unwrap();
        let xml = partwise(&format!("{}{}", note('C', 5, 2), note('D', 5, 2)));
        let out = convert_str(&xml, Some(&map), true).unwrap();
        assert_eq!(out, "C4:4\nD4:4\n");
    }

    #[test]
    fn test_auto_transpose_prefers_octave_shift_on_ties() {
        // Shifting C5,D5 by -10 also lands both notes in this mapping (as
        // D4,E4), but that rewrites the melody. The whole-octave shift must
        // win the tie so the pitch classes survive.
        let map = KeyMap::from_json(r#"{"C4": "z", "D4": "x", "E4": "c"}"#).unwrap();
        let events = vec![
            RawEvent {
                pitches: vec![Pitch::from_semitones(12)], // C5
                quarters: Quarters::new(1, 1),
                rest: false,
            },
            RawEvent {
                pitches: vec![Pitch::from_semitones(14)], // D5
                quarters: Quarters::new(1, 1),
                rest: false,
            },
        ];
        assert_eq!(best_transpose(&events, &map), -12);
    }

    #[test]
    fn test_no_transpose_flag_disables_shift() {
        let map = KeyMap::from_json(r#"{"C4": "z", "D4": "x"}"#).unwrap();
        let xml = partwise(&note('C', 5, 2));
        let out = convert_str(&xml, Some(&map), false).unwrap();
        // Not shifted, but still folded into the mapping's range.
        assert_eq!(out, "C4:4\n");
    }

    #[test]
    fn test_second_part_ignored() {
        let xml = format!(
            r#"<score-partwise><part id="P1"><measure number="1">
<attributes><divisions>1</divisions></attributes>{}</measure></part>
<part id="P2"><measure number="1">{}</measure></part></score-partwise>"#,
            note('C', 4, 1),
            note('G', 2, 1)
        );
        let out = convert_str(&xml, None, false).unwrap();
        assert_eq!(out, "C4:4\n");
    }
}
