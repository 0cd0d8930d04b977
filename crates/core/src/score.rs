//! Reader for `.thr` notation files.
//!
//! A file is split into three sections, introduced by lines containing the
//! words `header`, `instruments` and `notes`:
//!
//! ```text
//! header
//! 120
//! instruments
//! gaussian
//! cauchy 0.02
//! notes
//! 0, 3.0, 0.5, 1.0
//! 1, 3.5, 1.0, 0.5
//! ```
//!
//! The header holds the tempo in beats per minute. Each instrument line names
//! a registered instrument type, optionally followed by a kernel width. Each
//! note line is `instrument, octave, start, duration` with times in seconds.
//! Blank lines and lines starting with `#` are ignored everywhere.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Instrument, InstrumentContext, InstrumentRegistry, Note, Result, ThrorganError};

/// Global settings of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub bpm: f64,
}

impl Header {
    pub fn new(bpm: f64) -> Result<Self> {
        if bpm.is_finite() && bpm > 0.0 {
            Ok(Self { bpm })
        } else {
            Err(ThrorganError::InvalidTempo(bpm))
        }
    }
}

/// A parsed piece: tempo, instruments and the notes they play.
#[derive(Debug)]
pub struct Score {
    pub header: Header,
    pub instruments: Vec<Box<dyn Instrument>>,
    pub notes: Vec<Note>,
}

impl Score {
    /// Parses notation text using the built-in instruments.
    pub fn parse(text: &str) -> Result<Self> {
        parse_score(text, &InstrumentRegistry::with_builtins())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Latest time at which any note is still audible, or zero without notes.
    pub fn end_time(&self) -> f64 {
        self.notes
            .iter()
            .map(Note::effective_end)
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Header,
    Instruments,
    Notes,
}

impl Section {
    fn from_marker(line: &str) -> Option<Self> {
        let lower = line.to_ascii_lowercase();
        if lower.contains("header") {
            Some(Section::Header)
        } else if lower.contains("instruments") {
            Some(Section::Instruments)
        } else if lower.contains("notes") {
            Some(Section::Notes)
        } else {
            None
        }
    }
}

/// Parses notation text, resolving instrument types through `registry`.
pub fn parse_score(text: &str, registry: &InstrumentRegistry) -> Result<Score> {
    let mut section = Section::Preamble;
    let mut header: Option<(usize, Header)> = None;
    let mut instrument_lines = Vec::new();
    let mut note_lines = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(next) = Section::from_marker(line) {
            section = next;
            continue;
        }

        match section {
            Section::Preamble => {}
            Section::Header => {
                if let Some((first, _)) = header {
                    return Err(ThrorganError::MalformedHeader {
                        line: line_no,
                        reason: format!("tempo was already declared on line {first}"),
                    });
                }
                header = Some((line_no, parse_header(line, line_no)?));
            }
            Section::Instruments => instrument_lines.push((line_no, line)),
            Section::Notes => note_lines.push((line_no, line)),
        }
    }

    let header = match header {
        Some((_, header)) => header,
        None => {
            let (line, section) = match (instrument_lines.first(), note_lines.first()) {
                (Some(&(line, _)), _) => (line, "instruments"),
                (None, Some(&(line, _))) => (line, "notes"),
                (None, None) => (text.lines().count(), "the end of the file"),
            };
            return Err(ThrorganError::MissingTempo { line, section });
        }
    };

    let context = InstrumentContext { bpm: header.bpm };
    let mut instruments = instrument_lines
        .iter()
        .map(|&(line_no, line)| parse_instrument(line, line_no, registry, &context))
        .collect::<Result<Vec<_>>>()?;
    if instruments.is_empty() {
        tracing::info!("no instruments declared; using a single tempo-scaled gaussian");
        instruments.push(Box::new(crate::Gaussian::new(header.bpm)?));
    }

    let notes = note_lines
        .iter()
        .map(|&(line_no, line)| parse_note(line, line_no, &instruments))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        bpm = header.bpm,
        instruments = instruments.len(),
        notes = notes.len(),
        "parsed score"
    );
    Ok(Score {
        header,
        instruments,
        notes,
    })
}

fn parse_header(line: &str, line_no: usize) -> Result<Header> {
    let bpm = line
        .parse::<f64>()
        .map_err(|_| ThrorganError::MalformedHeader {
            line: line_no,
            reason: format!("expected a tempo in beats per minute, found `{line}`"),
        })?;
    Header::new(bpm).map_err(|err| err.at_line(line_no))
}

fn parse_instrument(
    line: &str,
    line_no: usize,
    registry: &InstrumentRegistry,
    context: &InstrumentContext,
) -> Result<Box<dyn Instrument>> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    let args = tokens
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| ThrorganError::InvalidInstrument {
                    line: line_no,
                    reason: format!("`{token}` is not a number"),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    match registry.build(name, context, &args) {
        Some(built) => built.map_err(|err| match err {
            ThrorganError::Message(reason) => ThrorganError::InvalidInstrument {
                line: line_no,
                reason,
            },
            other => other.at_line(line_no),
        }),
        None => Err(ThrorganError::UnknownInstrument {
            line: line_no,
            name: name.to_string(),
        }),
    }
}

fn parse_note(line: &str, line_no: usize, instruments: &[Box<dyn Instrument>]) -> Result<Note> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [index, octave, start, duration] = fields.as_slice() else {
        return Err(ThrorganError::MalformedNote {
            line: line_no,
            reason: format!(
                "expected `instrument, octave, start, duration`, found {} fields",
                fields.len()
            ),
        });
    };

    let index = index
        .parse::<usize>()
        .map_err(|_| ThrorganError::MalformedNote {
            line: line_no,
            reason: format!("instrument index `{index}` is not a non-negative integer"),
        })?;
    let octave = number(octave, "octave", line_no)?;
    let start = number(start, "start", line_no)?;
    let duration = number(duration, "duration", line_no)?;

    Note::new(instruments, index, octave, start, duration).map_err(|err| err.at_line(line_no))
}

fn number(field: &str, what: &str, line_no: usize) -> Result<f64> {
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ThrorganError::MalformedNote {
            line: line_no,
            reason: format!("{what} `{field}` is not a finite number"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: &str = "\
# a short test piece
header
120
instruments
gaussian
Cauchy 0.02
notes
0, 3.0, 0.5, 1.0
1, 3.5, 1.0, 0.5

0,4.25,2.0,0.25
";

    #[test]
    fn parses_all_sections() {
        let score = Score::parse(SONG).unwrap();
        assert_eq!(score.header.bpm, 120.0);
        assert_eq!(score.instruments.len(), 2);
        assert_eq!(score.instruments[0].name(), "gaussian");
        assert_eq!(score.instruments[1].name(), "cauchy");
        assert_eq!(score.notes.len(), 3);

        let note = &score.notes[1];
        assert_eq!(note.instrument(), 1);
        assert_eq!(note.octave(), 3.5);
        assert!((note.effective_start() - 0.9).abs() < 1e-12);

        assert_eq!(score.notes[2].octave(), 4.25);
        // Last note: 2.0 + 0.25 + gaussian release of 0.1 s.
        assert!((score.end_time() - 2.35).abs() < 1e-12);
    }

    #[test]
    fn empty_instrument_section_falls_back_to_gaussian() {
        let score = Score::parse("header\n90\ninstruments\nnotes\n0, 3, 0, 1\n").unwrap();
        assert_eq!(score.instruments.len(), 1);
        assert_eq!(score.instruments[0].name(), "gaussian");
        assert!((score.instruments[0].pre_time() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn markers_are_case_insensitive_substrings() {
        let score = Score::parse("== Header ==\n60\n[Instruments]\ncauchy\n-- NOTES --\n0, 1, 0, 1\n")
            .unwrap();
        assert_eq!(score.header.bpm, 60.0);
        assert_eq!(score.notes.len(), 1);
    }

    #[test]
    fn rejects_invalid_tempo() {
        let err = Score::parse("header\n0\nnotes\n").unwrap_err();
        assert!(matches!(err, ThrorganError::MalformedHeader { line: 2, .. }));
        assert!(err.is_configuration());

        let err = Score::parse("header\nfast\n").unwrap_err();
        assert!(matches!(err, ThrorganError::MalformedHeader { line: 2, .. }));

        let err = Score::parse("header\n120\n130\n").unwrap_err();
        assert!(matches!(err, ThrorganError::MalformedHeader { line: 3, .. }));
    }

    #[test]
    fn requires_a_tempo() {
        let err = Score::parse("instruments\ngaussian\n").unwrap_err();
        assert!(matches!(
            err,
            ThrorganError::MissingTempo {
                line: 2,
                section: "instruments"
            }
        ));
    }

    #[test]
    fn rejects_unknown_instruments() {
        let err = Score::parse("header\n120\ninstruments\nkazoo\n").unwrap_err();
        assert!(matches!(
            err,
            ThrorganError::UnknownInstrument { line: 4, ref name } if name == "kazoo"
        ));

        let err = Score::parse("header\n120\ninstruments\ncauchy wide\n").unwrap_err();
        assert!(matches!(err, ThrorganError::InvalidInstrument { line: 4, .. }));

        let err = Score::parse("header\n120\ninstruments\ncauchy -1\n").unwrap_err();
        assert!(matches!(err, ThrorganError::InvalidInstrument { line: 4, .. }));
    }

    #[test]
    fn rejects_malformed_notes() {
        for (text, line) in [
            ("header\n120\nnotes\n0, 3.0, 0.5\n", 4),
            ("header\n120\nnotes\n0, 3.0, 0.5, 1.0, 2\n", 4),
            ("header\n120\nnotes\n0, 3.0, 0.5, 1.0\nx, 3.0, 0.5, 1.0\n", 5),
            ("header\n120\nnotes\n0, three, 0.5, 1.0\n", 4),
            ("header\n120\nnotes\n0, 3.0, NaN, 1.0\n", 4),
            ("header\n120\nnotes\n1, 3.0, 0.5, 1.0\n", 4),
        ] {
            match Score::parse(text) {
                Err(ThrorganError::MalformedNote { line: got, .. }) => assert_eq!(got, line),
                other => panic!("expected malformed note for {text:?}, got {other:?}"),
            }
        }
    }
}
