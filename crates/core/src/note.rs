use serde::Serialize;

use crate::{Instrument, Result, ThrorganError};

/// A scheduled note, widened by its instrument's attack and release ramps.
///
/// Notes only come from [`Note::new`], which derives the audible window from
/// the instrument list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    instrument: usize,
    octave: f64,
    start: f64,
    duration: f64,
    effective_start: f64,
    effective_duration: f64,
}

impl Note {
    /// Builds a note played by `instruments[instrument]`.
    pub fn new(
        instruments: &[Box<dyn Instrument>],
        instrument: usize,
        octave: f64,
        start: f64,
        duration: f64,
    ) -> Result<Self> {
        let inst = instruments
            .get(instrument)
            .ok_or(ThrorganError::InstrumentIndex {
                index: instrument,
                count: instruments.len(),
            })?;
        let pre = inst.pre_time();
        let post = inst.post_time();

        Ok(Self {
            instrument,
            octave,
            start,
            duration,
            effective_start: start - pre,
            effective_duration: duration + pre + post,
        })
    }

    pub fn instrument(&self) -> usize {
        self.instrument
    }

    pub fn octave(&self) -> f64 {
        self.octave
    }

    /// Nominal start in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Nominal duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Start of the audible window, including the attack ramp.
    pub fn effective_start(&self) -> f64 {
        self.effective_start
    }

    /// Length of the audible window, including both ramps.
    pub fn effective_duration(&self) -> f64 {
        self.effective_duration
    }

    pub fn effective_end(&self) -> f64 {
        self.effective_start + self.effective_duration
    }

    /// Whether the note sounds at `t`. The window is open on both ends.
    pub fn check(&self, t: f64) -> bool {
        self.effective_start < t && t < self.effective_end()
    }
}
