use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, ThrorganError};

/// How the scheduler treats a note whose audible window falls entirely
/// between two coarse time steps (or whose window is empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedNotePolicy {
    /// Sound the note for exactly one step at full envelope weight.
    #[default]
    Pulse,
    /// Skip the note without producing any output.
    Drop,
}

/// Immutable render settings passed through the synthesis pipeline.
///
/// The defaults describe a three second timeline at
/// 22.05 kHz, 49 audio samples per coarse step and a seven octave pitch axis
/// with 32 bins per octave where octave 3 is middle C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub sample_rate: u32,
    /// Length of the rendered timeline in seconds.
    pub duration_seconds: f64,
    /// Audio samples per coarse time step.
    pub subdivide: usize,
    /// Frequency in Hz of octave 3 on the pitch axis.
    pub middle_c: f64,
    pub octave_span: f64,
    pub bins_per_octave: usize,
    /// Leave the last coarse step of the timeline out of the audio.
    pub drop_final_step: bool,
    pub missed_notes: MissedNotePolicy,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            duration_seconds: 3.0,
            subdivide: 49,
            middle_c: 261.625565,
            octave_span: 7.0,
            bins_per_octave: 32,
            drop_final_step: true,
            missed_notes: MissedNotePolicy::Pulse,
        }
    }
}

impl RenderConfig {
    /// Upper bound on `pitch_bins() * step_count()`, about 512 MiB of grid.
    /// At the default resolution this allows roughly eleven minutes.
    pub const MAX_GRID_CELLS: usize = 1 << 26;

    /// Parses a JSON document. Keys that are absent keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        if !(self.duration_seconds.is_finite() && self.duration_seconds > 0.0) {
            return Err(invalid("duration_seconds must be a positive number"));
        }
        if self.subdivide == 0 {
            return Err(invalid("subdivide must be positive"));
        }
        if !(self.middle_c.is_finite() && self.middle_c > 0.0) {
            return Err(invalid("middle_c must be a positive frequency"));
        }
        if !(self.octave_span.is_finite() && self.octave_span > 0.0) {
            return Err(invalid("octave_span must be positive"));
        }
        if self.pitch_bins() < 2 {
            return Err(invalid("the pitch axis needs at least two bins"));
        }
        if self.step_count() < 2 {
            return Err(ThrorganError::InvalidConfig(format!(
                "{} seconds at {} Hz yields {} coarse steps of {} samples; at least 2 are required",
                self.duration_seconds,
                self.sample_rate,
                self.step_count(),
                self.subdivide
            )));
        }
        let cells = self.pitch_bins().saturating_mul(self.step_count());
        if cells > Self::MAX_GRID_CELLS {
            return Err(ThrorganError::InvalidConfig(format!(
                "{} seconds at this resolution needs {} grid cells; the limit is {}",
                self.duration_seconds,
                cells,
                Self::MAX_GRID_CELLS
            )));
        }
        Ok(())
    }

    /// Number of coarse time steps, `sample_rate * duration / subdivide`
    /// rounded down.
    pub fn step_count(&self) -> usize {
        // Tolerate rounding noise in durations derived from step counts.
        let samples = (self.sample_rate as f64 * self.duration_seconds + 1e-6).floor();
        (samples as usize) / self.subdivide.max(1)
    }

    pub fn samples_per_step(&self) -> usize {
        self.subdivide
    }

    /// Number of coarse steps that are turned into audio.
    pub fn rendered_steps(&self) -> usize {
        let steps = self.step_count();
        if self.drop_final_step {
            steps.saturating_sub(1)
        } else {
            steps
        }
    }

    /// Length of the rendered sample buffer.
    pub fn output_len(&self) -> usize {
        self.rendered_steps() * self.subdivide
    }

    pub fn pitch_bins(&self) -> usize {
        (self.octave_span * self.bins_per_octave as f64).round() as usize
    }

    /// Evenly spaced pitch coordinates from 0 to `octave_span`, both ends
    /// included.
    pub fn pitch_axis(&self) -> Vec<f64> {
        linspace(0.0, self.octave_span, self.pitch_bins())
    }

    /// Start time in seconds of coarse step `index`.
    pub fn step_time(&self, index: usize) -> f64 {
        (index * self.subdivide) as f64 / self.sample_rate as f64
    }

    pub fn step_times(&self) -> Vec<f64> {
        (0..self.step_count()).map(|i| self.step_time(i)).collect()
    }

    /// Carrier frequency for a pitch coordinate; octave 3 maps to middle C.
    pub fn frequency_of(&self, octave: f64) -> f64 {
        self.middle_c * 2f64.powf(octave - 3.0)
    }
}

fn invalid(reason: &str) -> ThrorganError {
    ThrorganError::InvalidConfig(reason.to_string())
}

pub(crate) fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_seven_octaves_over_three_seconds() {
        let config = RenderConfig::default();
        config.validate().unwrap();

        assert_eq!(config.step_count(), 1350);
        assert_eq!(config.output_len(), 1349 * 49);
        assert_eq!(config.pitch_bins(), 224);

        let axis = config.pitch_axis();
        assert_eq!(axis[0], 0.0);
        assert!((axis[223] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn octave_three_is_middle_c() {
        let config = RenderConfig::default();
        assert!((config.frequency_of(3.0) - 261.625565).abs() < 1e-9);
        assert!((config.frequency_of(4.0) - 2.0 * 261.625565).abs() < 1e-9);
    }

    #[test]
    fn keeping_the_final_step_extends_output() {
        let config = RenderConfig {
            drop_final_step: false,
            ..Default::default()
        };
        assert_eq!(config.output_len(), 1350 * 49);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RenderConfig::from_json_str(r#"{ "sample_rate": 8000, "missed_notes": "drop" }"#)
                .unwrap();
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.subdivide, 49);
        assert_eq!(config.missed_notes, MissedNotePolicy::Drop);
    }

    #[test]
    fn rejects_degenerate_resolution() {
        let config = RenderConfig {
            subdivide: 100_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ThrorganError::InvalidConfig(_))
        ));

        let config = RenderConfig {
            duration_seconds: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_timelines_too_long_to_hold() {
        let ten_minutes = RenderConfig {
            duration_seconds: 600.0,
            ..Default::default()
        };
        ten_minutes.validate().unwrap();

        let config = RenderConfig {
            duration_seconds: 1e9,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ThrorganError::InvalidConfig(_))
        ));
    }
}
