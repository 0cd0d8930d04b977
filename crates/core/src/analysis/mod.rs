use std::f32::consts::PI;

use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

use crate::{Result, ThrorganError};

/// Hann-windowed magnitude spectrum of a block of samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    /// Width of one bin in Hz.
    pub bin_hz: f32,
    pub magnitudes: Vec<f32>,
}

impl Spectrum {
    /// Computes the spectrum of `samples` taken at `sample_rate`.
    pub fn of(samples: &[f32], sample_rate: u32) -> Result<Self> {
        let len = samples.len();
        if len < 2 {
            return Err(ThrorganError::msg(
                "spectrum analysis requires at least two samples",
            ));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(len);
        let mut input = plan.make_input_vec();
        let mut spectrum = plan.make_output_vec();
        let mut scratch = plan.make_scratch_vec();

        for (index, value) in samples.iter().enumerate() {
            input[index] = *value * hann_value(index, len);
        }
        plan.process_with_scratch(&mut input, &mut spectrum, &mut scratch)?;

        Ok(Self {
            bin_hz: sample_rate as f32 / len as f32,
            magnitudes: spectrum.iter().map(|bin| bin.norm()).collect(),
        })
    }

    /// Convenience wrapper for 16-bit samples.
    pub fn of_i16(samples: &[i16], sample_rate: u32) -> Result<Self> {
        let scaled: Vec<f32> = samples
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect();
        Self::of(&scaled, sample_rate)
    }

    /// Centre frequency of the strongest bin, ignoring DC.
    pub fn peak_frequency(&self) -> Option<f32> {
        self.magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .filter(|(_, magnitude)| **magnitude > f32::EPSILON)
            .map(|(index, _)| index as f32 * self.bin_hz)
    }

    /// Summed squared magnitude of the bins within `bandwidth_hz` of `freq`.
    pub fn energy_near(&self, freq: f32, bandwidth_hz: f32) -> f32 {
        self.magnitudes
            .iter()
            .enumerate()
            .filter(|(index, _)| (*index as f32 * self.bin_hz - freq).abs() <= bandwidth_hz)
            .map(|(_, magnitude)| magnitude * magnitude)
            .sum()
    }

    pub fn total_energy(&self) -> f32 {
        self.magnitudes.iter().map(|m| m * m).sum()
    }
}

pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
