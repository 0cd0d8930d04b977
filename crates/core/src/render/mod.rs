use std::f64::consts::TAU;

use crate::{AmplitudeGrid, RenderConfig};

/// Cosine carriers, one per pitch bin, evaluated on demand for a single
/// coarse step at a time.
#[derive(Debug, Clone)]
pub struct CarrierBank {
    /// Angular step per audio sample for every bin.
    omegas: Vec<f64>,
    frequencies: Vec<f64>,
    samples_per_step: usize,
}

impl CarrierBank {
    pub fn new(config: &RenderConfig, pitch_axis: &[f64]) -> Self {
        let sample_rate = config.sample_rate as f64;
        let frequencies: Vec<f64> = pitch_axis
            .iter()
            .map(|&octave| config.frequency_of(octave))
            .collect();
        let omegas = frequencies.iter().map(|f| TAU * f / sample_rate).collect();

        Self {
            omegas,
            frequencies,
            samples_per_step: config.samples_per_step(),
        }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Adds `weight` times carrier `bin` over the samples of `step` into
    /// `out`, which must hold exactly one step of samples.
    pub fn accumulate(&self, bin: usize, step: usize, weight: f64, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.samples_per_step);
        let omega = self.omegas[bin];
        let first = step * self.samples_per_step;
        for (k, sample) in out.iter_mut().enumerate() {
            *sample += weight * (omega * (first + k) as f64).cos();
        }
    }
}

/// Audio produced from an amplitude grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub sample_rate: u32,
    /// Waveform scaled into `[-1, 1]`.
    pub signal: Vec<f64>,
    /// Quantized 16-bit samples.
    pub samples: Vec<i16>,
    /// Peak absolute value of the waveform before normalization.
    pub peak: f64,
}

impl RenderedAudio {
    /// Whether the timeline rendered to pure silence.
    pub fn is_silent(&self) -> bool {
        self.peak == 0.0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Expands an amplitude grid into full-rate audio.
///
/// Each coarse step's weights are held for the whole step, so amplitude only
/// changes at step boundaries.
#[derive(Debug)]
pub struct WaveformRenderer<'a> {
    config: &'a RenderConfig,
}

impl<'a> WaveformRenderer<'a> {
    pub fn new(config: &'a RenderConfig) -> Self {
        Self { config }
    }

    /// Sums the weighted carriers of every rendered step, in time order.
    pub fn synthesize(&self, grid: &AmplitudeGrid) -> Vec<f64> {
        let bank = CarrierBank::new(self.config, grid.pitch_axis());
        let per_step = self.config.samples_per_step();
        let steps = if self.config.drop_final_step {
            grid.steps().saturating_sub(1)
        } else {
            grid.steps()
        };

        let mut raw = vec![0.0; steps * per_step];
        for (step, out) in raw.chunks_exact_mut(per_step).enumerate() {
            for (bin, &weight) in grid.column(step).iter().enumerate() {
                if weight != 0.0 {
                    bank.accumulate(bin, step, weight, out);
                }
            }
        }
        raw
    }

    /// Synthesizes, normalizes and quantizes `grid`.
    pub fn render(&self, grid: &AmplitudeGrid) -> RenderedAudio {
        let mut signal = self.synthesize(grid);
        let peak = normalize(&mut signal);
        if peak == 0.0 {
            tracing::warn!(
                samples = signal.len(),
                "rendered timeline is silent; writing silence"
            );
        }
        let samples = quantize_i16(&signal);

        tracing::debug!(samples = samples.len(), peak, "rendered waveform");
        RenderedAudio {
            sample_rate: self.config.sample_rate,
            signal,
            samples,
            peak,
        }
    }
}

/// Divides `signal` by its peak absolute value and returns that peak.
/// A silent signal is left untouched and reports a peak of zero.
pub fn normalize(signal: &mut [f64]) -> f64 {
    let peak = signal.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if peak > 0.0 {
        for x in signal.iter_mut() {
            *x /= peak;
        }
    }
    peak
}

/// Scales `signal` so its largest magnitude lands on `i16::MAX` and rounds
/// to 16-bit samples.
pub fn quantize_i16(signal: &[f64]) -> Vec<i16> {
    let (lo, hi) = signal
        .iter()
        .fold((0.0_f64, 0.0_f64), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    let extent = (-lo).max(hi);
    if extent == 0.0 {
        return vec![0; signal.len()];
    }

    let scale = i16::MAX as f64 / extent;
    signal
        .iter()
        .map(|&x| (x * scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect()
}
