use serde::{Deserialize, Serialize};

use crate::{Instrument, Note, RenderConfig, Result, Scheduler, ThrorganError};

/// Time-varying spectral amplitudes indexed by `[pitch bin][time step]`.
///
/// Values are stored one time step after another so that a step's column is
/// contiguous; [`AmplitudeGrid::get`] takes the bin first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeGrid {
    pitch_axis: Vec<f64>,
    times: Vec<f64>,
    values: Vec<f64>,
}

impl AmplitudeGrid {
    /// All-zero grid over the given axes.
    pub fn zeros(pitch_axis: Vec<f64>, times: Vec<f64>) -> Self {
        let values = vec![0.0; pitch_axis.len() * times.len()];
        Self {
            pitch_axis,
            times,
            values,
        }
    }

    pub fn pitch_axis(&self) -> &[f64] {
        &self.pitch_axis
    }

    /// Start time in seconds of every coarse step.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn bins(&self) -> usize {
        self.pitch_axis.len()
    }

    pub fn steps(&self) -> usize {
        self.times.len()
    }

    pub fn get(&self, bin: usize, step: usize) -> f64 {
        self.values[step * self.bins() + bin]
    }

    /// Amplitudes of every pitch bin at `step`.
    pub fn column(&self, step: usize) -> &[f64] {
        let bins = self.bins();
        &self.values[step * bins..(step + 1) * bins]
    }

    pub fn column_mut(&mut self, step: usize) -> &mut [f64] {
        let bins = self.bins();
        &mut self.values[step * bins..(step + 1) * bins]
    }

    /// Amplitude of `bin` across all steps.
    pub fn row(&self, bin: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.steps()).map(move |step| self.get(bin, step))
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Accumulates every sounding note's enveloped profile into a grid.
#[derive(Debug)]
pub struct GridBuilder<'a> {
    config: &'a RenderConfig,
    instruments: &'a [Box<dyn Instrument>],
}

impl<'a> GridBuilder<'a> {
    pub fn new(config: &'a RenderConfig, instruments: &'a [Box<dyn Instrument>]) -> Self {
        Self {
            config,
            instruments,
        }
    }

    /// Builds the amplitude grid for `notes`.
    ///
    /// Fails with [`ThrorganError::InstrumentIndex`] when a note references
    /// an instrument this builder does not hold.
    pub fn build(&self, notes: &[Note]) -> Result<AmplitudeGrid> {
        let count = self.instruments.len();
        if let Some(note) = notes.iter().find(|note| note.instrument() >= count) {
            return Err(ThrorganError::InstrumentIndex {
                index: note.instrument(),
                count,
            });
        }
        self.warn_out_of_range(notes);

        let mut grid = AmplitudeGrid::zeros(self.config.pitch_axis(), self.config.step_times());
        let axis = grid.pitch_axis().to_vec();
        let mut scheduler = Scheduler::new(notes, self.config.missed_notes);
        let mut peak_polyphony = 0;

        for step in 0..grid.steps() {
            let t = grid.times()[step];
            scheduler.advance(t);
            peak_polyphony = peak_polyphony.max(scheduler.active().len());

            let column = grid.column_mut(step);
            for &index in scheduler.active() {
                let note = &notes[index];
                let inst = &self.instruments[note.instrument()];
                let weight = inst.amp(t - note.start(), note.duration());
                inst.profile_into(&axis, note.octave(), weight, column);
            }
            for &index in scheduler.pulsed() {
                let note = &notes[index];
                let inst = &self.instruments[note.instrument()];
                // Evaluated on the nearest sustain point; an empty window
                // sustains for zero seconds.
                let duration = note.duration().max(0.0);
                let elapsed = (t - note.start()).clamp(0.0, duration);
                let weight = inst.amp(elapsed, duration);
                inst.profile_into(&axis, note.octave(), weight, column);
            }
        }

        tracing::debug!(
            bins = grid.bins(),
            steps = grid.steps(),
            notes = notes.len(),
            peak_polyphony,
            "built amplitude grid"
        );
        Ok(grid)
    }

    fn warn_out_of_range(&self, notes: &[Note]) {
        let span = self.config.octave_span;
        let length = self.config.duration_seconds;

        for (index, note) in notes.iter().enumerate() {
            if !(0.0..=span).contains(&note.octave()) {
                tracing::warn!(
                    note = index,
                    octave = note.octave(),
                    span,
                    "note lies outside the pitch axis and will be nearly silent"
                );
            }
            if note.duration() < 0.0 {
                tracing::warn!(
                    note = index,
                    duration = note.duration(),
                    "note has a negative duration"
                );
            }
            if note.effective_end() <= 0.0 || note.effective_start() >= length {
                tracing::warn!(
                    note = index,
                    start = note.start(),
                    length,
                    "note lies outside the rendered timeline"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cauchy, Gaussian, MissedNotePolicy};

    fn small_config() -> RenderConfig {
        RenderConfig {
            sample_rate: 1000,
            duration_seconds: 2.0,
            subdivide: 10,
            ..Default::default()
        }
    }

    fn gaussian() -> Vec<Box<dyn Instrument>> {
        vec![Box::new(Gaussian::new(120.0).unwrap())]
    }

    #[test]
    fn empty_steps_have_zero_columns() {
        let config = small_config();
        let insts = gaussian();
        let notes = vec![Note::new(&insts, 0, 3.0, 0.5, 0.5).unwrap()];
        let grid = GridBuilder::new(&config, &insts).build(&notes).unwrap();

        assert_eq!(grid.steps(), 200);
        assert_eq!(grid.bins(), 224);
        // Steps at 0.0 s and 1.9 s are far from the note's window.
        assert!(grid.column(0).iter().all(|&v| v == 0.0));
        assert!(grid.column(190).iter().all(|&v| v == 0.0));
        // Octave 3 falls between two bins of the 7/223-octave axis.
        assert!(grid.max_value() > 0.3);
    }

    #[test]
    fn sustained_note_column_is_its_profile() {
        let config = small_config();
        let insts = gaussian();
        let notes = vec![Note::new(&insts, 0, 3.0, 0.5, 1.0).unwrap()];
        let grid = GridBuilder::new(&config, &insts).build(&notes).unwrap();

        let step = 100; // 1.0 s, inside the sustain interval
        for (bin, &pitch) in grid.pitch_axis().iter().enumerate() {
            let expected = insts[0].profile(pitch, 3.0);
            assert!((grid.get(bin, step) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn envelope_scales_columns_during_ramps() {
        let config = small_config();
        let insts: Vec<Box<dyn Instrument>> = vec![Box::new(Cauchy::new())];
        let notes = vec![Note::new(&insts, 0, 3.0, 0.5, 1.0).unwrap()];
        let grid = GridBuilder::new(&config, &insts).build(&notes).unwrap();

        let attack = 45; // 0.45 s, halfway through the 0.1 s attack
        let sustain = 100;
        let bin = 96; // close to octave 3
        let ratio = grid.get(bin, attack) / grid.get(bin, sustain);
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn overlapping_notes_accumulate_linearly() {
        let config = small_config();
        let insts = gaussian();
        let low = Note::new(&insts, 0, 3.0, 0.5, 1.0).unwrap();
        let high = Note::new(&insts, 0, 4.0, 0.5, 1.0).unwrap();

        let builder = GridBuilder::new(&config, &insts);
        let both = builder.build(&[low.clone(), high.clone()]).unwrap();
        let only_low = builder.build(&[low]).unwrap();
        let only_high = builder.build(&[high]).unwrap();

        for step in [60, 100, 140] {
            for bin in 0..both.bins() {
                let sum = only_low.get(bin, step) + only_high.get(bin, step);
                assert!((both.get(bin, step) - sum).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn pulsed_notes_leave_a_single_column() {
        let config = RenderConfig {
            missed_notes: MissedNotePolicy::Pulse,
            ..small_config()
        };
        let insts: Vec<Box<dyn Instrument>> = vec![Box::new(Cauchy::new())];
        let notes = vec![Note::new(&insts, 0, 3.0, 1.0, -0.5).unwrap()];
        let grid = GridBuilder::new(&config, &insts).build(&notes).unwrap();
        let lit: Vec<usize> = (0..grid.steps())
            .filter(|&s| grid.column(s).iter().any(|&v| v > 0.0))
            .collect();
        assert_eq!(lit.len(), 1);

        let config = RenderConfig {
            missed_notes: MissedNotePolicy::Drop,
            ..config
        };
        let grid = GridBuilder::new(&config, &insts).build(&notes).unwrap();
        assert_eq!(grid.max_value(), 0.0);
    }

    #[test]
    fn notes_that_ended_before_the_timeline_stay_silent() {
        let config = small_config();
        let insts = gaussian();
        let notes = vec![Note::new(&insts, 0, 3.0, -2.0, 0.5).unwrap()];
        let grid = GridBuilder::new(&config, &insts).build(&notes).unwrap();
        assert_eq!(grid.max_value(), 0.0);
    }

    #[test]
    fn rejects_notes_for_a_missing_instrument() {
        let config = small_config();
        let two: Vec<Box<dyn Instrument>> =
            vec![Box::new(Gaussian::new(120.0).unwrap()), Box::new(Cauchy::new())];
        let notes = vec![Note::new(&two, 1, 3.0, 0.5, 0.5).unwrap()];

        let one = gaussian();
        let err = GridBuilder::new(&config, &one).build(&notes).unwrap_err();
        assert!(matches!(
            err,
            ThrorganError::InstrumentIndex { index: 1, count: 1 }
        ));
    }
}
