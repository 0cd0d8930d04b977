use crate::{MissedNotePolicy, Note};

/// Tracks which notes sound as a time cursor moves forward.
///
/// Notes are visited through an index cursor over a copy of their indices
/// sorted by effective start, so the note slice itself is never reordered or
/// shrunk. Each note is admitted once and retired once, which keeps a full
/// pass over the timeline linear in the number of notes.
///
/// Time must advance strictly; rewinding requires a fresh scheduler.
#[derive(Debug)]
pub struct Scheduler<'a> {
    notes: &'a [Note],
    order: Vec<usize>,
    next_note: usize,
    active: Vec<usize>,
    pulsed: Vec<usize>,
    policy: MissedNotePolicy,
    last_time: Option<f64>,
}

impl<'a> Scheduler<'a> {
    pub fn new(notes: &'a [Note], policy: MissedNotePolicy) -> Self {
        let mut order: Vec<usize> = (0..notes.len()).collect();
        order.sort_by(|&a, &b| {
            notes[a]
                .effective_start()
                .total_cmp(&notes[b].effective_start())
        });

        Self {
            notes,
            order,
            next_note: 0,
            active: Vec::new(),
            pulsed: Vec::new(),
            policy,
            last_time: None,
        }
    }

    /// Moves the cursor to `t` and updates the active set.
    pub fn advance(&mut self, t: f64) {
        debug_assert!(
            self.last_time.map_or(true, |last| t > last),
            "scheduler time must strictly increase"
        );
        let previous = self.last_time.replace(t);
        self.pulsed.clear();

        while let Some(&index) = self.order.get(self.next_note) {
            let note = &self.notes[index];
            if note.effective_start() >= t {
                break;
            }
            self.next_note += 1;

            if note.check(t) {
                self.active.push(index);
                continue;
            }

            // Only a window that opened after the previous step was missed;
            // anything older ended before the timeline began.
            let between_steps =
                previous.is_some_and(|prev| note.effective_start() >= prev);
            if between_steps && self.policy == MissedNotePolicy::Pulse {
                self.pulsed.push(index);
            } else {
                tracing::debug!(
                    note = index,
                    time = t,
                    "dropping note that ended between time steps"
                );
            }
        }

        let notes = self.notes;
        self.active.retain(|&index| notes[index].check(t));
    }

    /// Indices of notes whose audible window contains the current time.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Indices of notes sounded for the current step only because their
    /// whole window fell between this step and the previous one. Notes that
    /// ended before the first step are never pulsed.
    pub fn pulsed(&self) -> &[usize] {
        &self.pulsed
    }

    /// Whether every note has been admitted and retired.
    pub fn is_finished(&self) -> bool {
        self.next_note >= self.order.len() && self.active.is_empty()
    }

    pub fn notes(&self) -> &'a [Note] {
        self.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cauchy, Gaussian, Instrument};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn instruments() -> Vec<Box<dyn Instrument>> {
        vec![Box::new(Gaussian::new(100.0).unwrap()), Box::new(Cauchy::new())]
    }

    fn sorted(mut indices: Vec<usize>) -> Vec<usize> {
        indices.sort_unstable();
        indices
    }

    fn brute_force(notes: &[Note], t: f64) -> Vec<usize> {
        (0..notes.len()).filter(|&i| notes[i].check(t)).collect()
    }

    fn random_notes(rng: &mut StdRng, count: usize, min_duration: f64) -> Vec<Note> {
        let insts = instruments();
        (0..count)
            .map(|_| {
                let inst = rng.gen_range(0..insts.len());
                let octave = rng.gen_range(0.0..7.0);
                let start = rng.gen_range(0.0..4.0);
                let duration = rng.gen_range(min_duration..1.5);
                Note::new(&insts, inst, octave, start, duration).unwrap()
            })
            .collect()
    }

    #[test]
    fn active_set_matches_brute_force_scan() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..20 {
            let notes = random_notes(&mut rng, 40, 0.0);
            let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Drop);

            for step in 0..700 {
                let t = step as f64 * 0.011;
                scheduler.advance(t);
                assert_eq!(
                    sorted(scheduler.active().to_vec()),
                    brute_force(&notes, t),
                    "mismatch at t = {t}"
                );
                assert!(scheduler.pulsed().is_empty());
            }
            assert!(scheduler.is_finished());
        }
    }

    #[test]
    fn pulse_policy_keeps_active_set_exact() {
        let mut rng = StdRng::seed_from_u64(42);
        let notes = random_notes(&mut rng, 60, 0.0);
        let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Pulse);

        for step in 0..200 {
            let t = step as f64 * 0.03;
            scheduler.advance(t);
            assert_eq!(sorted(scheduler.active().to_vec()), brute_force(&notes, t));
            for &index in scheduler.pulsed() {
                assert!(!notes[index].check(t));
                assert!(notes[index].effective_end() <= t);
            }
        }
    }

    #[test]
    fn short_note_between_steps_pulses_once() {
        let insts: Vec<Box<dyn Instrument>> = vec![Box::new(Cauchy::new())];
        // Audible window is (0.35, 0.6), entirely between steps 0.3 and 1.0.
        let notes = vec![Note::new(&insts, 0, 3.0, 0.45, 0.05).unwrap()];

        let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Pulse);
        scheduler.advance(0.3);
        assert!(scheduler.active().is_empty());
        assert!(scheduler.pulsed().is_empty());

        scheduler.advance(1.0);
        assert!(scheduler.active().is_empty());
        assert_eq!(scheduler.pulsed(), &[0]);

        scheduler.advance(1.7);
        assert!(scheduler.pulsed().is_empty());
        assert!(scheduler.is_finished());

        let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Drop);
        scheduler.advance(0.3);
        scheduler.advance(1.0);
        assert!(scheduler.pulsed().is_empty());
        assert!(scheduler.active().is_empty());
    }

    #[test]
    fn notes_ending_before_the_first_step_are_not_pulsed() {
        let insts = instruments();
        // The first note is audible only between about -2.0 s and -1.4 s.
        let notes = vec![
            Note::new(&insts, 0, 3.0, -2.0, 0.5).unwrap(),
            Note::new(&insts, 1, 3.0, 0.45, 0.05).unwrap(),
        ];
        let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Pulse);

        scheduler.advance(0.0);
        assert!(scheduler.pulsed().is_empty());
        assert!(scheduler.active().is_empty());

        scheduler.advance(1.0);
        assert_eq!(scheduler.pulsed(), &[1]);
        scheduler.advance(2.0);
        assert!(scheduler.is_finished());
    }

    #[test]
    fn note_is_not_active_at_its_exact_boundaries() {
        let insts: Vec<Box<dyn Instrument>> = vec![Box::new(Cauchy::new())];
        let notes = vec![Note::new(&insts, 0, 3.0, 0.35, 0.8).unwrap()];
        let (start, end) = (notes[0].effective_start(), notes[0].effective_end());
        let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Drop);

        scheduler.advance(start);
        assert!(scheduler.active().is_empty());
        scheduler.advance(0.5);
        assert_eq!(scheduler.active(), &[0]);
        scheduler.advance(end);
        assert!(scheduler.active().is_empty());
    }

    #[test]
    #[should_panic(expected = "strictly increase")]
    #[cfg(debug_assertions)]
    fn rejects_rewinding() {
        let notes: Vec<Note> = Vec::new();
        let mut scheduler = Scheduler::new(&notes, MissedNotePolicy::Drop);
        scheduler.advance(1.0);
        scheduler.advance(0.5);
    }
}
