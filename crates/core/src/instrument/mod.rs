use std::collections::BTreeMap;
use std::fmt;

use crate::{Result, ThrorganError};

/// Capability shared by every instrument: a spectral mask over the pitch
/// axis and an amplitude envelope over time.
///
/// Instruments are stateless after construction and shared read-only by all
/// notes that reference them.
pub trait Instrument: fmt::Debug + Send + Sync {
    /// Registry token the instrument was built from.
    fn name(&self) -> &str;

    /// Length in seconds of the attack ramp that precedes a note's start.
    fn pre_time(&self) -> f64;

    /// Length in seconds of the release ramp that follows a note's end.
    fn post_time(&self) -> f64;

    /// Weight of the instrument's harmonic stack at `pitch` for a note
    /// centred on `center`. Both are in octaves.
    fn profile(&self, pitch: f64, center: f64) -> f64;

    /// Envelope weight in `[0, 1]` at `elapsed` seconds after the nominal
    /// start of a note lasting `duration` seconds.
    fn amp(&self, elapsed: f64, duration: f64) -> f64 {
        ramp_envelope(elapsed, duration, self.pre_time(), self.post_time())
    }

    /// Adds `weight * profile(axis[k], center)` into `column[k]`.
    fn profile_into(&self, axis: &[f64], center: f64, weight: f64, column: &mut [f64]) {
        for (cell, &pitch) in column.iter_mut().zip(axis) {
            *cell += weight * self.profile(pitch, center);
        }
    }
}

/// Linear attack from 0 over `pre`, flat 1 on `[0, duration]`, linear
/// release to 0 over `post`.
pub fn ramp_envelope(elapsed: f64, duration: f64, pre: f64, post: f64) -> f64 {
    let value = if elapsed < 0.0 {
        if pre > 0.0 {
            (pre + elapsed) / pre
        } else {
            0.0
        }
    } else if elapsed > duration {
        if post > 0.0 {
            (post - elapsed + duration) / post
        } else {
            0.0
        }
    } else {
        1.0
    };
    value.clamp(0.0, 1.0)
}

/// Shape of a single spectral lobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Gaussian { sigma: f64 },
    Cauchy { gamma: f64 },
}

impl Kernel {
    /// Peak-normalised kernel value at `offset` octaves from the lobe centre.
    pub fn eval(&self, offset: f64) -> f64 {
        match *self {
            Kernel::Gaussian { sigma } => (-offset * offset / (2.0 * sigma * sigma)).exp(),
            Kernel::Cauchy { gamma } => {
                let x = offset / gamma;
                1.0 / (1.0 + x * x)
            }
        }
    }

    fn width(&self) -> f64 {
        match *self {
            Kernel::Gaussian { sigma } => sigma,
            Kernel::Cauchy { gamma } => gamma,
        }
    }
}

/// One lobe of a harmonic stack: `weight` at `offset` octaves above the note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lobe {
    pub offset: f64,
    pub weight: f64,
}

const fn lobe(offset: f64, weight: f64) -> Lobe {
    Lobe { offset, weight }
}

/// Overtones at one octave, an octave and a half and two octaves.
pub const GAUSSIAN_LOBES: [Lobe; 4] = [
    lobe(0.0, 1.0),
    lobe(1.0, 0.5),
    lobe(1.5, 0.25),
    lobe(2.0, 0.125),
];

pub const CAUCHY_LOBES: [Lobe; 4] = [
    lobe(0.0, 1.0),
    lobe(2.0, 0.5),
    lobe(1.5, 0.25),
    lobe(4.0 / 3.0, 0.125),
];

fn stack(kernel: Kernel, lobes: &[Lobe], pitch: f64, center: f64) -> f64 {
    lobes
        .iter()
        .map(|l| l.weight * kernel.eval(pitch - center - l.offset))
        .sum()
}

/// Narrow-kernel instrument whose ramps scale with the tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    kernel: Kernel,
    pre_time: f64,
    post_time: f64,
}

impl Gaussian {
    pub const DEFAULT_SIGMA: f64 = 0.01;

    pub fn new(bpm: f64) -> Result<Self> {
        Self::with_sigma(bpm, Self::DEFAULT_SIGMA)
    }

    pub fn with_sigma(bpm: f64, sigma: f64) -> Result<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(ThrorganError::InvalidTempo(bpm));
        }
        check_width(sigma)?;
        Ok(Self {
            kernel: Kernel::Gaussian { sigma },
            pre_time: 0.02 * bpm / 60.0,
            post_time: 0.05 * bpm / 60.0,
        })
    }

    pub fn sigma(&self) -> f64 {
        self.kernel.width()
    }
}

impl Instrument for Gaussian {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn pre_time(&self) -> f64 {
        self.pre_time
    }

    fn post_time(&self) -> f64 {
        self.post_time
    }

    fn profile(&self, pitch: f64, center: f64) -> f64 {
        stack(self.kernel, &GAUSSIAN_LOBES, pitch, center)
    }
}

/// Wide-kernel instrument with fixed 100 ms ramps.
#[derive(Debug, Clone, PartialEq)]
pub struct Cauchy {
    kernel: Kernel,
    pre_time: f64,
    post_time: f64,
}

impl Cauchy {
    pub const DEFAULT_GAMMA: f64 = 0.01;
    pub const RAMP_SECONDS: f64 = 0.1;

    pub fn new() -> Self {
        Self {
            kernel: Kernel::Cauchy {
                gamma: Self::DEFAULT_GAMMA,
            },
            pre_time: Self::RAMP_SECONDS,
            post_time: Self::RAMP_SECONDS,
        }
    }

    pub fn with_gamma(gamma: f64) -> Result<Self> {
        check_width(gamma)?;
        Ok(Self {
            kernel: Kernel::Cauchy { gamma },
            ..Self::new()
        })
    }

    pub fn gamma(&self) -> f64 {
        self.kernel.width()
    }
}

impl Default for Cauchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument for Cauchy {
    fn name(&self) -> &str {
        "cauchy"
    }

    fn pre_time(&self) -> f64 {
        self.pre_time
    }

    fn post_time(&self) -> f64 {
        self.post_time
    }

    fn profile(&self, pitch: f64, center: f64) -> f64 {
        stack(self.kernel, &CAUCHY_LOBES, pitch, center)
    }
}

fn check_width(width: f64) -> Result<()> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(ThrorganError::msg(format!(
            "kernel width must be positive, got {width}"
        )))
    }
}

/// Values available to instrument constructors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentContext {
    pub bpm: f64,
}

pub type InstrumentConstructor = fn(&InstrumentContext, &[f64]) -> Result<Box<dyn Instrument>>;

/// Maps instrument type tokens to constructors.
#[derive(Clone)]
pub struct InstrumentRegistry {
    constructors: BTreeMap<String, InstrumentConstructor>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with the `gaussian` and `cauchy` instruments.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("gaussian", build_gaussian);
        registry.register("cauchy", build_cauchy);
        registry
    }

    /// Registers `constructor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, constructor: InstrumentConstructor) {
        self.constructors
            .insert(name.to_ascii_lowercase(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Builds an instrument, or returns `None` for an unknown token.
    pub fn build(
        &self,
        name: &str,
        context: &InstrumentContext,
        args: &[f64],
    ) -> Option<Result<Box<dyn Instrument>>> {
        self.constructors
            .get(&name.to_ascii_lowercase())
            .map(|constructor| constructor(context, args))
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentRegistry")
            .field("names", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_gaussian(context: &InstrumentContext, args: &[f64]) -> Result<Box<dyn Instrument>> {
    let sigma = single_width(args, Gaussian::DEFAULT_SIGMA)?;
    Ok(Box::new(Gaussian::with_sigma(context.bpm, sigma)?))
}

fn build_cauchy(_context: &InstrumentContext, args: &[f64]) -> Result<Box<dyn Instrument>> {
    let gamma = single_width(args, Cauchy::DEFAULT_GAMMA)?;
    Ok(Box::new(Cauchy::with_gamma(gamma)?))
}

fn single_width(args: &[f64], default: f64) -> Result<f64> {
    match args {
        [] => Ok(default),
        [width] => Ok(*width),
        _ => Err(ThrorganError::msg(format!(
            "expected at most one kernel width, got {} arguments",
            args.len()
        ))),
    }
}
