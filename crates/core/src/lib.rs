//! Core library for the Throrgan music compiler.
//!
//! A score names a tempo, a set of instruments and a list of notes. The
//! compiler schedules the notes over a coarse time grid, accumulates each
//! sounding note's spectral profile into an amplitude grid indexed by pitch
//! bin and time step, and renders that grid into audio by weighting a bank of
//! cosine carriers, one per pitch bin. The result is normalized and
//! quantized to 16-bit PCM.
//!
//! ```no_run
//! use throrgan_core::{Compiler, RenderConfig};
//!
//! let compiler = Compiler::new(RenderConfig::default());
//! let (compilation, path) = compiler.compile_file("theme.thr", None)?;
//! println!("wrote {} samples to {}", compilation.audio.samples.len(), path.display());
//! # Ok::<(), throrgan_core::ThrorganError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod grid;
pub mod instrument;
pub mod note;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod score;
pub mod timeline;

pub use analysis::{compute_rms, Spectrum};
pub use config::{MissedNotePolicy, RenderConfig};
pub use error::{Result, ThrorganError};
pub use grid::{AmplitudeGrid, GridBuilder};
pub use instrument::{
    Cauchy, Gaussian, Instrument, InstrumentContext, InstrumentRegistry, Kernel,
};
pub use note::Note;
pub use pipeline::{synthesize, Compilation, Compiler};
pub use record::{output_path_for, write_wav};
pub use render::{CarrierBank, RenderedAudio, WaveformRenderer};
pub use score::{Header, Score};
pub use timeline::Scheduler;
