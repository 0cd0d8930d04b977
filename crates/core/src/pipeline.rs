use std::io;
use std::path::{Path, PathBuf};

use crate::record::{output_path_for, write_wav};
use crate::score::parse_score;
use crate::{
    AmplitudeGrid, GridBuilder, InstrumentRegistry, RenderConfig, RenderedAudio, Result, Score,
    WaveformRenderer,
};

/// Everything produced while compiling one score.
#[derive(Debug)]
pub struct Compilation {
    pub score: Score,
    /// Settings actually used, after duration fitting.
    pub config: RenderConfig,
    pub grid: AmplitudeGrid,
    pub audio: RenderedAudio,
}

/// Turns notation text into audio: parse, schedule, build the grid, render.
#[derive(Debug, Clone)]
pub struct Compiler {
    config: RenderConfig,
    registry: InstrumentRegistry,
    fit_duration: bool,
    overwrite: bool,
}

impl Compiler {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            registry: InstrumentRegistry::with_builtins(),
            fit_duration: false,
            overwrite: false,
        }
    }

    pub fn with_registry(mut self, registry: InstrumentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Stretch or shrink the timeline so it ends with the last note's
    /// release.
    pub fn fit_duration(mut self, fit: bool) -> Self {
        self.fit_duration = fit;
        self
    }

    /// Allow [`Compiler::compile_file`] to replace an existing output file.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Settings for `score`, with the duration fitted when requested.
    pub fn config_for(&self, score: &Score) -> Result<RenderConfig> {
        let mut config = self.config.clone();
        if self.fit_duration {
            let end = score.end_time();
            // Whole coarse steps, plus the step the renderer drops.
            let step = config.subdivide as f64 / config.sample_rate as f64;
            config.duration_seconds = ((end / step).ceil() + 2.0) * step;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn compile_text(&self, text: &str) -> Result<Compilation> {
        let score = parse_score(text, &self.registry)?;
        self.compile_score(score)
    }

    pub fn compile_score(&self, score: Score) -> Result<Compilation> {
        let config = self.config_for(&score)?;
        let (grid, audio) = synthesize(&score, &config)?;
        Ok(Compilation {
            score,
            config,
            grid,
            audio,
        })
    }

    /// Compiles `input` and writes the result next to it, or to `output`
    /// when given. Returns the compilation and the path written.
    pub fn compile_file(
        &self,
        input: impl AsRef<Path>,
        output: Option<&Path>,
    ) -> Result<(Compilation, PathBuf)> {
        let input = input.as_ref();
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| output_path_for(input));
        if !self.overwrite && output.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite {}", output.display()),
            )
            .into());
        }

        let text = std::fs::read_to_string(input)?;
        let compilation = self.compile_text(&text)?;
        write_wav(&output, &compilation.audio.samples, compilation.config.sample_rate)?;

        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            notes = compilation.score.notes.len(),
            seconds = compilation.audio.duration_seconds(),
            silent = compilation.audio.is_silent(),
            "compiled score"
        );
        Ok((compilation, output))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

/// Runs the synthesis stages for an already parsed score.
pub fn synthesize(
    score: &Score,
    config: &RenderConfig,
) -> Result<(AmplitudeGrid, RenderedAudio)> {
    let grid = GridBuilder::new(config, &score.instruments).build(&score.notes)?;
    let audio = WaveformRenderer::new(config).render(&grid);
    Ok((grid, audio))
}
