use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use throrgan_core::{compute_rms, Compiler, RenderConfig, Spectrum, ThrorganError};
use tracing_subscriber::EnvFilter;

mod plot;

fn main() -> throrgan_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            force,
            plot,
            render,
        } => run_compile(&input, output.as_deref(), force, plot.as_deref(), &render),
        Commands::Inspect { input, render } => run_inspect(&input, &render),
    }
}

fn run_compile(
    input: &Path,
    output: Option<&Path>,
    force: bool,
    plot: Option<&Path>,
    render: &RenderArgs,
) -> throrgan_core::Result<()> {
    tracing::info!(?input, ?output, "compiling score");

    let compiler = render.compiler()?.overwrite(force);
    let (compilation, written) = compiler.compile_file(input, output)?;

    if let Some(plot_path) = plot {
        let audio = &compilation.audio;
        plot::draw(plot_path, &compilation.grid, &audio.signal, audio.sample_rate)
            .map_err(|err| ThrorganError::msg(format!("could not draw plot: {err}")))?;
        tracing::info!(path = ?plot_path, "wrote plot");
    }

    println!("{}", written.display());
    Ok(())
}

fn run_inspect(input: &Path, render: &RenderArgs) -> throrgan_core::Result<()> {
    let text = std::fs::read_to_string(input)?;
    let compilation = render.compiler()?.compile_text(&text)?;
    let audio = &compilation.audio;

    let signal: Vec<f32> = audio.signal.iter().map(|&x| x as f32).collect();
    let peak_frequency = if audio.is_silent() {
        None
    } else {
        Spectrum::of(&signal, audio.sample_rate)?.peak_frequency()
    };
    let instruments: Vec<&str> = compilation
        .score
        .instruments
        .iter()
        .map(|inst| inst.name())
        .collect();

    let report = serde_json::json!({
        "bpm": compilation.score.header.bpm,
        "instruments": instruments,
        "notes": compilation.score.notes.len(),
        "score_end_seconds": compilation.score.end_time(),
        "timeline_seconds": compilation.config.duration_seconds,
        "grid": { "bins": compilation.grid.bins(), "steps": compilation.grid.steps() },
        "samples": audio.samples.len(),
        "sample_rate": audio.sample_rate,
        "silent": audio.is_silent(),
        "peak_frequency_hz": peak_frequency,
        "rms": compute_rms(&signal),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile .thr music notation into WAV audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a score and write it as a 16-bit mono WAV file.
    Compile {
        /// Path to the notation file.
        input: PathBuf,
        /// Output path; defaults to the input path with a `.wav` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replace the output file if it already exists.
        #[arg(short, long)]
        force: bool,
        /// Also draw the amplitude grid and waveform to this SVG file.
        #[arg(long)]
        plot: Option<PathBuf>,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Render a score in memory and print a JSON summary.
    Inspect {
        /// Path to the notation file.
        input: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
    },
}

/// Render settings shared by every subcommand.
#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON file with render settings; missing keys use the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output sample rate in Hz.
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Timeline length in seconds.
    #[arg(long, conflicts_with = "fit")]
    duration: Option<f64>,
    /// Audio samples per coarse time step.
    #[arg(long)]
    subdivide: Option<usize>,
    /// Fit the timeline to the end of the last note.
    #[arg(long)]
    fit: bool,
    /// Render the last coarse step instead of dropping it.
    #[arg(long)]
    keep_final_step: bool,
}

impl RenderArgs {
    fn config(&self) -> throrgan_core::Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)?,
            None => RenderConfig::default(),
        };
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(duration) = self.duration {
            config.duration_seconds = duration;
        }
        if let Some(subdivide) = self.subdivide {
            config.subdivide = subdivide;
        }
        if self.keep_final_step {
            config.drop_final_step = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn compiler(&self) -> throrgan_core::Result<Compiler> {
        Ok(Compiler::new(self.config()?).fit_duration(self.fit))
    }
}
