use std::path::Path;

use plotters::prelude::*;
use throrgan_core::AmplitudeGrid;

const MAX_COLUMNS: usize = 300;
const MAX_POINTS: usize = 4000;

/// Draws the amplitude grid as a heat map above the rendered waveform.
pub fn draw(
    path: &Path,
    grid: &AmplitudeGrid,
    signal: &[f64],
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(420);

    let times = grid.times();
    let axis = grid.pitch_axis();
    let t_end = times.last().copied().unwrap_or(0.0)
        + times.get(1).copied().unwrap_or(1.0)
        - times.first().copied().unwrap_or(0.0);
    let span = axis.last().copied().unwrap_or(1.0);

    let mut chart = ChartBuilder::on(&upper)
        .caption("Amplitude grid", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(0f64..t_end, 0f64..span)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Time (s)")
        .y_desc("Octave")
        .draw()?;

    let stride = grid.steps().div_ceil(MAX_COLUMNS).max(1);
    let bin_height = if axis.len() > 1 { span / (axis.len() - 1) as f64 } else { span };
    let max_value = grid.max_value();

    if max_value > 0.0 {
        let mut cells = Vec::new();
        for step in (0..grid.steps()).step_by(stride) {
            let t0 = times[step];
            let t1 = times.get(step + stride).copied().unwrap_or(t_end);
            for (bin, &pitch) in axis.iter().enumerate() {
                let value = grid.get(bin, step) / max_value;
                if value > 1e-3 {
                    cells.push(Rectangle::new(
                        [(t0, pitch), (t1, pitch + bin_height)],
                        heat(value).filled(),
                    ));
                }
            }
        }
        chart.draw_series(cells)?;
    }

    let duration = t_end.max(f64::EPSILON);
    let mut chart = ChartBuilder::on(&lower)
        .caption("Waveform", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(0f64..duration, -1.05f64..1.05f64)?;
    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Amplitude")
        .draw()?;

    let seconds_per_sample = 1.0 / sample_rate.max(1) as f64;
    let stride = signal.len().div_ceil(MAX_POINTS).max(1);
    chart.draw_series(LineSeries::new(
        signal
            .iter()
            .enumerate()
            .step_by(stride)
            .map(|(n, &x)| (n as f64 * seconds_per_sample, x)),
        BLUE.stroke_width(1),
    ))?;

    root.present()?;
    Ok(())
}

/// Black through red to yellow for values in `[0, 1]`.
fn heat(value: f64) -> RGBColor {
    let v = value.clamp(0.0, 1.0);
    let red = (v * 2.0).min(1.0);
    let green = (v * 2.0 - 1.0).max(0.0);
    RGBColor((red * 255.0) as u8, (green * 255.0) as u8, 0)
}
