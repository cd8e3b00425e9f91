#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::error::{PipelineError, Result};
use crate::payload::ScatterPayload;
use crate::plot::{MARKER_SIZE, plot_title};
use plotters::prelude::*;

/// Width in pixels reserved for the colour bar on the right
const COLORBAR_WIDTH: u32 = 90;

/// Configuration options for PNG rendering
///
/// Axis labels and the title come from the payload itself; these only
/// control the image geometry.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,

    /// Marker radius in pixels
    pub marker_size: u32,
}

impl Default for GraphOptions {
    /// 800x600 with the same marker size the browser plot uses
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            marker_size: MARKER_SIZE / 2,
        }
    }
}

/// Map `t` in `[0, 1]` onto the jet colour scale (blue → cyan → yellow → red)
pub fn jet(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    let channel = |offset: f64| {
        let v = (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    RGBColor(channel(3.0), channel(2.0), channel(1.0))
}

/// Colour for one target value given the payload's colour range
pub fn color_for(value: f64, min: f64, max: f64) -> RGBColor {
    if max > min {
        jet((value - min) / (max - min))
    } else {
        jet(0.5)
    }
}

/// Axis range with a little padding, never empty
fn padded_range(values: &[f64]) -> std::ops::Range<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if max > min {
        let pad = (max - min) * 0.05;
        (min - pad)..(max + pad)
    } else {
        (min - 0.5)..(max + 0.5)
    }
}

/// Renders a scatter payload to PNG bytes
///
/// Points are coloured by their target value along the jet scale between
/// `color_min` and `color_max`, with a colour bar drawn on the right.
///
/// # Errors
/// * `Render` if plotters fails to draw or encode the image
/// * `Io` if the temporary image file cannot be created or read
pub fn render_scatter_png(payload: &ScatterPayload, options: &GraphOptions) -> Result<Vec<u8>> {
    let file = tempfile::Builder::new()
        .prefix("plotdesk_")
        .suffix(".png")
        .tempfile()?;
    let path = file.path().to_path_buf();

    draw_scatter(payload, options, &path).map_err(|e| PipelineError::Render(e.to_string()))?;

    // The temporary file is removed when `file` drops
    let png_data = std::fs::read(&path)?;
    Ok(png_data)
}

fn draw_scatter(
    payload: &ScatterPayload,
    options: &GraphOptions,
    path: &std::path::Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let split = options.width.saturating_sub(COLORBAR_WIDTH);
    let (plot_area, bar_area) = root.split_horizontally(split);

    let mut chart = ChartBuilder::on(&plot_area)
        .caption(plot_title(payload), ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(padded_range(&payload.x), padded_range(&payload.y))?;

    chart
        .configure_mesh()
        .x_desc(&payload.x_label)
        .y_desc(&payload.y_label)
        .draw()?;

    let (min, max) = (payload.color_min, payload.color_max);
    chart.draw_series(
        payload
            .x
            .iter()
            .zip(&payload.y)
            .zip(&payload.color)
            .map(|((&x, &y), &c)| {
                Circle::new((x, y), options.marker_size, color_for(c, min, max).filled())
            }),
    )?;

    draw_colorbar(&bar_area, payload)?;

    root.present()?;
    Ok(())
}

/// Vertical gradient from `color_min` (bottom) to `color_max` (top)
fn draw_colorbar(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    payload: &ScatterPayload,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let (_, height) = area.dim_in_pixel();
    let top = 40i32;
    let bottom = height as i32 - 50;
    let steps = (bottom - top).max(1);

    for i in 0..steps {
        let t = 1.0 - i as f64 / steps as f64;
        area.draw(&Rectangle::new(
            [(10, top + i), (30, top + i + 1)],
            jet(t).filled(),
        ))?;
    }

    let style = ("sans-serif", 14).into_font();
    area.draw(&Text::new(payload.color_label.clone(), (5, top - 25), style.clone()))?;
    area.draw(&Text::new(format!("{:.3}", payload.color_max), (35, top), style.clone()))?;
    area.draw(&Text::new(format!("{:.3}", payload.color_min), (35, bottom - 10), style))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jet_endpoints_and_midpoint() {
        assert_eq!(jet(0.0), RGBColor(0, 0, 128));
        assert_eq!(jet(0.5), RGBColor(128, 255, 128));
        assert_eq!(jet(1.0), RGBColor(128, 0, 0));
        // Out-of-range inputs are clamped
        assert_eq!(jet(-3.0), jet(0.0));
        assert_eq!(jet(7.0), jet(1.0));
    }

    #[test]
    fn flat_colour_range_uses_middle_of_scale() {
        assert_eq!(color_for(4.0, 4.0, 4.0), jet(0.5));
        assert_eq!(color_for(10.0, 0.0, 10.0), jet(1.0));
    }

    #[test]
    fn ranges_are_padded_and_never_empty() {
        let r = padded_range(&[1.0, 1.0]);
        assert_eq!(r, 0.5..1.5);
        let r = padded_range(&[0.0, 10.0]);
        assert!(r.start < 0.0 && r.end > 10.0);
        assert_eq!(padded_range(&[]), 0.0..1.0);
    }
}
