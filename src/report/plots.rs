//! SVG diagnostics: training curves and heatmaps.

use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;

/// Training points as dots, validation as a line, against 1-based epochs
pub fn plot_curves(train: &[f64], val: &[f64], metric: &str, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = train.len().max(val.len()).max(1) as f64;
    let (mut y_min, mut y_max) = train
        .iter()
        .chain(val)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !y_min.is_finite() || !y_max.is_finite() {
        y_min = 0.0;
        y_max = 1.0;
    }
    let pad = ((y_max - y_min) * 0.05).max(1e-3);

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Training and validation {}", metric), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(0.5..n + 0.5, (y_min - pad)..(y_max + pad))?;

    chart
        .configure_mesh()
        .x_desc("Epochs")
        .y_desc(metric)
        .draw()?;

    chart
        .draw_series(
            train
                .iter()
                .enumerate()
                .map(|(i, &v)| Circle::new(((i + 1) as f64, v), 3, BLUE.filled())),
        )?
        .label(format!("training_{}", metric))
        .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

    if !val.is_empty() {
        chart
            .draw_series(LineSeries::new(
                val.iter().enumerate().map(|(i, &v)| ((i + 1) as f64, v)),
                RED.stroke_width(2),
            ))?
            .label(format!("validation_{}", metric))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Heatmap of `values[row][col]`; negative cells in blue, positive in red
pub fn plot_heatmap(
    values: &[Vec<f64>],
    row_labels: &[String],
    col_labels: &[String],
    title: &str,
    path: &Path,
) -> Result<()> {
    let rows = values.len().max(1);
    let cols = values.first().map(|r| r.len()).unwrap_or(0).max(1);
    let scale = values
        .iter()
        .flatten()
        .fold(0.0f64, |acc, v| acc.max(v.abs()))
        .max(1e-12);

    let root = SVGBackend::new(path, (120 + 100 * cols as u32, 80 + 60 * rows as u32)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..cols as i32, 0..rows as i32)?;

    let x_label = |x: &i32| col_labels.get(*x as usize).cloned().unwrap_or_default();
    let y_label = |y: &i32| {
        // Row 0 is drawn at the top
        let row = rows as i32 - 1 - *y;
        row_labels.get(row as usize).cloned().unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols)
        .y_labels(rows)
        .x_label_offset(50)
        .y_label_offset(-30)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .draw()?;

    chart.draw_series(values.iter().enumerate().flat_map(|(r, row)| {
        let y = rows as i32 - 1 - r as i32;
        row.iter().enumerate().map(move |(c, &v)| {
            Rectangle::new([(c as i32, y), (c as i32 + 1, y + 1)], cell_color(v / scale).filled())
        })
    }))?;

    root.present()?;
    Ok(())
}

/// Map [-1, 1] onto a blue-white-red scale
fn cell_color(t: f64) -> RGBColor {
    let t = t.clamp(-1.0, 1.0);
    let fade = |x: f64| (255.0 * (1.0 - x)) as u8;
    if t >= 0.0 {
        RGBColor(255, fade(t), fade(t))
    } else {
        RGBColor(fade(-t), fade(-t), 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_color_scale() {
        assert_eq!(cell_color(0.0), RGBColor(255, 255, 255));
        assert_eq!(cell_color(1.0), RGBColor(255, 0, 0));
        assert_eq!(cell_color(-1.0), RGBColor(0, 0, 255));
        assert_eq!(cell_color(5.0), RGBColor(255, 0, 0));
    }
}
