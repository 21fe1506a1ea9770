//! Figures drawn with plotters. Every figure goes out as PNG and SVG.

use std::path::Path;

use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};

use crate::{error::AnalysisError, histogram::Hist1D, style::PlotStyle};

fn plot_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> AnalysisError {
    AnalysisError::Plot(err.to_string())
}

/// Outline of a histogram as a sequence of horizontal steps.
pub fn step_points(hist: &Hist1D) -> Vec<(f64, f64)> {
    (1..=hist.n_bins())
        .flat_map(|bin| {
            let content = hist.content(bin);
            [
                (hist.axis.bin_low_edge(bin), content),
                (hist.axis.bin_up_edge(bin), content),
            ]
        })
        .collect()
}

/// Strip boxes cut to `[-xlength, xlength]`; boxes fully outside are dropped.
pub fn visible_boxes(boxes: &[(f64, f64)], xlength: f64) -> Vec<(f64, f64)> {
    boxes
        .iter()
        .filter(|(low, high)| *high > -xlength && *low < xlength)
        .map(|(low, high)| (low.max(-xlength), high.min(xlength)))
        .collect()
}

pub struct AmplitudePlot<'a> {
    pub hist: &'a Hist1D,
    pub strip_boxes: &'a [(f64, f64)],
    pub xlength: f64,
    pub ylength: f64,
    pub ylabel: &'a str,
    pub sensor_info: &'a str,
}

fn draw_amplitude<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    plot: &AmplitudePlot,
    style: &PlotStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(root)
        .caption(plot.sensor_info, (style.font, style.font_size).into_font())
        .margin(style.margin)
        .x_label_area_size(style.label_area)
        .y_label_area_size(style.label_area)
        .build_cartesian_2d(-plot.xlength..plot.xlength, 0.0..plot.ylength)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Track x position [mm]")
        .y_desc(plot.ylabel)
        .axis_desc_style((style.font, style.font_size))
        .label_style((style.font, style.font_size - 6))
        .draw()?;

    chart.draw_series(
        visible_boxes(plot.strip_boxes, plot.xlength)
            .into_iter()
            .map(|(low, high)| Rectangle::new([(low, 0.0), (high, plot.ylength)], style.strip_box.filled())),
    )?;

    chart.draw_series(LineSeries::new(
        step_points(plot.hist)
            .into_iter()
            .map(|(x, y)| (x, y.min(plot.ylength))),
        style.color(0).stroke_width(style.line_width),
    ))?;

    root.present()?;
    Ok(())
}

/// Writes `<stem>.png` and `<stem>.svg`.
pub fn save_amplitude_vs_x(stem: &Path, plot: &AmplitudePlot, style: &PlotStyle) -> Result<(), AnalysisError> {
    let png = stem.with_extension("png");
    draw_amplitude(&BitMapBackend::new(&png, style.size).into_drawing_area(), plot, style).map_err(plot_error)?;
    let svg = stem.with_extension("svg");
    draw_amplitude(&SVGBackend::new(&svg, style.size).into_drawing_area(), plot, style).map_err(plot_error)?;
    Ok(())
}

pub struct FitPlot<'a> {
    pub hist: &'a Hist1D,
    pub curve: &'a [(f64, f64)],
    pub title: &'a str,
}

fn draw_fit<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    plot: &FitPlot,
    style: &PlotStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let y_max = plot
        .curve
        .iter()
        .map(|(_, y)| *y)
        .fold(plot.hist.maximum(), f64::max);
    let y_max = if y_max > 0.0 && y_max.is_finite() { 1.1 * y_max } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(plot.title, (style.font, style.font_size).into_font())
        .margin(style.margin)
        .x_label_area_size(style.label_area)
        .y_label_area_size(style.label_area)
        .build_cartesian_2d(plot.hist.axis.min..plot.hist.axis.max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Signal amplitude [mV]")
        .y_desc("Events")
        .label_style((style.font, style.font_size - 6))
        .draw()?;

    chart.draw_series(LineSeries::new(step_points(plot.hist), BLACK.stroke_width(style.line_width)))?;
    chart.draw_series(LineSeries::new(
        plot.curve.iter().copied(),
        style.color(2).stroke_width(style.line_width),
    ))?;

    root.present()?;
    Ok(())
}

pub fn save_fit_png(path: &Path, plot: &FitPlot, style: &PlotStyle) -> Result<(), AnalysisError> {
    draw_fit(&BitMapBackend::new(path, style.size).into_drawing_area(), plot, style).map_err(plot_error)
}

/// One set of `(x, y, y error)` points sharing a marker color.
pub struct Series {
    pub label: String,
    pub color: usize,
    pub points: Vec<(f64, f64, f64)>,
}

pub struct GraphPlot<'a> {
    pub series: &'a [Series],
    pub x_range: (f64, f64),
    pub y_max: f64,
    pub xlabel: &'a str,
    pub ylabel: &'a str,
    /// Drawn right-aligned above the frame.
    pub corner_text: &'a str,
}

fn draw_graph<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    plot: &GraphPlot,
    style: &PlotStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(root)
        .margin(style.margin)
        .margin_top(style.margin + style.font_size)
        .x_label_area_size(style.label_area)
        .y_label_area_size(style.label_area)
        .build_cartesian_2d(plot.x_range.0..plot.x_range.1, 0.0001..plot.y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(plot.xlabel)
        .y_desc(plot.ylabel)
        .axis_desc_style((style.font, style.font_size))
        .label_style((style.font, style.font_size - 6))
        .draw()?;

    for series in plot.series {
        let color = style.color(series.color);
        chart.draw_series(series.points.iter().map(|(x, y, err)| {
            ErrorBar::new_vertical(*x, y - err, *y, y + err, color.stroke_width(style.line_width), 12)
        }))?;
        chart
            .draw_series(LineSeries::new(
                series.points.iter().map(|(x, y, _)| (*x, *y)),
                color.stroke_width(style.line_width),
            ))?
            .label(series.label.as_str())
            .legend(move |(x, y)| Circle::new((x, y), 6, color.filled()));
        chart.draw_series(
            series
                .points
                .iter()
                .map(|(x, y, _)| Circle::new((*x, *y), style.marker_size, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .label_font((style.font, style.font_size - 4))
        .background_style(WHITE.mix(0.8))
        .border_style(WHITE)
        .draw()?;

    let (width, _) = root.dim_in_pixel();
    let corner = TextStyle::from((style.font, style.font_size - 4).into_font()).pos(Pos::new(HPos::Right, VPos::Top));
    root.draw(&Text::new(
        plot.corner_text.to_owned(),
        (width as i32 - style.margin as i32, style.margin as i32 / 2),
        corner,
    ))?;

    root.present()?;
    Ok(())
}

/// Writes `<stem>.png` and `<stem>.svg`.
pub fn save_graph(stem: &Path, plot: &GraphPlot, style: &PlotStyle) -> Result<(), AnalysisError> {
    let png = stem.with_extension("png");
    draw_graph(&BitMapBackend::new(&png, style.size).into_drawing_area(), plot, style).map_err(plot_error)?;
    let svg = stem.with_extension("svg");
    draw_graph(&SVGBackend::new(&svg, style.size).into_drawing_area(), plot, style).map_err(plot_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_follow_bin_edges() {
        let mut hist = Hist1D::new(2, 0.0, 2.0);
        hist.set_content(1, 3.0);
        hist.set_content(2, 5.0);
        assert_eq!(
            step_points(&hist),
            vec![(0.0, 3.0), (1.0, 3.0), (1.0, 5.0), (2.0, 5.0)]
        );
    }

    #[test]
    fn boxes_are_clipped_to_axis() {
        let boxes = [(-4.0, -3.0), (-2.8, -2.2), (-0.3, 0.3), (2.2, 2.8)];
        assert_eq!(
            visible_boxes(&boxes, 2.5),
            vec![(-2.5, -2.2), (-0.3, 0.3), (2.2, 2.5)]
        );
    }
}
