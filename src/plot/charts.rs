//! Loss curves, ROC, PR and confusion-matrix charts as in-memory images.
//!
//! Every `render_*` function is pure and returns a fresh `RgbImage`; only
//! `save_png` and the `plot_*` helpers touch the filesystem.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::confusion::ConfusionMatrix;
use crate::metrics::curves::{auc, precision_recall_curve, roc_curve, Curve};
use crate::plot::canvas::{
    blues, Canvas, PlotArea, BLACK, BLUE_DARK, DARK_TEXT, GREY, GREY_GRID, RED_DARK, WHITE,
};

pub const CHART_WIDTH: u32 = 640;
pub const CHART_HEIGHT: u32 = 480;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 50.0;
const TICKS: usize = 5;

fn plot_area(x_range: (f64, f64), y_range: (f64, f64), right_margin: f64) -> PlotArea {
    PlotArea {
        left: MARGIN_LEFT,
        top: MARGIN_TOP,
        width: CHART_WIDTH as f64 - MARGIN_LEFT - right_margin,
        height: CHART_HEIGHT as f64 - MARGIN_TOP - MARGIN_BOTTOM,
        x_range,
        y_range,
    }
}

/// Grid lines, tick labels and the two axes.
fn draw_axes(canvas: &mut Canvas, area: &PlotArea, x_ticks: &[(f64, String)], y_ticks: &[(f64, String)]) {
    for (v, label) in y_ticks {
        let (_, y) = area.to_px(area.x_range.0, *v);
        canvas.line((area.left, y), (area.right(), y), GREY_GRID, 1);
        let w = Canvas::text_width(label, 2);
        canvas.text(area.left as i64 - 8 - w, y as i64 - 5, label, DARK_TEXT, 2);
    }
    for (v, label) in x_ticks {
        let (x, _) = area.to_px(*v, area.y_range.0);
        canvas.line((x, area.top), (x, area.bottom()), GREY_GRID, 1);
        canvas.text_centered(x as i64, area.bottom() as i64 + 16, label, DARK_TEXT, 2);
    }
    canvas.line((area.left, area.bottom()), (area.right(), area.bottom()), DARK_TEXT, 2);
    canvas.line((area.left, area.top), (area.left, area.bottom()), DARK_TEXT, 2);
}

fn linear_ticks(lo: f64, hi: f64, decimals: usize) -> Vec<(f64, String)> {
    (0..=TICKS)
        .map(|i| {
            let v = lo + (hi - lo) * i as f64 / TICKS as f64;
            (v, format!("{:.*}", decimals, v))
        })
        .collect()
}

/// Corner of the plot area a legend is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corner {
    TopRight,
    BottomRight,
    BottomLeft,
}

/// One legend row: a colored swatch followed by its label.
fn legend_entry(canvas: &mut Canvas, area: &PlotArea, corner: Corner, slot: usize, color: Rgb<u8>, label: &str) {
    const ROW: i64 = 16;
    let text_w = Canvas::text_width(label, 2);
    let swatch_x = match corner {
        Corner::BottomLeft => area.left as i64 + 10,
        Corner::TopRight | Corner::BottomRight => area.right() as i64 - 10 - text_w - 30,
    };
    let y = match corner {
        Corner::TopRight => area.top as i64 + 10 + slot as i64 * ROW,
        Corner::BottomRight | Corner::BottomLeft => area.bottom() as i64 - 10 - (slot as i64 + 1) * ROW,
    };
    canvas.fill_rect(swatch_x, y + 3, 24, 4, color);
    canvas.text(swatch_x + 30, y, label, DARK_TEXT, 2);
}

/// Title above the plot area, x label below the ticks, y label rotated left
/// of the tick labels.
fn draw_labels(canvas: &mut Canvas, area: &PlotArea, title: &str, x_label: &str, y_label: &str) {
    let cx = (area.left + area.width / 2.0) as i64;
    let cy = (area.top + area.height / 2.0) as i64;
    canvas.text_centered(cx, 20, title, DARK_TEXT, 2);
    canvas.text_centered(cx, area.bottom() as i64 + 38, x_label, DARK_TEXT, 2);
    canvas.text_vertical(16, cy, y_label, DARK_TEXT, 2);
}

/// Train loss (red) and validation loss (blue) per epoch.
///
/// The y axis spans `[0, 1]`, stretched when a loss exceeds 1.
pub fn render_loss_curves(train_losses: &[f64], val_losses: &[f64]) -> RgbImage {
    let n = train_losses.len().max(val_losses.len()).max(1);
    let max_loss = train_losses.iter().chain(val_losses).cloned().filter(|v| v.is_finite()).fold(0.0, f64::max);
    let y_max = if max_loss > 1.0 { max_loss * 1.05 } else { 1.0 };
    let x_max = if n > 1 { n as f64 } else { 2.0 };
    let area = plot_area((1.0, x_max), (0.0, y_max), MARGIN_RIGHT);

    let mut canvas = Canvas::new(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let x_ticks: Vec<(f64, String)> = [1, n.div_ceil(2).max(1), n]
        .iter()
        .map(|&e| (e as f64, e.to_string()))
        .collect();
    draw_axes(&mut canvas, &area, &x_ticks, &linear_ticks(0.0, y_max, 2));
    draw_labels(&mut canvas, &area, "", "epoch", "loss");

    for (series, color) in [(train_losses, RED_DARK), (val_losses, BLUE_DARK)] {
        let points: Vec<(f64, f64)> = series.iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| area.to_px((i + 1) as f64, v))
            .collect();
        if points.len() == 1 {
            canvas.fill_rect(points[0].0 as i64 - 2, points[0].1 as i64 - 2, 5, 5, color);
        }
        canvas.polyline(&points, color, 2);
    }
    legend_entry(&mut canvas, &area, Corner::TopRight, 0, RED_DARK, "train_loss");
    legend_entry(&mut canvas, &area, Corner::TopRight, 1, BLUE_DARK, "validation_loss");
    canvas.into_image()
}

struct CurveStyle<'a> {
    color: Rgb<u8>,
    diagonal: ((f64, f64), (f64, f64)),
    legend: Corner,
    legend_label: String,
    title: &'a str,
    x_label: &'a str,
    y_label: &'a str,
}

fn render_curve(curve: &Curve, style: CurveStyle<'_>) -> RgbImage {
    let area = plot_area((-0.05, 1.05), (-0.05, 1.05), MARGIN_RIGHT);
    let mut canvas = Canvas::new(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let ticks = linear_ticks(0.0, 1.0, 1);
    draw_axes(&mut canvas, &area, &ticks, &ticks);
    draw_labels(&mut canvas, &area, style.title, style.x_label, style.y_label);

    let (a, b) = style.diagonal;
    canvas.dashed_line(area.to_px(a.0, a.1), area.to_px(b.0, b.1), GREY, 2, 8, 6);

    let points: Vec<(f64, f64)> = curve.x.iter().zip(&curve.y).map(|(&x, &y)| area.to_px(x, y)).collect();
    canvas.polyline(&points, style.color, 2);

    legend_entry(&mut canvas, &area, style.legend, 0, style.color, &style.legend_label);
    canvas.into_image()
}

/// ROC curve in red with the chance diagonal dashed in gray, titled
/// `<model> AUROC`.
pub fn render_roc(curve: &Curve, model_config: &str) -> RgbImage {
    render_curve(curve, CurveStyle {
        color: RED_DARK,
        diagonal: ((0.0, 0.0), (1.0, 1.0)),
        legend: Corner::BottomRight,
        legend_label: format!("AUROC = {:.4}", auc(&curve.x, &curve.y)),
        title: &format!("{} AUROC", model_config),
        x_label: "False Positive Rate",
        y_label: "True Positive Rate",
    })
}

/// Precision-recall curve in blue with the (0,1)–(1,0) reference dashed in
/// gray, titled `<model> AUPRC`.
pub fn render_pr(curve: &Curve, model_config: &str) -> RgbImage {
    render_curve(curve, CurveStyle {
        color: BLUE_DARK,
        diagonal: ((0.0, 1.0), (1.0, 0.0)),
        legend: Corner::BottomLeft,
        legend_label: format!("AUPRC = {:.4}", auc(&curve.x, &curve.y)),
        title: &format!("{} AUPRC", model_config),
        x_label: "Recall",
        y_label: "Precision",
    })
}

/// Tick labels of a confusion matrix: `N`/`Y` for a binary matrix without
/// class names, class ids for larger ones.
fn class_tick_labels(n: usize, class_names: &[String]) -> Vec<String> {
    if class_names.len() == n {
        class_names.to_vec()
    } else if n == 2 {
        vec!["N".to_string(), "Y".to_string()]
    } else {
        (0..n).map(|i| i.to_string()).collect()
    }
}

/// Row-normalized confusion matrix in the `Blues` colormap with a colorbar.
///
/// Cells show their rounded percentage when non-zero, white on cells above
/// `text_threshold` and black otherwise. `class_names` label the ticks when
/// it has one entry per class.
pub fn render_confusion_matrix(cm: &ConfusionMatrix, text_threshold: f64, title: &str, class_names: &[String]) -> RgbImage {
    let norm = cm.normalize_rows();
    let n = cm.num_classes.max(1);
    let area = plot_area((0.0, n as f64), (0.0, n as f64), 120.0);
    let side = area.width.min(area.height);
    let cell = side / n as f64;
    let (left, top) = (area.left, area.top);

    let mut canvas = Canvas::new(CHART_WIDTH, CHART_HEIGHT, WHITE);
    for (r, row) in norm.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            let x = (left + c as f64 * cell) as i64;
            let y = (top + r as f64 * cell) as i64;
            let size = cell.ceil() as i64;
            canvas.fill_rect(x, y, size, size, blues(v));

            let pct = (v * 100.0 + 0.5) as i64;
            if pct > 0 {
                let color = if v > text_threshold { WHITE } else { BLACK };
                let cx = x + size / 2;
                let cy = y + size / 2;
                canvas.text_centered(cx, cy, &format!("{}%", pct), color, 3);
            }
        }
    }
    canvas.stroke_rect(left as i64, top as i64, side as i64, side as i64, DARK_TEXT);

    for (i, label) in class_tick_labels(n, class_names).iter().enumerate() {
        let center = left + (i as f64 + 0.5) * cell;
        canvas.text_centered(center as i64, (top + side) as i64 + 16, label, DARK_TEXT, 2);
        let w = Canvas::text_width(label, 2);
        canvas.text(left as i64 - 8 - w, center as i64 - 5, label, DARK_TEXT, 2);
    }
    let matrix_area = PlotArea { width: side, height: side, ..area };
    draw_labels(&mut canvas, &matrix_area, title, "Predicted label", "True label");

    // Colorbar, 0 at the bottom and 1 at the top.
    let bar_left = (left + side + 30.0) as i64;
    let bar_height = side as i64;
    for dy in 0..bar_height {
        let t = 1.0 - dy as f64 / (bar_height - 1).max(1) as f64;
        canvas.fill_rect(bar_left, top as i64 + dy, 20, 1, blues(t));
    }
    canvas.stroke_rect(bar_left, top as i64, 20, bar_height, DARK_TEXT);
    for (v, label) in linear_ticks(0.0, 1.0, 1) {
        let y = top as i64 + ((1.0 - v) * (bar_height - 1) as f64) as i64;
        canvas.text(bar_left + 26, y - 5, &label, DARK_TEXT, 2);
    }
    canvas.into_image()
}

pub fn save_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save_with_format(path, image::ImageFormat::Png)?;
    info!(path = %path.display(), "saved plot");
    Ok(())
}

/// Writes `<model_config>_train_loss.png` into `results_dir`.
pub fn plot_training_loss(train_losses: &[f64], val_losses: &[f64], results_dir: &Path, model_config: &str) -> Result<PathBuf> {
    let path = results_dir.join(format!("{}_train_loss.png", model_config));
    save_png(&render_loss_curves(train_losses, val_losses), &path)?;
    Ok(path)
}

/// Areas and confusion matrix produced by `plot_test_metrics`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestMetrics {
    /// `None` when the labels contain a single class.
    pub auroc: Option<f64>,
    /// `None` when the labels contain no positive.
    pub auprc: Option<f64>,
    pub confusion: ConfusionMatrix,
}

/// Binary test report: writes `<model_config>_AUROC.png`,
/// `<model_config>_AUPRC.png` and `<model_config>_Confusion_Matrix.png`.
///
/// `scores` are positive-class probabilities; the confusion matrix predicts 1
/// for scores above 0.5. Curves that are undefined for the labels are logged
/// and skipped.
pub fn plot_test_metrics(labels: &[usize], scores: &[f64], results_dir: &Path, model_config: &str) -> Result<TestMetrics> {
    let auroc = match roc_curve(labels, scores) {
        Some(curve) => {
            save_png(&render_roc(&curve, model_config), &results_dir.join(format!("{}_AUROC.png", model_config)))?;
            Some(auc(&curve.x, &curve.y))
        }
        None => {
            warn!("ROC curve undefined: test labels contain a single class");
            None
        }
    };
    let auprc = match precision_recall_curve(labels, scores) {
        Some(curve) => {
            save_png(&render_pr(&curve, model_config), &results_dir.join(format!("{}_AUPRC.png", model_config)))?;
            Some(auc(&curve.x, &curve.y))
        }
        None => {
            warn!("PR curve undefined: test labels contain no positive sample");
            None
        }
    };

    let confusion = ConfusionMatrix::from_scores(scores, labels, 0.5);
    save_png(
        &render_confusion_matrix(&confusion, 0.5, &format!("{} Confusion Matrix", model_config), &[]),
        &results_dir.join(format!("{}_Confusion_Matrix.png", model_config)),
    )?;

    info!(?auroc, ?auprc, "test metrics");
    Ok(TestMetrics { auroc, auprc, confusion })
}
