//! Figure generation with plotters.
//!
//! Every figure is an SVG so that rendering needs no system fonts beyond the SVG
//! viewer's own.

use crate::core::catalog::{Category, Protocol, Subcategory};
use crate::core::stats::descriptive::{mean, std_dev};
use crate::core::table::MetricTable;
use crate::engine::config::FiguresConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::workflows::analyze::{Analysis, load_compiled};
use plotters::prelude::*;
use plotters::coord::Shift;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_svg::SVGBackend;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const FIG1_HEATMAP: &str = "fig1_clashscore_improvement_heatmap.svg";
pub const FIG2_PAIRED_SCATTER: &str = "fig2_molprobity_paired_scatter.svg";
pub const FIG3_DISTRIBUTIONS: &str = "fig3_metric_distributions.svg";
pub const FIG4_INITIAL_VS_CHANGE: &str = "fig4_initial_vs_change.svg";

const CATEGORY_COLORS: [RGBColor; 3] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
];

type DrawResult = Result<(), Box<dyn Error>>;

fn category_color(category: Category) -> RGBColor {
    let idx = Category::ALL
        .iter()
        .position(|&c| c == category)
        .unwrap_or_default();
    CATEGORY_COLORS[idx]
}

/// Blue for negative, white at zero, red for positive values of `value / max_abs`.
fn diverging_color(value: f64, max_abs: f64) -> RGBColor {
    let v = if max_abs > 0.0 {
        (0.5 + value / (2.0 * max_abs)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    if v < 0.5 {
        let t = v * 2.0;
        RGBColor((255.0 * t) as u8, (255.0 * t) as u8, 255)
    } else {
        let t = (v - 0.5) * 2.0;
        RGBColor(255, (255.0 * (1.0 - t)) as u8, (255.0 * (1.0 - t)) as u8)
    }
}

/// Axis range covering `values` with a margin; never empty.
fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.1).max(0.5);
    (lo - pad)..(hi + pad)
}

fn no_data(root: &DrawingArea<SVGBackend<'_>, Shift>) -> DrawResult {
    let (w, h) = root.dim_in_pixel();
    root.draw(&Text::new(
        "No data",
        (w as i32 / 2 - 30, h as i32 / 2),
        ("sans-serif", 20).into_font().color(&BLACK),
    ))?;
    Ok(())
}

/// Mean baseline minus mean relaxed clashscore per category and protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct Improvement {
    pub category: Category,
    pub protocol: Protocol,
    pub value: f64,
}

pub fn clashscore_improvements(analysis: &Analysis) -> Vec<Improvement> {
    analysis
        .relaxations()
        .into_iter()
        .filter_map(|(category, protocol)| {
            let before = mean(&analysis.group_values(
                category,
                &Subcategory::baseline_for(category),
                "clashscore",
            ))?;
            let after = mean(&analysis.group_values(
                category,
                &Subcategory::Relaxed(protocol.clone()),
                "clashscore",
            ))?;
            Some(Improvement {
                category,
                protocol,
                value: before - after,
            })
        })
        .collect()
}

/// Per-protein (baseline, relaxed) means of `metric`, pooling every relaxed protocol.
pub fn paired_means(analysis: &Analysis, metric: &str) -> Vec<(Category, Vec<(f64, f64)>)> {
    Category::ALL
        .iter()
        .map(|&category| {
            let baseline = Subcategory::baseline_for(category);
            let before = analysis.protein_means_where(metric, |row| {
                Analysis::in_group(row, category, &baseline)
            });
            let after = analysis.protein_means_where(metric, |row| {
                row.category() == Some(category)
                    && row.subcategory().is_some_and(|s| s.protocol().is_some())
            });
            let points: Vec<(f64, f64)> = before
                .iter()
                .filter_map(|(protein, b)| Some((*b, *after.get(protein)?)))
                .collect();
            (category, points)
        })
        .filter(|(_, points)| !points.is_empty())
        .collect()
}

/// Mean and sample std of `metric` for each category/subcategory group.
pub fn group_bars(analysis: &Analysis, metric: &str) -> Vec<(String, f64, f64)> {
    analysis
        .groups()
        .iter()
        .filter_map(|(category, sub)| {
            let values = analysis.group_values(*category, sub, metric);
            let m = mean(&values)?;
            Some((
                format!("{category}/{sub}"),
                m,
                std_dev(&values).unwrap_or(0.0),
            ))
        })
        .collect()
}

/// Per-protein (initial, change) clashscore points for `normal_beta`.
pub fn initial_vs_change_points(analysis: &Analysis) -> Vec<(Category, Vec<(f64, f64)>)> {
    Category::ALL
        .iter()
        .map(|&category| {
            let points = analysis
                .normal_beta_pairs(category, "clashscore")
                .into_iter()
                .map(|(_, before, after)| (before, after - before))
                .collect::<Vec<_>>();
            (category, points)
        })
        .filter(|(_, points)| !points.is_empty())
        .collect()
}

fn draw_heatmap(path: &Path, cells: &[Improvement]) -> DrawResult {
    let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    if cells.is_empty() {
        no_data(&root)?;
        root.present()?;
        return Ok(());
    }

    let categories: Vec<Category> = Category::ALL
        .into_iter()
        .filter(|c| cells.iter().any(|cell| cell.category == *c))
        .collect();
    let mut protocols: Vec<Protocol> = cells.iter().map(|c| c.protocol.clone()).collect();
    protocols.sort();
    protocols.dedup();
    let max_abs = cells.iter().map(|c| c.value.abs()).fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Clashscore improvement (baseline - relaxed)",
            ("sans-serif", 20),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(
            (0..categories.len()).into_segmented(),
            (0..protocols.len()).into_segmented(),
        )?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(categories.len())
        .y_labels(protocols.len())
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) if *i < categories.len() => categories[*i].to_string(),
            _ => String::new(),
        })
        .y_label_formatter(&|y| match y {
            SegmentValue::CenterOf(i) if *i < protocols.len() => protocols[*i].to_string(),
            _ => String::new(),
        })
        .draw()?;

    let centre = Pos::new(HPos::Center, VPos::Center);
    for cell in cells {
        let (Some(ci), Some(pi)) = (
            categories.iter().position(|c| *c == cell.category),
            protocols.iter().position(|p| *p == cell.protocol),
        ) else {
            continue;
        };
        chart.draw_series(std::iter::once(Rectangle::new(
            [
                (SegmentValue::Exact(ci), SegmentValue::Exact(pi)),
                (SegmentValue::Exact(ci + 1), SegmentValue::Exact(pi + 1)),
            ],
            diverging_color(cell.value, max_abs).filled(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{:.2}", cell.value),
            (SegmentValue::CenterOf(ci), SegmentValue::CenterOf(pi)),
            ("sans-serif", 16).into_font().color(&BLACK).pos(centre),
        )))?;
    }

    root.present()?;
    Ok(())
}

fn draw_scatter(
    path: &Path,
    caption: &str,
    (x_desc, y_desc): (&str, &str),
    series: &[(Category, Vec<(f64, f64)>)],
    reference: Reference,
) -> DrawResult {
    let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    if series.is_empty() {
        no_data(&root)?;
        root.present()?;
        return Ok(());
    }

    let points = || series.iter().flat_map(|(_, p)| p.iter().copied());
    let (x_range, y_range) = match reference {
        Reference::Identity => {
            let r = padded_range(points().flat_map(|(x, y)| [x, y]));
            (r.clone(), r)
        }
        Reference::Zero => (
            padded_range(points().map(|(x, _)| x)),
            padded_range(points().map(|(_, y)| y).chain(std::iter::once(0.0))),
        ),
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range)?;

    chart.configure_mesh().x_desc(x_desc).y_desc(y_desc).draw()?;

    let line = match reference {
        Reference::Identity => [(x_range.start, x_range.start), (x_range.end, x_range.end)],
        Reference::Zero => [(x_range.start, 0.0), (x_range.end, 0.0)],
    };
    chart.draw_series(LineSeries::new(line, BLACK.mix(0.5).stroke_width(1)))?;

    for (category, pts) in series {
        let color = category_color(*category);
        chart
            .draw_series(
                pts.iter()
                    .map(move |&(x, y)| Circle::new((x, y), 4, color.filled())),
            )?
            .label(category.as_str())
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Reference {
    Identity,
    Zero,
}

fn draw_bars(path: &Path, metric: &str, bars: &[(String, f64, f64)]) -> DrawResult {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    if bars.is_empty() {
        no_data(&root)?;
        root.present()?;
        return Ok(());
    }

    let y_range = padded_range(
        bars.iter()
            .flat_map(|(_, m, s)| [m + s, m - s, 0.0]),
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{metric} by group (mean ± std)"), ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(120)
        .y_label_area_size(60)
        .build_cartesian_2d((0..bars.len()).into_segmented(), y_range)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) if *i < bars.len() => bars[*i].0.clone(),
            _ => String::new(),
        })
        .y_desc(metric)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, m, _))| {
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), *m),
            ],
            CATEGORY_COLORS[0].mix(0.7).filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;
    chart.draw_series(bars.iter().enumerate().map(|(i, (_, m, s))| {
        ErrorBar::new_vertical(SegmentValue::CenterOf(i), m - s, *m, m + s, BLACK.filled(), 10)
    }))?;

    root.present()?;
    Ok(())
}

fn render(path: PathBuf, draw: impl FnOnce(&Path) -> DrawResult) -> Result<PathBuf, EngineError> {
    draw(&path).map_err(|e| EngineError::Render {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(path)
}

#[derive(Debug, Clone, Default)]
pub struct FiguresReport {
    pub written: Vec<PathBuf>,
}

#[instrument(skip_all, name = "figures_workflow")]
pub fn run(config: &FiguresConfig, reporter: &ProgressReporter) -> Result<FiguresReport, EngineError> {
    let table: MetricTable = load_compiled(&config.input_dir)?;
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| EngineError::io(&config.output_dir, e))?;

    let metric = config.distribution_metric.as_str();
    let analysis = Analysis::new(
        &table,
        vec![
            "clashscore".to_string(),
            "molprobity_score".to_string(),
            metric.to_string(),
        ],
    );

    reporter.phase_start("Rendering figures");
    reporter.report(Progress::TaskStart { total: 4 });
    let out = |name: &str| config.output_dir.join(name);
    let mut written = Vec::with_capacity(4);

    let cells = clashscore_improvements(&analysis);
    written.push(render(out(FIG1_HEATMAP), |p| draw_heatmap(p, &cells))?);
    reporter.report(Progress::TaskIncrement { amount: 1 });

    let paired = paired_means(&analysis, "molprobity_score");
    written.push(render(out(FIG2_PAIRED_SCATTER), |p| {
        draw_scatter(
            p,
            "MolProbity score per protein",
            ("baseline", "relaxed"),
            &paired,
            Reference::Identity,
        )
    })?);
    reporter.report(Progress::TaskIncrement { amount: 1 });

    let bars = group_bars(&analysis, metric);
    written.push(render(out(FIG3_DISTRIBUTIONS), |p| draw_bars(p, metric, &bars))?);
    reporter.report(Progress::TaskIncrement { amount: 1 });

    let change = initial_vs_change_points(&analysis);
    written.push(render(out(FIG4_INITIAL_VS_CHANGE), |p| {
        draw_scatter(
            p,
            "Initial clashscore vs change after normal_beta",
            ("initial clashscore", "change"),
            &change,
            Reference::Zero,
        )
    })?);
    reporter.report(Progress::TaskIncrement { amount: 1 });
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    info!(
        figures = written.len(),
        output = %config.output_dir.display(),
        "Figures written."
    );
    Ok(FiguresReport { written })
}
