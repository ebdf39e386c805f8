//! Chart report sink.
//!
//! Rendering is split in two: [`ChartPlan::build`] turns a result table into
//! plain data (which bars or lines to draw, already in the report unit), and
//! [`render`] draws a plan to a PNG with `plotters`. Unavailable backends and
//! cells never reach the plan.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::backends::BackendKind;
use crate::error::{Error, Result};
use crate::results::ResultTable;

use super::csv_sink::{query_labels, tier_sizes};
use super::{ChartKind, ReportSink, ReportSpec};

const FONT: &str = "sans-serif";

/// One plotted value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Category index for bar charts, tier size for line charts.
    pub x: f64,
    pub y: f64,
}

/// The points of one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub backend: BackendKind,
    pub points: Vec<Point>,
}

/// What to draw, independent of the drawing backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPlan {
    pub title: String,
    pub kind: ChartKind,
    pub x_label: &'static str,
    pub y_label: &'static str,
    /// Bar chart x-axis categories. Empty for line charts.
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl ChartPlan {
    /// Build the plan for a workload's results.
    pub fn build(table: &ResultTable, spec: &ReportSpec) -> Self {
        let unit = spec.unit;
        let mut categories = Vec::new();
        let mut series = Vec::new();

        let x_label = match spec.chart {
            ChartKind::Bar => {
                for (backend, _) in table.available() {
                    let Some(millis) = table.scalar_of(backend) else {
                        continue;
                    };
                    let x = categories.len() as f64;
                    categories.push(backend.name().to_string());
                    series.push(Series {
                        backend,
                        points: vec![Point {
                            x,
                            y: unit.from_millis(millis),
                        }],
                    });
                }
                "Database"
            }
            ChartKind::GroupedBar => {
                let labels = query_labels(table, spec.query_rows());
                categories = labels.iter().map(|l| l.to_string()).collect();
                for (backend, measurement) in table.available() {
                    let points: Vec<_> = labels
                        .iter()
                        .enumerate()
                        .filter_map(|(i, label)| {
                            let millis = *measurement.query(label)?.as_ref().ok()?;
                            Some(Point {
                                x: i as f64,
                                y: unit.from_millis(millis),
                            })
                        })
                        .collect();
                    if !points.is_empty() {
                        series.push(Series { backend, points });
                    }
                }
                "Query"
            }
            ChartKind::LogLine => {
                let sizes = tier_sizes(table, spec.tier_rows());
                for (backend, measurement) in table.available() {
                    // Log axes cannot show zero.
                    let points: Vec<_> = sizes
                        .iter()
                        .filter_map(|&size| {
                            let millis = *measurement.tier(size)?.as_ref().ok()?;
                            let y = unit.from_millis(millis);
                            (size > 0 && y > 0.0).then_some(Point { x: size as f64, y })
                        })
                        .collect();
                    if !points.is_empty() {
                        series.push(Series { backend, points });
                    }
                }
                "Number of records"
            }
        };

        Self {
            title: spec.title.to_string(),
            kind: spec.chart,
            x_label,
            y_label: unit.axis_label(),
            categories,
            series,
        }
    }

    /// Backends that will be drawn.
    pub fn backends(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.series.iter().map(|s| s.backend)
    }

    /// Number of bars (or line points) to draw.
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn points(&self) -> impl Iterator<Item = &Point> {
        self.series.iter().flat_map(|s| s.points.iter())
    }
}

/// Renders charts as PNG images.
#[derive(Debug, Clone, Copy)]
pub struct ChartSink {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSink {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
        }
    }
}

impl ReportSink for ChartSink {
    fn write(&self, table: &ResultTable, spec: &ReportSpec, output_dir: &Path) -> Result<PathBuf> {
        let plan = ChartPlan::build(table, spec);
        for (backend, unavailable) in table.unavailable() {
            tracing::debug!(backend = %backend, reason = %unavailable.reason, "left off chart");
        }

        let path = output_dir.join(spec.chart_file);
        render(&plan, &path, (self.width, self.height))?;
        Ok(path)
    }
}

/// Draw a plan to a PNG file.
pub fn render(plan: &ChartPlan, path: &Path, size: (u32, u32)) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    match plan.kind {
        ChartKind::Bar | ChartKind::GroupedBar => draw_bars(&root, plan)?,
        ChartKind::LogLine => draw_lines(&root, plan)?,
    }

    root.present().map_err(chart_error)?;
    Ok(())
}

fn draw_bars(root: &DrawingArea<BitMapBackend<'_>, Shift>, plan: &ChartPlan) -> Result<()> {
    let n = plan.categories.len().max(1);
    let y_max = plan.points().map(|p| p.y).fold(0.0, f64::max);
    // Headroom for the value labels above the bars.
    let y_max = if y_max > 0.0 { y_max * 1.15 } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(&plan.title, (FONT, 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)
        .map_err(chart_error)?;

    let formatter = |x: &f64| category_label(&plan.categories, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&formatter)
        .x_desc(plan.x_label)
        .y_desc(plan.y_label)
        .draw()
        .map_err(chart_error)?;

    let slots = match plan.kind {
        ChartKind::GroupedBar => plan.series.len().max(1),
        _ => 1,
    };
    let width = 0.8 / slots as f64;
    let annotation = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));

    for (slot, series) in plan.series.iter().enumerate() {
        let slot = if slots == 1 { 0 } else { slot };
        let color = backend_color(series.backend);
        let left = |p: &Point| p.x - 0.4 + slot as f64 * width;

        let drawn = chart
            .draw_series(series.points.iter().map(|p| {
                Rectangle::new([(left(p), 0.0), (left(p) + width, p.y)], color.filled())
            }))
            .map_err(chart_error)?;
        if plan.kind == ChartKind::GroupedBar {
            drawn
                .label(series.backend.name())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .draw_series(series.points.iter().map(|p| {
                Text::new(
                    format!("{:.2}", p.y),
                    (left(p) + width / 2.0, p.y),
                    annotation.clone(),
                )
            }))
            .map_err(chart_error)?;
    }

    if plan.kind == ChartKind::GroupedBar && !plan.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_error)?;
    }

    Ok(())
}

fn draw_lines(root: &DrawingArea<BitMapBackend<'_>, Shift>, plan: &ChartPlan) -> Result<()> {
    let (x_min, x_max) = bounds(plan.points().map(|p| p.x)).unwrap_or((10.0, 10_000.0));
    let (y_min, y_max) = bounds(plan.points().map(|p| p.y)).unwrap_or((0.1, 1_000.0));

    let mut chart = ChartBuilder::on(root)
        .caption(&plan.title, (FONT, 28))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(
            (x_min / 2.0..x_max * 2.0).log_scale(),
            (y_min / 2.0..y_max * 2.0).log_scale(),
        )
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x: &f64| format!("{x:.0}"))
        .x_desc(plan.x_label)
        .y_desc(plan.y_label)
        .draw()
        .map_err(chart_error)?;

    let annotation = TextStyle::from((FONT, 12).into_font()).pos(Pos::new(HPos::Left, VPos::Bottom));

    for series in &plan.series {
        let color = backend_color(series.backend);
        let coords: Vec<_> = series.points.iter().map(|p| (p.x, p.y)).collect();

        chart
            .draw_series(LineSeries::new(coords.iter().copied(), color.stroke_width(2)))
            .map_err(chart_error)?
            .label(series.backend.name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart
            .draw_series(coords.iter().map(|&c| Circle::new(c, 4, color.filled())))
            .map_err(chart_error)?;
        chart
            .draw_series(
                coords
                    .iter()
                    .map(|&(x, y)| Text::new(format!("{y:.2}"), (x, y), annotation.clone())),
            )
            .map_err(chart_error)?;
    }

    if !plan.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_error)?;
    }

    Ok(())
}

/// Label of the category at an integer position, empty between categories.
fn category_label(categories: &[String], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    categories.get(index as usize).cloned().unwrap_or_default()
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Fixed color per backend, so every chart uses the same legend.
fn backend_color(backend: BackendKind) -> RGBAColor {
    Palette99::pick(backend as usize).to_rgba()
}

fn chart_error(err: impl std::fmt::Display) -> Error {
    Error::Chart(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::report::{Layout, Unit};
    use crate::results::{
        FailureReason, Measurement, QueryTiming, Samples, TierTiming, Unavailable,
    };

    fn spec(chart: ChartKind, unit: Unit) -> ReportSpec {
        ReportSpec {
            title: "test",
            csv_file: "test.csv",
            chart_file: "test.png",
            layout: Layout::Samples,
            chart,
            unit,
        }
    }

    fn down() -> Unavailable {
        Unavailable::new(FailureReason::Connection, "refused")
    }

    fn repeated(backend: BackendKind, millis: u64) -> Measurement {
        let mut samples = Samples::default();
        samples.push(backend, "op", Duration::from_millis(millis));
        Measurement::Repeated(samples)
    }

    #[test]
    fn test_bar_plan_skips_unavailable() {
        let mut table = ResultTable::new();
        table
            .insert(BackendKind::MongoDb, Ok(repeated(BackendKind::MongoDb, 4)))
            .unwrap();
        table.insert(BackendKind::PostgreSql, Err(down())).unwrap();
        table
            .insert(BackendKind::Redis, Ok(repeated(BackendKind::Redis, 2)))
            .unwrap();

        let plan = ChartPlan::build(&table, &spec(ChartKind::Bar, Unit::Millis));
        assert_eq!(plan.categories, vec!["MongoDB", "Redis"]);
        assert_eq!(plan.point_count(), 2);
        assert_eq!(plan.series[1].points[0], Point { x: 1.0, y: 2.0 });
        assert!(!plan.backends().any(|b| b == BackendKind::PostgreSql));
    }

    #[test]
    fn test_all_unavailable_plan_is_empty() {
        let mut table = ResultTable::new();
        for kind in BackendKind::ALL {
            table.insert(kind, Err(down())).unwrap();
        }
        for chart in [ChartKind::Bar, ChartKind::GroupedBar, ChartKind::LogLine] {
            let plan = ChartPlan::build(&table, &spec(chart, Unit::Millis));
            assert!(plan.is_empty());
            assert_eq!(plan.point_count(), 0);
        }
    }

    #[test]
    fn test_grouped_plan_omits_failed_cells() {
        let mut table = ResultTable::new();
        table
            .insert(
                BackendKind::MySql,
                Ok(Measurement::Queries(vec![
                    QueryTiming {
                        label: "a",
                        millis: Ok(1500.0),
                    },
                    QueryTiming {
                        label: "b",
                        millis: Err(down()),
                    },
                ])),
            )
            .unwrap();

        let plan = ChartPlan::build(&table, &spec(ChartKind::GroupedBar, Unit::Seconds));
        assert_eq!(plan.categories, vec!["a", "b"]);
        assert_eq!(plan.series[0].points, vec![Point { x: 0.0, y: 1.5 }]);
        assert_eq!(plan.y_label, "Time (s)");
    }

    #[test]
    fn test_line_plan_uses_tier_sizes() {
        let mut table = ResultTable::new();
        table
            .insert(
                BackendKind::PostgreSql,
                Ok(Measurement::Tiered(vec![
                    TierTiming {
                        size: 100,
                        millis: Ok(1.0),
                    },
                    TierTiming {
                        size: 1000,
                        millis: Err(down()),
                    },
                    TierTiming {
                        size: 10000,
                        millis: Ok(9.0),
                    },
                ])),
            )
            .unwrap();

        let plan = ChartPlan::build(&table, &spec(ChartKind::LogLine, Unit::Millis));
        let xs: Vec<_> = plan.series[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![100.0, 10000.0]);
        assert!(plan.categories.is_empty());
    }

    fn measurement_for(chart: ChartKind, backend: BackendKind, scale: f64) -> Measurement {
        match chart {
            ChartKind::Bar => repeated(backend, 2 + backend as u64),
            ChartKind::GroupedBar => Measurement::Queries(vec![
                QueryTiming {
                    label: "rides_by_lyft",
                    millis: Ok(120.0 * scale),
                },
                QueryTiming {
                    label: "avg_price_by_cab_type",
                    millis: Err(down()),
                },
            ]),
            ChartKind::LogLine => Measurement::Tiered(
                [100, 1000, 10000]
                    .into_iter()
                    .map(|size| TierTiming {
                        size,
                        millis: Ok(size as f64 * 0.01 * scale),
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_render_with_unavailable_backends() {
        let dir = tempfile::tempdir().unwrap();
        let layouts = [
            (ChartKind::Bar, Layout::Samples),
            (
                ChartKind::GroupedBar,
                Layout::Queries {
                    labels: vec!["rides_by_lyft", "avg_price_by_cab_type"],
                },
            ),
            (
                ChartKind::LogLine,
                Layout::Tiers {
                    sizes: vec![100, 1000, 10000],
                },
            ),
        ];

        for (chart, layout) in layouts {
            for failing in 0..=BackendKind::ALL.len() {
                let mut table = ResultTable::new();
                for (i, kind) in BackendKind::ALL.into_iter().enumerate() {
                    let result = if i < failing {
                        Err(down())
                    } else {
                        Ok(measurement_for(chart, kind, 1.0 + i as f64))
                    };
                    table.insert(kind, result).unwrap();
                }

                let spec = ReportSpec {
                    layout: layout.clone(),
                    ..spec(chart, Unit::Millis)
                };
                let path = ChartSink { width: 640, height: 400 }
                    .write(&table, &spec, dir.path())
                    .unwrap();
                assert_eq!(path, dir.path().join("test.png"));
                assert!(std::fs::metadata(&path).unwrap().len() > 0, "{chart:?} with {failing} down");
                std::fs::remove_file(&path).unwrap();
            }
        }
    }

    #[test]
    fn test_render_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        for chart in [ChartKind::Bar, ChartKind::GroupedBar, ChartKind::LogLine] {
            let plan = ChartPlan::build(&ResultTable::new(), &spec(chart, Unit::Seconds));
            render(&plan, &path, (320, 240)).unwrap();
            assert!(path.exists());
        }
    }

    #[test]
    fn test_category_labels() {
        let categories = vec!["MongoDB".to_string(), "MySQL".to_string()];
        assert_eq!(category_label(&categories, 1.0), "MySQL");
        assert_eq!(category_label(&categories, 0.5), "");
        assert_eq!(category_label(&categories, -1.0), "");
        assert_eq!(category_label(&categories, 5.0), "");
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds([3.0, 1.0, 2.0].into_iter()), Some((1.0, 3.0)));
        assert_eq!(bounds(std::iter::empty()), None);
    }
}
