use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::debug;

use crate::analysis::report::{BenchGroup, ChartSink};
use crate::error::{io_error, plot_error, Result};

const DEFAULT_SIZE: (u32, u32) = (800, 600);

const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// Writes one PNG line chart per benchmark group: GFLOPS over `m`, one line
/// per implementation.
///
/// The bitmap carries no text so no font backend is needed. Title, axis
/// labels and the color of each implementation go to a `.legend.txt` file
/// beside the image.
///
/// Benchmarks whose names sanitize to the same file stem get a numeric
/// suffix, `<stem>-2`, in the order they are rendered.
#[derive(Debug, Clone)]
pub struct PlottersChart {
    out_dir: PathBuf,
    run_idx: Option<usize>,
    size: (u32, u32),
    written: Vec<PathBuf>,
    claimed: HashMap<String, String>,
}

impl PlottersChart {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            run_idx: None,
            size: DEFAULT_SIZE,
            written: Vec::new(),
            claimed: HashMap::new(),
        }
    }

    /// Suffixes file names with the run index, `<bench>_<run>.png`.
    pub fn with_run_index(mut self, run_idx: usize) -> Self {
        self.run_idx = Some(run_idx);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Images written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Image path of `bench_name` before any collision suffix.
    pub fn path_for(&self, bench_name: &str) -> PathBuf {
        self.image_path(&sanitize(bench_name))
    }

    fn image_path(&self, stem: &str) -> PathBuf {
        let file = match self.run_idx {
            Some(run) => format!("{stem}_{run}.png"),
            None => format!("{stem}.png"),
        };
        self.out_dir.join(file)
    }

    /// Reserves a file stem for `bench_name`, suffixed when another
    /// benchmark already holds the sanitized name.
    fn claim_stem(&mut self, bench_name: &str) -> String {
        let base = sanitize(bench_name);
        let mut stem = base.clone();
        let mut suffix = 1;
        loop {
            match self.claimed.get(&stem) {
                Some(owner) if owner == bench_name => return stem,
                Some(_) => {
                    suffix += 1;
                    stem = format!("{base}-{suffix}");
                }
                None => {
                    self.claimed.insert(stem.clone(), bench_name.to_string());
                    return stem;
                }
            }
        }
    }

    fn draw(&self, path: &Path, group: &BenchGroup) -> Result<()> {
        let (x_range, y_max) = bounds(group);

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| plot_error(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(x_range, 0f64..y_max)
            .map_err(|e| plot_error(e.to_string()))?;

        for (index, series) in group.series.iter().enumerate() {
            let color = SERIES_COLORS[index % SERIES_COLORS.len()];
            let points: Vec<(f64, f64)> = series
                .points
                .iter()
                .filter(|p| p.gflops.is_finite())
                .map(|p| (p.m as f64, p.gflops))
                .collect();

            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(|e| plot_error(e.to_string()))?;
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&point| Circle::new(point, 3, color.filled())),
                )
                .map_err(|e| plot_error(e.to_string()))?;
        }

        root.present().map_err(|e| plot_error(e.to_string()))?;
        Ok(())
    }
}

impl ChartSink for PlottersChart {
    fn render(&mut self, group: &BenchGroup) -> Result<()> {
        fs::create_dir_all(&self.out_dir).map_err(|e| io_error(&self.out_dir, e))?;
        let stem = self.claim_stem(&group.bench_name);
        let path = self.image_path(&stem);
        self.draw(&path, group)?;

        let legend_path = path.with_extension("legend.txt");
        fs::write(&legend_path, legend(group)).map_err(|e| io_error(&legend_path, e))?;
        debug!(path = %path.display(), "chart written");
        self.written.push(path);
        Ok(())
    }
}

/// Text that the bitmap cannot carry: title, axes and series colors.
fn legend(group: &BenchGroup) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "title: {} (GFLOPS by m)", group.bench_name);
    let _ = writeln!(text, "x: m");
    let _ = writeln!(text, "y: GFLOPS");
    for (index, series) in group.series.iter().enumerate() {
        let RGBColor(r, g, b) = SERIES_COLORS[index % SERIES_COLORS.len()];
        let _ = writeln!(text, "#{r:02x}{g:02x}{b:02x} {}", series.implementation);
    }
    text
}

/// X range over `m` and the top of the GFLOPS axis. Non-finite throughputs
/// are left out.
fn bounds(group: &BenchGroup) -> (std::ops::Range<f64>, f64) {
    let (mut x_min, mut x_max, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY, 0f64);
    for (m, gflops, _) in group.triples().filter(|(_, gflops, _)| gflops.is_finite()) {
        x_min = x_min.min(m as f64);
        x_max = x_max.max(m as f64);
        y_max = y_max.max(gflops);
    }
    if !x_min.is_finite() {
        (x_min, x_max) = (0.0, 1.0);
    } else if x_min == x_max {
        (x_min, x_max) = (x_min - 1.0, x_max + 1.0);
    }
    let y_top = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };
    (x_min..x_max, y_top)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::report::{Series, SeriesPoint};

    fn group(points: &[(u64, f64)]) -> BenchGroup {
        BenchGroup {
            bench_name: "sgemm small/m".to_string(),
            series: vec![Series {
                implementation: "glare".to_string(),
                points: points
                    .iter()
                    .map(|&(m, gflops)| SeriesPoint {
                        m,
                        n: m,
                        k: m,
                        gflops,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_path_for() {
        let chart = PlottersChart::new("/tmp/images");
        assert_eq!(
            chart.path_for("sgemm small/m"),
            PathBuf::from("/tmp/images/sgemm_small_m.png")
        );
        let chart = chart.with_run_index(2);
        assert_eq!(
            chart.path_for("dgemm"),
            PathBuf::from("/tmp/images/dgemm_2.png")
        );
    }

    #[test]
    fn test_bounds_pads_single_size() {
        let (x, y) = bounds(&group(&[(512, 100.0)]));
        assert_eq!(x, 511.0..513.0);
        assert!((y - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut chart = PlottersChart::new(dir.path().join("run")).with_size(320, 240);
        chart
            .render(&group(&[(256, 80.0), (512, 120.0), (1024, 150.0)]))
            .unwrap();

        assert_eq!(chart.written().len(), 1);
        let bytes = fs::read(&chart.written()[0]).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_bounds_skip_non_finite() {
        let (x, y) = bounds(&group(&[(256, f64::INFINITY), (512, 100.0), (1024, f64::NAN)]));
        assert_eq!(x, 511.0..513.0);
        assert!((y - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_with_infinite_point() {
        let dir = tempfile::tempdir().unwrap();
        let mut chart = PlottersChart::new(dir.path()).with_size(320, 240);
        chart
            .render(&group(&[(256, 80.0), (512, f64::INFINITY)]))
            .unwrap();
        assert_eq!(chart.written().len(), 1);
    }

    #[test]
    fn test_colliding_names_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut chart = PlottersChart::new(dir.path()).with_size(320, 240);
        for name in ["a b", "a/b", "a b"] {
            let mut g = group(&[(256, 80.0)]);
            g.bench_name = name.to_string();
            chart.render(&g).unwrap();
        }

        assert_eq!(
            chart.written(),
            &[
                dir.path().join("a_b.png"),
                dir.path().join("a_b-2.png"),
                dir.path().join("a_b.png"),
            ]
        );
        let legend = fs::read_to_string(dir.path().join("a_b-2.legend.txt")).unwrap();
        assert!(legend.starts_with("title: a/b (GFLOPS by m)\n"));
    }

    #[test]
    fn test_legend_names_series_colors() {
        let mut g = group(&[(256, 80.0)]);
        g.series.push(Series {
            implementation: "mkl".to_string(),
            points: Vec::new(),
        });
        assert_eq!(
            legend(&g),
            "title: sgemm small/m (GFLOPS by m)\nx: m\ny: GFLOPS\n#1f77b4 glare\n#ff7f0e mkl\n"
        );
    }
}
