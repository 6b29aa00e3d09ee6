use std::fmt;

use ndarray::Array2;
use tracing::info;

use crate::analysis::aggregate::AggregatedTable;
use crate::analysis::record::Dims;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub m: u64,
    pub n: u64,
    pub k: u64,
    pub gflops: f64,
}

impl SeriesPoint {
    pub fn dims(&self) -> Dims {
        Dims {
            m: self.m,
            n: self.n,
            k: self.k,
        }
    }
}

/// Throughput of one implementation over problem sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub implementation: String,
    /// Ascending in `(m, n, k)`.
    pub points: Vec<SeriesPoint>,
}

/// All series of one benchmark, one chart's worth.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchGroup {
    pub bench_name: String,
    pub series: Vec<Series>,
}

impl BenchGroup {
    /// `(m, gflops, implementation)` for every point of every series.
    pub fn triples(&self) -> impl Iterator<Item = (u64, f64, &str)> + '_ {
        self.series.iter().flat_map(|series| {
            series
                .points
                .iter()
                .map(move |p| (p.m, p.gflops, series.implementation.as_str()))
        })
    }

    pub fn comparison_table(&self) -> ComparisonTable {
        ComparisonTable::from_group(self)
    }
}

/// Groups rows by benchmark, then by implementation.
///
/// Benchmarks and implementations appear in the order they are first met in
/// the table; points are sorted by ascending `(m, n, k)`, ties keeping table
/// order.
pub fn group_by_bench(table: &AggregatedTable) -> Vec<BenchGroup> {
    let mut groups: Vec<BenchGroup> = Vec::new();

    for row in table {
        let record = &row.record;
        let group_index = groups
            .iter()
            .position(|g| g.bench_name == record.bench_name)
            .unwrap_or_else(|| {
                groups.push(BenchGroup {
                    bench_name: record.bench_name.clone(),
                    series: Vec::new(),
                });
                groups.len() - 1
            });
        let group = &mut groups[group_index];

        let series_index = group
            .series
            .iter()
            .position(|s| s.implementation == record.implementation)
            .unwrap_or_else(|| {
                group.series.push(Series {
                    implementation: record.implementation.clone(),
                    points: Vec::new(),
                });
                group.series.len() - 1
            });

        group.series[series_index].points.push(SeriesPoint {
            m: record.m,
            n: record.n,
            k: record.k,
            gflops: row.gflops,
        });
    }

    for series in groups.iter_mut().flat_map(|g| g.series.iter_mut()) {
        series.points.sort_by_key(SeriesPoint::dims);
    }
    groups
}

/// GFLOPS of one benchmark as problem sizes × implementations.
///
/// Rows are distinct `(m, n, k)` triples, so points sharing `m` but not `n`
/// or `k` stay apart. Missing cells are NaN. A cell fed by several rows (configurations that
/// differ outside the dimensions) keeps the best throughput.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub bench_name: String,
    pub sizes: Vec<Dims>,
    pub implementations: Vec<String>,
    pub gflops: Array2<f64>,
}

impl ComparisonTable {
    pub fn from_group(group: &BenchGroup) -> Self {
        let mut sizes: Vec<Dims> = group
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(SeriesPoint::dims))
            .collect();
        sizes.sort_unstable();
        sizes.dedup();

        let implementations: Vec<String> = group
            .series
            .iter()
            .map(|s| s.implementation.clone())
            .collect();

        let mut gflops = Array2::from_elem((sizes.len(), implementations.len()), f64::NAN);
        for (col, series) in group.series.iter().enumerate() {
            for point in &series.points {
                if let Ok(row) = sizes.binary_search(&point.dims()) {
                    let cell = &mut gflops[[row, col]];
                    *cell = if cell.is_nan() {
                        point.gflops
                    } else {
                        cell.max(point.gflops)
                    };
                }
            }
        }

        Self {
            bench_name: group.bench_name.clone(),
            sizes,
            implementations,
            gflops,
        }
    }

    pub fn get(&self, dims: Dims, implementation: &str) -> Option<f64> {
        let row = self.sizes.binary_search(&dims).ok()?;
        let col = self
            .implementations
            .iter()
            .position(|name| name == implementation)?;
        let value = self.gflops[[row, col]];
        (!value.is_nan()).then_some(value)
    }

    /// Fastest implementation at each size, `None` where no cell is filled.
    pub fn best_per_size(&self) -> Vec<Option<&str>> {
        self.gflops
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_nan())
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(col, _)| self.implementations[col].as_str())
            })
            .collect()
    }
}

impl fmt::Display for ComparisonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .implementations
            .iter()
            .map(|name| name.len().max(10))
            .collect();

        writeln!(f, "{} (GFLOPS)", self.bench_name)?;
        write!(f, "{:>8}  {:>8}  {:>8}", "m", "n", "k")?;
        for (name, width) in self.implementations.iter().zip(&widths) {
            write!(f, "  {:>width$}", name, width = width)?;
        }
        writeln!(f, "  best")?;

        for ((size, row), best) in self
            .sizes
            .iter()
            .zip(self.gflops.rows())
            .zip(self.best_per_size())
        {
            write!(f, "{:>8}  {:>8}  {:>8}", size.m, size.n, size.k)?;
            for (value, width) in row.iter().zip(&widths) {
                if value.is_nan() {
                    write!(f, "  {:>width$}", "-", width = width)?;
                } else {
                    write!(f, "  {:>width$.2}", value, width = width)?;
                }
            }
            writeln!(f, "  {}", best.unwrap_or("-"))?;
        }
        Ok(())
    }
}

/// Renders one benchmark group, e.g. to an image file.
pub trait ChartSink {
    fn render(&mut self, group: &BenchGroup) -> Result<()>;
}

/// Hands every benchmark group of a table to a [`ChartSink`].
pub struct ReportEmitter<S: ChartSink> {
    sink: S,
}

impl<S: ChartSink> ReportEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Groups `table` and renders each group. Returns the groups rendered.
    pub fn emit(&mut self, table: &AggregatedTable) -> Result<Vec<BenchGroup>> {
        let groups = group_by_bench(table);
        for group in &groups {
            info!(
                bench = %group.bench_name,
                series = group.series.len(),
                "rendering comparison chart"
            );
            self.sink.render(group)?;
        }
        Ok(groups)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(size: u64, gflops: f64) -> SeriesPoint {
        SeriesPoint {
            m: size,
            n: size,
            k: size,
            gflops,
        }
    }

    fn dims(m: u64, n: u64, k: u64) -> Dims {
        Dims { m, n, k }
    }

    fn group() -> BenchGroup {
        BenchGroup {
            bench_name: "sgemm".to_string(),
            series: vec![
                Series {
                    implementation: "glare".to_string(),
                    points: vec![
                        cube(256, 100.0),
                        cube(512, 150.0),
                        cube(512, 160.0),
                    ],
                },
                Series {
                    implementation: "mkl".to_string(),
                    points: vec![
                        cube(512, 155.0),
                        cube(1024, 170.0),
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_comparison_table_pivot() {
        let table = group().comparison_table();
        assert_eq!(
            table.sizes,
            vec![dims(256, 256, 256), dims(512, 512, 512), dims(1024, 1024, 1024)]
        );
        assert_eq!(table.gflops.dim(), (3, 2));
        assert_eq!(table.get(dims(512, 512, 512), "glare"), Some(160.0));
        assert_eq!(table.get(dims(256, 256, 256), "mkl"), None);
        assert_eq!(table.get(dims(4096, 4096, 4096), "mkl"), None);
        assert_eq!(table.best_per_size(), vec![Some("glare"), Some("glare"), Some("mkl")]);
    }

    #[test]
    fn test_comparison_table_display() {
        let text = group().comparison_table().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sgemm (GFLOPS)");
        assert!(lines[1].contains("glare") && lines[1].contains("mkl"));
        assert_eq!(lines[1].split_whitespace().take(3).collect::<Vec<_>>(), ["m", "n", "k"]);
        assert!(lines[2].contains("100.00"));
        assert!(lines[2].contains(" -"));
        assert!(lines[4].trim_end().ends_with("mkl"));
    }

    #[test]
    fn test_triples() {
        let group = group();
        let triples: Vec<(u64, f64, &str)> = group.triples().collect();
        assert_eq!(triples.len(), 5);
        assert_eq!(triples[0], (256, 100.0, "glare"));
        assert_eq!(triples[4], (1024, 170.0, "mkl"));
    }

    #[test]
    fn test_same_m_different_n_k_stay_apart() {
        let group = BenchGroup {
            bench_name: "sgemm_small_m".to_string(),
            series: vec![Series {
                implementation: "glare".to_string(),
                points: vec![
                    SeriesPoint { m: 32, n: 512, k: 512, gflops: 16.0 },
                    SeriesPoint { m: 32, n: 4096, k: 4096, gflops: 2.0 },
                ],
            }],
        };
        let table = group.comparison_table();
        assert_eq!(table.sizes, vec![dims(32, 512, 512), dims(32, 4096, 4096)]);
        assert_eq!(table.get(dims(32, 512, 512), "glare"), Some(16.0));
        assert_eq!(table.get(dims(32, 4096, 4096), "glare"), Some(2.0));

        let text = table.to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("16.00") && text.contains("2.00"));
    }
}
