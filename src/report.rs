// src/report.rs
use anyhow::{Context, Result, bail};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Metrics pulled from one ApacheBench output file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BenchMetrics {
    pub requests_per_second: f64,
    pub time_per_request_mean: f64,
    pub time_per_request_concurrent: f64,
    pub failed_requests: u64,
    pub total_requests: u64,
    pub concurrency_level: u64,
    /// "p50" -> ms
    pub percentiles: BTreeMap<String, f64>,
}

static RPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Requests per second:\s+([0-9.]+)\s+\[#/sec\]").unwrap());
static TPR_MEAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Time per request:\s+([0-9.]+)\s+\[ms\]\s+\(mean\)").unwrap());
static TPR_CONCURRENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Time per request:\s+([0-9.]+)\s+\[ms\]\s+\(mean, across all concurrent requests\)")
        .unwrap()
});
static FAILED: Lazy<Regex> = Lazy::new(|| Regex::new(r"Failed requests:\s+([0-9]+)").unwrap());
static COMPLETE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Complete requests:\s+([0-9]+)").unwrap());
static CONCURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Concurrency Level:\s+([0-9]+)").unwrap());
static PERCENTILE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Percentage of the requests served within a certain time \(ms\)").unwrap()
});

fn capture<T: std::str::FromStr + Default>(re: &Regex, text: &str) -> T {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_default()
}

/// Parse ab output. Fields that are absent come back as zero.
pub fn parse_ab(text: &str) -> BenchMetrics {
    BenchMetrics {
        requests_per_second: capture(&RPS, text),
        time_per_request_mean: capture(&TPR_MEAN, text),
        time_per_request_concurrent: capture(&TPR_CONCURRENT, text),
        failed_requests: capture(&FAILED, text),
        total_requests: capture(&COMPLETE, text),
        concurrency_level: capture(&CONCURRENCY, text),
        percentiles: parse_percentiles(text),
    }
}

fn parse_percentiles(text: &str) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    let Some(header) = PERCENTILE_HEADER.find(text) else {
        return out;
    };
    // the table runs until the first blank line
    for line in text[header.end()..]
        .lines()
        .skip_while(|l| l.trim().is_empty())
        .take_while(|l| !l.trim().is_empty())
    {
        let mut parts = line.split_whitespace();
        let (Some(pct), Some(ms)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Some(pct) = pct.strip_suffix('%') else {
            continue;
        };
        if let Ok(ms) = ms.parse::<f64>() {
            out.insert(format!("p{pct}"), ms);
        }
    }
    out
}

/// All parsed results in a directory, keyed by test name.
pub struct Analyzer {
    dir: PathBuf,
    tests: BTreeMap<String, BenchMetrics>,
}

impl Analyzer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tests: BTreeMap::new(),
        }
    }

    /// Load every `<name>_results.txt`. Unreadable files are logged and skipped.
    pub fn load(&mut self) -> Result<usize> {
        if !self.dir.is_dir() {
            bail!("results directory {} not found", self.dir.display());
        }
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix("_results.txt"))
                .map(str::to_string)
            else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(text) => {
                    info!(target = "report", test = %name, "loaded results");
                    self.tests.insert(name, parse_ab(&text));
                }
                Err(e) => warn!(target = "report", path = %path.display(), error = %e, "skipping"),
            }
        }
        Ok(self.tests.len())
    }

    fn sorted_by_rps(&self) -> Vec<(&String, &BenchMetrics)> {
        let mut sorted: Vec<_> = self.tests.iter().collect();
        sorted.sort_by(|a, b| b.1.requests_per_second.total_cmp(&a.1.requests_per_second));
        sorted
    }

    fn average_rps(&self, keyword: &str) -> Option<f64> {
        let rps: Vec<f64> = self
            .tests
            .iter()
            .filter(|(name, _)| name.contains(keyword))
            .map(|(_, m)| m.requests_per_second)
            .collect();
        if rps.is_empty() {
            None
        } else {
            Some(rps.iter().sum::<f64>() / rps.len() as f64)
        }
    }

    pub fn render(&self) -> String {
        let mut r = String::new();
        let rule = "=".repeat(80);
        let thin = "-".repeat(80);

        let _ = writeln!(r, "{rule}");
        let _ = writeln!(r, "THREAD PERFORMANCE COMPARISON REPORT");
        let _ = writeln!(r, "{rule}");
        let _ = writeln!(r, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(r);

        let sorted = self.sorted_by_rps();
        if sorted.is_empty() {
            let _ = writeln!(r, "No test results loaded!");
            return r;
        }

        let _ = writeln!(r, "PERFORMANCE SUMMARY (sorted by Requests/sec)");
        let _ = writeln!(r, "{thin}");
        let _ = writeln!(
            r,
            "{:<25} {:<10} {:<10} {:<10} {:<8}",
            "Test Name", "RPS", "Mean(ms)", "95th%", "Failed"
        );
        let _ = writeln!(r, "{thin}");
        for (name, m) in &sorted {
            let p95 = m
                .percentiles
                .get("p95")
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "N/A".to_string());
            let _ = writeln!(
                r,
                "{:<25} {:<10.1} {:<10.1} {:<10} {:<8}",
                name, m.requests_per_second, m.time_per_request_mean, p95, m.failed_requests
            );
        }
        let _ = writeln!(r);

        let _ = writeln!(r, "DETAILED ANALYSIS");
        let _ = writeln!(r, "{}", "-".repeat(50));
        let (best_name, best) = sorted[0];
        let (worst_name, worst) = sorted[sorted.len() - 1];
        let _ = writeln!(
            r,
            "Best throughput: {best_name} ({:.1} RPS)",
            best.requests_per_second
        );
        let _ = writeln!(
            r,
            "Worst throughput: {worst_name} ({:.1} RPS)",
            worst.requests_per_second
        );
        if let Some(pct) = improvement(best.requests_per_second, worst.requests_per_second) {
            let _ = writeln!(r, "Performance improvement: {pct:.1}%");
        }
        let _ = writeln!(r);

        for (keyword, title) in [("threads", "THREADS SERVICE:"), ("tasks", "TASKS SERVICE:")] {
            let group: Vec<_> = self
                .tests
                .iter()
                .filter(|(name, _)| name.contains(keyword))
                .collect();
            if group.is_empty() {
                continue;
            }
            let _ = writeln!(r, "{title}");
            for (name, m) in group {
                let _ = writeln!(r, "  {name}: {:.1} RPS", m.requests_per_second);
            }
            let _ = writeln!(r);
        }

        let _ = writeln!(r, "THREADING MODEL INSIGHTS:");
        if let Some(platform) = self.average_rps("platform") {
            for (keyword, label) in [("virtual", "Virtual threads"), ("coroutine", "Coroutines")] {
                if let Some(pct) = self
                    .average_rps(keyword)
                    .and_then(|avg| improvement(avg, platform))
                {
                    let _ = writeln!(r, "  {label} vs Platform threads: {pct:+.1}% improvement");
                }
            }
        }
        r
    }

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut w = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        w.write_record([
            "test_name",
            "requests_per_second",
            "time_per_request_mean",
            "time_per_request_concurrent",
            "failed_requests",
            "total_requests",
            "concurrency_level",
            "p50",
            "p90",
            "p95",
            "p99",
        ])?;
        for (name, m) in &self.tests {
            let mut row = vec![
                name.clone(),
                m.requests_per_second.to_string(),
                m.time_per_request_mean.to_string(),
                m.time_per_request_concurrent.to_string(),
                m.failed_requests.to_string(),
                m.total_requests.to_string(),
                m.concurrency_level.to_string(),
            ];
            for p in ["p50", "p90", "p95", "p99"] {
                row.push(m.percentiles.get(p).map(|v| v.to_string()).unwrap_or_default());
            }
            w.write_record(&row)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.tests)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Print the report, save it with a timestamped name, and export CSV + JSON.
    pub fn run(&mut self, export: bool) -> Result<()> {
        if self.load()? == 0 {
            bail!(
                "no test results found in {}; run the load tests first",
                self.dir.display()
            );
        }

        let report = self.render();
        println!("{report}");

        let report_path = self.dir.join(format!(
            "comparison_report_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        fs::write(&report_path, &report)
            .with_context(|| format!("writing {}", report_path.display()))?;
        info!(target = "report", path = %report_path.display(), "report saved");

        if export {
            let csv_path = self.dir.join("performance_comparison.csv");
            self.export_csv(&csv_path)?;
            let json_path = self.dir.join("performance_results.json");
            self.export_json(&json_path)?;
            info!(
                target = "report",
                csv = %csv_path.display(),
                json = %json_path.display(),
                "results exported"
            );
        }
        Ok(())
    }
}

/// Percent by which `a` beats `b`; None when `b` is zero.
fn improvement(a: f64, b: f64) -> Option<f64> {
    if b == 0.0 {
        None
    } else {
        Some((a / b - 1.0) * 100.0)
    }
}
