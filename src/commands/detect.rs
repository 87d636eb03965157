use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use cogwar::analytics::{run_query, BurstAnalysis, BurstInterval, SmoothingMethod};
use cogwar::config::Config;
use cogwar::dashboard::AnalysisParams;
use cogwar::export::{render_analysis, ExportFormat, ExportTarget};
use cogwar::storage::EventRepository;

use super::open_events;

/// Output format of the `detect` command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    Csv,
    Json,
}

/// Parameters of the `detect` command
#[derive(Debug, Clone, Default)]
pub struct DetectParams {
    /// Event file to analyse instead of the database
    pub input: Option<PathBuf>,
    pub analysis: AnalysisParams,
    pub format: OutputFormat,
    pub target: ExportTarget,
    /// Write here instead of stdout
    pub output: Option<PathBuf>,
}

/// Parameters of the `series` command
#[derive(Debug, Clone, Default)]
pub struct SeriesParams {
    pub input: Option<PathBuf>,
    pub analysis: AnalysisParams,
    pub smoothing: Option<SmoothingMethod>,
}

/// Validate parameters against the configuration and run the query
fn analyse(config: &Config, repo: &dyn EventRepository, params: &AnalysisParams) -> Result<BurstAnalysis> {
    let detector = config.analysis.detector()?;
    let bounds = repo.date_bounds()?;
    let query = params
        .to_query(
            config.analysis.default_granularity,
            config.analysis.sensitivity()?,
            bounds,
        )
        .context("Invalid analysis parameters")?;

    Ok(run_query(repo, &detector, &query)?)
}

/// Detect bursts and print or write them
pub fn detect(config: &Config, params: DetectParams) -> Result<()> {
    let repo = open_events(config, params.input.as_deref())?;
    let analysis = analyse(config, repo.as_ref(), &params.analysis)?;

    let rendered = match params.format {
        OutputFormat::Table => render_table(&analysis),
        OutputFormat::Csv => render_analysis(&analysis, ExportFormat::Csv, params.target)?,
        OutputFormat::Json => render_analysis(&analysis, ExportFormat::Json, params.target)?,
    };

    write_output(params.output.as_deref(), &rendered)
}

/// Print the bucket series with burst markers and optional smoothing
pub fn series(config: &Config, params: SeriesParams) -> Result<()> {
    if let Some(method) = &params.smoothing {
        method.validate()?;
    }

    let repo = open_events(config, params.input.as_deref())?;
    let analysis = analyse(config, repo.as_ref(), &params.analysis)?;
    let report = &analysis.overall;

    let smoothed = match &params.smoothing {
        Some(method) => Some(method.apply(&report.series.counts())?),
        None => None,
    };
    let widest = report.series.buckets.iter().map(|b| b.count).max().unwrap_or(0);

    println!(
        "Series ({}, {} buckets, {} events)",
        report.granularity,
        report.series.len(),
        report.series.bucketed_events()
    );
    println!("{:-<60}", "");

    for (i, bucket) in report.series.buckets.iter().enumerate() {
        let marker = if report.intervals.iter().any(|iv| iv.contains(bucket.start)) {
            '*'
        } else {
            ' '
        };
        let bar_len = if widest == 0 {
            0
        } else {
            (bucket.count * 40).div_ceil(widest) as usize
        };
        let smooth = smoothed
            .as_ref()
            .and_then(|s| s.get(i))
            .map(|v| format!("{v:>9.2}"))
            .unwrap_or_default();

        println!(
            "{marker} {}  {:>7}{smooth}  {}",
            bucket.start,
            bucket.count,
            "#".repeat(bar_len)
        );
    }

    Ok(())
}

fn render_table(analysis: &BurstAnalysis) -> String {
    let overall = &analysis.overall;
    let mut out = String::new();

    out.push_str(&format!(
        "Bursts ({}, sensitivity {}, baseline {}, {} events, {} buckets)\n",
        overall.granularity,
        overall.sensitivity,
        overall.baseline_method.as_str(),
        analysis.matched_events,
        overall.series.len()
    ));
    out.push_str(&format!("{:=<96}\n", ""));

    let mut ranked: Vec<&BurstInterval> = overall.ranked();
    if let Some(categories) = &analysis.categories {
        ranked.extend(categories.ranked());
    }

    if ranked.is_empty() {
        out.push_str("No bursts detected.\n");
        return out;
    }

    out.push_str(&format!(
        "{:<24} {:<10} {:<10} {:>7} {:>7} {:>9} {:>9} {:>7}\n",
        "Category", "Start", "End", "Buckets", "Peak", "Baseline", "Magnitude", "z"
    ));
    out.push_str(&format!("{:-<96}\n", ""));

    for interval in ranked {
        out.push_str(&format!(
            "{:<24} {:<10} {:<10} {:>7} {:>7} {:>9.2} {:>9.2} {:>7.2}\n",
            interval.category.as_deref().unwrap_or("(all)"),
            interval.start,
            interval.end,
            interval.duration_buckets,
            interval.peak_count,
            interval.baseline,
            interval.magnitude,
            interval.z_score
        ));
    }

    let summary = &overall.summary;
    out.push_str(&format!(
        "\nOverall: {} bursts, mean duration {:.1} buckets, mean magnitude {:.2}\n",
        summary.total_bursts, summary.average_duration, summary.average_magnitude
    ));
    if let Some(categories) = &analysis.categories {
        out.push_str(&format!(
            "Categories: {} analysed, {} bursts, {} uncategorized events\n",
            categories.len(),
            categories.total_bursts(),
            categories.uncategorized
        ));
    }

    out
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
