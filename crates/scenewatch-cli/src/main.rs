//! scenewatch - visual change monitoring CLI
//!
//! Compares monitoring snapshots through the scenewatch analysis pipeline
//! and prints the resulting report.
//!
//! ## Commands
//!
//! - `compare`: Analyze one pair of snapshots
//! - `batch`: Analyze every pair in a JSON manifest
//! - `check`: Probe the inference service and configured model

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use scenewatch_core::{
    init_telemetry, AnalysisOptions, AnalysisReport, ImagePair, OllamaTransport, ScenePipeline,
    DEFAULT_ALERT_THRESHOLD,
};

#[derive(Parser)]
#[command(name = "scenewatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Visual change monitoring for camera snapshots", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON: reports on stdout, log lines on stderr
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two snapshots and print the analysis report
    Compare {
        /// Baseline snapshot
        first: PathBuf,

        /// Current snapshot
        second: PathBuf,

        /// Fused-similarity threshold below which the pair is an error
        #[arg(short, long, default_value_t = DEFAULT_ALERT_THRESHOLD)]
        threshold: f64,
    },

    /// Analyze every pair in a JSON manifest
    Batch {
        /// Manifest file: a JSON array of {"id"?, "first", "second"} entries
        manifest: PathBuf,

        /// Fused-similarity threshold below which a pair is an error
        #[arg(short, long, default_value_t = DEFAULT_ALERT_THRESHOLD)]
        threshold: f64,
    },

    /// Probe the inference service and verify the configured model is loaded
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_telemetry(cli.json, level);

    match cli.command {
        Commands::Compare {
            first,
            second,
            threshold,
        } => cmd_compare(&first, &second, threshold, cli.json).await,
        Commands::Batch {
            manifest,
            threshold,
        } => cmd_batch(&manifest, threshold, cli.json).await,
        Commands::Check => cmd_check().await,
    }
}

fn build_pipeline(threshold: f64) -> Result<ScenePipeline> {
    let transport =
        OllamaTransport::from_env().context("failed to build inference transport")?;
    let options = AnalysisOptions::default().with_threshold(threshold);
    Ok(ScenePipeline::new(Arc::new(transport), options))
}

async fn cmd_compare(first: &Path, second: &Path, threshold: f64, json: bool) -> Result<()> {
    let pipeline = build_pipeline(threshold)?;
    let report = pipeline
        .analyze_images(first, second)
        .await
        .with_context(|| format!("analysis failed for {:?} vs {:?}", first, second))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

async fn cmd_batch(manifest: &Path, threshold: f64, json: bool) -> Result<()> {
    let pairs = read_manifest(manifest)?;
    if pairs.is_empty() {
        anyhow::bail!("manifest {:?} contains no pairs", manifest);
    }

    let pipeline = build_pipeline(threshold)?;
    let reports = pipeline.analyze_batch(&pairs).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for item in &reports {
            match (&item.result, &item.error) {
                (Some(report), _) => println!(
                    "  ✓ {}: {} ({:.1}%)",
                    item.id,
                    report.alert_level,
                    report.similarity_score * 100.0
                ),
                (None, Some(message)) => println!("  ✗ {}: {}", item.id, message),
                (None, None) => println!("  ✗ {}: unknown failure", item.id),
            }
        }
        let succeeded = reports.iter().filter(|r| r.succeeded()).count();
        println!();
        println!("{}/{} pairs analyzed", succeeded, reports.len());
    }

    Ok(())
}

async fn cmd_check() -> Result<()> {
    let transport =
        OllamaTransport::from_env().context("failed to build inference transport")?;
    let base_url = transport.config().base_url.clone();
    let model = transport.config().model.clone();
    let pipeline = ScenePipeline::new(Arc::new(transport), AnalysisOptions::default());

    println!("Service: {}", base_url);
    println!("Model:   {}", model);

    match pipeline.check_connection().await {
        Ok(true) => {
            println!("Status:  ✓ model available");
            Ok(())
        }
        Ok(false) => anyhow::bail!("service reachable but model {:?} is not loaded", model),
        Err(e) => Err(e).context("inference service unreachable"),
    }
}

fn read_manifest(path: &Path) -> Result<Vec<ImagePair>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {:?}", path))?;
    let pairs: Vec<ImagePair> = serde_json::from_str(&raw)
        .with_context(|| format!("manifest {:?} is not a JSON array of image pairs", path))?;
    Ok(pairs)
}

fn print_report(report: &AnalysisReport) {
    println!("Similarity: {:.2}%", report.similarity_score * 100.0);
    println!("Alert:      {}", report.alert_level);
    println!("Summary:    {}", report.summary);
    println!("Elapsed:    {:.2}s", report.processing_time);

    if !report.differences.is_empty() {
        println!();
        println!("Differences:");
        for diff in &report.differences {
            println!(
                "  - [{}] {} (confidence {:.2})",
                diff.kind, diff.description, diff.confidence
            );
        }
    }

    if let Some(detail) = &report.alert_detail {
        println!();
        println!("Severity:   {} (risk {})", detail.severity, detail.risk_level);
        println!("Category:   {}", detail.category);
        println!("Impact:     {}", detail.impact);
        if let Some(eta) = &detail.estimated_resolution_time {
            println!("Resolution: {}", eta);
        }
        println!("Recommended actions:");
        for step in &detail.recommendations {
            println!("  - {}", step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_manifest_parses_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "gate-cam", "first": "/imgs/a.png", "second": "/imgs/b.png"},
                {"first": "/imgs/c.png", "second": "/imgs/d.png"}
            ]"#,
        )
        .unwrap();

        let pairs = read_manifest(&path).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].id.as_deref(), Some("gate-cam"));
        assert!(pairs[1].id.is_none());
    }

    #[test]
    fn test_read_manifest_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{"first": "/a.png", "second": "/b.png"}"#).unwrap();

        assert!(read_manifest(&path).is_err());
    }

    #[test]
    fn test_cli_parses_compare_with_threshold() {
        let cli = Cli::parse_from([
            "scenewatch",
            "compare",
            "a.png",
            "b.png",
            "--threshold",
            "0.9",
        ]);
        match cli.command {
            Commands::Compare { threshold, .. } => assert_eq!(threshold, 0.9),
            _ => panic!("expected compare command"),
        }
    }

    #[test]
    fn test_cli_defaults_threshold() {
        let cli = Cli::parse_from(["scenewatch", "compare", "a.png", "b.png"]);
        match cli.command {
            Commands::Compare { threshold, .. } => assert_eq!(threshold, DEFAULT_ALERT_THRESHOLD),
            _ => panic!("expected compare command"),
        }
    }
}
