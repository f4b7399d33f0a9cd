//! Markdown monitoring report

use super::RunReport;
use crate::error::Result;
use crate::tracker::ProgressStatus;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub fn report_path(dir: impl AsRef<Path>, report: &RunReport) -> PathBuf {
    dir.as_ref().join(format!(
        "MONITORING_REPORT_{}.md",
        report.timestamp.format("%Y-%m-%d")
    ))
}

pub fn render_markdown(report: &RunReport, watched: &[String]) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Monitoring Report ({})\n", report.question);
    let _ = writeln!(md, "Date (UTC): {}\n", report.timestamp.format("%Y-%m-%d %H:%M"));

    let _ = writeln!(md, "## Forecast");
    let _ = writeln!(md, "- Current: {:.1}%", report.forecast * 100.0);
    if let Some(p) = &report.progress {
        let status = match p.status {
            ProgressStatus::OnTrack => "ON_TRACK",
            ProgressStatus::Behind => "BEHIND",
            ProgressStatus::ResolvedYes => "RESOLVED_YES",
        };
        let _ = writeln!(
            md,
            "- Count: {} / {} ({:.1}%), {} days remaining, {}",
            p.cumulative, p.threshold, p.progress_pct, p.days_remaining, status
        );
    }
    if let Some(rec) = &report.recommendation {
        let _ = writeln!(
            md,
            "- Suggested: {} {}",
            rec.direction.as_deref().unwrap_or("UNCHANGED"),
            rec.reasoning.as_deref().unwrap_or("")
        );
    }
    md.push('\n');

    if !watched.is_empty() {
        let _ = writeln!(md, "## Values");
        for name in watched {
            match report.values.get(name) {
                Some(v) => {
                    let _ = writeln!(md, "- {}: {}", name, v);
                }
                None => {
                    let _ = writeln!(md, "- {}: Unavailable", name);
                }
            }
        }
        md.push('\n');
    }

    if !report.markets.is_empty() {
        let _ = writeln!(md, "## Markets");
        for m in &report.markets {
            let price = match m.yes_price {
                Some(p) => format!("{:.1}%", p * 100.0),
                None => "n/a".to_string(),
            };
            let _ = write!(md, "- [{}] {}: {}", m.scan, m.title, price);
            if let Some(volume) = m.volume_24h {
                let _ = write!(md, ", 24h volume {:.0}", volume);
            }
            if let Some(liquidity) = m.liquidity {
                let _ = write!(md, ", liquidity {:.0}", liquidity);
            }
            let _ = writeln!(md, " ({})", m.url);
        }
        md.push('\n');
    }

    let _ = writeln!(
        md,
        "## News\n- Checked: {}, new: {}, relevant: {} ({})",
        report.items_checked,
        report.new_items,
        report.relevant.len(),
        report.method
    );
    for c in &report.relevant {
        let _ = writeln!(
            md,
            "- [{}] {} ({})",
            c.analysis.relevance, c.item.title, c.item.url
        );
    }
    md.push('\n');

    let _ = writeln!(md, "## Alerts");
    if report.alerts.is_empty() {
        let _ = writeln!(md, "- None");
    } else {
        for alert in &report.alerts {
            let json = serde_json::to_string(alert).unwrap_or_default();
            let _ = writeln!(md, "- {}: {}", alert.alert_type, json);
        }
    }

    md
}

/// Write MONITORING_REPORT_<date>.md into `dir`
pub async fn write_report(dir: impl AsRef<Path>, report: &RunReport, watched: &[String]) -> Result<PathBuf> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    let path = report_path(dir, report);
    tokio::fs::write(&path, render_markdown(report, watched)).await?;
    Ok(path)
}
