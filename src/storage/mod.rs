//! Run journal
//!
//! Optional SQLite log of monitoring runs, raised alerts, forecast changes
//! and simulation summaries, for looking back across many runs.


use crate::error::Result;
use crate::monitor::RunReport;
use crate::simulation::SimulationReport;
use crate::types::{Alert, ForecastEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

pub struct Journal {
    pool: SqlitePool,
}

/// One row of the `runs` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub id: String,
    pub question_id: String,
    pub timestamp: DateTime<Utc>,
    pub items_checked: i64,
    pub new_items: i64,
    pub relevant_items: i64,
    pub alerts: i64,
    pub cumulative_count: i64,
    pub forecast: f64,
    pub method: String,
}

impl Journal {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let journal = Self { pool };
        journal.run_migrations().await?;

        Ok(journal)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                question_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                items_checked INTEGER NOT NULL,
                new_items INTEGER NOT NULL,
                relevant_items INTEGER NOT NULL,
                alerts INTEGER NOT NULL,
                cumulative_count INTEGER NOT NULL,
                forecast REAL NOT NULL,
                method TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forecasts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                forecast REAL NOT NULL,
                reason TEXT NOT NULL,
                cumulative INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS simulations (
                id TEXT PRIMARY KEY,
                question_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                target TEXT NOT NULL,
                samples INTEGER NOT NULL,
                seed INTEGER NOT NULL,
                p50 REAL,
                mean REAL,
                report TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_forecasts_question ON forecasts(question_id, timestamp)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_question ON runs(question_id, timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Save a monitoring run, returning its id
    pub async fn record_run(&self, report: &RunReport) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO runs (id, question_id, timestamp, items_checked, new_items, relevant_items, alerts, cumulative_count, forecast, method)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&report.question_id)
        .bind(report.timestamp.to_rfc3339())
        .bind(report.items_checked as i64)
        .bind(report.new_items as i64)
        .bind(report.relevant.len() as i64)
        .bind(report.alerts.len() as i64)
        .bind(report.cumulative_count as i64)
        .bind(report.forecast)
        .bind(&report.method)
        .execute(&self.pool)
        .await?;

        tracing::debug!(run_id = %id, "Recorded run");
        Ok(id)
    }

    pub async fn record_alert(&self, run_id: &str, alert: &Alert) -> Result<()> {
        sqlx::query("INSERT INTO alerts (run_id, alert_type, payload) VALUES (?, ?, ?)")
            .bind(run_id)
            .bind(&alert.alert_type)
            .bind(serde_json::to_string(alert)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_forecast(&self, question_id: &str, entry: &ForecastEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO forecasts (question_id, timestamp, forecast, reason, cumulative) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(question_id)
        .bind(entry.date.to_rfc3339())
        .bind(entry.forecast)
        .bind(&entry.reason)
        .bind(entry.cumulative.map(|c| c as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_simulation(&self, question_id: &str, report: &SimulationReport) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let (p50, mean) = match &report.mixture {
            Some(m) => (Some(m.forecast_percentiles.p50), Some(m.forecast_mean)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO simulations (id, question_id, timestamp, target, samples, seed, p50, mean, report)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(question_id)
        .bind(report.as_of_utc.to_rfc3339())
        .bind(&report.target)
        .bind(report.samples as i64)
        .bind(report.seed as i64)
        .bind(p50)
        .bind(mean)
        .bind(serde_json::to_string(report)?)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Most recent runs for a question first
    pub async fn recent_runs(&self, question_id: &str, limit: i64) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, question_id, timestamp, items_checked, new_items, relevant_items, alerts, cumulative_count, forecast, method
            FROM runs
            WHERE question_id = ?
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(question_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    /// Forecast changes for a question, oldest first
    pub async fn forecast_history(&self, question_id: &str) -> Result<Vec<ForecastEntry>> {
        let rows = sqlx::query_as::<_, ForecastRow>(
            r#"
            SELECT timestamp, forecast, reason, cumulative
            FROM forecasts
            WHERE question_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(|r| r.try_into().ok()).collect())
    }

    pub async fn alerts_for_run(&self, run_id: &str) -> Result<Vec<Alert>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT payload FROM alerts WHERE run_id = ? ORDER BY id ASC")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(payload,)| serde_json::from_str(&payload).ok())
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: String,
    question_id: String,
    timestamp: String,
    items_checked: i64,
    new_items: i64,
    relevant_items: i64,
    alerts: i64,
    cumulative_count: i64,
    forecast: f64,
    method: String,
}

impl TryFrom<RunRow> for RunSummary {
    type Error = anyhow::Error;

    fn try_from(row: RunRow) -> std::result::Result<Self, Self::Error> {
        Ok(RunSummary {
            id: row.id,
            question_id: row.question_id,
            timestamp: row.timestamp.parse()?,
            items_checked: row.items_checked,
            new_items: row.new_items,
            relevant_items: row.relevant_items,
            alerts: row.alerts,
            cumulative_count: row.cumulative_count,
            forecast: row.forecast,
            method: row.method,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ForecastRow {
    timestamp: String,
    forecast: f64,
    reason: String,
    cumulative: Option<i64>,
}

impl TryFrom<ForecastRow> for ForecastEntry {
    type Error = anyhow::Error;

    fn try_from(row: ForecastRow) -> std::result::Result<Self, Self::Error> {
        Ok(ForecastEntry {
            date: row.timestamp.parse()?,
            forecast: row.forecast,
            reason: row.reason,
            cumulative: row.cumulative.map(u64::try_from).transpose()?,
        })
    }
}
