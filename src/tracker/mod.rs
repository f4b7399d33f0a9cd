//! Question tracker
//!
//! Manual bookkeeping on top of the persisted state: logged events,
//! forecast changes, pre-committed triggers, the running count for
//! threshold questions and countdowns to key dates.


use crate::config::{QuestionConfig, TriggerConfig};
use crate::error::{ForecastError, Result};
use crate::state::{QuestionState, QuestionStatus};
use crate::types::{ForecastEntry, TrackedEvent};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

/// Share of the pro-rata pace a count must reach to be ON_TRACK
const PACE_TOLERANCE: f64 = 0.8;
const CRITICAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    OnTrack,
    Behind,
    ResolvedYes,
}

/// Where a threshold question stands against its counting window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdProgress {
    pub cumulative: u64,
    pub threshold: u64,
    pub progress_pct: f64,
    pub days_elapsed: i64,
    pub days_remaining: i64,
    pub total_days: i64,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyDateStatus {
    pub name: String,
    pub date: NaiveDate,
    pub days_remaining: i64,
    pub critical: bool,
    pub passed: bool,
}

/// Everything `status` prints
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub question: String,
    pub forecast: f64,
    pub status: QuestionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ThresholdProgress>,
    pub key_dates: Vec<KeyDateStatus>,
    pub recent_events: Vec<TrackedEvent>,
    pub recent_forecasts: Vec<ForecastEntry>,
}

pub struct Tracker {
    question: QuestionConfig,
    state: QuestionState,
}

impl Tracker {
    pub fn new(question: QuestionConfig, state: QuestionState) -> Self {
        Self { question, state }
    }

    pub fn question(&self) -> &QuestionConfig {
        &self.question
    }

    pub fn state(&self) -> &QuestionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut QuestionState {
        &mut self.state
    }

    pub fn into_state(self) -> QuestionState {
        self.state
    }

    /// Current forecast, falling back to the configured initial value
    pub fn forecast(&self) -> f64 {
        self.state.current_forecast(self.question.forecast)
    }

    pub fn add_event(&mut self, event_type: &str, description: &str, source: &str) -> &TrackedEvent {
        info!(event_type, "Logged event: {}", description);
        self.state.events.push(TrackedEvent {
            date: Utc::now(),
            event_type: event_type.to_string(),
            description: description.to_string(),
            source: source.to_string(),
        });
        let last = self.state.events.len() - 1;
        &self.state.events[last]
    }

    /// Record a new forecast and return the previous one
    pub fn update_forecast(&mut self, value: f64, reason: &str) -> Result<f64> {
        if !(0.0..=1.0).contains(&value) || value.is_nan() {
            return Err(ForecastError::InvalidForecast(value));
        }
        let previous = self.forecast();
        self.state.forecast = Some(value);
        self.push_history(value, reason);
        info!(previous, new = value, "Forecast updated");
        Ok(previous)
    }

    /// Append a history entry at the current forecast without changing it
    pub fn note_forecast(&mut self, reason: &str) {
        let current = self.forecast();
        self.push_history(current, reason);
    }

    fn push_history(&mut self, forecast: f64, reason: &str) {
        let cumulative = self.question.threshold.map(|_| self.state.cumulative_count);
        self.state.forecast_history.push(ForecastEntry {
            date: Utc::now(),
            forecast,
            reason: reason.to_string(),
            cumulative,
        });
    }

    /// Apply a pre-committed trigger; returns (previous forecast, trigger)
    pub fn apply_trigger(&mut self, name: &str) -> Result<(f64, TriggerConfig)> {
        let trigger = self
            .question
            .triggers
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| ForecastError::UnknownTrigger(name.to_string()))?;

        let previous = self.update_forecast(trigger.new_forecast, &format!("Trigger: {}", trigger.condition))?;
        self.add_event("trigger", &trigger.condition, &trigger.name);
        Ok((previous, trigger))
    }

    pub fn set_count(&mut self, count: u64) {
        self.state.cumulative_count = count;
        self.check_resolution();
    }

    pub fn add_count(&mut self, delta: u64) -> u64 {
        self.state.cumulative_count = self.state.cumulative_count.saturating_add(delta);
        self.check_resolution();
        self.state.cumulative_count
    }

    fn check_resolution(&mut self) {
        if let Some(threshold) = self.question.threshold {
            if self.state.cumulative_count >= threshold && self.state.status == QuestionStatus::Active {
                info!(threshold, "Threshold reached");
                self.state.status = QuestionStatus::ResolvedYes;
            }
        }
    }

    /// None unless the question has a threshold and a counting window
    pub fn progress(&self, today: NaiveDate) -> Option<ThresholdProgress> {
        let threshold = self.question.threshold?;
        let start = self.question.start_date?;
        let end = self.question.end_date?;

        let total_days = (end - start).num_days().max(1);
        let days_elapsed = (today - start).num_days().clamp(0, total_days);
        let days_remaining = (end - today).num_days().max(0);
        let cumulative = self.state.cumulative_count;

        let progress_pct = if threshold > 0 {
            (cumulative as f64 / threshold as f64 * 1000.0).round() / 10.0
        } else {
            100.0
        };

        let expected = days_elapsed as f64 / total_days as f64 * threshold as f64 * PACE_TOLERANCE;
        let status = if cumulative >= threshold {
            ProgressStatus::ResolvedYes
        } else if cumulative as f64 >= expected {
            ProgressStatus::OnTrack
        } else {
            ProgressStatus::Behind
        };

        Some(ThresholdProgress {
            cumulative,
            threshold,
            progress_pct,
            days_elapsed,
            days_remaining,
            total_days,
            status,
        })
    }

    /// Countdown for each configured key date, soonest first
    pub fn key_dates(&self, today: NaiveDate) -> Vec<KeyDateStatus> {
        let mut dates: Vec<KeyDateStatus> = self
            .question
            .key_dates
            .iter()
            .map(|(name, date)| {
                let days_remaining = (*date - today).num_days();
                KeyDateStatus {
                    name: name.clone(),
                    date: *date,
                    days_remaining,
                    critical: (0..=CRITICAL_DAYS).contains(&days_remaining),
                    passed: days_remaining < 0,
                }
            })
            .collect();
        dates.sort_by_key(|d| d.date);
        dates
    }

    pub fn summary(&self, today: NaiveDate, recent: usize) -> StatusSummary {
        let tail = |len: usize| len.saturating_sub(recent);
        StatusSummary {
            question: self.question.title.clone(),
            forecast: self.forecast(),
            status: self.state.status,
            progress: self.progress(today),
            key_dates: self.key_dates(today),
            recent_events: self.state.events[tail(self.state.events.len())..].to_vec(),
            recent_forecasts: self.state.forecast_history[tail(self.state.forecast_history.len())..].to_vec(),
        }
    }
}
