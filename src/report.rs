//! Read-side views over a [`State`]: per-project totals, daily buckets, the
//! rolling heatmap and the snapshot handed to renderers and the summarizer.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use serde::Serialize;

use crate::domain::{LogEntry, Project, ProjectStatus, State, Timestamp};

pub const DEFAULT_HEATMAP_DAYS: usize = 14;
pub const DEFAULT_CONTEXT_LOGS: usize = 20;
pub const UNKNOWN_PROJECT: &str = "Unbekannt";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectWithMinutes {
    #[serde(flatten)]
    pub project: Project,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapBucket {
    pub date: NaiveDate,
    pub label: &'static str,
    pub value: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub totals: Vec<ProjectWithMinutes>,
    pub active: Vec<ProjectWithMinutes>,
    pub queued: Vec<ProjectWithMinutes>,
    pub paused: Vec<ProjectWithMinutes>,
    pub done: Vec<ProjectWithMinutes>,
    pub last_log: Option<LogEntry>,
    pub total_minutes: f64,
    pub heatmap: Vec<HeatmapBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarRow {
    pub project_id: String,
    pub name: String,
    pub minutes: f64,
    /// Share of the longest bar, in `(0, 1]`.
    pub ratio: f64,
}

/// Everything the summarization collaborator gets to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryContext {
    pub stats: ContextStats,
    pub projects: Vec<ProjectContext>,
    pub recent_logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStats {
    pub total_minutes: f64,
    pub active: usize,
    pub paused: usize,
    pub queued: usize,
    pub done: usize,
    pub last_log: Option<LogEntry>,
    pub heatmap: Vec<HeatmapBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub goal: String,
    pub note: String,
    pub minutes: f64,
    pub updated_at: Timestamp,
    pub created_at: Timestamp,
}

/// Minutes per project id. Projects without logs have no entry.
pub fn build_project_totals(state: &State) -> HashMap<String, f64> {
    let mut totals = HashMap::new();
    for log in &state.logs {
        *totals.entry(log.project_id.clone()).or_insert(0.0) += log.minutes;
    }
    totals
}

pub fn project_minutes(logs: &[LogEntry], project_id: &str) -> f64 {
    logs.iter()
        .filter(|log| log.project_id == project_id)
        .map(|log| log.minutes)
        .sum()
}

/// Projects with their totals, grouped `active, paused, queued, done`. The sort
/// is stable so projects keep their list order within a group.
pub fn summarize_projects(state: &State) -> Vec<ProjectWithMinutes> {
    let totals = build_project_totals(state);
    let mut rows = state
        .projects
        .iter()
        .map(|project| ProjectWithMinutes {
            minutes: totals.get(&project.id).copied().unwrap_or(0.0),
            project: project.clone(),
        })
        .collect::<Vec<_>>();
    rows.sort_by_key(|row| row.project.status.rank());
    rows
}

/// Minutes per calendar day, using the offset each log was recorded with.
pub fn daily_minutes(logs: &[LogEntry]) -> BTreeMap<NaiveDate, f64> {
    let mut buckets = BTreeMap::new();
    for log in logs {
        *buckets.entry(log.created_at.date_naive()).or_insert(0.0) += log.minutes;
    }
    buckets
}

/// `days` buckets ending with `today`, oldest first.
pub fn heatmap_series(logs: &[LogEntry], days: usize, today: NaiveDate) -> Vec<HeatmapBucket> {
    let buckets = daily_minutes(logs);
    let mut series = (0..days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(offset as u64)))
        .map(|date| HeatmapBucket {
            date,
            label: weekday_label(date.weekday()),
            value: buckets.get(&date).copied().unwrap_or(0.0),
            intensity: 0.0,
        })
        .collect::<Vec<_>>();

    let max = series.iter().map(|bucket| bucket.value).fold(1.0, f64::max);
    for bucket in &mut series {
        bucket.intensity = (bucket.value / max).clamp(0.0, 1.0);
    }
    series
}

pub fn heatmap_series_today(logs: &[LogEntry], days: usize) -> Vec<HeatmapBucket> {
    heatmap_series(logs, days, Local::now().date_naive())
}

pub fn stats_snapshot(state: &State, today: NaiveDate, heatmap_days: usize) -> StatsSnapshot {
    let totals = summarize_projects(state);
    let with_status = |status: ProjectStatus| {
        totals
            .iter()
            .filter(|row| row.project.status == status)
            .cloned()
            .collect::<Vec<_>>()
    };

    StatsSnapshot {
        active: with_status(ProjectStatus::Active),
        queued: with_status(ProjectStatus::Queued),
        paused: with_status(ProjectStatus::Paused),
        done: with_status(ProjectStatus::Done),
        last_log: latest_log(&state.logs).cloned(),
        total_minutes: state.logs.iter().map(|log| log.minutes).sum(),
        heatmap: heatmap_series(&state.logs, heatmap_days, today),
        totals,
    }
}

/// Chronologically newest log. On equal timestamps the earlier list entry wins.
pub fn latest_log(logs: &[LogEntry]) -> Option<&LogEntry> {
    logs.iter().fold(None, |latest: Option<&LogEntry>, log| match latest {
        Some(current) if current.created_at >= log.created_at => Some(current),
        _ => Some(log),
    })
}

/// Bars sorted by minutes, longest first. Logs whose project is gone still get
/// a bar under a placeholder name.
pub fn bar_chart(state: &State) -> Vec<BarRow> {
    let totals = build_project_totals(state);

    let mut ids = state
        .projects
        .iter()
        .map(|project| project.id.as_str())
        .filter(|id| totals.contains_key(*id))
        .collect::<Vec<_>>();
    for log in &state.logs {
        if !ids.contains(&log.project_id.as_str()) {
            ids.push(log.project_id.as_str());
        }
    }

    let mut rows = ids
        .into_iter()
        .map(|id| BarRow {
            project_id: id.to_string(),
            name: state
                .project(id)
                .map(|project| project.name.clone())
                .unwrap_or_else(|| UNKNOWN_PROJECT.to_string()),
            minutes: totals.get(id).copied().unwrap_or(0.0),
            ratio: 0.0,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| right.minutes.total_cmp(&left.minutes));

    let max = rows.first().map(|row| row.minutes).unwrap_or(0.0);
    if max > 0.0 {
        for row in &mut rows {
            row.ratio = row.minutes / max;
        }
    }
    rows
}

pub fn summary_context(
    state: &State,
    today: NaiveDate,
    heatmap_days: usize,
    log_limit: usize,
) -> SummaryContext {
    let snapshot = stats_snapshot(state, today, heatmap_days);

    let projects = snapshot
        .totals
        .iter()
        .map(|row| ProjectContext {
            id: row.project.id.clone(),
            name: row.project.name.clone(),
            status: row.project.status,
            goal: row.project.goal.clone(),
            note: row.project.note.clone(),
            minutes: row.minutes,
            updated_at: row.project.updated_at,
            created_at: row.project.created_at,
        })
        .collect();

    SummaryContext {
        stats: ContextStats {
            total_minutes: snapshot.total_minutes,
            active: snapshot.active.len(),
            paused: snapshot.paused.len(),
            queued: snapshot.queued.len(),
            done: snapshot.done.len(),
            last_log: snapshot.last_log,
            heatmap: snapshot.heatmap,
        },
        projects,
        recent_logs: state.logs.iter().take(log_limit).cloned().collect(),
    }
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mo",
        Weekday::Tue => "Di",
        Weekday::Wed => "Mi",
        Weekday::Thu => "Do",
        Weekday::Fri => "Fr",
        Weekday::Sat => "Sa",
        Weekday::Sun => "So",
    }
}
