use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_ACTIVE_PROJECTS: usize = 3;

const ID_LEN: usize = 12;

/// Timestamps keep the offset they were recorded with, so a log's calendar day
/// is the day it was logged in, not the day in UTC.
pub type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Rejection of a transition into `active` once the focus set is full. This is
/// an expected outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Maximal {limit} aktive Projekte erlaubt.")]
pub struct CapacityError {
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Paused,
    Queued,
    Done,
}

impl ProjectStatus {
    /// Display order: the focus set first, finished work last.
    pub const ORDER: [ProjectStatus; 4] = [
        ProjectStatus::Active,
        ProjectStatus::Paused,
        ProjectStatus::Queued,
        ProjectStatus::Done,
    ];

    pub fn rank(self) -> usize {
        match self {
            Self::Active => 0,
            Self::Paused => 1,
            Self::Queued => 2,
            Self::Done => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Queued => "queued",
            Self::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Aktiv",
            Self::Paused => "Pausiert",
            Self::Queued => "Queue",
            Self::Done => "Fertig",
        }
    }
}

impl Display for ProjectStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ProjectStatus::ORDER
            .into_iter()
            .find(|status| status.as_str() == raw.trim())
            .ok_or_else(|| CoreError::Validation(format!("invalid status: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

impl FromStr for Theme {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(CoreError::Validation(format!("invalid theme: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    /// Remote record identity; the core never reads these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub note: String,
    pub status: ProjectStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub project_id: String,
    pub minutes: f64,
    #[serde(default)]
    pub note: String,
    pub created_at: Timestamp,
}

/// Root of all tracked data. Projects are kept newest-first; logs are kept
/// newest-first by `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub settings: Settings,
}

impl State {
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn count_active(&self) -> usize {
        self.projects
            .iter()
            .filter(|project| project.status == ProjectStatus::Active)
            .count()
    }

    fn project_mut(&mut self, id: &str) -> Result<&mut Project, CoreError> {
        self.projects
            .iter_mut()
            .find(|project| project.id == id)
            .ok_or_else(|| project_not_found(id))
    }
}

pub fn default_state() -> State {
    State::default()
}

/// Deep copy used as the first step of every mutation; nothing done to the
/// copy is visible through the original.
pub fn clone_state(state: &State) -> State {
    state.clone()
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub goal: String,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub note: Option<String>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone)]
pub struct NewLog {
    pub project_id: String,
    pub minutes: f64,
    pub note: String,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub enum StatusChange {
    Applied { state: State, project: Project },
    Rejected(CapacityError),
}

pub fn add_project(state: &State, input: NewProject) -> Result<(State, Project), CoreError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation(
            "project name must not be empty".to_string(),
        ));
    }

    let now = now_iso();
    let project = Project {
        id: generate_id(),
        name: name.to_string(),
        goal: input.goal.trim().to_string(),
        note: input.note.trim().to_string(),
        status: ProjectStatus::Queued,
        created_at: now,
        updated_at: now,
    };

    let mut next = clone_state(state);
    next.projects.insert(0, project.clone());
    Ok((next, project))
}

pub fn set_project_status(
    state: &State,
    project_id: &str,
    status: ProjectStatus,
) -> Result<StatusChange, CoreError> {
    let project = state
        .project(project_id)
        .ok_or_else(|| project_not_found(project_id))?;

    if let Err(rejection) = admit(state, project, status) {
        return Ok(StatusChange::Rejected(rejection));
    }

    let mut next = clone_state(state);
    let project = modify_project(&mut next, project_id, now_iso(), |project| {
        project.status = status;
    })?;
    Ok(StatusChange::Applied {
        state: next,
        project,
    })
}

/// Removes the project together with its logs. Unknown ids are ignored.
pub fn delete_project(state: &State, project_id: &str) -> State {
    let mut next = clone_state(state);
    next.projects.retain(|project| project.id != project_id);
    next.logs.retain(|log| log.project_id != project_id);
    next
}

pub fn update_project(
    state: &State,
    project_id: &str,
    patch: ProjectPatch,
) -> Result<(State, Project), CoreError> {
    let project = state
        .project(project_id)
        .ok_or_else(|| project_not_found(project_id))?;

    let name = match patch.name {
        Some(name) if name.trim().is_empty() => {
            return Err(CoreError::Validation(
                "project name must not be empty".to_string(),
            ));
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    if let Some(status) = patch.status {
        admit(state, project, status)?;
    }

    let mut next = clone_state(state);
    let project = modify_project(&mut next, project_id, now_iso(), |project| {
        if let Some(name) = name {
            project.name = name;
        }
        if let Some(goal) = patch.goal {
            project.goal = goal.trim().to_string();
        }
        if let Some(note) = patch.note {
            project.note = note.trim().to_string();
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
    })?;
    Ok((next, project))
}

pub fn add_log_entry(state: &State, input: NewLog) -> Result<(State, LogEntry), CoreError> {
    validate_minutes(input.minutes)?;
    if state.project(&input.project_id).is_none() {
        return Err(project_not_found(&input.project_id));
    }

    let log = LogEntry {
        id: generate_id(),
        project_id: input.project_id,
        minutes: input.minutes,
        note: input.note.trim().to_string(),
        created_at: input.created_at.unwrap_or_else(now_iso),
    };

    let mut next = clone_state(state);
    // The project reflects when the work happened, which matters for backdated logs.
    modify_project(&mut next, &log.project_id, log.created_at, |_| {})?;
    insert_log_sorted(&mut next.logs, log.clone());

    Ok((next, log))
}

/// Inserts ahead of the first log that is not newer, keeping the list
/// newest-first. Among equal timestamps the latest insert comes first.
pub fn insert_log_sorted(logs: &mut Vec<LogEntry>, log: LogEntry) {
    let position = logs
        .iter()
        .position(|existing| existing.created_at <= log.created_at)
        .unwrap_or(logs.len());
    logs.insert(position, log);
}

pub fn parse_minutes(raw: &str) -> Result<f64, CoreError> {
    let minutes = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| minutes_error())?;
    validate_minutes(minutes)?;
    Ok(minutes)
}

pub fn parse_timestamp(raw: &str) -> Result<Timestamp, CoreError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|err| CoreError::Validation(format!("invalid timestamp {raw}: {err}")))
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// Current local time. Day buckets use the stored offset, so this has to agree
/// with the local calendar the heatmap counts back from.
pub fn now_iso() -> Timestamp {
    Local::now().fixed_offset()
}

pub fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{minutes:.0} min")
    } else {
        format!("{minutes:.1} min")
    }
}

fn admit(state: &State, project: &Project, status: ProjectStatus) -> Result<(), CapacityError> {
    let entering_active =
        status == ProjectStatus::Active && project.status != ProjectStatus::Active;
    if entering_active && state.count_active() >= MAX_ACTIVE_PROJECTS {
        return Err(CapacityError {
            limit: MAX_ACTIVE_PROJECTS,
        });
    }
    Ok(())
}

fn modify_project(
    state: &mut State,
    project_id: &str,
    updated_at: Timestamp,
    apply: impl FnOnce(&mut Project),
) -> Result<Project, CoreError> {
    let project = state.project_mut(project_id)?;
    apply(project);
    project.updated_at = updated_at;
    Ok(project.clone())
}

fn validate_minutes(minutes: f64) -> Result<(), CoreError> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(minutes_error());
    }
    Ok(())
}

fn minutes_error() -> CoreError {
    CoreError::Validation("minutes must be greater than 0".to_string())
}

fn project_not_found(project_id: &str) -> CoreError {
    CoreError::NotFound(format!("project not found: {project_id}"))
}
