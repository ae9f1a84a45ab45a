use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{
    CoreError, LogEntry, Project, ProjectStatus, Settings, State, Theme, Timestamp,
    insert_log_sorted,
};

const LOGS_MARKER: &str = "\n=== LOGS ===\n";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML header: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("failed to encode TOML header: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("failed to parse JSONL log on line {line}: {source}")]
    JsonDecode {
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to encode JSONL log: {0}")]
    JsonEncode(serde_json::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Record-level persistence contract. Callers compute the next [`State`] with
/// the core first, then push the matching write here.
///
/// Only `load_state` and `save_state` are required; the entity writes default
/// to load, apply, save.
pub trait StateStore {
    fn load_state(&self) -> Result<State, StorageError>;

    fn save_state(&self, state: &State) -> Result<(), StorageError>;

    fn create_project(&self, project: &Project) -> Result<(), StorageError> {
        self.modify(|state| {
            state.projects.retain(|existing| existing.id != project.id);
            state.projects.insert(0, project.clone());
            Ok(())
        })
    }

    /// Mirrors name, goal, note, status and timestamps of an existing record.
    fn update_project(&self, project: &Project) -> Result<(), StorageError> {
        self.modify(|state| {
            let existing = state
                .projects
                .iter_mut()
                .find(|existing| existing.id == project.id)
                .ok_or_else(|| CoreError::NotFound(format!("project not found: {}", project.id)))?;
            *existing = project.clone();
            Ok(())
        })
    }

    /// Deletes the project record and every log that references it.
    fn delete_project(&self, project_id: &str) -> Result<(), StorageError> {
        self.modify(|state| {
            state.projects.retain(|project| project.id != project_id);
            state.logs.retain(|log| log.project_id != project_id);
            Ok(())
        })
    }

    /// Stores a new log together with the project it touched, in one write.
    fn create_log(&self, log: &LogEntry, project: &Project) -> Result<(), StorageError> {
        self.modify(|state| {
            let existing = state
                .projects
                .iter_mut()
                .find(|existing| existing.id == project.id)
                .ok_or_else(|| CoreError::NotFound(format!("project not found: {}", project.id)))?;
            *existing = project.clone();
            state.logs.retain(|existing| existing.id != log.id);
            insert_log_sorted(&mut state.logs, log.clone());
            Ok(())
        })
    }

    fn upsert_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.modify(|state| {
            state.settings.theme = theme;
            Ok(())
        })
    }

    fn modify(
        &self,
        apply: impl FnOnce(&mut State) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut state = self.load_state()?;
        apply(&mut state)?;
        self.save_state(&state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Single-file store: a TOML header holding settings and projects, a marker
/// line, then one JSON object per log.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateHeader {
    schema_version: u32,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    projects: Vec<Project>,
}

impl FileStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { path: config.path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces whatever is stored with the demo data set.
    pub fn reset(&self, now: Timestamp) -> Result<State, StorageError> {
        let state = seed_state(now);
        self.save_state(&state)?;
        info!(path = %self.path.display(), "state reset to seed data");
        Ok(state)
    }
}

impl StateStore for FileStore {
    fn load_state(&self) -> Result<State, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet, starting empty");
                return Ok(State::default());
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        if raw.trim().is_empty() {
            return Ok(State::default());
        }

        // Multiline notes may carry the marker inside the header; JSONL lines never do.
        let (header_blob, logs_blob) = raw.rsplit_once(LOGS_MARKER).unwrap_or((raw.as_str(), ""));

        let header: StateHeader = toml::from_str(header_blob)?;
        let mut logs: Vec<LogEntry> = Vec::new();
        for (index, line) in logs_blob.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let log = serde_json::from_str(line).map_err(|source| StorageError::JsonDecode {
                line: index + 1,
                source,
            })?;
            logs.push(log);
        }
        logs.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        debug!(
            path = %self.path.display(),
            projects = header.projects.len(),
            logs = logs.len(),
            "state loaded"
        );
        Ok(State {
            projects: header.projects,
            logs,
            settings: header.settings,
        })
    }

    fn save_state(&self, state: &State) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let header = StateHeader {
            schema_version: SCHEMA_VERSION,
            settings: state.settings.clone(),
            projects: state.projects.clone(),
        };
        let header = toml::to_string_pretty(&header)?;

        let mut file = fs::File::create(&self.path)?;
        file.write_all(header.as_bytes())?;
        file.write_all(LOGS_MARKER.as_bytes())?;
        for log in &state.logs {
            let line = serde_json::to_string(log).map_err(StorageError::JsonEncode)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }

        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

/// Demo data: two active projects, one paused, and a few logs spread over the
/// last five days.
pub fn seed_state(now: Timestamp) -> State {
    let project = |id: &str, name: &str, goal: &str, status| Project {
        id: id.to_string(),
        name: name.to_string(),
        goal: goal.to_string(),
        note: String::new(),
        status,
        created_at: now,
        updated_at: now,
    };

    let mut state = State {
        projects: vec![
            project(
                "mission-alpha",
                "Mission Alpha",
                "Release MVP und Nutzer onboarden",
                ProjectStatus::Active,
            ),
            project(
                "training-hours",
                "Training & Fokus",
                "2h Deep Work pro Tag",
                ProjectStatus::Active,
            ),
            project(
                "launch-prep",
                "Launch Prep",
                "Marketing Assets finalisieren",
                ProjectStatus::Paused,
            ),
        ],
        ..State::default()
    };

    let logs = [
        ("log-1", "mission-alpha", 50.0, "Sprint Backlog geklärt", 1),
        ("log-2", "training-hours", 40.0, "Deep Work Block", 2),
        ("log-3", "launch-prep", 30.0, "Landing Page Text", 3),
        ("log-4", "mission-alpha", 25.0, "User Interviews ausgewertet", 4),
        ("log-5", "training-hours", 35.0, "Fokus-Sprint", 0),
    ];
    for (id, project_id, minutes, note, days_ago) in logs {
        insert_log_sorted(
            &mut state.logs,
            LogEntry {
                id: id.to_string(),
                project_id: project_id.to_string(),
                minutes,
                note: note.to_string(),
                created_at: now - Duration::days(days_ago),
            },
        );
    }

    state
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::domain::{
        NewLog, NewProject, ProjectStatus, State, StatusChange, Theme, add_log_entry,
        add_project, parse_timestamp, set_project_status,
    };

    use super::{FileStore, StateStore, StorageError, StoreConfig, seed_state};

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(StoreConfig {
            path: dir.path().join("nested").join("state.ledger"),
        });
        (dir, store)
    }

    fn sample_state() -> State {
        let (state, project) = add_project(
            &State::default(),
            NewProject {
                name: "Personal".to_string(),
                goal: "Write the thing".to_string(),
                note: "remember the outline".to_string(),
            },
        )
        .expect("project should be created");
        let (state, _) = add_log_entry(
            &state,
            NewLog {
                project_id: project.id,
                minutes: 42.5,
                note: "deep work".to_string(),
                created_at: Some(parse_timestamp("2026-01-01T09:00:00+01:00").expect("timestamp")),
            },
        )
        .expect("log should be created");
        state
    }

    #[test]
    fn round_trips_toml_header_and_jsonl_logs() {
        let (_dir, store) = store();
        let mut state = sample_state();
        state.settings.theme = Theme::Light;

        store.save_state(&state).expect("save should succeed");
        let raw = fs::read_to_string(store.path()).expect("file should exist");
        assert!(raw.contains("=== LOGS ==="));
        assert!(raw.contains("schema_version = 1"));

        let loaded = store.load_state().expect("load should succeed");
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_or_blank_file_loads_default_state() {
        let (_dir, store) = store();
        assert_eq!(store.load_state().expect("load"), State::default());

        fs::create_dir_all(store.path().parent().expect("parent")).expect("dir");
        fs::write(store.path(), "  \n").expect("write");
        assert_eq!(store.load_state().expect("load"), State::default());
    }

    #[test]
    fn reports_the_broken_log_line() {
        let (_dir, store) = store();
        store.save_state(&sample_state()).expect("save");
        let mut raw = fs::read_to_string(store.path()).expect("read");
        raw.push_str("{not json}\n");
        fs::write(store.path(), raw).expect("write");

        let err = store.load_state().expect_err("corrupt log line");
        assert!(matches!(err, StorageError::JsonDecode { line: 2, .. }));
    }

    #[test]
    fn entity_writes_mirror_core_transitions() {
        let (_dir, store) = store();
        let state = State::default();

        let (state, project) = add_project(
            &state,
            NewProject {
                name: "Remote".to_string(),
                ..NewProject::default()
            },
        )
        .expect("project");
        store.create_project(&project).expect("create project");

        let StatusChange::Applied { state, project } =
            set_project_status(&state, &project.id, ProjectStatus::Active).expect("status")
        else {
            panic!("first activation must be admitted");
        };
        store.update_project(&project).expect("update project");

        let (state, log) = add_log_entry(
            &state,
            NewLog {
                project_id: project.id.clone(),
                minutes: 25.0,
                note: String::new(),
                created_at: None,
            },
        )
        .expect("log");
        let touched = state.project(&project.id).expect("project");
        store.create_log(&log, touched).expect("create log");
        store.upsert_theme(Theme::Light).expect("theme");

        let loaded = store.load_state().expect("load");
        assert_eq!(loaded.projects, state.projects);
        assert_eq!(loaded.logs, state.logs);
        assert_eq!(loaded.settings.theme, Theme::Light);

        store.delete_project(&project.id).expect("delete");
        let loaded = store.load_state().expect("load");
        assert!(loaded.projects.is_empty());
        assert!(loaded.logs.is_empty());
    }

    #[test]
    fn marker_inside_a_note_does_not_split_the_file() {
        let (_dir, store) = store();
        let mut state = sample_state();
        state.projects[0].note = "a\n=== LOGS ===\nb".to_string();

        store.save_state(&state).expect("save");
        let loaded = store.load_state().expect("multiline note should load");
        assert_eq!(loaded, state);
        assert_eq!(loaded.logs.len(), 1);
    }

    #[test]
    fn loading_sorts_logs_newest_first() {
        let (_dir, store) = store();
        let state = sample_state();
        let project_id = state.projects[0].id.clone();
        store.save_state(&state).expect("save");

        let mut raw = fs::read_to_string(store.path()).expect("read");
        for (id, at) in [
            ("older", "2025-12-30T09:00:00+01:00"),
            ("newer", "2026-02-01T09:00:00+01:00"),
        ] {
            let line = serde_json::json!({
                "id": id,
                "projectId": project_id,
                "minutes": 10.0,
                "note": "",
                "createdAt": at,
            });
            raw.push_str(&format!("{line}\n"));
        }
        fs::write(store.path(), raw).expect("write");

        let loaded = store.load_state().expect("load");
        let ids = loaded
            .logs
            .iter()
            .map(|log| log.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids[0], "newer");
        assert_eq!(ids[2], "older");
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn recording_a_log_for_a_missing_project_writes_nothing() {
        let (_dir, store) = store();
        let state = sample_state();
        let (next, log) = add_log_entry(
            &state,
            NewLog {
                project_id: state.projects[0].id.clone(),
                minutes: 15.0,
                note: String::new(),
                created_at: None,
            },
        )
        .expect("log");

        let err = store
            .create_log(&log, next.project(&log.project_id).expect("project"))
            .expect_err("project was never stored");
        assert!(matches!(err, StorageError::Core(_)));
        assert_eq!(store.load_state().expect("load"), State::default());
    }

    #[test]
    fn updating_a_missing_record_fails() {
        let (_dir, store) = store();
        let state = sample_state();
        let err = store
            .update_project(&state.projects[0])
            .expect_err("nothing stored yet");
        assert!(matches!(err, StorageError::Core(_)));
    }

    #[test]
    fn reset_writes_seed_data() {
        let (_dir, store) = store();
        store.save_state(&sample_state()).expect("save");
        let now = parse_timestamp("2026-10-17T12:00:00+02:00").expect("timestamp");

        let seeded = store.reset(now).expect("reset");
        assert_eq!(seeded, seed_state(now));
        assert_eq!(store.load_state().expect("load"), seeded);
        assert_eq!(seeded.count_active(), 2);
        assert_eq!(seeded.logs.len(), 5);
        assert_eq!(seeded.logs[0].id, "log-5");
        assert!(
            seeded
                .logs
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at)
        );
    }
}
