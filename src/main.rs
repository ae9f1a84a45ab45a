use std::error::Error;
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use focus_ledger::config::AppConfig;
use focus_ledger::domain::{
	CoreError, NewLog, NewProject, ProjectPatch, ProjectStatus, StatusChange, Theme, add_log_entry,
	add_project, delete_project, format_minutes, now_iso, parse_minutes, parse_timestamp,
	set_project_status, update_project,
};
use focus_ledger::render::{render_bar_chart, render_heatmap, render_project_list, render_summary};
use focus_ledger::report::{bar_chart, heatmap_series_today, stats_snapshot, summary_context};
use focus_ledger::storage::{FileStore, StateStore};

const LOG_ENV: &str = "FOCUS_LEDGER_LOG";

#[derive(Debug, Parser)]
#[command(name = "focus-ledger", about = "Project focus tracker with a capped active set")]
struct Cli {
	#[arg(long)]
	state: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init {
		/// Start from the demo data set when the state is empty.
		#[arg(long)]
		seed: bool,
	},
	/// Overwrite the state with the demo data set.
	Reset,
	AddProject {
		#[arg(long)]
		name: String,
		#[arg(long, default_value = "")]
		goal: String,
		#[arg(long, default_value = "")]
		note: String,
	},
	Status {
		#[arg(long)]
		project: String,
		/// active, paused, queued or done
		status: String,
	},
	Note {
		#[arg(long)]
		project: String,
		#[arg(long)]
		text: String,
	},
	Delete {
		#[arg(long)]
		project: String,
	},
	Log {
		#[arg(long)]
		project: String,
		#[arg(long)]
		minutes: String,
		#[arg(long)]
		note: Option<String>,
		/// RFC 3339 timestamp, defaults to now
		#[arg(long)]
		at: Option<String>,
	},
	List,
	Summary,
	Chart,
	Heatmap {
		#[arg(long)]
		days: Option<usize>,
	},
	/// Print the data handed to the summarizer as JSON.
	Context {
		#[arg(long)]
		limit: Option<usize>,
	},
	/// Show the theme, or set it to dark, light or toggle.
	Theme {
		value: Option<String>,
	},
}

fn main() {
	init_tracing();
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn init_tracing() {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.compact()
		.init();
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let config = AppConfig::resolve(cli.state)?;
	let store = FileStore::new(config.store_config());
	let state = store.load_state()?;
	let today = Local::now().date_naive();

	match cli.command.unwrap_or(Command::Summary) {
		Command::Init { seed } => {
			let is_empty = state.projects.is_empty() && state.logs.is_empty();
			if seed && is_empty {
				store.reset(now_iso())?;
			} else {
				if seed {
					warn!("state already holds data, not seeding");
				}
				store.save_state(&state)?;
			}
			println!("initialized state at {}", store.path().display());
		}
		Command::Reset => {
			store.reset(now_iso())?;
			println!("reset {} to seed data", store.path().display());
		}
		Command::AddProject { name, goal, note } => {
			let (_, project) = add_project(&state, NewProject { name, goal, note })?;
			store.create_project(&project)?;
			info!(project = %project.id, "project created");
			println!("created project {}", project.id);
		}
		Command::Status { project, status } => {
			let status = status.parse::<ProjectStatus>()?;
			match set_project_status(&state, &project, status)? {
				StatusChange::Applied { project, .. } => {
					store.update_project(&project)?;
					info!(project = %project.id, %status, "status changed");
					println!("Status: {status}");
				}
				StatusChange::Rejected(rejection) => {
					warn!(%project, "activation rejected, focus set is full");
					return Err(rejection.into());
				}
			}
		}
		Command::Note { project, text } => {
			let patch = ProjectPatch {
				note: Some(text),
				..ProjectPatch::default()
			};
			let (_, project) = update_project(&state, &project, patch)?;
			store.update_project(&project)?;
			println!("note saved for {}", project.name);
		}
		Command::Delete { project } => {
			let next = delete_project(&state, &project);
			if next.projects.len() == state.projects.len() {
				println!("no project {project}, nothing to delete");
				return Ok(());
			}
			store.delete_project(&project)?;
			info!(%project, "project deleted");
			println!("deleted project {project}");
		}
		Command::Log {
			project,
			minutes,
			note,
			at,
		} => {
			let minutes = parse_minutes(&minutes)?;
			let created_at = at.as_deref().map(parse_timestamp).transpose()?;
			let (next, log) = add_log_entry(
				&state,
				NewLog {
					project_id: project,
					minutes,
					note: note.unwrap_or_default(),
					created_at,
				},
			)?;
			let project = next.project(&log.project_id).ok_or_else(|| {
				CoreError::NotFound(format!("project not found: {}", log.project_id))
			})?;
			store.create_log(&log, project)?;
			println!("logged {} for {}", format_minutes(log.minutes), project.name);
		}
		Command::List => {
			println!("{}", render_project_list(&state));
		}
		Command::Summary => {
			let snapshot = stats_snapshot(&state, today, config.heatmap_days);
			println!("{}", render_summary(&state, &snapshot));
		}
		Command::Chart => {
			println!("{}", render_bar_chart(&bar_chart(&state)));
		}
		Command::Heatmap { days } => {
			let series = heatmap_series_today(&state.logs, days.unwrap_or(config.heatmap_days));
			println!("{}", render_heatmap(&series));
		}
		Command::Context { limit } => {
			let context = summary_context(
				&state,
				today,
				config.heatmap_days,
				limit.unwrap_or(config.context_log_limit),
			);
			println!("{}", serde_json::to_string_pretty(&context)?);
		}
		Command::Theme { value } => {
			let current = state.settings.theme;
			let theme = match value.as_deref() {
				None => {
					println!("theme: {}", current.as_str());
					return Ok(());
				}
				Some("toggle") => current.toggle(),
				Some(raw) => raw.parse::<Theme>()?,
			};
			store.upsert_theme(theme)?;
			println!("theme: {}", theme.as_str());
		}
	}

	Ok(())
}
