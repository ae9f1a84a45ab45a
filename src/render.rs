use crate::domain::{State, format_minutes};
use crate::report::{BarRow, HeatmapBucket, ProjectWithMinutes, StatsSnapshot, UNKNOWN_PROJECT};

const BAR_WIDTH: usize = 30;
const NAME_WIDTH: usize = 24;
const HEAT_SHADES: [&str; 5] = ["·", "░", "▒", "▓", "█"];

pub fn render_summary(state: &State, snapshot: &StatsSnapshot) -> String {
    let mut lines = vec![format!(
        "Minuten gesamt: {}",
        format_minutes(snapshot.total_minutes)
    )];
    let last = match &snapshot.last_log {
        Some(log) => format!(
            "{} · {}",
            log.created_at.format("%d.%m. %H:%M"),
            project_name(state, &log.project_id)
        ),
        None => "–".to_string(),
    };
    lines.push(format!("Letztes Update: {last}"));

    lines.push(String::new());
    lines.push("Fokus".to_string());
    push_projects(
        &mut lines,
        snapshot.active.iter(),
        "Keine aktiven Projekte. Ab in die Queue!",
    );

    lines.push(String::new());
    lines.push("Queue".to_string());
    push_projects(
        &mut lines,
        snapshot.paused.iter().chain(snapshot.queued.iter()),
        "Keine Projekte in der Übersicht.",
    );

    lines.push(String::new());
    lines.push("Fertig".to_string());
    push_projects(
        &mut lines,
        snapshot.done.iter(),
        "Noch nichts abgeschlossen.",
    );

    lines.join("\n")
}

pub fn render_bar_chart(rows: &[BarRow]) -> String {
    if rows.is_empty() {
        return "Kein Chart ohne Logs.".to_string();
    }

    rows.iter()
        .map(|row| {
            let width = ((row.ratio * BAR_WIDTH as f64).round() as usize).clamp(1, BAR_WIDTH);
            format!(
                "{:<name_width$} {:<bar_width$} {}",
                truncate(&row.name, NAME_WIDTH),
                "#".repeat(width),
                format_minutes(row.minutes),
                name_width = NAME_WIDTH,
                bar_width = BAR_WIDTH,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_heatmap(series: &[HeatmapBucket]) -> String {
    if series.is_empty() {
        return "Noch keine Daten.".to_string();
    }

    let labels = series
        .iter()
        .map(|bucket| bucket.label)
        .collect::<Vec<_>>()
        .join(" ");
    let cells = series
        .iter()
        .map(|bucket| heat_shade(bucket).repeat(2))
        .collect::<Vec<_>>()
        .join(" ");

    let mut lines = vec![labels, cells];
    for bucket in series.iter().filter(|bucket| bucket.value > 0.0) {
        lines.push(format!(
            "{}: {}",
            bucket.date.format("%Y-%m-%d"),
            format_minutes(bucket.value)
        ));
    }
    lines.join("\n")
}

pub fn render_project_list(state: &State) -> String {
    if state.projects.is_empty() {
        return "no projects yet".to_string();
    }

    state
        .projects
        .iter()
        .map(|project| {
            format!(
                "{} | {} | {} | updated {}",
                project.id,
                project.status,
                project.name,
                project.updated_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_projects<'a>(
    lines: &mut Vec<String>,
    rows: impl Iterator<Item = &'a ProjectWithMinutes>,
    empty: &str,
) {
    let before = lines.len();
    for row in rows {
        let project = &row.project;
        let goal = if project.goal.is_empty() {
            "Kein Ziel hinterlegt"
        } else {
            project.goal.as_str()
        };
        lines.push(format!(
            "  [{}] {} ({}) · {} geloggt · {}",
            project.status.label(),
            project.name,
            project.id,
            format_minutes(row.minutes),
            goal
        ));
        if !project.note.is_empty() {
            lines.push(format!("      Notiz: {}", project.note));
        }
    }
    if lines.len() == before {
        lines.push(format!("  {empty}"));
    }
}

fn project_name<'a>(state: &'a State, project_id: &str) -> &'a str {
    state
        .project(project_id)
        .map(|project| project.name.as_str())
        .unwrap_or(UNKNOWN_PROJECT)
}

fn heat_shade(bucket: &HeatmapBucket) -> &'static str {
    if bucket.value <= 0.0 {
        return HEAT_SHADES[0];
    }
    let steps = (HEAT_SHADES.len() - 1) as f64;
    let index = (bucket.intensity * steps).ceil() as usize;
    HEAT_SHADES[index.clamp(1, HEAT_SHADES.len() - 1)]
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short = text.chars().take(width - 1).collect::<String>();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::parse_timestamp;
    use crate::report::{HeatmapBucket, bar_chart, heatmap_series, stats_snapshot};
    use crate::storage::seed_state;

    use super::{render_bar_chart, render_heatmap, render_project_list, render_summary, truncate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
    }

    #[test]
    fn summary_lists_groups_and_last_update() {
        let now = parse_timestamp("2026-10-17T12:00:00+02:00").expect("timestamp");
        let state = seed_state(now);
        let snapshot = stats_snapshot(&state, today(), 14);

        let text = render_summary(&state, &snapshot);
        assert!(text.contains("Minuten gesamt: 180 min"));
        assert!(text.contains("Letztes Update: 17.10. 12:00 · Training & Fokus"));
        assert!(text.contains("[Aktiv] Mission Alpha"));
        assert!(text.contains("[Pausiert] Launch Prep"));
        assert!(text.contains("Noch nichts abgeschlossen."));
    }

    #[test]
    fn empty_state_renders_placeholders() {
        let state = crate::domain::default_state();
        let snapshot = stats_snapshot(&state, today(), 14);

        let text = render_summary(&state, &snapshot);
        assert!(text.contains("Letztes Update: –"));
        assert!(text.contains("Keine aktiven Projekte. Ab in die Queue!"));
        assert_eq!(render_bar_chart(&bar_chart(&state)), "Kein Chart ohne Logs.");
        assert_eq!(render_project_list(&state), "no projects yet");
    }

    #[test]
    fn bar_chart_scales_to_the_longest_bar() {
        let now = parse_timestamp("2026-10-17T12:00:00+02:00").expect("timestamp");
        let text = render_bar_chart(&bar_chart(&seed_state(now)));
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Mission Alpha"));
        assert!(lines[0].contains(&"#".repeat(30)));
        assert!(lines[0].ends_with("75 min"));
        assert!(lines[2].starts_with("Launch Prep"));
    }

    #[test]
    fn heatmap_shades_follow_intensity() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date");
        let series = vec![
            HeatmapBucket {
                date: day(15),
                label: "Do",
                value: 0.0,
                intensity: 0.0,
            },
            HeatmapBucket {
                date: day(16),
                label: "Fr",
                value: 10.0,
                intensity: 0.1,
            },
            HeatmapBucket {
                date: day(17),
                label: "Sa",
                value: 100.0,
                intensity: 1.0,
            },
        ];

        let text = render_heatmap(&series);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Do Fr Sa");
        assert_eq!(lines[1], "·· ░░ ██");
        assert_eq!(lines[2], "2026-10-16: 10 min");
        assert_eq!(lines.len(), 4);
        assert_eq!(render_heatmap(&heatmap_series(&[], 0, today())), "Noch keine Daten.");
    }

    #[test]
    fn truncates_long_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long project", 6), "a ver…");
    }
}
