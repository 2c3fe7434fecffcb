// Plain-text rendering for the terminal.

use pennant_league::standings::{PointsNote, RankedRow};

use crate::fetcher::FetchFailure;
use crate::pipeline::Report;

const HEADERS: [&str; 9] = ["Pos", "Team", "Player", "Sched", "GP", "W", "L", "Left", "Pts"];

/// Fixed-width table; Team and Player columns widen to their longest value.
pub fn render_table(rows: &[RankedRow]) -> String {
    let cells: Vec<[String; 9]> = rows
        .iter()
        .map(|r| {
            [
                r.rank.to_string(),
                r.row.team.clone(),
                r.row.display_name.clone(),
                r.row.scheduled.to_string(),
                r.row.played.to_string(),
                r.row.wins.to_string(),
                r.row.losses.to_string(),
                r.row.remaining.to_string(),
                r.row.points.total.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String; 9], widths: &[usize; 9]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(col, (cell, &w))| match col {
            // Team and Player are left-aligned, numbers right-aligned.
            1 | 2 => format!("{cell:<w$}"),
            _ => format!("{cell:>w$}"),
        })
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}

/// `- <team>: <+n|-n> - <reason>`
pub fn render_note(note: &PointsNote) -> String {
    format!("- {}: {:+} - {}", note.team, note.points_extra, note.reason)
}

pub fn render_failure(failure: &FetchFailure) -> String {
    format!(
        "- {} page {} ({} attempts): {}",
        failure.identity, failure.page, failure.attempts, failure.message
    )
}

pub fn render_report(report: &Report) -> String {
    let mut out = format!("{}\n\n", report.league);
    out.push_str(&render_table(&report.standings.rows));

    if !report.standings.notes.is_empty() {
        out.push_str("\nPoint adjustments\n");
        for note in &report.standings.notes {
            out.push_str(&render_note(note));
            out.push('\n');
        }
    }

    out.push_str("\nPlayed today\n");
    if report.today.is_empty() {
        out.push_str("(none)\n");
    }
    for line in &report.today {
        out.push_str(line);
        out.push('\n');
    }

    if !report.failures.is_empty() {
        out.push_str("\nUnavailable pages\n");
        for failure in &report.failures {
            out.push_str(&render_failure(failure));
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "\nLast updated {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}
