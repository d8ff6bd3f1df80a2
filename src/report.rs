use std::fmt::Write;

use crate::summary::CohortSummary;

const SCATTER_ROWS: usize = 25;

pub fn risk_mix(summary: &CohortSummary) -> Vec<(&str, usize)> {
    let mut mix: Vec<(&str, usize)> = summary
        .risk_distribution
        .iter()
        .map(|(label, count)| (label.as_str(), *count))
        .collect();
    mix.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    mix
}

pub fn render_markdown(source: Option<&str>, summary: &CohortSummary) -> String {
    let mut output = String::new();
    let source_label = source.unwrap_or("uploaded cohort");

    let _ = writeln!(output, "# Cohort Risk Dashboard");
    let _ = writeln!(
        output,
        "Generated for {} ({} students)",
        source_label, summary.total_students
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    for (label, count) in risk_mix(summary) {
        let share = 100.0 * count as f64 / summary.total_students.max(1) as f64;
        let _ = writeln!(output, "- {label}: {count} students ({share:.1}%)");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Averages");
    let _ = writeln!(
        output,
        "- Attendance: {:.2}%",
        summary.average_attendance
    );
    let _ = writeln!(output, "- Grade: {:.2}", summary.average_grade);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance vs Grade");

    if summary.scatter_data.is_empty() {
        let _ = writeln!(output, "No students recorded.");
    } else {
        let _ = writeln!(output, "| Attendance % | Grade avg |");
        let _ = writeln!(output, "|---:|---:|");
        for point in summary.scatter_data.iter().take(SCATTER_ROWS) {
            let _ = writeln!(
                output,
                "| {:.2} | {:.2} |",
                point.attendance_percentage, point.overall_grade_avg
            );
        }
        let hidden = summary.scatter_data.len().saturating_sub(SCATTER_ROWS);
        if hidden > 0 {
            let _ = writeln!(output, "\n_{hidden} more students not shown._");
        }
    }

    output
}
