#[cfg(test)]
#[path = "printer_test.rs"]
mod tests;

use std::io::Write;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::domain::models::Course;
use crate::domain::models::DueItem;
use crate::domain::models::RelayError;
use crate::domain::models::StreamEvent;
use crate::domain::models::SummaryData;
use crate::domain::models::User;
use crate::domain::services::prompts::format_date;
use crate::domain::services::Roster;

fn format_points(val: Option<f64>) -> String {
    return match val {
        Some(val) if val.fract() == 0.0 => format!("{}", val as i64),
        Some(val) => val.to_string(),
        None => "-".to_string(),
    };
}

pub fn format_students(roster: &Roster) -> String {
    if roster.students.is_empty() {
        return "No students are visible to this account.".to_string();
    }

    let mut lines = vec![];
    if let Some(viewer) = &roster.viewer {
        lines.push(format!("Signed in with {}", viewer.enrollment_type));
    }
    for student in &roster.students {
        lines.push(format!("- (ID: {}) {}", student.id, student.name));
    }

    return lines.join("\n");
}

pub fn format_courses(courses: &[Course]) -> String {
    if courses.is_empty() {
        return "No active courses found.".to_string();
    }

    return courses
        .iter()
        .map(|course| return format!("- (ID: {}) {}", course.id, course.name))
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn format_due(items: &[DueItem]) -> String {
    if items.is_empty() {
        return "Nothing is due around today.".to_string();
    }

    return items
        .iter()
        .map(|item| {
            let status = if item.submitted {
                "submitted"
            } else if item.is_overdue {
                "overdue"
            } else {
                "open"
            };
            return format!("- {} {} [{status}]", item.due_date, item.title);
        })
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn format_summary(student: &User, course: &Course, data: &SummaryData) -> String {
    let mut lines = vec![
        format!("{} - {}", student.name, course.name),
        format!(
            "Assignments: {}, Completed: {}, Late: {}, Missing: {}",
            data.stats.total, data.stats.completed, data.stats.late, data.stats.missing
        ),
        "".to_string(),
    ];

    for activity in &data.activities {
        let mut flags = vec![];
        if activity.is_late {
            flags.push("late");
        }
        if activity.is_missing {
            flags.push("missing");
        }

        let mut line = format!(
            "- {} (due {}) {}/{}",
            activity.name,
            format_date(activity.due_date.as_deref()),
            format_points(activity.score),
            format_points(activity.points_possible),
        );
        if !flags.is_empty() {
            line = format!("{line} [{}]", flags.join(", "));
        }
        lines.push(line);
    }

    return lines.join("\n");
}

/// Writes chunks to `out` as they arrive and returns the complete text.
pub async fn print_stream<W: Write>(
    mut events: BoxStream<'static, StreamEvent>,
    out: &mut W,
) -> Result<String, RelayError> {
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Chunk(text) => {
                write!(out, "{text}").map_err(|err| return RelayError::Generation(err.to_string()))?;
                out.flush()
                    .map_err(|err| return RelayError::Generation(err.to_string()))?;
            }
            StreamEvent::Complete(content) => {
                writeln!(out).map_err(|err| return RelayError::Generation(err.to_string()))?;
                return Ok(content);
            }
            StreamEvent::Error(err) => {
                return Err(RelayError::Generation(err));
            }
        }
    }

    return Err(RelayError::Closed);
}
