#[cfg(test)]
#[path = "prompts_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::NaiveDate;

use crate::domain::models::Activity;
use crate::domain::models::Role;

/// Most activities handed to the model in one prompt.
const MAX_PROMPT_ACTIVITIES: usize = 10;

/// Renders an ISO timestamp or date as `M/D/YYYY`, falling back to `N/A`.
pub fn format_date(date: Option<&str>) -> String {
    let date = match date {
        Some(date) if !date.trim().is_empty() => date.trim(),
        _ => return "N/A".to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.format("%-m/%-d/%Y").to_string();
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return parsed.format("%-m/%-d/%Y").to_string();
    }

    return "N/A".to_string();
}

fn format_number(val: f64) -> String {
    if val.fract() == 0.0 {
        return format!("{}", val as i64);
    }

    return val.to_string();
}

fn yes_no(val: bool) -> &'static str {
    if val {
        return "Yes";
    }

    return "No";
}

pub fn activities_to_markdown(activities: &[Activity]) -> String {
    let mut markdown = "Assignments:\n".to_string();

    for activity in activities {
        let name = if activity.name.is_empty() {
            "Untitled"
        } else {
            &activity.name
        };

        markdown += &format!("Assignment: {name}\n");
        markdown += &format!("- Due Date: {}\n", format_date(activity.due_date.as_deref()));
        markdown += &format!(
            "- Submitted Date: {}\n",
            format_date(activity.submitted_date.as_deref())
        );
        markdown += &format!("- Status: {}\n", activity.status);
        markdown += &format!(
            "- Points Possible: {}\n",
            format_number(activity.points_possible.unwrap_or(0.0))
        );
        markdown += &format!(
            "- Score: {}\n",
            activity
                .score
                .map(format_number)
                .unwrap_or_else(|| return "Not graded".to_string())
        );
        markdown += &format!("- Late: {}\n", yes_no(activity.is_late));
        markdown += &format!("- Missing: {}\n\n", yes_no(activity.is_missing));
    }

    return markdown;
}

/// Builds the request sent to the model for a student's progress. Only the
/// first few activities are included to keep the prompt short.
pub fn summary_prompt(role: Role, student_name: &str, activities: &[Activity]) -> String {
    let count = activities.len().min(MAX_PROMPT_ACTIVITIES);
    let progress = format!(
        "{student_name}'s Progress:\n{}",
        activities_to_markdown(&activities[..count])
    );

    let request = match role {
        Role::Student => format!(
            r#"Generate a plan to help me succeed in school. Keep your response simple, short, and direct.
Please respond in the markdown format using English.
My name is {student_name}.

Explain and provide detail on:
1. Areas of strength
2. Areas needing improvement
3. A simple and direct plan to improve.
4. Any additional comments or suggestions.
5. Websites or videos that could help me improve on specific topics."#
        ),
        Role::Observer => format!(
            r#"Generate a comprehensive summary of this student's progress.
Please respond in the markdown format using English.
The student's name is {student_name}.

Explain and provide detail on:
1. Overall engagement
2. Assignment completion patterns
3. Areas of strength
4. Areas needing improvement"#
        ),
    };

    return format!("{progress}{request}");
}
