#[cfg(test)]
#[path = "activity_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Assignment;
use super::Submission;

/// An assignment joined with the student's submission for it, if any.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: u64,
    pub name: String,
    pub due_date: Option<String>,
    pub submitted_date: Option<String>,
    pub score: Option<f64>,
    pub points_possible: Option<f64>,
    pub is_late: bool,
    pub is_missing: bool,
    pub status: String,
    pub html_url: Option<String>,
}

impl Activity {
    pub fn new(assignment: &Assignment, submission: Option<&Submission>) -> Activity {
        return Activity {
            id: assignment.id,
            name: assignment.name.to_string(),
            due_date: assignment.due_at.clone(),
            submitted_date: submission.and_then(|e| return e.submitted_at.clone()),
            score: submission.and_then(|e| return e.score),
            points_possible: assignment.points_possible,
            is_late: submission.map(|e| return e.late).unwrap_or(false),
            is_missing: submission.is_none(),
            status: submission
                .and_then(|e| return e.workflow_state.clone())
                .unwrap_or_else(|| return "not_submitted".to_string()),
            html_url: assignment.html_url.clone(),
        };
    }

    pub fn is_completed(&self) -> bool {
        return self.submitted_date.is_some();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total: usize,
    pub completed: usize,
    pub late: usize,
    pub missing: usize,
}

impl SummaryStats {
    pub fn from_activities(activities: &[Activity]) -> SummaryStats {
        return SummaryStats {
            total: activities.len(),
            completed: activities.iter().filter(|e| return e.is_completed()).count(),
            late: activities.iter().filter(|e| return e.is_late).count(),
            missing: activities.iter().filter(|e| return e.is_missing).count(),
        };
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryData {
    pub student_id: u64,
    pub course_id: u64,
    pub activities: Vec<Activity>,
    pub stats: SummaryStats,
}

/// Assignment due around today, used for the "due soon" view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueItem {
    pub title: String,
    pub due_date: String,
    pub submitted: bool,
    pub is_overdue: bool,
    pub is_missing: bool,
    pub html_url: Option<String>,
}
