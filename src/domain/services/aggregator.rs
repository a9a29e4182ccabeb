#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;

use std::collections::HashSet;

use chrono::DateTime;
use chrono::Datelike;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::TimeZone;
use chrono::Weekday;
use futures::future;

use super::prompts::format_date;
use crate::domain::models::Activity;
use crate::domain::models::Assignment;
use crate::domain::models::CanvasError;
use crate::domain::models::Course;
use crate::domain::models::DueItem;
use crate::domain::models::Enrollment;
use crate::domain::models::Submission;
use crate::domain::models::SummaryData;
use crate::domain::models::SummaryStats;
use crate::domain::models::User;
use crate::infrastructure::canvas::Canvas;

/// Students visible to the caller, along with the caller's own enrollment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Roster {
    pub viewer: Option<Enrollment>,
    pub students: Vec<User>,
}

/// Left joins submissions onto assignments by assignment id.
pub fn join_activities(assignments: &[Assignment], submissions: &[Submission]) -> Vec<Activity> {
    return assignments
        .iter()
        .map(|assignment| {
            let submission = submissions
                .iter()
                .find(|e| return e.assignment_id == assignment.id);
            return Activity::new(assignment, submission);
        })
        .collect();
}

/// First and last day considered "due soon": the previous school day through
/// the next one, skipping weekends.
pub fn school_day_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let back = match today.weekday() {
        Weekday::Mon => 3,
        _ => 1,
    };
    let ahead = match today.weekday() {
        Weekday::Fri => 3,
        _ => 1,
    };

    return (today - Duration::days(back), today + Duration::days(ahead));
}

pub fn select_due_soon<Tz: TimeZone>(assignments: &[Assignment], now: &DateTime<Tz>) -> Vec<DueItem> {
    let (first, last) = school_day_window(now.date_naive());

    let mut due = assignments
        .iter()
        .filter_map(|assignment| {
            let due_at = assignment.due_at.as_deref()?;
            let parsed = DateTime::parse_from_rfc3339(due_at).ok()?;
            let day = parsed.with_timezone(&now.timezone()).date_naive();
            if day < first || day > last {
                return None;
            }

            let submitted = assignment
                .submission
                .as_ref()
                .map(|e| return e.submitted_at.is_some())
                .unwrap_or(false);

            let item = DueItem {
                title: assignment.name.to_string(),
                due_date: format_date(Some(due_at)),
                submitted,
                is_overdue: !submitted && parsed.timestamp() < now.timestamp(),
                is_missing: assignment.submission.is_none(),
                html_url: assignment.html_url.clone(),
            };

            return Some((parsed.timestamp(), item));
        })
        .collect::<Vec<(i64, DueItem)>>();

    due.sort_by_key(|(timestamp, _)| return *timestamp);

    return due.into_iter().map(|(_, item)| return item).collect();
}

/// Joins several Canvas calls into the views the CLI prints. Any failed fetch
/// fails the whole call, a 403 only empties that fetch.
pub struct Aggregator {
    canvas: Canvas,
}

impl Aggregator {
    pub fn new(canvas: Canvas) -> Aggregator {
        return Aggregator { canvas };
    }

    pub async fn students(&self) -> Result<Roster, CanvasError> {
        let courses = self.canvas.courses().await?;
        let first = match courses.first() {
            Some(course) => course,
            None => return Ok(Roster::default()),
        };

        let (viewer, enrollments) = future::try_join(
            self.canvas.self_enrollments(first.id),
            future::try_join_all(
                courses
                    .iter()
                    .map(|course| return self.canvas.student_enrollments(course.id)),
            ),
        )
        .await?;

        let mut seen: HashSet<u64> = HashSet::new();
        let mut students: Vec<User> = vec![];
        for enrollment in enrollments.into_iter().flatten() {
            if !enrollment.is_active_student() {
                continue;
            }
            if let Some(user) = enrollment.user {
                if seen.insert(user.id) {
                    students.push(user);
                }
            }
        }

        tracing::debug!(
            courses = courses.len(),
            students = students.len(),
            "Resolved students"
        );

        return Ok(Roster {
            viewer: viewer.into_iter().next(),
            students,
        });
    }

    pub async fn student_courses(&self, student_id: u64) -> Result<Vec<Course>, CanvasError> {
        let courses = self.canvas.student_courses(student_id).await?;
        return Ok(courses
            .into_iter()
            .filter(|course| return course.enrollment_term_id.is_some())
            .collect());
    }

    pub async fn summary(&self, course_id: u64, student: &User) -> Result<SummaryData, CanvasError> {
        let (assignments, submissions) = future::try_join(
            self.canvas.assignments(course_id, student.id),
            self.canvas.submissions(course_id, student.id),
        )
        .await?;

        let activities = join_activities(&assignments, &submissions);
        let stats = SummaryStats::from_activities(&activities);

        return Ok(SummaryData {
            student_id: student.id,
            course_id,
            activities,
            stats,
        });
    }

    pub async fn due_soon<Tz: TimeZone>(
        &self,
        courses: &[Course],
        now: &DateTime<Tz>,
    ) -> Result<Vec<DueItem>, CanvasError> {
        let assignments = future::try_join_all(
            courses
                .iter()
                .map(|course| return self.canvas.course_assignments(course.id)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect::<Vec<Assignment>>();

        return Ok(select_due_soon(&assignments, now));
    }
}
