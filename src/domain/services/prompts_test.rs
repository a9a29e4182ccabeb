use super::activities_to_markdown;
use super::format_date;
use super::summary_prompt;
use crate::domain::models::Activity;
use crate::domain::models::Role;

fn activity(id: u64) -> Activity {
    return Activity {
        id,
        name: format!("Worksheet {id}"),
        due_date: Some("2024-01-05T23:59:00Z".to_string()),
        submitted_date: None,
        score: None,
        points_possible: Some(10.0),
        is_late: false,
        is_missing: true,
        status: "not_submitted".to_string(),
        html_url: None,
    };
}

#[test]
fn it_formats_dates() {
    assert_eq!(format_date(Some("2024-01-05T23:59:00Z")), "1/5/2024");
    assert_eq!(format_date(Some("2024-11-12")), "11/12/2024");
    assert_eq!(format_date(Some("yesterday")), "N/A");
    assert_eq!(format_date(Some("")), "N/A");
    assert_eq!(format_date(None), "N/A");
}

#[test]
fn it_renders_activities_as_markdown() {
    let graded = Activity {
        id: 10,
        name: "Fractions".to_string(),
        due_date: Some("2024-01-01".to_string()),
        submitted_date: Some("2023-12-31T18:00:00Z".to_string()),
        score: Some(90.0),
        points_possible: Some(100.0),
        is_late: false,
        is_missing: false,
        status: "graded".to_string(),
        html_url: None,
    };
    let untitled = Activity {
        id: 11,
        name: "".to_string(),
        score: Some(7.5),
        is_late: true,
        status: "submitted".to_string(),
        ..Activity::default()
    };

    insta::assert_snapshot!(activities_to_markdown(&[graded, untitled]).trim_end(), @r###"
    Assignments:
    Assignment: Fractions
    - Due Date: 1/1/2024
    - Submitted Date: 12/31/2023
    - Status: graded
    - Points Possible: 100
    - Score: 90
    - Late: No
    - Missing: No

    Assignment: Untitled
    - Due Date: N/A
    - Submitted Date: N/A
    - Status: submitted
    - Points Possible: 0
    - Score: 7.5
    - Late: Yes
    - Missing: No
    "###);
}

#[test]
fn it_limits_prompt_to_ten_activities() {
    let activities = (1..=12).map(activity).collect::<Vec<Activity>>();
    let prompt = summary_prompt(Role::Student, "Ada", &activities);

    assert!(prompt.starts_with("Ada's Progress:\nAssignments:\n"));
    assert!(prompt.contains("Assignment: Worksheet 10\n"));
    assert!(!prompt.contains("Assignment: Worksheet 11\n"));
    assert_eq!(prompt.matches("Assignment: ").count(), 10);
}

#[test]
fn it_asks_students_for_a_plan() {
    let prompt = summary_prompt(Role::Student, "Ada", &[activity(1)]);

    assert!(prompt.contains("Generate a plan to help me succeed in school."));
    assert!(prompt.contains("My name is Ada."));
    assert!(!prompt.contains("Overall engagement"));
}

#[test]
fn it_asks_observers_for_a_summary() {
    let prompt = summary_prompt(Role::Observer, "Ada", &[]);

    insta::assert_snapshot!(prompt, @r###"
    Ada's Progress:
    Assignments:
    Generate a comprehensive summary of this student's progress.
    Please respond in the markdown format using English.
    The student's name is Ada.

    Explain and provide detail on:
    1. Overall engagement
    2. Assignment completion patterns
    3. Areas of strength
    4. Areas needing improvement
    "###);
}
