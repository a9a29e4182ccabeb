use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enrollment_term_id: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "type", default)]
    pub enrollment_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub enrollment_state: String,
    #[serde(default)]
    pub user: Option<User>,
}

impl Enrollment {
    pub fn is_active_student(&self) -> bool {
        return self.user.is_some()
            && self.enrollment_type == "StudentEnrollment"
            && self.enrollment_state == "active";
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub assignment_id: u64,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub late: bool,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub workflow_state: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub html_url: Option<String>,
    /// Only populated when requested with `include[]=submission`.
    #[serde(default)]
    pub submission: Option<Submission>,
}
