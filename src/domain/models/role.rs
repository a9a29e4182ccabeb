#[cfg(test)]
#[path = "role_test.rs"]
mod tests;

use super::SessionError;

const OBSERVER_PROMPT: &str = "You are a conscientious teacher preparing for parent-teacher conferences. Your task is to review the student's academic record and prepare a clear, concise summary for parents. Your goal is to provide an honest yet supportive assessment, highlighting strengths, identifying areas for growth, and suggesting actionable steps to help the student improve and succeed. Approach this task with empathy, professionalism, and attention to detail, making sure to personalize insights based on the student's unique record.";

const STUDENT_PROMPT: &str = "You are a student that wants to do better at school. Examine your performance and develop short, simple, a plan to improve.";

/// Who is asking for the summary. Selects the model's instruction prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Observer,
    Student,
}

impl Role {
    /// Accepts the short names as well as Canvas enrollment types.
    pub fn parse(text: &str) -> Result<Role, SessionError> {
        let lowered = text.trim().to_lowercase();
        match lowered.as_str() {
            "student" | "studentenrollment" => return Ok(Role::Student),
            "observer" | "observerenrollment" | "teacher" | "teacherenrollment" => {
                return Ok(Role::Observer)
            }
            _ => return Err(SessionError::InvalidRole(text.to_string())),
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Role::Observer => return OBSERVER_PROMPT,
            Role::Student => return STUDENT_PROMPT,
        }
    }
}
