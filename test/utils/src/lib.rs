//! Canvas and model payloads shared across tests.

pub const COURSES: &str = r#"[
    {"id": 1, "name": "Math", "enrollment_term_id": 7},
    {"id": 2, "name": "Sandbox"}
]"#;

pub const SELF_OBSERVER_ENROLLMENT: &str = r#"[
    {"type": "ObserverEnrollment", "role": "ObserverEnrollment", "enrollment_state": "active"}
]"#;

pub const MATH_STUDENT_ENROLLMENTS: &str = r#"[
    {"type": "StudentEnrollment", "role": "StudentEnrollment", "enrollment_state": "active", "user": {"id": 42, "name": "Ada"}},
    {"type": "StudentEnrollment", "role": "StudentEnrollment", "enrollment_state": "inactive", "user": {"id": 43, "name": "Grace"}}
]"#;

pub const SANDBOX_STUDENT_ENROLLMENTS: &str = r#"[
    {"type": "StudentEnrollment", "role": "StudentEnrollment", "enrollment_state": "active", "user": {"id": 42, "name": "Ada"}},
    {"type": "StudentEnrollment", "role": "StudentEnrollment", "enrollment_state": "active", "user": {"id": 44, "name": "Linus"}},
    {"type": "TeacherEnrollment", "role": "TeacherEnrollment", "enrollment_state": "active", "user": {"id": 1, "name": "Ms. Frizzle"}}
]"#;

pub const MATH_ASSIGNMENTS: &str = r#"[
    {"id": 10, "name": "Fractions", "due_at": "2024-01-01", "points_possible": 100}
]"#;

/// Carries `submitted_at`, which is what makes the assignment count as completed.
pub const MATH_SUBMISSIONS: &str = r#"[
    {"assignment_id": 10, "score": 90, "late": false, "submitted_at": "2023-12-31T18:00:00Z", "workflow_state": "graded"}
]"#;

/// Newline delimited JSON as streamed by Ollama's `/api/generate`.
pub fn ollama_stream(chunks: &[&str]) -> String {
    let mut lines = chunks
        .iter()
        .map(|chunk| {
            return serde_json::json!({ "response": chunk, "done": false }).to_string();
        })
        .collect::<Vec<String>>();
    lines.push(serde_json::json!({ "response": "", "done": true }).to_string());

    return lines.join("\n");
}

/// Server sent events as streamed by OpenAI compatible `/v1/chat/completions`.
pub fn openai_stream(chunks: &[&str]) -> String {
    let mut lines = chunks
        .iter()
        .map(|chunk| {
            let payload = serde_json::json!({ "choices": [{ "delta": { "content": chunk } }] });
            return format!("data: {payload}\n");
        })
        .collect::<Vec<String>>();
    lines.push("data: [DONE]\n".to_string());

    return lines.join("\n");
}
