use super::resolve_model;
use crate::domain::models::BackendName;

fn models() -> Vec<String> {
    return vec!["llama3:latest".to_string(), "mistral:7b".to_string()];
}

#[test]
fn it_defaults_to_first_model() {
    let res = resolve_model(BackendName::Ollama, "", models()).unwrap();
    assert_eq!(res, "llama3:latest");
}

#[test]
fn it_accepts_untagged_model_names() {
    let res = resolve_model(BackendName::Ollama, "llama3", models()).unwrap();
    assert_eq!(res, "llama3");
}

#[test]
fn it_rejects_unknown_models() {
    let res = resolve_model(BackendName::Ollama, "gpt-4", models());
    assert_eq!(
        res.unwrap_err().to_string(),
        "No model named gpt-4 found in backend ollama. Did you mistype it?"
    );
}

#[test]
fn it_fails_without_models() {
    let res = resolve_model(BackendName::OpenAI, "", vec![]);
    assert_eq!(
        res.unwrap_err().to_string(),
        "Backend openai has no models available"
    );
}
