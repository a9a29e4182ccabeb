use anyhow::Result;

use super::Config;
use super::ConfigKey;
use crate::application::cli;

#[test]
fn it_serializes_to_valid_toml() -> Result<()> {
    let res = Config::serialize_default(cli::build());
    let doc = res.parse::<toml_edit::Document>()?;

    assert_eq!(doc.get("backend").and_then(|e| return e.as_str()), Some("ollama"));
    assert_eq!(
        doc.get("generation-timeout").and_then(|e| return e.as_integer()),
        Some(120000)
    );
    assert!(res.contains("# api-url = \"\""));
    assert!(res.contains("[possible values: ollama, openai]"));
    assert!(!res.contains("config-file"));

    return Ok(());
}

#[test]
fn it_parses_example_config() -> Result<()> {
    let toml_str = std::fs::read_to_string("./config.example.toml")?;
    let values = Config::parse_toml(&cli::build(), &toml_str)?;

    assert!(values.contains(&(
        ConfigKey::ApiURL,
        "https://school.instructure.com".to_string()
    )));
    assert!(values.contains(&(ConfigKey::Backend, "ollama".to_string())));
    assert!(values.contains(&(ConfigKey::MaxRetries, "3".to_string())));
    assert!(!values.iter().any(|(key, _)| return *key == ConfigKey::ApiToken));

    return Ok(());
}

#[test]
fn it_rejects_invalid_possible_values() {
    let res = Config::parse_toml(&cli::build(), "backend = \"skynet\"");

    assert!(res
        .unwrap_err()
        .to_string()
        .starts_with("config.toml has an invalid value for key 'backend': skynet"));
}

#[test]
fn it_rejects_non_scalar_values() {
    let res = Config::parse_toml(&cli::build(), "model = [\"a\", \"b\"]");
    assert!(res.is_err());
}

#[tokio::test]
async fn it_loads_config_from_file() -> Result<()> {
    let matches = cli::build().try_get_matches_from(vec![
        "gradebrief",
        "-c",
        "./config.example.toml",
        "students",
    ])?;
    Config::load(cli::build(), vec![&matches]).await?;
    return Ok(());
}

#[tokio::test]
async fn it_fails_to_loads_config_from_file() -> Result<()> {
    let matches = cli::build().try_get_matches_from(vec![
        "gradebrief",
        "-c",
        "./test/bad-config.toml",
        "students",
    ])?;
    let res = Config::load(cli::build(), vec![&matches]).await;
    assert!(res.is_err());
    return Ok(());
}
