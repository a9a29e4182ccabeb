#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::env;
use std::io;
use std::path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::printer;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::models::Course;
use crate::domain::models::Role;
use crate::domain::models::User;
use crate::domain::services::prompts;
use crate::domain::services::Aggregator;
use crate::domain::services::Relay;
use crate::domain::services::Roster;
use crate::domain::services::SessionManager;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::canvas::Canvas;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

/// Picks the requested student, or the only visible one when none was asked
/// for.
pub fn select_student(students: &[User], requested: Option<u64>) -> Result<User> {
    if let Some(id) = requested {
        return students
            .iter()
            .find(|student| return student.id == id)
            .cloned()
            .ok_or_else(|| return anyhow!("No student with ID {id} is visible to this account"));
    }

    match students {
        [] => bail!("No students are visible to this account"),
        [student] => return Ok(student.clone()),
        _ => {
            let list = students
                .iter()
                .map(|student| return format!("- (ID: {}) {}", student.id, student.name))
                .collect::<Vec<String>>()
                .join("\n");
            bail!(format!(
                "Several students are visible, pick one with --student:\n{list}"
            ));
        }
    }
}

/// Same as `select_student` for a student's courses.
pub fn select_course(courses: &[Course], requested: Option<u64>) -> Result<Course> {
    if let Some(id) = requested {
        return courses
            .iter()
            .find(|course| return course.id == id)
            .cloned()
            .ok_or_else(|| return anyhow!("Course {id} is not an active course for this student"));
    }

    match courses {
        [] => bail!("The student has no active courses"),
        [course] => return Ok(course.clone()),
        _ => {
            let list = printer::format_courses(courses);
            bail!(format!(
                "Several courses are active, pick one with --course:\n{list}"
            ));
        }
    }
}

/// Role for the model session. The configured role wins, otherwise the
/// caller's own enrollment type is used.
pub fn resolve_role(roster: &Roster) -> String {
    let configured = Config::get(ConfigKey::Role);
    if !configured.is_empty() {
        return configured;
    }

    if let Some(viewer) = &roster.viewer {
        if !viewer.enrollment_type.is_empty() {
            return viewer.enrollment_type.to_string();
        }
    }

    return Role::Student.to_string();
}

async fn resolve_student(aggregator: &Aggregator, matches: &ArgMatches) -> Result<(Roster, User)> {
    let roster = aggregator.students().await?;
    let student = select_student(&roster.students, matches.get_one::<u64>("student").copied())?;

    return Ok((roster, student));
}

async fn run_students() -> Result<()> {
    let aggregator = Aggregator::new(Canvas::default());
    let roster = aggregator.students().await?;
    println!("{}", printer::format_students(&roster));

    return Ok(());
}

async fn run_courses(matches: &ArgMatches) -> Result<()> {
    let aggregator = Aggregator::new(Canvas::default());
    let (_, student) = resolve_student(&aggregator, matches).await?;
    let courses = aggregator.student_courses(student.id).await?;
    println!("{}", printer::format_courses(&courses));

    return Ok(());
}

async fn run_due(matches: &ArgMatches) -> Result<()> {
    let aggregator = Aggregator::new(Canvas::default());
    let (_, student) = resolve_student(&aggregator, matches).await?;
    let courses = aggregator.student_courses(student.id).await?;
    let items = aggregator
        .due_soon(&courses, &chrono::Local::now())
        .await?;
    println!("{}", printer::format_due(&items));

    return Ok(());
}

async fn run_summary(matches: &ArgMatches) -> Result<()> {
    let aggregator = Aggregator::new(Canvas::default());
    let (roster, student) = resolve_student(&aggregator, matches).await?;
    let courses = aggregator.student_courses(student.id).await?;
    let course = select_course(&courses, matches.get_one::<u64>("course").copied())?;

    let data = aggregator.summary(course.id, &student).await?;
    println!("{}\n", printer::format_summary(&student, &course, &data));

    if matches.get_flag("no-ai") {
        return Ok(());
    }

    let role_name = resolve_role(&roster);
    let role = Role::parse(&role_name)?;
    let prompt = prompts::summary_prompt(role, &student.name, &data.activities);

    let backend_name = BackendName::parse(Config::get(ConfigKey::Backend))
        .ok_or_else(|| return anyhow!("Unknown backend {}", Config::get(ConfigKey::Backend)))?;
    let backend = BackendManager::get(backend_name)?;
    let idle_timeout = Config::get(ConfigKey::GenerationTimeout).parse::<u64>()?;

    let sessions = Arc::new(SessionManager::new(backend));
    let relay = Relay::new(
        sessions.clone(),
        &role_name,
        Some(Duration::from_millis(idle_timeout)),
    );

    relay.prepare().await?;
    if let Some((session, role)) = sessions.current().await {
        tracing::info!(model = session.model(), %role, "Streaming summary");
    }

    let events = relay.open_stream(&prompt).await?;
    printer::print_stream(events, &mut io::stdout()).await?;
    relay.close_all();

    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for Gradebrief")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running Gradebrief with environment variable RUST_LOG=gradebrief")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn arg_student() -> Arg {
    return Arg::new("student")
        .long("student")
        .num_args(1)
        .value_parser(value_parser!(u64))
        .help("Canvas user ID of the student. Can be omitted when only one student is visible.");
}

fn arg_course() -> Arg {
    return Arg::new("course")
        .long("course")
        .num_args(1)
        .value_parser(value_parser!(u64))
        .help("Canvas course ID. Can be omitted when the student has a single active course.");
}

fn subcommand_summary() -> Command {
    return Command::new("summary")
        .about("Prints a student's assignments for a course, then streams a summary from the language model.")
        .arg(arg_student())
        .arg(arg_course())
        .arg(
            Arg::new("no-ai")
                .long("no-ai")
                .action(ArgAction::SetTrue)
                .help("Only print the assignments, skip the language model."),
        );
}

fn global_arg(key: ConfigKey, env_name: &str, help: String) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env_name.to_string())
        .num_args(1)
        .help(help)
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("gradebrief")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .subcommand(Command::new("students").about("Lists the students visible to this account."))
        .subcommand(
            Command::new("courses")
                .about("Lists a student's active courses.")
                .arg(arg_student()),
        )
        .subcommand(
            Command::new("due")
                .about("Lists assignments due between the previous and the next school day.")
                .arg(arg_student()),
        )
        .subcommand(subcommand_summary())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("GRADEBRIEF_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(global_arg(
            ConfigKey::ApiURL,
            "GRADEBRIEF_API_URL",
            "Base URL of the Canvas site, such as https://school.instructure.com.".to_string(),
        ))
        .arg(global_arg(
            ConfigKey::ApiToken,
            "GRADEBRIEF_API_TOKEN",
            "Canvas access token, sent as a bearer token.".to_string(),
        ))
        .arg(global_arg(
            ConfigKey::ApiCookie,
            "GRADEBRIEF_API_COOKIE",
            "Cookie header to send to Canvas when reusing a browser login.".to_string(),
        ))
        .arg(global_arg(
            ConfigKey::MaxRetries,
            "GRADEBRIEF_MAX_RETRIES",
            format!("Times a failed Canvas request is retried. [default: {}]", Config::default(ConfigKey::MaxRetries)),
        ))
        .arg(global_arg(
            ConfigKey::Role,
            "GRADEBRIEF_ROLE",
            "Who the summary is written for, student or observer. Defaults to the enrollment type of this account.".to_string(),
        ))
        .arg(
            global_arg(
                ConfigKey::Backend,
                "GRADEBRIEF_BACKEND",
                format!("The backend hosting a model to connect to. [default: {}]", Config::default(ConfigKey::Backend)),
            )
            .short('b')
            .value_parser(PossibleValuesParser::new(BackendName::VARIANTS)),
        )
        .arg(
            global_arg(
                ConfigKey::Model,
                "GRADEBRIEF_MODEL",
                "The model on a backend to consume. Defaults to the first model available from the backend if not set.".to_string(),
            )
            .short('m'),
        )
        .arg(global_arg(
            ConfigKey::BackendHealthCheckTimeout,
            "GRADEBRIEF_BACKEND_HEALTH_CHECK_TIMEOUT",
            format!("Time to wait in milliseconds before timing out when doing a healthcheck for a backend. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)),
        ))
        .arg(global_arg(
            ConfigKey::GenerationTimeout,
            "GRADEBRIEF_GENERATION_TIMEOUT",
            format!("Time to wait in milliseconds for the next piece of model output, 0 waits forever. [default: {}]", Config::default(ConfigKey::GenerationTimeout)),
        ))
        .arg(global_arg(
            ConfigKey::OllamaURL,
            "GRADEBRIEF_OLLAMA_URL",
            format!("Ollama API URL when using the Ollama backend. [default: {}]", Config::default(ConfigKey::OllamaURL)),
        ))
        .arg(global_arg(
            ConfigKey::OpenaiURL,
            "GRADEBRIEF_OPENAI_URL",
            format!("OpenAI compatible API URL when using the OpenAI backend. [default: {}]", Config::default(ConfigKey::OpenaiURL)),
        ))
        .arg(global_arg(
            ConfigKey::OpenaiToken,
            "GRADEBRIEF_OPENAI_TOKEN",
            "OpenAI API token when using the OpenAI backend.".to_string(),
        ));
}

pub async fn parse() -> Result<()> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => match debug_matches.subcommand() {
            Some(("log-path", _)) => {
                let log_dir = env::var("GRADEBRIEF_LOG_DIR").map(path::PathBuf::from).unwrap_or_else(|_| {
                    return dirs::cache_dir()
                        .unwrap_or_else(env::temp_dir)
                        .join("gradebrief");
                });
                println!("{}", log_dir.join("debug.log").to_string_lossy());
            }
            Some(("enum-config", _)) => {
                println!("{}", ConfigKey::VARIANTS.join("\n"));
            }
            _ => {
                subcommand_debug().print_long_help()?;
            }
        },
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        Some(("students", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_students().await?;
        }
        Some(("courses", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_courses(subcmd_matches).await?;
        }
        Some(("due", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_due(subcmd_matches).await?;
        }
        Some(("summary", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            run_summary(subcmd_matches).await?;
        }
        _ => {
            build().print_long_help()?;
        }
    }

    return Ok(());
}
