use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use brsr_core::model::{
    ActiveQuestion, CompanyId, FinancialYear, ModuleId, PlantDraft, PlantId, Question,
    QuestionId, QuestionType, ReportScope,
};
use brsr_core::validation::AnswerForm;
use services::{ApiConfig, AppServices, Clock, SaveTarget};
use storage::repository::AnswerScope;

mod render;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required for this command"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  brsr login    --email <email> --password <password>");
    eprintln!("  brsr logout");
    eprintln!("  brsr plants");
    eprintln!("  brsr add-plant --code <code> --name <name> [--type <type>] [--address <text>]");
    eprintln!("  brsr progress --module <id> --plant <id> [--fy <YYYY-YYYY>]");
    eprintln!("  brsr answer   --module <id> --plant <id> --question <id> --value <text|json>");
    eprintln!("  brsr ask      --module <id> --question <id>");
    eprintln!("  brsr doc-chat --file <path> --prompt <text>");
    eprintln!();
    eprintln!("Shared flags:");
    eprintln!("  --db <sqlite_url>   local store (default sqlite://brsr.sqlite3)");
    eprintln!("  --company <id>      company when the login carries none");
    eprintln!("  --fy <YYYY-YYYY>    financial year, remembered in the session");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  BRSR_DB_URL, BRSR_API_BASE_URL, BRSR_AI_BASE_URL, BRSR_RAG_BASE_URL,");
    eprintln!("  BRSR_API_TOKEN, BRSR_HTTP_TIMEOUT_SECS, BRSR_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Login,
    Logout,
    Plants,
    AddPlant,
    Progress,
    Answer,
    Ask,
    DocChat,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "plants" => Some(Self::Plants),
            "add-plant" => Some(Self::AddPlant),
            "progress" => Some(Self::Progress),
            "answer" => Some(Self::Answer),
            "ask" => Some(Self::Ask),
            "doc-chat" => Some(Self::DocChat),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: String,
    company: Option<CompanyId>,
    financial_year: Option<FinancialYear>,
    module: Option<ModuleId>,
    plant: Option<PlantId>,
    question: Option<QuestionId>,
    value: Option<String>,
    email: Option<String>,
    password: Option<String>,
    code: Option<String>,
    name: Option<String>,
    plant_type: Option<String>,
    address: Option<String>,
    file: Option<PathBuf>,
    prompt: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("BRSR_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://brsr.sqlite3".into(), normalize_sqlite_url),
            password: std::env::var("BRSR_PASSWORD").ok(),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--company" => parsed.company = Some(parse_flag(args, "--company")?),
                "--fy" => parsed.financial_year = Some(parse_flag(args, "--fy")?),
                "--module" => parsed.module = Some(parse_flag(args, "--module")?),
                "--plant" => parsed.plant = Some(parse_flag(args, "--plant")?),
                "--question" => parsed.question = Some(parse_flag(args, "--question")?),
                "--value" => parsed.value = Some(require_value(args, "--value")?),
                "--email" => parsed.email = Some(require_value(args, "--email")?),
                "--password" => parsed.password = Some(require_value(args, "--password")?),
                "--code" => parsed.code = Some(require_value(args, "--code")?),
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--type" => parsed.plant_type = Some(require_value(args, "--type")?),
                "--address" => parsed.address = Some(require_value(args, "--address")?),
                "--file" => parsed.file = Some(PathBuf::from(require_value(args, "--file")?)),
                "--prompt" => parsed.prompt = Some(require_value(args, "--prompt")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn parse_flag<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn required<T: Clone>(value: &Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.clone().ok_or(ArgsError::MissingFlag { flag })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Turn a raw `--value` into the form layout the question expects.
fn form_for(question: &Question, raw: &str) -> Result<AnswerForm, ArgsError> {
    let invalid = || ArgsError::InvalidValue {
        flag: "--value",
        raw: raw.to_string(),
    };
    Ok(match question.question_type() {
        QuestionType::Table | QuestionType::TableWithAdditionalRows => {
            let rows: Vec<Value> = serde_json::from_str(raw).map_err(|_| invalid())?;
            let rows = rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(map) => Ok(map),
                    _ => Err(invalid()),
                })
                .collect::<Result<_, _>>()?;
            AnswerForm::Table { rows }
        }
        QuestionType::Subjective if question.sub_fields().is_empty() => AnswerForm::Text {
            value: raw.to_string(),
        },
        QuestionType::Subjective => {
            let fields = match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(fields)) => fields,
                _ => return Err(invalid()),
            };
            AnswerForm::Subjective {
                text: String::new(),
                fields,
            }
        }
        QuestionType::Decimal => AnswerForm::Decimal {
            raw: raw.to_string(),
        },
        QuestionType::Link => AnswerForm::Link {
            value: raw.to_string(),
        },
        QuestionType::Note => AnswerForm::Note {
            value: raw.to_string(),
        },
        QuestionType::Boolean => {
            let (flag, rest) = raw.split_once(':').unwrap_or((raw, ""));
            let value = match flag.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "y" => Some(true),
                "no" | "false" | "n" => Some(false),
                "" => None,
                _ => return Err(invalid()),
            };
            if question.is_provisions() {
                AnswerForm::Provisions {
                    has_provisions: value,
                    explanation: rest.trim().to_string(),
                }
            } else {
                AnswerForm::Boolean { value }
            }
        }
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BRSR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let config = ApiConfig::from_env()?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::system(), &config).await?;
    let session = services.session();

    if let Some(company) = parsed.company.clone() {
        session.set_company(company).await?;
    }
    if let Some(financial_year) = parsed.financial_year {
        session.set_financial_year(financial_year).await?;
    }
    debug!(?cmd, db = %parsed.db_url, "running command");

    match cmd {
        Command::Login => {
            let email = required(&parsed.email, "--email")?;
            let password = required(&parsed.password, "--password")?;
            let user = session.login(&email, &password).await?;
            println!("logged in as {}", user.email);
        }
        Command::Logout => {
            session.logout().await?;
            println!("logged out");
        }
        Command::Plants => {
            let plants = services.plants().list().await?;
            print!("{}", render::plant_list(&plants));
        }
        Command::AddPlant => {
            let draft = PlantDraft {
                company_id: parsed.company.clone(),
                code: parsed.code.clone().unwrap_or_default(),
                name: parsed.name.clone().unwrap_or_default(),
                plant_type: parsed.plant_type.clone(),
                address: parsed.address.clone(),
            };
            let plant = services.plants().create(draft).await?;
            println!("created plant {} ({})", plant.code, plant.id);
        }
        Command::Progress => {
            let module_id = required(&parsed.module, "--module")?;
            let plant_id = required(&parsed.plant, "--plant")?;
            let scope = ReportScope {
                company_id: session.require_company().await?,
                plant_id,
                financial_year: session.require_financial_year().await?,
            };

            let progress = services.progress();
            let mut module = progress.load_module(&module_id).await?;
            progress.expand_all(&mut module).await?;
            services.answers().load(&scope, &module).await?;
            let summary = progress
                .module_progress(&module, &AnswerScope::new(module_id, &scope))
                .await?;
            print!("{}", render::progress_tree(&summary));
        }
        Command::Answer => {
            let module_id = required(&parsed.module, "--module")?;
            let question_id = required(&parsed.question, "--question")?;
            let raw = required(&parsed.value, "--value")?;

            let progress = services.progress();
            let mut module = progress.load_module(&module_id).await?;
            progress.expand_all(&mut module).await?;
            let question = module
                .find_question(&question_id)
                .ok_or(ArgsError::InvalidValue {
                    flag: "--question",
                    raw: question_id.to_string(),
                })?;

            let form = form_for(question, &raw)?;
            let target = SaveTarget {
                module_id: Some(module_id),
                plant_id: parsed.plant.clone(),
            };
            match services.answers().save(&target, question, form).await {
                Ok(record) => println!("saved {}", record.question_id),
                Err(err) => {
                    if let Some(errors) = err.validation() {
                        for field in errors.errors() {
                            eprintln!("{}: {}", field.field, field.message);
                        }
                    }
                    return Err(err.into());
                }
            }
        }
        Command::Ask => {
            let module_id = required(&parsed.module, "--module")?;
            let question_id = required(&parsed.question, "--question")?;

            let progress = services.progress();
            let mut module = progress.load_module(&module_id).await?;
            progress.expand_all(&mut module).await?;
            let question = module
                .find_question(&question_id)
                .ok_or(ArgsError::InvalidValue {
                    flag: "--question",
                    raw: question_id.to_string(),
                })?;

            let current = match parsed.plant.clone() {
                Some(plant_id) => {
                    let scope = AnswerScope {
                        module_id: module_id.clone(),
                        company_id: session.require_company().await?,
                        plant_id,
                        financial_year: session.require_financial_year().await?,
                    };
                    services
                        .answers()
                        .local(&scope)
                        .await?
                        .answer(&question_id)
                        .cloned()
                }
                None => None,
            };
            session
                .activate_question(ActiveQuestion::from_question(question, module_id, current))
                .await?;
            let active = session
                .active_question()
                .await?
                .ok_or(ArgsError::MissingFlag { flag: "--question" })?;
            let reply = services.assistant().draft_answer(&active).await?;
            println!("{}", render::assistant_reply(&reply));
        }
        Command::DocChat => {
            let file = required(&parsed.file, "--file")?;
            let prompt = required(&parsed.prompt, "--prompt")?;
            let bytes = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".into());

            let rag = services.rag();
            let file_id = rag.upload(&file_name, bytes).await?;
            println!("{}", rag.chat(&file_id, &prompt).await?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
