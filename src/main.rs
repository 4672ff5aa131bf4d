use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use schemagen::config::{AppConfig, CliArgs, Command, GenerateArgs, InputArgs};
use schemagen::db::project_store::ProjectStore;
use schemagen::llm::models::{GenerationInput, Progress};
use schemagen::llm::prompts::{example_prompt, validate_input, EXAMPLE_PROMPTS};
use schemagen::llm::{LlmError, LlmManager};
use schemagen::util::logging::init_tracing;
use schemagen::web;
use schemagen::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Generate(generate_args) => generate(config, &generate_args).await,
        Command::Validate(input_args) => validate(&input_args),
        Command::Examples => {
            for (name, prompt) in EXAMPLE_PROMPTS {
                println!("{:<16} {}", name, prompt);
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn Error>> {
    // Ensure data directory exists
    let data_dir = PathBuf::from(&config.data_dir);
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
    }

    let project_store = ProjectStore::open(&config.database_path(), config.database.pool_size as u32)?;

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, llm_manager, project_store));

    // Start the web server
    info!("Starting schemagen server on {}:{}", web_config.host, web_config.port);
    match web::run_server(web_config, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

async fn generate(config: AppConfig, args: &GenerateArgs) -> Result<(), Box<dyn Error>> {
    let input = read_input(&args.input)?;
    let llm_manager = LlmManager::new(&config.llm)?;

    let show_progress = |p: Progress| eprintln!("[{:>3}%] {}", p.percent, p.message);
    let outcome = llm_manager
        .generate_schema(&input, args.mock, Some(&show_progress))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let result = &outcome.result;
    println!("{}\n", result.sql);
    println!("Explanation:\n{}\n", result.explanation);
    println!("Suggestions:");
    for suggestion in &result.suggestions {
        println!("  - {}", suggestion);
    }
    if let Some(cost) = &result.estimated_cost {
        println!("\nEstimated cost: {}", cost);
    }
    info!(
        "Generated {} schema with {} in {} ms",
        outcome.mode, outcome.model, outcome.duration_ms
    );

    Ok(())
}

fn validate(args: &InputArgs) -> Result<(), Box<dyn Error>> {
    let report = validate_input(&read_input(args)?);
    if report.is_valid {
        println!("Input is valid");
        return Ok(());
    }

    for message in &report.errors {
        println!("  - {}", message);
    }
    Err(LlmError::Validation(report.errors).into())
}

fn read_input(args: &InputArgs) -> Result<GenerationInput, Box<dyn Error>> {
    let description = match &args.example {
        Some(name) => Some(
            example_prompt(name)
                .ok_or_else(|| format!("Unknown example '{}'", name))?
                .to_string(),
        ),
        None => args.description.clone(),
    };

    let input = match &args.sql_file {
        Some(path) => {
            let sql = std::fs::read_to_string(path)?;
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            GenerationInput::from_sql(sql, file_name)
        }
        None => GenerationInput::default(),
    };

    Ok(match description {
        Some(description) => input.with_description(description),
        None => input,
    })
}
