use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "openai" or "mock"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: u64,
    pub progress_interval_ms: u64,
    pub mock_step_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub data_dir: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Directory for data storage
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// LLM backend: "openai" or "mock"
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Generate a schema and print it
    Generate(GenerateArgs),
    /// Check an input without generating anything
    Validate(InputArgs),
    /// List the built-in example prompts
    Examples,
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Natural-language description of the database
    #[arg(short, long)]
    pub description: Option<String>,

    /// SQL file to improve or analyze
    #[arg(short, long, value_name = "FILE")]
    pub sql_file: Option<PathBuf>,

    /// Use a built-in example prompt as the description
    #[arg(short, long, conflicts_with = "description")]
    pub example: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Use the offline mock generator regardless of the configured backend
    #[arg(long)]
    pub mock: bool,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder()
            .set_default("database.connection_string", "schemagen.duckdb")?
            .set_default("database.pool_size", 5_i64)?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000_i64)?
            .set_default("llm.backend", "mock")?
            .set_default("llm.model", "gpt-4")?
            .set_default("llm.timeout_secs", 60_i64)?
            .set_default("llm.progress_interval_ms", 500_i64)?
            .set_default("llm.mock_step_delay_ms", 500_i64)?
            .set_default("data_dir", "data")?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = [
                "config.toml",
                "config/config.toml",
                "/etc/schemagen/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // SCHEMAGEN_LLM__API_KEY, SCHEMAGEN_WEB__PORT, ...
        config_builder = config_builder.add_source(
            Environment::with_prefix("SCHEMAGEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(backend) = &args.backend {
            config.llm.backend = backend.clone();
        }

        // The conventional variable is the last resort for the credential
        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.is_empty());
        }

        Ok(config)
    }

    /// Location of the project database. Relative paths live under `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.connection_string);
        if path.is_absolute() {
            path
        } else {
            PathBuf::from(&self.data_dir).join(path)
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "mock".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            api_url: None,
            timeout_secs: 60,
            progress_interval_ms: 500,
            mock_step_delay_ms: 500,
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "schemagen.duckdb".to_string(),
                pool_size: 5,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig::default(),
            data_dir: "data".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_with_file(path: &Path) -> CliArgs {
        CliArgs::parse_from(["schemagen", "--config", path.to_str().unwrap(), "--port", "8088"])
    }

    #[test]
    fn test_file_values_and_cli_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/tmp/schemagen-test"

[web]
host = "0.0.0.0"
port = 4000

[llm]
backend = "openai"
api_key = "sk-from-file"
timeout_secs = 5
"#
        )
        .unwrap();

        let config = AppConfig::new(&args_with_file(file.path())).unwrap();
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 8088);
        assert_eq!(config.llm.backend, "openai");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/schemagen-test/schemagen.duckdb")
        );
    }

    #[test]
    fn test_subcommand_parsing() {
        let args = CliArgs::parse_from([
            "schemagen",
            "generate",
            "--example",
            "blog",
            "--mock",
            "--backend",
            "mock",
        ]);
        match args.command {
            Some(Command::Generate(generate)) => {
                assert!(generate.mock);
                assert_eq!(generate.input.example.as_deref(), Some("blog"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.backend.as_deref(), Some("mock"));
    }
}
