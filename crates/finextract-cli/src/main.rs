//! FinExtract CLI - extract financial data from news articles

mod render;

use clap::{Parser, Subcommand, ValueEnum};
use finextract::{
    ApiConfig, ConversationDriver, FinancialExtractor, HttpTransport, SamplingParams,
    ToolRegistry, DEFAULT_MAX_TURNS,
};
use std::io::{self, Write};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Output format for the extract subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Field table, summary or error block
    #[default]
    Text,
    /// JSON object with status, result and raw response
    Json,
}

/// FinExtract - financial facts from news articles via AI
///
/// Reads SG_ACCESS_TOKEN, SG_MODELS_ENDPOINT, SG_CHAT_COMPLETIONS_ENDPOINT
/// and the optional X_Requested_With from the environment.
#[derive(Parser, Debug)]
#[command(name = "finextract")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the models offered by the endpoint
    Models,
    /// Extract company name, symbol, revenue, net income and EPS from an article
    Extract {
        /// Article URL
        url: String,

        /// Model id (defaults to the first listed model)
        #[arg(long, short)]
        model: Option<String>,

        /// Maximum tokens in the answer (100-4000)
        #[arg(long, default_value_t = 1000)]
        max_tokens: u32,

        /// Sampling temperature (0.0-2.0)
        #[arg(long, default_value_t = 0.3)]
        temperature: f32,

        /// Nucleus sampling threshold (0.0-1.0)
        #[arg(long, default_value_t = 0.95)]
        top_p: f32,

        /// Maximum tool turns before giving up
        #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
        max_turns: usize,

        /// Also offer the article extraction tool to the model
        #[arg(long)]
        with_article_tool: bool,

        /// Output format
        #[arg(long, short, default_value = "text")]
        output: OutputFormat,

        /// Append the raw API response to text output
        #[arg(long)]
        raw: bool,
    },
    /// Print the tool specs sent to the model
    Tools {
        /// Include the article extraction tool
        #[arg(long)]
        with_article_tool: bool,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Models => run_models().await,
        Commands::Extract {
            url,
            model,
            max_tokens,
            temperature,
            top_p,
            max_turns,
            with_article_tool,
            output,
            raw,
        } => {
            let sampling = SamplingParams {
                max_tokens,
                temperature,
                top_p,
            };
            let options = ExtractOptions {
                model,
                sampling,
                max_turns,
                with_article_tool,
                output,
                raw,
            };
            run_extract(&url, options).await;
        }
        Commands::Tools { with_article_tool } => {
            writeln_safe(&render::format_tools(&registry(with_article_tool)));
        }
    }
}

/// Logs go to stderr so stdout carries only results
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

struct ExtractOptions {
    model: Option<String>,
    sampling: SamplingParams,
    max_turns: usize,
    with_article_tool: bool,
    output: OutputFormat,
    raw: bool,
}

fn registry(with_article_tool: bool) -> ToolRegistry {
    let registry = ToolRegistry::with_defaults();
    if with_article_tool {
        registry.with_article_tool()
    } else {
        registry
    }
}

fn transport() -> HttpTransport {
    let config = ApiConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Set SG_ACCESS_TOKEN, SG_MODELS_ENDPOINT and SG_CHAT_COMPLETIONS_ENDPOINT.");
        std::process::exit(1);
    });
    HttpTransport::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

async fn run_models() {
    let transport = transport();
    match transport.fetch_models().await {
        Ok(models) if models.data.is_empty() => {
            eprintln!("No models available");
            std::process::exit(1);
        }
        Ok(models) => writeln_safe(&render::format_models(&models.data)),
        Err(e) => {
            error!(error = %e, "Failed to list models");
            eprintln!("Error fetching models: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_extract(url: &str, options: ExtractOptions) {
    if let Err(e) = options.sampling.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    if options.max_turns == 0 {
        eprintln!("Error: --max-turns must be at least 1");
        std::process::exit(1);
    }

    let transport = transport();
    let model = match options.model {
        Some(model) => model,
        None => first_model(&transport).await,
    };
    debug!(model = %model, "Selected model");

    let driver = ConversationDriver::new(transport, registry(options.with_article_tool))
        .max_turns(options.max_turns);
    let extractor = FinancialExtractor::new(driver);
    let report = extractor.process(url, &model, options.sampling).await;

    match options.output {
        OutputFormat::Text => writeln_safe(&render::format_report_text(&report, options.raw)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&render::report_json(&report))
                .unwrap_or_else(|e| {
                    eprintln!("Error serializing report: {}", e);
                    std::process::exit(1);
                });
            writeln_safe(&json);
        }
    }

    if report.extraction.is_error() {
        std::process::exit(1);
    }
}

async fn first_model(transport: &HttpTransport) -> String {
    match transport.fetch_models().await {
        Ok(models) => match models.data.into_iter().next() {
            Some(model) => model.id,
            None => {
                eprintln!("Error: no models available; pass --model");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error fetching models: {}", e);
            std::process::exit(1);
        }
    }
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_defaults() {
        let cli = Cli::try_parse_from(["finextract", "extract", "https://news.example.com/a"])
            .unwrap();
        match cli.command {
            Commands::Extract {
                url,
                model,
                max_tokens,
                temperature,
                top_p,
                max_turns,
                with_article_tool,
                output,
                raw,
            } => {
                assert_eq!(url, "https://news.example.com/a");
                assert!(model.is_none());
                assert_eq!(max_tokens, 1000);
                assert_eq!(temperature, 0.3);
                assert_eq!(top_p, 0.95);
                assert_eq!(max_turns, DEFAULT_MAX_TURNS);
                assert!(!with_article_tool);
                assert!(matches!(output, OutputFormat::Text));
                assert!(!raw);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_extract_options() {
        let cli = Cli::try_parse_from([
            "finextract",
            "extract",
            "https://news.example.com/a",
            "--model",
            "gpt-4o",
            "--temperature",
            "0.7",
            "--output",
            "json",
            "--with-article-tool",
            "--raw",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract {
                model,
                temperature,
                output,
                with_article_tool,
                raw,
                ..
            } => {
                assert_eq!(model.as_deref(), Some("gpt-4o"));
                assert_eq!(temperature, 0.7);
                assert!(matches!(output, OutputFormat::Json));
                assert!(with_article_tool);
                assert!(raw);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_registry_selection() {
        assert_eq!(registry(false).len(), 1);
        assert_eq!(registry(true).len(), 2);
    }
}
