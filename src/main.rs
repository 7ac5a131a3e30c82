use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use webpilot::{run_task_with_sanitizer, ChromePage, PageDriver, SanitizeConfig, TaskConfig};

/// Complete a natural-language task against a web page.
#[derive(Parser, Debug)]
#[command(name = "webpilot", version, about)]
struct Args {
    /// The task to perform, in plain language
    task: String,

    /// URL to open before starting the task
    #[arg(long)]
    url: Option<String>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// JSON file with the sanitizer allow-list (allowedTags /
    /// allowedAttributes)
    #[arg(long)]
    sanitizer_config: Option<PathBuf>,

    /// Verbose tracing of the tool-call loop
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let mut config = TaskConfig {
        debug: args.debug,
        ..TaskConfig::default()
    };
    if let Some(model) = args.model {
        config.model = model;
    }

    info!("launching browser");
    let page = Arc::new(ChromePage::launch(!args.headed)?);

    if let Some(url) = &args.url {
        info!(url, "opening start page");
        page.navigate(url).await?;
    }

    let sanitize = match &args.sanitizer_config {
        Some(path) => SanitizeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SanitizeConfig::default(),
    };

    let result = run_task_with_sanitizer(&args.task, page, &config, sanitize).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
