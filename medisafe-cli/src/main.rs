mod console;
mod render;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medisafe_flow::{
    AnalysisService, DashboardState, DirectorySink, HttpAnalysisService, InteractionWorkflow,
    View, WorkflowConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{console::ConsoleNotifier, render::render, shell::Shell};

#[derive(Parser)]
#[command(name = "medisafe")]
#[command(version, about = "Ask the MediSafe analysis service about drug interactions")]
struct Cli {
    /// Base URL of the analysis service, including the /api prefix
    #[arg(long, global = true, env = "MEDISAFE_API_BASE")]
    api_base: Option<String>,

    /// User id sent with each query
    #[arg(long, global = true, env = "MEDISAFE_USER_ID")]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one question and print the result
    Ask {
        question: String,

        /// Also save a text report into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,

        /// Print the raw service response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent analyses
    History {
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Show aggregate statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Interactive dashboard
    Shell {
        /// Directory exported reports are written to
        #[arg(long, value_name = "DIR", default_value = ".")]
        reports: PathBuf,
    },
}

/// Initialize tracing; `LOG_FORMAT=json` switches to structured output
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medisafe_cli=info,medisafe_flow=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

fn build_config(cli: &Cli) -> WorkflowConfig {
    let mut config = WorkflowConfig::from_env();
    if let Some(api_base) = &cli.api_base {
        config = config.with_api_base(api_base.clone());
    }
    if let Some(user_id) = &cli.user_id {
        config = config.with_user_id(user_id.clone());
    }
    config
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = build_config(&cli);
    info!(api_base = %config.api_base, "Using analysis service");

    match cli.command {
        Command::Ask {
            question,
            export,
            json,
        } => {
            let workflow = InteractionWorkflow::connect(config, Arc::new(ConsoleNotifier))?;
            let Ok(result) = shell::ask_with_progress(&workflow, &question).await else {
                return Ok(ExitCode::FAILURE);
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render(View::Result, &workflow.snapshot()));
            }

            if let Some(dir) = export {
                let sink = DirectorySink::new(dir);
                let report = workflow
                    .export_current_result(&sink)
                    .await
                    .context("exporting report")?;
                println!("Saved {}", sink.path_for(&report).display());
            }
        }
        Command::History { limit, json } => {
            let service = HttpAnalysisService::new(&config)?;
            let history = service
                .fetch_history(limit.unwrap_or(config.history_limit))
                .await
                .context("fetching history")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                let state = DashboardState {
                    history,
                    ..DashboardState::new()
                };
                print!("{}", render(View::History, &state));
            }
        }
        Command::Stats { json } => {
            let service = HttpAnalysisService::new(&config)?;
            let stats = service.fetch_stats().await.context("fetching stats")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let state = DashboardState {
                    stats: Some(stats),
                    ..DashboardState::new()
                };
                print!("{}", render(View::Query, &state));
            }
        }
        Command::Shell { reports } => {
            let workflow = InteractionWorkflow::connect(config, Arc::new(ConsoleNotifier))?;
            Shell::new(workflow, reports).run().await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
