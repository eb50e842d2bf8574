//! Command-line interface for renova.
//!
//! Provides commands for submitting a service request and watching it
//! through the pipeline, inspecting resolved configuration, and probing
//! the configured capabilities.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    ClaudeClient, ClaudeIntake, ClaudeRanker, HttpDirectory, StageAdapter, StageSet, StubDirectory,
    StubIntake, StubRanker,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{EventBus, Orchestrator};
use crate::domain::{JobEvent, JobStatus, JobSubmission};

/// renova - agent pipeline matching service requests with professionals
#[derive(Parser, Debug)]
#[command(name = "renova")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a service request and stream progress until it settles
    Submit {
        /// Free-text description of the work (reads stdin if omitted)
        prompt: Option<String>,

        #[arg(short, long)]
        city: String,

        #[arg(short, long)]
        state: String,

        #[arg(long)]
        zip_code: Option<String>,

        /// Photo URL to attach (repeatable)
        #[arg(long = "photo-url")]
        photo_urls: Vec<String>,

        /// Print the job id and exit without waiting for results
        #[arg(long)]
        no_follow: bool,

        /// Use the deterministic in-process capabilities even when
        /// credentials are configured
        #[arg(long)]
        stub: bool,
    },

    /// Show resolved configuration
    Config,

    /// Check connectivity of the configured stage capabilities
    Health,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Submit {
                prompt,
                city,
                state,
                zip_code,
                photo_urls,
                no_follow,
                stub,
            } => {
                let prompt = read_prompt(prompt)?;
                submit(
                    JobSubmission {
                        prompt,
                        city,
                        state,
                        zip_code,
                        photo_urls,
                    },
                    no_follow,
                    stub,
                )
                .await
            }
            Commands::Config => show_config(),
            Commands::Health => health().await,
        }
    }
}

/// Prompt from the argument, or stdin when piped in
fn read_prompt(arg: Option<String>) -> Result<String> {
    if let Some(prompt) = arg {
        return Ok(prompt);
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read prompt from stdin")?;
    Ok(buffer.trim().to_string())
}

/// Assemble the capability set from configuration.
///
/// Intake and ranking go live when an API key is present, the directory
/// when its URL is configured; anything unconfigured runs as a stub so
/// the pipeline always works end to end.
fn build_stages(config: &ResolvedConfig, force_stub: bool) -> StageSet {
    if force_stub {
        return StageSet::stubbed();
    }

    let claude = config
        .anthropic_api_key
        .as_ref()
        .map(|key| ClaudeClient::new(key.clone(), config.model.clone()));

    let (intake, rank): (
        crate::adapters::IntakeAdapter,
        crate::adapters::RankAdapter,
    ) = match claude {
        Some(client) => (
            Arc::new(ClaudeIntake::new(client.clone(), config.intake_timeout)),
            Arc::new(ClaudeRanker::new(client, config.rank_timeout)),
        ),
        None => (Arc::new(StubIntake::new()), Arc::new(StubRanker::new())),
    };

    let search: crate::adapters::SearchAdapter = match &config.directory_url {
        Some(url) => Arc::new(HttpDirectory::new(url.clone(), config.search_timeout)),
        None => Arc::new(StubDirectory::new()),
    };

    StageSet {
        intake,
        search,
        rank,
    }
}

async fn submit(submission: JobSubmission, no_follow: bool, force_stub: bool) -> Result<()> {
    let config = config::get()?;
    let stages = build_stages(config, force_stub);
    let orchestrator = Orchestrator::new(stages, EventBus::new(config.stream_ceiling));

    let job_id = orchestrator
        .submit(submission)
        .context("Submission rejected")?;

    println!("Job {} queued", job_id);

    if no_follow {
        return Ok(());
    }

    let mut subscription = orchestrator
        .subscribe(job_id)
        .context("Failed to open progress stream")?;

    while let Some(event) = subscription.next().await {
        match &event {
            JobEvent::Progress(progress) => {
                println!("  [{}] {}", progress.stage, progress.message);
            }
            JobEvent::Error(error) => {
                println!("  [error:{}] {}", error.stage, error.error);
            }
        }
    }

    let job = orchestrator.status(job_id)?;
    match job.status {
        JobStatus::Completed => {
            let result = job
                .result
                .context("Completed job is missing its result")?;
            println!("\n{} match(es):", result.count);
            for (i, m) in result.matches.iter().enumerate() {
                println!("  {}. {} (score {:.0})", i + 1, m.professional_id, m.score);
                println!("     {}", m.reason);
                if let Some(concerns) = &m.concerns {
                    println!("     Concerns: {}", concerns);
                }
            }
            Ok(())
        }
        JobStatus::Failed => {
            let failure = job.error.context("Failed job is missing its error")?;
            anyhow::bail!("Job failed at {}: {}", failure.stage, failure.message)
        }
        status => {
            // Stream ceiling hit before the job settled
            println!("Gave up waiting; job was still {}", status);
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config = config::get()?;

    println!("Resolved configuration:");
    match &config.config_file {
        Some(path) => println!("  config file:   {}", path.display()),
        None => println!("  config file:   (none found)"),
    }
    println!(
        "  anthropic key: {}",
        if config.anthropic_api_key.is_some() {
            "configured"
        } else {
            "not set (stub intake/rank)"
        }
    );
    println!("  model:         {}", config.model);
    match &config.directory_url {
        Some(url) => println!("  directory:     {}", url),
        None => println!("  directory:     not set (stub search)"),
    }
    println!("  timeouts:      intake {:?}, search {:?}, rank {:?}",
        config.intake_timeout, config.search_timeout, config.rank_timeout
    );
    println!("  stream ceiling: {:?}", config.stream_ceiling);

    Ok(())
}

async fn health() -> Result<()> {
    let config = config::get()?;
    let stages = build_stages(config, false);

    let checks: [(&str, Result<(), crate::adapters::StageError>); 3] = [
        (stages.intake.name(), stages.intake.health_check().await),
        (stages.search.name(), stages.search.health_check().await),
        (stages.rank.name(), stages.rank.health_check().await),
    ];

    let mut failures = 0;
    for (name, result) in checks {
        match result {
            Ok(()) => println!("  {:<15} ok", name),
            Err(e) => {
                failures += 1;
                println!("  {:<15} FAILED: {}", name, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} capability check(s) failed", failures);
    }
    Ok(())
}
