// ABOUTME: Command-line front end for submitting and tracking backend-generation jobs
// ABOUTME: Renders poll progress, previews and download links for the user

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use orchesity_generator::config::{self, ClientConfig};
use orchesity_generator::remote::{
    GenerationRequest, GenerationStatus, JobId, PollObserver, PollOutcome, PollingClient,
    ProjectPreview,
};
use orchesity_generator::{AuthContext, ClientError, GeneratorClient, JobTracker, TrackerState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "orchesity-generator")]
#[command(about = "Generate backend projects with OrchesityAI and track their progress")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Override the status poll interval in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a generation job and follow it to completion
    Generate(GenerateArgs),
    /// Print the current status of a job
    Status { job_id: String },
    /// Follow one or more jobs until they finish
    Watch {
        #[arg(required = true)]
        job_ids: Vec<String>,
    },
    /// Show the generated project's file listing
    Preview {
        job_id: String,
        /// Print the raw JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
    /// Print a time-limited download link
    Download { job_id: String },
    /// Store an access token for later commands
    Login {
        /// Token to store; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// What the backend should do
    #[arg(long)]
    prompt: String,
    /// Project name
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "fastapi")]
    framework: String,
    #[arg(long, default_value = "postgresql")]
    database: String,
    /// Feature flag to enable (repeatable)
    #[arg(long = "feature")]
    features: Vec<String>,
    /// Free-text extra requirements
    #[arg(long, default_value = "")]
    requirements: String,
    /// Print the job id and exit without waiting
    #[arg(long)]
    no_wait: bool,
    /// Show the preview once the job completes
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orchesity_generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Login { token } => login(&config, token),
        Commands::Generate(args) => {
            let client = build_client(&config)?;
            generate(&client, &config, args).await
        }
        Commands::Status { job_id } => {
            let client = build_client(&config)?;
            let status = client.get_status(&JobId::from(job_id)).await?;
            print_status(&status);
            Ok(())
        }
        Commands::Watch { job_ids } => {
            let client = build_client(&config)?;
            watch(&client, &config, job_ids).await
        }
        Commands::Preview { job_id, json } => {
            let client = build_client(&config)?;
            let preview = client.fetch_preview(&JobId::from(job_id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                print_preview(&preview);
            }
            Ok(())
        }
        Commands::Download { job_id } => {
            let client = build_client(&config)?;
            let info = client.fetch_download(&JobId::from(job_id)).await?;
            println!("{}", info.download_url);
            if let Some(expires_at) = info.expires_at {
                println!("Link expires at {}", expires_at);
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = ClientConfig::load(&path)?;

    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    config.validate()?;

    tracing::debug!(
        api = %config.base_url(),
        interval_ms = config.poll_interval.as_millis() as u64,
        "Configuration loaded"
    );
    Ok(config)
}

fn build_client(config: &ClientConfig) -> Result<GeneratorClient> {
    let auth = AuthContext::resolve(&config.credentials_path)?;
    if !auth.is_authenticated() {
        tracing::warn!("No access token configured; run `orchesity-generator login` first");
    }
    GeneratorClient::new(config, auth)
}

fn login(config: &ClientConfig, token: Option<String>) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => dialoguer::Password::new()
            .with_prompt("Access token")
            .interact()
            .context("Failed to read access token")?,
    };

    let auth = AuthContext::with_token(token);
    if !auth.is_authenticated() {
        anyhow::bail!("Access token must not be empty");
    }
    auth.save(&config.credentials_path)?;
    println!("Saved access token to {}", config.credentials_path.display());
    Ok(())
}

async fn generate(
    client: &GeneratorClient,
    config: &ClientConfig,
    args: GenerateArgs,
) -> Result<()> {
    let request = GenerationRequest {
        prompt: args.prompt,
        project_name: args.name,
        framework: args.framework,
        database: args.database,
        features: args.features,
        requirements: args.requirements,
    };
    request.validate().map_err(anyhow::Error::msg)?;

    let tracker = Arc::new(Mutex::new(JobTracker::new()));
    lock(&tracker).begin_submit()?;

    let job_id = match client.submit(&request).await {
        Ok(job_id) => job_id,
        Err(err) => {
            lock(&tracker).fail(err.to_string())?;
            return Err(err).context("Failed to submit generation job");
        }
    };
    lock(&tracker).submitted(job_id.clone())?;
    println!("Submitted job {}", job_id);

    if args.no_wait {
        return Ok(());
    }

    let poller = PollingClient::for_generation(Arc::new(client.clone()), config.poll_interval);
    let bar = new_bar(&MultiProgress::new(), &job_id);
    let outcome = follow(&poller, job_id.clone(), bar, Arc::clone(&tracker)).await;

    let state = lock(&tracker).state().clone();
    match state {
        TrackerState::Completed { .. } if args.preview => {
            let preview = client.fetch_preview(&job_id).await?;
            print_preview(&preview);
            Ok(())
        }
        TrackerState::Completed { .. } => {
            println!("Run `orchesity-generator download {}` to fetch the project", job_id);
            Ok(())
        }
        TrackerState::Failed { message, .. } => anyhow::bail!(message),
        other => anyhow::bail!("Polling ended in state {} ({:?})", other.name(), outcome),
    }
}

async fn watch(
    client: &GeneratorClient,
    config: &ClientConfig,
    job_ids: Vec<String>,
) -> Result<()> {
    let poller = PollingClient::for_generation(Arc::new(client.clone()), config.poll_interval);
    let multi = MultiProgress::new();

    let jobs: Vec<_> = job_ids
        .into_iter()
        .map(|id| {
            let job_id = JobId::from(id);
            let tracker = Arc::new(Mutex::new(JobTracker::resume(job_id.clone())));
            let bar = new_bar(&multi, &job_id);
            (job_id, tracker, bar)
        })
        .collect();

    let outcomes = futures::future::join_all(jobs.iter().map(|(job_id, tracker, bar)| {
        follow(&poller, job_id.clone(), bar.clone(), Arc::clone(tracker))
    }))
    .await;

    let failed = outcomes
        .iter()
        .filter(|outcome| **outcome != PollOutcome::Completed)
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} jobs did not complete", failed, jobs.len());
    }
    Ok(())
}

/// Spawns a poll loop and waits for it, cancelling on Ctrl-C.
async fn follow(
    poller: &PollingClient<GeneratorClient>,
    job_id: JobId,
    bar: ProgressBar,
    tracker: Arc<Mutex<JobTracker>>,
) -> PollOutcome {
    let observer = ProgressObserver {
        bar,
        tracker,
        logs_shown: 0,
    };
    let handle = poller.poll(job_id, observer);
    let token = handle.cancellation_token();

    tokio::select! {
        outcome = handle.join() => outcome,
        _ = tokio::signal::ctrl_c() => {
            token.cancel();
            tracing::info!("Interrupted, stopped polling");
            PollOutcome::Cancelled
        }
    }
}

struct ProgressObserver {
    bar: ProgressBar,
    tracker: Arc<Mutex<JobTracker>>,
    logs_shown: usize,
}

impl PollObserver<GenerationStatus> for ProgressObserver {
    fn on_update(&mut self, status: &GenerationStatus) {
        self.bar.set_position(u64::from(status.progress));
        let stage = if status.stage.is_empty() {
            status.status.to_string()
        } else {
            format!("{}: {}", status.status, status.stage)
        };
        self.bar.set_message(stage);

        // A fresh snapshot may carry fewer lines if the server truncates.
        let new_logs = status.logs.iter().skip(self.logs_shown);
        for line in new_logs {
            self.bar.println(format!("  {}", line));
        }
        self.logs_shown = self.logs_shown.max(status.logs.len());

        if let Err(err) = lock(&self.tracker).update(status) {
            tracing::debug!(error = %err, "Ignoring update");
        }
    }

    fn on_complete(&mut self, status: GenerationStatus) {
        self.bar.finish_with_message(format!("completed {}", status.id));
        if let Err(err) = lock(&self.tracker).complete(status) {
            tracing::debug!(error = %err, "Ignoring completion");
        }
    }

    fn on_error(&mut self, error: ClientError) {
        self.bar.abandon_with_message(error.to_string());
        if let Err(err) = lock(&self.tracker).fail(error.to_string()) {
            tracing::debug!(error = %err, "Ignoring failure");
        }
    }
}

fn lock(tracker: &Mutex<JobTracker>) -> std::sync::MutexGuard<'_, JobTracker> {
    tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn new_bar(multi: &MultiProgress, job_id: &JobId) -> ProgressBar {
    let style = ProgressStyle::with_template("{prefix} [{bar:30}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let bar = multi.add(ProgressBar::new(100));
    bar.set_style(style);
    bar.set_prefix(job_id.to_string());
    bar
}

fn print_status(status: &GenerationStatus) {
    println!("Job:      {}", status.id);
    println!("Status:   {}", status.status);
    println!("Progress: {}%", status.progress);
    if !status.stage.is_empty() {
        println!("Stage:    {}", status.stage);
    }
    if let Some(error) = &status.error {
        println!("Error:    {}", error);
    }
    for line in &status.logs {
        println!("  {}", line);
    }
}

fn print_preview(preview: &ProjectPreview) {
    println!(
        "{} ({} / {})",
        preview.project_name, preview.framework, preview.database
    );
    for file in &preview.files {
        match &file.language {
            Some(language) => println!("  {:<48} {:>8} B  {}", file.path, file.size, language),
            None => println!("  {:<48} {:>8} B", file.path, file.size),
        }
    }
    println!("{} files", preview.files.len());
}
