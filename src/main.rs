use anyhow::{Context, Result};
use bomba::cli::commands::{RunCommand, ServeCommand, ValidateCommand};
use bomba::cli::output::*;
use bomba::cli::{Cli, Command};
use bomba::core::{PipelineConfig, RunContext, StageKind};
use bomba::execution::{ExecutionEngine, ShellRunner, Workspace};
use bomba::server::{create_router, AppState};
use bomba::settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_filter = if cli.verbose {
        "bomba=debug,tower_http=debug"
    } else {
        "bomba=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Serve(cmd) => serve(cmd).await?,
        Command::Run(cmd) => run_once(cmd).await?,
        Command::Validate(cmd) => validate_definition(cmd)?,
    }

    Ok(())
}

fn build_engine(settings: &Settings) -> Result<ExecutionEngine<ShellRunner>> {
    std::fs::create_dir_all(&settings.work_dir).with_context(|| {
        format!("Failed to create work directory {}", settings.work_dir.display())
    })?;
    std::fs::create_dir_all(&settings.log_dir).with_context(|| {
        format!("Failed to create log directory {}", settings.log_dir.display())
    })?;

    let reporter = settings.status_reporter()?;
    Ok(ExecutionEngine::new(
        ShellRunner::new(settings.command_timeout_secs),
        reporter,
        Workspace::new(&settings.work_dir),
        &settings.log_dir,
    ))
}

async fn serve(cmd: &ServeCommand) -> Result<()> {
    let webhook_secret = cmd.signature_secret()?;
    let settings = cmd.service.settings();
    let engine = build_engine(&settings)?;

    let state = AppState::new(engine, webhook_secret, settings.clone_protocol);
    let app = create_router(state, &cmd.webhook_path);

    let listener = tokio::net::TcpListener::bind(&cmd.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", cmd.bind))?;

    tracing::info!(
        "Listening on {} (webhook at {}, work dir {})",
        cmd.bind,
        cmd.webhook_path,
        settings.work_dir.display()
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn run_once(cmd: &RunCommand) -> Result<()> {
    let settings = cmd.service.settings();
    let sha = cmd.commit_sha(&settings)?;
    let engine = build_engine(&settings)?.with_event_handler(|event| {
        if let Some(line) = format_execution_event(event) {
            println!("{}", line);
        }
    });

    let run = RunContext::new(&cmd.repository, &sha, &cmd.branch, cmd.pr);
    let source_url = cmd.source_url(settings.clone_protocol);
    println!(
        "{} Running {} ({}) from {}",
        INFO,
        style(&cmd.repository).bold(),
        style(&cmd.branch).cyan(),
        style(&source_url).dim()
    );

    println!();
    let report = engine.execute(&run, &source_url).await;
    engine.reporter().flush().await;

    println!("\n{}", format_run_report(&report));
    println!(
        "{} Log: {}",
        INFO,
        style(settings.log_dir.join(run.log_artifact_id.file_name()).display()).dim()
    );

    if !report.is_green() {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_definition(cmd: &ValidateCommand) -> Result<()> {
    if !cmd.json {
        println!("{} Validating {}...", INFO, style(cmd.file.display()).bold());
    }

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{}", format_definition(&config, cmd.json)?);
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(&e).red());
            let salvaged = e.salvaged();
            if salvaged.total() > 0 {
                println!("  {} steps would be marked as errored:", WARN);
                for kind in StageKind::ORDER {
                    for name in salvaged.get(kind) {
                        println!("    {}", style(kind.context_for(name)).dim());
                    }
                }
            }
            std::process::exit(1);
        }
    }
}
