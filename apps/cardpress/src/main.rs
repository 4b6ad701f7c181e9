mod config;
mod copy;
mod document;
mod enhance;
mod errors;
mod layout;
mod llm_client;
mod pipeline;
mod publish;
mod render;
mod review;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::copy::{CopyFramework, LlmCopyOptimizer};
use crate::document::{FrontMatterParser, MarkdownParser};
use crate::enhance::replicate::ReplicateSettings;
use crate::enhance::{EnhanceIntensity, EnhanceStyle, EnhanceThemes, ReplicateEnhancer};
use crate::layout::{paginate, StyleProfile};
use crate::llm_client::LlmClient;
use crate::pipeline::{
    Artifact, Checkpoint, ConsoleCheckpoint, CopyOptimizeStage, Document, EnhanceStage,
    PipelineController, PipelineState, PublishStage, RenderStage, RunStatus, StageKind,
    StagePlan,
};
use crate::publish::command::CommandPublisher;
use crate::publish::s3::S3Publisher;
use crate::publish::Publisher;
use crate::render::chromium::ChromiumRenderer;
use crate::render::themes::ThemeCatalog;
use crate::review::{HttpCheckpoint, ReviewHub};
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "cardpress", version, about = "Turn a Markdown note into reviewed social-media image cards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the staged pipeline with a checkpoint after every stage
    Run(RunArgs),
    /// Print the page plan for a document as JSON, without rendering
    Paginate(PaginateArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Markdown document with optional front matter
    file: PathBuf,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Theme id for rendered cards
    #[arg(long, default_value = ThemeCatalog::DEFAULT_STYLE)]
    style: String,

    /// JSON file overriding the layout style profile
    #[arg(long)]
    style_profile: Option<PathBuf>,

    #[arg(long)]
    optimize_copy: bool,

    #[arg(long, value_enum, default_value = "problem_solution")]
    copy_framework: CopyFramework,

    #[arg(long)]
    no_render: bool,

    #[arg(long)]
    enhance: bool,

    #[arg(long, value_enum, default_value = "illustration")]
    enhance_style: EnhanceStyle,

    #[arg(long, value_enum, default_value = "medium")]
    enhance_intensity: EnhanceIntensity,

    #[arg(long)]
    publish: bool,

    #[arg(long, value_enum, default_value = "s3")]
    publisher: PublisherKind,

    /// Program run by `--publisher command`
    #[arg(long)]
    publish_command: Option<String>,

    /// Argument passed to the publish command before the generated ones; repeatable
    #[arg(long = "publish-arg", allow_hyphen_values = true)]
    publish_args: Vec<String>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    desc: Option<String>,

    #[arg(long, value_enum, default_value = "console")]
    review: ReviewMode,

    /// Body cards rendered at once
    #[arg(long, default_value_t = 4)]
    render_concurrency: usize,
}

#[derive(Args)]
struct PaginateArgs {
    file: PathBuf,

    #[arg(long)]
    style_profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PublisherKind {
    S3,
    Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReviewMode {
    Console,
    Http,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Run(args) => run(args, config).await,
        Command::Paginate(args) => print_page_plan(args).await,
    }
}

async fn run(args: RunArgs, config: Config) -> Result<()> {
    info!("Starting cardpress v{}", env!("CARGO_PKG_VERSION"));

    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;

    let style = Arc::new(load_style_profile(args.style_profile.as_deref()).await?);
    let themes = Arc::new(ThemeCatalog::builtin());
    if themes.get(&args.style).is_none() {
        bail!(
            "unknown style '{}', expected one of: {}",
            args.style,
            themes.ids().collect::<Vec<_>>().join(", ")
        );
    }

    let plan = StagePlan::new(StageKind::ALL)
        .with(StageKind::CopyOptimize, args.optimize_copy)
        .with(StageKind::Render, !args.no_render)
        .with(StageKind::Enhance, args.enhance)
        .with(StageKind::Publish, args.publish);
    info!(stages = ?plan.stages(), "Pipeline planned");

    let checkpoint = build_checkpoint(args.review, &config).await?;
    let mut controller = PipelineController::new(plan.clone(), checkpoint);

    // Secrets are resolved here so a missing one fails before any stage runs.
    if plan.is_enabled(StageKind::CopyOptimize) {
        let llm = LlmClient::new(config.require_anthropic_key()?, llm_client::DEFAULT_MODEL)?;
        info!("LLM client initialized (model: {})", llm.model());
        let optimizer = Arc::new(LlmCopyOptimizer::new(llm));
        controller = controller.with_producer(
            StageKind::CopyOptimize,
            Arc::new(CopyOptimizeStage::new(optimizer, args.copy_framework)),
        );
    }

    if plan.is_enabled(StageKind::Render) {
        let renderer = Arc::new(ChromiumRenderer::new(
            config.chromium_bin.clone(),
            args.output_dir.clone(),
            Arc::clone(&style),
            Arc::clone(&themes),
        ));
        let parser: Arc<dyn MarkdownParser> = Arc::new(FrontMatterParser::default());
        controller = controller.with_producer(
            StageKind::Render,
            Arc::new(
                RenderStage::new(parser, renderer, Arc::clone(&style), args.style.clone())
                    .with_max_concurrency(args.render_concurrency),
            ),
        );
    }

    if plan.is_enabled(StageKind::Enhance) {
        let enhancer = ReplicateEnhancer::new(
            config.require_replicate_token()?,
            ReplicateSettings::default(),
            Arc::new(EnhanceThemes::builtin()),
            args.output_dir.clone(),
        )?;
        controller = controller.with_producer(
            StageKind::Enhance,
            Arc::new(EnhanceStage::new(
                Arc::new(enhancer),
                args.enhance_style,
                args.enhance_intensity,
            )),
        );
    }

    if plan.is_enabled(StageKind::Publish) {
        let publisher = build_publisher(&args, &config).await?;
        controller = controller.with_producer(
            StageKind::Publish,
            Arc::new(
                PublishStage::new(publisher)
                    .with_title(args.title.clone())
                    .with_description(args.desc.clone()),
            ),
        );
    }

    let input = Artifact::Document(Document {
        path: Some(args.file.clone()),
        text,
    });
    let state = controller.run(input).await;
    report(&state)
}

async fn build_checkpoint(mode: ReviewMode, config: &Config) -> Result<Arc<dyn Checkpoint>> {
    match mode {
        ReviewMode::Console => Ok(Arc::new(ConsoleCheckpoint::new())),
        ReviewMode::Http => {
            let hub = ReviewHub::new();
            let app = build_router(AppState { review: hub.clone() })
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let addr: SocketAddr = format!("0.0.0.0:{}", config.review_port).parse()?;
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Review API listening on {addr}");
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    warn!("Review API stopped: {e}");
                }
            });
            Ok(Arc::new(HttpCheckpoint::new(hub)))
        }
    }
}

async fn build_publisher(args: &RunArgs, config: &Config) -> Result<Arc<dyn Publisher>> {
    match args.publisher {
        PublisherKind::S3 => {
            let settings = config.require_s3()?;
            info!(bucket = %settings.bucket, "S3 publisher initialized");
            Ok(Arc::new(S3Publisher::from_settings(&settings).await))
        }
        PublisherKind::Command => {
            let program = args
                .publish_command
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .context("--publisher command needs a non-empty --publish-command")?;
            let command = CommandPublisher::new(program, args.publish_args.clone());
            info!(command = %command.target(), "Command publisher initialized");
            Ok(Arc::new(command))
        }
    }
}

async fn load_style_profile(path: Option<&Path>) -> Result<StyleProfile> {
    let profile = match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("cannot read style profile {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid style profile {}", path.display()))?
        }
        None => StyleProfile::default(),
    };
    profile.validate()?;
    Ok(profile)
}

async fn print_page_plan(args: PaginateArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let style = load_style_profile(args.style_profile.as_deref()).await?;
    let parsed = FrontMatterParser::default().parse(&text);

    let pagination = paginate(&parsed.blocks, &style)?;
    for warning in &pagination.warnings {
        warn!("{warning}");
    }
    println!("{}", serde_json::to_string_pretty(&pagination)?);
    Ok(())
}

/// Completed and operator-rejected runs exit cleanly; failures do not.
fn report(state: &PipelineState) -> Result<()> {
    match state.status() {
        RunStatus::Completed => {
            info!(run_id = %state.run_id(), "Pipeline completed");
            for (stage, artifact) in state.approved_artifacts() {
                println!("✓ {stage}: {}", artifact.summary());
            }
            Ok(())
        }
        RunStatus::Aborted(reason) if !reason.is_failure() => {
            println!("Stopped: {reason}");
            println!("Last approved: {}", state.current_artifact().summary());
            Ok(())
        }
        RunStatus::Aborted(reason) => bail!("pipeline aborted: {reason}"),
        other => bail!("pipeline ended in unexpected state {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_args_keep_spaces_and_hyphens() {
        let cli = Cli::try_parse_from([
            "cardpress",
            "run",
            "post.md",
            "--publish",
            "--publisher",
            "command",
            "--publish-command",
            "python3",
            "--publish-arg",
            "/opt/My Scripts/publish.py",
            "--publish-arg",
            "--dry-run",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.publish_command.as_deref(), Some("python3"));
        assert_eq!(args.publish_args, vec!["/opt/My Scripts/publish.py", "--dry-run"]);
    }
}
