use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use secrecy::SecretString;

use lead_nurture::channels::{ChannelKind, Dispatcher, EmailChannel, EmailConfig, LogChannel, SlackChannel};
use lead_nurture::config::NurtureConfig;
use lead_nurture::discovery::{AgentProfile, DiscoveryClient};
use lead_nurture::engagement::EngagementTracker;
use lead_nurture::leads::{CsvLeadParser, Lead};
use lead_nurture::llm::{LlmBackend, LlmConfig, create_provider};
use lead_nurture::nurture::{NurtureOrchestrator, OrchestratorDeps, PlanOutcome, spawn_ticker};
use lead_nurture::planner::PlanGenerator;
use lead_nurture::scheduler::InMemoryScheduler;
use lead_nurture::store::{LeadStore, MemoryLeadStore, MemoryTemplateStore};
use lead_nurture::templates::load_template_dir;
use lead_nurture::tracking::{TrackingPixels, TrackingState, tracking_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("parse") => {
            let source = args.get(2).context("usage: lead-nurture parse <leads.csv> [out.json]")?;
            cmd_parse(Path::new(source), args.get(3).map(PathBuf::from)).await
        }
        Some("nurture") => {
            let leads = args
                .get(2)
                .context("usage: lead-nurture nurture <leads.json> <templates_dir>")?;
            let templates = args
                .get(3)
                .context("usage: lead-nurture nurture <leads.json> <templates_dir>")?;
            cmd_nurture(Path::new(leads), Path::new(templates)).await
        }
        Some("register") => {
            let name = args.get(2).cloned().unwrap_or_else(|| "Sales Nurturer".to_string());
            let description = args
                .get(3)
                .cloned()
                .unwrap_or_else(|| "An agent for nurturing sales leads".to_string());
            cmd_register(&name, &description).await
        }
        Some("discover") => cmd_discover(args.get(2).map(String::as_str)).await,
        _ => {
            eprintln!("lead-nurture v{}", env!("CARGO_PKG_VERSION"));
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  lead-nurture parse <leads.csv> [out.json]");
            eprintln!("  lead-nurture nurture <leads.json> <templates_dir>");
            eprintln!("  lead-nurture register [name] [description]");
            eprintln!("  lead-nurture discover [capability]");
            Ok(())
        }
    }
}

/// Console logging plus a rolling file under the data dir.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let log_dir = std::env::var("NURTURE_LOG_DIR").unwrap_or_else(|_| "./data".to_string());
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "nurture.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    guard
}

async fn cmd_parse(source: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let leads = CsvLeadParser::parse_file(source)?;
    let json = serde_json::to_string_pretty(&leads)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)?;
            eprintln!("Parsed {} leads from {} -> {}", leads.len(), source.display(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn cmd_nurture(leads_path: &Path, templates_dir: &Path) -> anyhow::Result<()> {
    let config = NurtureConfig::from_env();

    // ── LLM provider ────────────────────────────────────────────────
    let llm_config = llm_config_from_env()?;
    let llm = create_provider(&llm_config);

    eprintln!("lead-nurture v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Business: {} ({})", config.business_name, config.business_type);

    // ── Stores ──────────────────────────────────────────────────────
    let raw = std::fs::read_to_string(leads_path)
        .with_context(|| format!("reading {}", leads_path.display()))?;
    let leads: Vec<Lead> = serde_json::from_str(&raw)?;
    let lead_store = Arc::new(MemoryLeadStore::with_leads(leads.clone()).await);

    let templates = load_template_dir(templates_dir)?;
    eprintln!("   Templates: {} loaded from {}", templates.len(), templates_dir.display());
    let template_store = Arc::new(MemoryTemplateStore::with_templates(templates).await);

    // ── Channels ────────────────────────────────────────────────────
    let mut dispatcher = Dispatcher::new();
    let mut active_channels = vec!["log"];
    dispatcher.register(ChannelKind::Log, Arc::new(LogChannel::new()));

    if let Some(email_config) = EmailConfig::from_env() {
        eprintln!("   Email: enabled (SMTP: {})", email_config.smtp_host);
        dispatcher.register(ChannelKind::Email, Arc::new(EmailChannel::new(email_config)));
        active_channels.push("email");
    }
    if let Some(slack) = SlackChannel::from_env() {
        eprintln!("   Slack: enabled");
        dispatcher.register(ChannelKind::Slack, Arc::new(slack));
        active_channels.push("slack");
    }
    eprintln!("   Channels: {}", active_channels.join(", "));

    // ── Orchestrator ────────────────────────────────────────────────
    let tracker = Arc::new(EngagementTracker::new(
        lead_store.clone() as Arc<dyn LeadStore>,
        config.engagement.clone(),
    ));
    let scheduler = Arc::new(InMemoryScheduler::new());
    let generator = PlanGenerator::new(llm, config.clone());

    let orchestrator = Arc::new(NurtureOrchestrator::new(
        config.clone(),
        OrchestratorDeps {
            lead_store: lead_store.clone(),
            template_store,
            tracker: tracker.clone(),
            generator,
            scheduler: scheduler.clone(),
            dispatcher,
        },
    ));

    // ── Open tracking ───────────────────────────────────────────────
    if let Some(ref base_url) = config.tracking_base_url {
        let port: u16 = std::env::var("NURTURE_TRACK_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8088);
        let state = TrackingState {
            pixels: Arc::new(TrackingPixels::new()),
            tracker: tracker.clone(),
        };
        let app = tracking_routes(state);
        eprintln!("   Tracking: {base_url} (listening on 0.0.0.0:{port})");
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .expect("Failed to bind tracking port");
            axum::serve(listener, app).await.ok();
        });
    } else {
        eprintln!("   Tracking: disabled");
    }

    // ── Create plans ────────────────────────────────────────────────
    let mut scheduled = 0usize;
    let mut skipped = 0usize;
    for lead in &leads {
        match orchestrator.create_plan(&lead.id).await {
            Ok(PlanOutcome::Scheduled { plan_id, job_ids }) => {
                tracing::info!(lead = %lead.id, plan = %plan_id, steps = job_ids.len(), "Plan scheduled");
                scheduled += 1;
            }
            Ok(PlanOutcome::Skipped) => skipped += 1,
            Err(e) => tracing::error!(lead = %lead.id, "Plan creation failed: {e}"),
        }
    }
    eprintln!(
        "   Plans: {scheduled} scheduled, {skipped} skipped ({} jobs pending)",
        scheduler.pending_count().await
    );

    // ── Run ─────────────────────────────────────────────────────────
    let _ticker = spawn_ticker(orchestrator, scheduler, config.tick_interval);
    eprintln!("   Running. Ctrl-C to stop.\n");
    tokio::signal::ctrl_c().await?;
    eprintln!("Shutting down.");
    Ok(())
}

fn llm_config_from_env() -> anyhow::Result<LlmConfig> {
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        let model = std::env::var("NURTURE_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        return Ok(LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: SecretString::from(key),
            model,
        });
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let model = std::env::var("NURTURE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        return Ok(LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: SecretString::from(key),
            model,
        });
    }
    bail!("Set ANTHROPIC_API_KEY or OPENAI_API_KEY to enable plan generation")
}

async fn cmd_register(name: &str, description: &str) -> anyhow::Result<()> {
    let client = DiscoveryClient::from_env()?;
    let profile = AgentProfile {
        name: name.to_string(),
        description: description.to_string(),
        capabilities: vec![
            "lead_nurturing".to_string(),
            "email".to_string(),
            "slack".to_string(),
        ],
        address: None,
    };
    let address = client.register(&profile).await?;
    println!("Registered '{name}' at {address}");
    Ok(())
}

async fn cmd_discover(capability: Option<&str>) -> anyhow::Result<()> {
    let client = DiscoveryClient::from_env()?;
    let agents = client.discover(capability).await?;
    println!("{}", serde_json::to_string_pretty(&agents)?);
    Ok(())
}
