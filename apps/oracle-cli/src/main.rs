use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use oracle_client::{ClientConfig, PlanClient, PlanSession, PlanState};
use oracle_protocol::{
    AgentEvent, AreaType, ArtifactDownloadRequest, ArtifactId, BehaviourFlag, RideForm, RunRequest,
    SessionId, TimeOfDay,
};
use oracle_risk::{
    HttpRiskScorer, ReassessOutcome, RiskMonitor, RiskScorer, RuleBasedScorer, SituationUpdate,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "oracle")]
#[command(about = "Plan streaming and ride-risk client")]
struct Cli {
    #[arg(long, env = "ORACLE_GATEWAY_URL", default_value = "http://127.0.0.1:3001")]
    gateway_url: String,
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream a plan for a goal and print progress as it arrives.
    Plan(PlanArgs),
    /// Assess a ride, apply de-escalation updates, reassess and summarize.
    Ride(RideArgs),
    /// List artifacts generated in a session.
    Artifacts { session_id: String },
    /// Download one artifact to a file.
    Download {
        artifact_id: String,
        session_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct PlanArgs {
    goal: String,
    #[arg(long, default_value = "general")]
    domain: String,
    /// Continue an existing upstream session.
    #[arg(long)]
    session: Option<String>,
    /// Print the final plan as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct RideArgs {
    #[arg(long, default_value = "")]
    driver: String,
    #[arg(long, default_value = "")]
    plate: String,
    #[arg(long, default_value = "")]
    pickup: String,
    #[arg(long, default_value = "")]
    destination: String,
    #[arg(long, default_value = "day")]
    time: TimeOfDay,
    #[arg(long, default_value = "urban")]
    area: AreaType,
    /// Observed behaviour, repeatable (e.g. route_deviation).
    #[arg(long = "flag")]
    flags: Vec<BehaviourFlag>,
    /// De-escalation update applied before reassessing, repeatable.
    #[arg(long = "update")]
    updates: Vec<SituationUpdate>,
    /// Score locally instead of through the gateway.
    #[arg(long)]
    local: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::new(&cli.gateway_url)
        .connect_timeout(Duration::from_secs(cli.connect_timeout_secs.max(1)));

    match cli.command {
        Command::Plan(args) => run_plan(PlanClient::new(config)?, args).await,
        Command::Ride(args) => run_ride(&cli.gateway_url, args).await,
        Command::Artifacts { session_id } => {
            let listing = PlanClient::new(config)?
                .list_artifacts(&SessionId::from_string(session_id))
                .await?;
            println!("{} artifact(s) in {}", listing.count, listing.session_id);
            for artifact in &listing.artifacts {
                println!("  {}  [{}] {}", artifact.id, artifact.kind, artifact.title);
            }
            Ok(())
        }
        Command::Download {
            artifact_id,
            session_id,
            out,
        } => {
            let request = ArtifactDownloadRequest::new(
                ArtifactId::from_string(artifact_id),
                SessionId::from_string(session_id),
            );
            let download = PlanClient::new(config)?.download_artifact(&request).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(request.filename_for("document")));
            tokio::fs::write(&path, &download.body)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = download.body.len(), "artifact saved");
            println!("saved {}", path.display());
            Ok(())
        }
    }
}

async fn run_plan(client: PlanClient, args: PlanArgs) -> Result<()> {
    let mut request = RunRequest::new(args.goal).with_domain(args.domain);
    if let Some(session) = args.session {
        request = request.with_session(SessionId::from_string(session));
    }

    let mut session = PlanSession::new(client);
    let mut updates = session.subscribe();
    session.start(request)?;

    let mut printed = 0;
    loop {
        let state = updates.borrow_and_update().clone();
        for event in &state.events[printed.min(state.events.len())..] {
            print_event(&state, event);
        }
        printed = state.events.len();
        if !state.is_streaming {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted; cancelling stream");
                session.cancel();
            }
        }
    }

    let state = session.snapshot();
    if let Some(error) = &state.error {
        bail!("plan stream failed: {error}");
    }
    print_summary(&state, args.json)
}

fn print_event(state: &PlanState, event: &AgentEvent) {
    let progress = state.progress_percent();
    match event {
        AgentEvent::Session { session_id } => println!("[{progress:>3}%] session {session_id}"),
        AgentEvent::IntentAnalyzed { intent } => println!(
            "[{progress:>3}%] intent: {} ({} urgency)",
            intent.plan_type, intent.urgency
        ),
        AgentEvent::PlanDecomposed { subtasks } => {
            println!("[{progress:>3}%] plan has {} subtask(s)", subtasks.len());
            for subtask in subtasks {
                println!("         {}. {}", subtask.id, subtask.description);
            }
        }
        AgentEvent::ArtifactReady { artifact } => {
            println!("[{progress:>3}%] artifact ready: {}", artifact.title);
        }
        AgentEvent::Critic { passed, scores, .. } => println!(
            "[{progress:>3}%] critic {} (feasibility {:.1})",
            if *passed { "passed" } else { "flagged issues" },
            scores.feasibility
        ),
        AgentEvent::Error { content } => println!("[{progress:>3}%] upstream error: {content}"),
        other => println!("[{progress:>3}%] {}", other.event_type().as_str()),
    }
}

fn print_summary(state: &PlanState, json: bool) -> Result<()> {
    let Some(plan) = &state.plan else {
        println!("stream ended without a plan");
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }
    println!();
    println!("goal: {}", plan.goal);
    if !plan.executive_summary.is_empty() {
        println!("{}", plan.executive_summary);
    }
    println!(
        "subtasks: {}/{} complete, artifacts: {}",
        state.completed_subtasks(),
        state.subtasks.len(),
        state.artifacts.len()
    );
    if let Some(critic) = &state.critic_result {
        println!("critic: {}", if critic.passed { "passed" } else { "not passed" });
    }
    Ok(())
}

async fn run_ride(gateway_url: &str, args: RideArgs) -> Result<()> {
    let scorer: Arc<dyn RiskScorer> = if args.local {
        Arc::new(RuleBasedScorer)
    } else {
        Arc::new(HttpRiskScorer::for_gateway(
            gateway_url,
            Duration::from_secs(30),
        )?)
    };

    let form = RideForm {
        driver_name: args.driver,
        vehicle_plate: args.plate,
        pickup: args.pickup,
        destination: args.destination,
        time_of_day: args.time,
        area_type: args.area,
    };

    let mut monitor = RiskMonitor::new(scorer);
    let first = monitor.assess(form, args.flags).await?;
    println!("risk {} ({})", first.risk.score, first.risk.level);
    for factor in &first.risk.triggered_factors {
        println!("  - {factor}");
    }
    if let Some(action) = first.advice.immediate_actions.first() {
        println!("first action: {action}");
    }

    if !args.updates.is_empty() {
        for update in &args.updates {
            println!("update: {}", update.label());
        }
        let pending = monitor.apply_updates(&args.updates)?;
        info!(
            flags = pending.behaviour_flags.len(),
            area = %pending.form.area_type,
            "updates staged"
        );
        match monitor.reassess().await? {
            ReassessOutcome::Updated { delta } => {
                if let Some(current) = monitor.current() {
                    println!(
                        "reassessed: {} ({}), change {delta:+}",
                        current.risk.score, current.risk.level
                    );
                }
            }
            ReassessOutcome::Retained { reason } => {
                println!("reassessment unavailable ({reason}); keeping previous result");
            }
        }
    }

    let summary = monitor.close()?;
    println!(
        "summary: initial {} ({}), peak {} ({}), final {} ({}), {} reassessment(s)",
        summary.initial_score,
        summary.initial_level,
        summary.peak_score,
        summary.peak_level,
        summary.final_score,
        summary.final_level,
        summary.reassess_count
    );
    Ok(())
}
