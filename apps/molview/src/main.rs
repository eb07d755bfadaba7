mod config;
mod dictation;
mod report;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    HttpMoleculeService, PipelineOrchestrator, RunPolicy, SampleSession, SessionEvent,
    SessionOptions, SharedEngine,
};
use engine_integration::{HeadlessEngineLoader, MissingSpeechCapability, SpeechCapability};
use futures::future::join_all;
use shared::domain::{ListeningState, RequestLifecycle, SessionId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::dictation::LineDictation;

#[derive(Parser, Debug)]
#[command(
    name = "molview",
    about = "Resolve two molecule descriptions and fetch their 2D and 3D structures"
)]
struct Args {
    /// Free-text description for sample 1.
    #[arg(long)]
    sample1: Option<String>,
    /// Free-text description for sample 2.
    #[arg(long)]
    sample2: Option<String>,
    /// Dictate each sample as a line on stdin instead of passing it as a flag.
    #[arg(long)]
    voice: bool,
    #[arg(long)]
    service_url: Option<String>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[arg(long)]
    run_policy: Option<RunPolicy>,
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(v) = args.service_url {
        settings.service_url = v;
    }
    if let Some(v) = args.out_dir {
        settings.output_dir = v;
    }
    if let Some(v) = args.run_policy {
        settings.run_policy = v;
    }
    info!(
        service_url = %settings.service_url,
        run_policy = ?settings.run_policy,
        output_dir = %settings.output_dir.display(),
        "starting molview"
    );

    let service = HttpMoleculeService::new(&settings.service_url)?.into_shared();
    let pipeline = Arc::new(PipelineOrchestrator::from_service(service));

    let engine = SharedEngine::new(Arc::new(HeadlessEngineLoader::default()));
    if let Err(err) = engine.ensure_loaded().await {
        warn!("continuing without 3D viewer: {err}");
    }

    let speech: Arc<dyn SpeechCapability> = if args.voice {
        Arc::new(LineDictation::from_stdin())
    } else {
        Arc::new(MissingSpeechCapability)
    };
    let options = SessionOptions {
        auto_submit_delay: settings.auto_submit_delay(),
        run_policy: settings.run_policy,
        ..SessionOptions::default()
    };

    let sessions: Vec<Arc<SampleSession>> = (1..=2)
        .map(|n| {
            SampleSession::new(
                SessionId(n),
                pipeline.clone(),
                engine.clone(),
                speech.clone(),
                options.clone(),
            )
        })
        .collect();

    let outcomes = if args.voice {
        // Both samples read the same stdin, so they dictate one at a time.
        let mut outcomes = Vec::with_capacity(sessions.len());
        for session in &sessions {
            outcomes.push(dictate(session.clone()).await);
        }
        outcomes
    } else {
        let inputs = [args.sample1, args.sample2];
        join_all(
            sessions
                .iter()
                .zip(inputs)
                .map(|(session, input)| submit_typed(session.clone(), input)),
        )
        .await
    };
    for outcome in outcomes {
        if let Err(err) = outcome {
            error!("{err:#}");
        }
    }

    let mut states = Vec::with_capacity(sessions.len());
    for session in &sessions {
        states.push(session.snapshot().await);
    }
    print!("{}", report::summary_table(&states));

    for state in &states {
        for path in report::write_artifacts(state, &settings.output_dir).await? {
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}

async fn submit_typed(session: Arc<SampleSession>, input: Option<String>) -> Result<()> {
    let Some(input) = input else {
        return Ok(());
    };
    session.set_input(input).await;
    if let Some(run) = session.submit_input().await {
        run.await
            .with_context(|| format!("sample {} run task failed", session.id()))?;
    }
    Ok(())
}

/// One voice capture; returns once its run (if any) has finished.
async fn dictate(session: Arc<SampleSession>) -> Result<()> {
    let mut events = session.subscribe_events();
    eprintln!(
        "sample {}: type the molecule you would say, then press Enter",
        session.id()
    );
    session.toggle_voice().await?;

    loop {
        match events.recv().await {
            Ok(SessionEvent::TranscriptReceived(text)) if text.trim().is_empty() => return Ok(()),
            Ok(SessionEvent::TranscriptReceived(_)) => break,
            Ok(SessionEvent::Listening(ListeningState::Idle)) => return Ok(()),
            Ok(SessionEvent::VoiceError(err)) => {
                warn!(session = %session.id(), "{err}");
                return Ok(());
            }
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => bail!("sample {} event stream closed", session.id()),
        }
    }

    loop {
        match events.recv().await {
            Ok(SessionEvent::LifecycleChanged(
                RequestLifecycle::Succeeded | RequestLifecycle::Failed,
            )) => return Ok(()),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => bail!("sample {} event stream closed", session.id()),
        }
    }
}
