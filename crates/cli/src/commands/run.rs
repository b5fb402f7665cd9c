//! `robovox run`: the interactive conversation loop.

use std::path::Path;
use std::sync::Arc;

use robovox_agent::LlmAgent;
use robovox_core::event::{DomainEvent, EventBus};
use robovox_core::speech::SpeechInput;
use robovox_executor::SkillExecutor;
use robovox_mode::{LlmMode, ModeReport};
use robovox_voice::{ConsoleSpeechOutput, LineSpeechInput};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(config_path: Option<&Path>, replay: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let provider = super::build_provider(&config, replay)?;
    let provider_name = provider.name().to_string();

    let bus = Arc::new(EventBus::default());
    let (_arm, tools) = robovox_robot::simulated(&config);
    let executor = Arc::new(SkillExecutor::new(Arc::new(tools)).with_events(bus.clone()));
    let planner = Arc::new(LlmAgent::from_config(provider, &config));
    let speech = Arc::new(ConsoleSpeechOutput::stdout(&config.speech));
    let mode = LlmMode::new(planner, executor, speech, &config).with_events(bus.clone());

    let watcher = tokio::spawn(watch_events(bus));

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        robovox — talking to the arm          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  LLM:       {provider_name} ({})", config.llm.model);
    println!("  Robot:     simulated arm");
    println!("  Speech:    {}", if config.speech.tts_enabled { "console" } else { "off" });
    println!();
    println!("  Type what you would say and press Enter.");
    println!("  End a line with '...' to keep talking, type 'exit' or Ctrl+C to quit.");
    println!();

    let input = LineSpeechInput::stdin();
    let transcripts = input.start().await?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    let report = mode.run(transcripts, shutdown).await;
    watcher.abort();
    print_summary(&report);
    Ok(())
}

/// Surface the events an operator needs to see while the loop runs.
async fn watch_events(bus: Arc<EventBus>) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => match event.as_ref() {
                DomainEvent::OperatorAttentionRequired { reason, .. } => {
                    eprintln!("  [OPERATOR] Check the robot: {reason}");
                }
                DomainEvent::SkillExecuted {
                    skill,
                    status,
                    duration_ms,
                    ..
                } => {
                    info!(%skill, ?status, duration_ms, "Skill executed");
                }
                _ => {}
            },
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Event watcher lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_summary(report: &ModeReport) {
    let turns = report.turns().count();
    let attention = report
        .sessions
        .iter()
        .filter(|s| s.requires_operator_attention())
        .count();

    println!();
    println!("  Sessions:  {}", report.sessions.len());
    println!("  Turns:     {turns}");
    if attention > 0 {
        println!("  ⚠️  {attention} session(s) ended with a hardware fault. Inspect the robot.");
    }
    println!();
    println!("  Goodbye! 👋");
    println!();
}
