use std::io::{BufRead, Write as _};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;

use crate::settings::Settings;
use verba_coach::{
    request_writing_feedback, tutor_reply, ChatTurn, GenAiClient, ProficiencyLevel,
};
use verba_foundation::{SessionState, ShutdownHandler};
use verba_live::protocol::LiveConfig;
use verba_live::session::{VoiceSession, VoiceSessionConfig};
use verba_live::transport::WsTransport;
use verba_telemetry::PipelineMetrics;

/// Wire up the full pipeline and run one live session until Ctrl-C, the
/// peer hangs up, or a device fails.
pub async fn run_live(
    settings: Settings,
    level: ProficiencyLevel,
    device: Option<String>,
) -> anyhow::Result<()> {
    settings.require_api_key()?;

    let metrics = Arc::new(PipelineMetrics::default());
    let transport = Arc::new(WsTransport::new(
        settings.ws_endpoint.clone(),
        settings.api_key.clone(),
        settings.audio.outbound_queue,
    ));

    let mut session_cfg = VoiceSessionConfig::new(LiveConfig {
        model: settings.live_model.clone(),
        voice: settings.voice.clone(),
        system_instruction: level.live_instruction(),
    });
    session_cfg.block_samples = settings.audio.block_samples;
    session_cfg.input_device = device.or_else(|| settings.audio.input_device.clone());

    let shutdown = ShutdownHandler::new().install().await;

    println!("Starting live voice session ({} level). Speak naturally; Ctrl-C to stop.", level);
    let session = VoiceSession::start(session_cfg, transport, metrics.clone())
        .await
        .context("could not start the live session")?;

    // Either the user stops us, or the session winds down on its own
    loop {
        if shutdown.is_shutdown_requested() {
            session.stop();
            break;
        }
        if session.state() == SessionState::Closed {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
    session.wait().await;

    println!(
        "Session over. Sent {} blocks ({} dropped), played {} segments, {} interruptions.",
        metrics.blocks_sent.load(Ordering::Relaxed),
        metrics.blocks_dropped.load(Ordering::Relaxed),
        metrics.segments_completed.load(Ordering::Relaxed),
        metrics.interruptions.load(Ordering::Relaxed),
    );
    Ok(())
}

/// Line-oriented text chat with the tutor.
pub async fn run_chat(settings: Settings, level: ProficiencyLevel) -> anyhow::Result<()> {
    settings.require_api_key()?;
    let client = GenAiClient::new(settings.http_endpoint.clone(), settings.api_key.clone());

    let mut history = vec![ChatTurn::model(
        "Hello! I'm your English tutor. What would you like to practice today?",
    )];
    println!("{}", history[0].text);

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        history.push(ChatTurn::user(line));
        let reply = tutor_reply(&client, &settings.chat_model, level, &history).await;
        println!("{}", reply);
        history.push(ChatTurn::model(reply));
    }
    Ok(())
}

/// Evaluate a writing sample from a file or stdin.
pub async fn run_write(
    settings: Settings,
    level: ProficiencyLevel,
    path: Option<&str>,
) -> anyhow::Result<()> {
    settings.require_api_key()?;
    let client = GenAiClient::new(settings.http_endpoint.clone(), settings.api_key.clone());

    let text = match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("could not read {}", p))?,
        None => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
            buf
        }
    };
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("nothing to evaluate");
    }

    match request_writing_feedback(&client, &settings.feedback_model, level, text).await {
        Ok(feedback) => {
            println!("Estimated level: {}", feedback.score);
            if !feedback.corrections.is_empty() {
                println!("\nCorrections:");
                for c in &feedback.corrections {
                    println!("  - {}", c);
                }
            }
            if !feedback.vocabulary_suggestions.is_empty() {
                println!("\nVocabulary:");
                for v in &feedback.vocabulary_suggestions {
                    println!("  - {}", v);
                }
            }
            println!("\n{}", feedback.general_feedback);
        }
        Err(e) => {
            // Recover locally: the flow ends with a readable message, not a crash
            tracing::warn!("Writing feedback failed: {}", e);
            println!("Feedback is unavailable right now. Please try again in a moment.");
        }
    }
    Ok(())
}
