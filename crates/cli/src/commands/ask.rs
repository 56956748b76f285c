//! `dataclaw ask`: One chat turn from the terminal.

use std::io::Write;

use dataclaw_agent::{ChatStreamEvent, ChatTurn};
use dataclaw_config::AppConfig;
use tracing::debug;

pub async fn run(
    config: AppConfig,
    message: &str,
    chat_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = dataclaw_gateway::build_state(&config).await?;

    match state.orchestrator.handle_turn(chat_id, message).await {
        ChatTurn::Answered {
            chat_id,
            scope,
            answer,
        } => {
            debug!(chat_id = %chat_id, scope = %scope, "Answered without generation");
            eprintln!("  chat {chat_id} [{scope}]");
            if answer.is_empty() {
                eprintln!("  (no answer for this scope)");
            } else {
                println!("{answer}");
            }
        }
        ChatTurn::Streaming { mut events, .. } => {
            let mut stdout = std::io::stdout();
            while let Some(event) = events.recv().await {
                match event {
                    ChatStreamEvent::Meta { chat_id, scope } => {
                        eprintln!("  chat {chat_id} [{scope}]");
                    }
                    ChatStreamEvent::Chunk { content } => {
                        write!(stdout, "{content}")?;
                        stdout.flush()?;
                    }
                    ChatStreamEvent::Done { usage } => {
                        println!();
                        if let Some(u) = usage {
                            eprintln!(
                                "  tokens: {} prompt + {} completion",
                                u.prompt_tokens, u.completion_tokens
                            );
                        }
                    }
                    ChatStreamEvent::Error { message } => {
                        println!();
                        return Err(format!("Generation failed: {message}").into());
                    }
                }
            }
        }
    }

    Ok(())
}
