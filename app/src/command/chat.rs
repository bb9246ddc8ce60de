//! Multi-turn conversation command.
//!
//! Maintains context across turns within one process; the model may
//! continue unprompted for a bounded number of turns per message.

use std::io::Write;

use futures::StreamExt;
use tracing::info;

use quill_core::{AbortSignal, Content, GenerationConfig, Part, Role};
use quill_conversation::{ConversationManager, TurnEvent, history_stats};

use super::{CommandStrategy, init_components};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
    /// Optional autonomous-turn bound (clamped to the hard ceiling)
    pub max_turns: Option<usize>,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_components(input.model)?;
        let defaults = &common.config.chat;

        let mut manager = ConversationManager::new(common.provider.clone(), common.runtime);

        if let Some(prompt) = &defaults.system_prompt {
            manager = manager.with_system_instruction(Content::new(
                Role::User,
                vec![Part::from_text(prompt.clone())],
            ));
        }
        manager = manager.with_generation_config(GenerationConfig {
            temperature: defaults.temperature,
            top_p: None,
            max_output_tokens: defaults.max_output_tokens,
        });

        match input.message {
            Some(message) => {
                stream_one_message(&mut manager, &message, input.max_turns).await?;
                Ok(())
            }
            None => run_interactive(&mut manager, input.max_turns).await,
        }
    }
}

/// Send one message and print events as they stream in. Ctrl-C aborts
/// the in-flight turn instead of killing the process.
async fn stream_one_message(
    manager: &mut ConversationManager,
    message: &str,
    max_turns: Option<usize>,
) -> anyhow::Result<()> {
    let signal = AbortSignal::new();
    let interrupt = {
        let signal = signal.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal.abort();
            }
        })
    };

    let result = print_events(manager, message, signal, max_turns).await;
    interrupt.abort();
    result
}

async fn print_events(
    manager: &mut ConversationManager,
    message: &str,
    signal: AbortSignal,
    max_turns: Option<usize>,
) -> anyhow::Result<()> {
    let stream = manager.send_message_stream(vec![Part::from_text(message)], signal, max_turns);
    futures::pin_mut!(stream);

    while let Some(event) = stream.next().await {
        match event? {
            TurnEvent::Content(text) => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            TurnEvent::ToolCallRequest(call) => {
                println!("\n[tool requested: {} {}]", call.name, call.args);
            }
            TurnEvent::Compressed(stats) => {
                eprintln!(
                    "[history compacted: {} -> {} tokens]",
                    stats.original_token_count, stats.new_token_count
                );
            }
        }
    }
    println!();
    Ok(())
}

async fn run_interactive(
    manager: &mut ConversationManager,
    max_turns: Option<usize>,
) -> anyhow::Result<()> {
    println!("=== quill chat session: {} ===", manager.chat().id());
    println!("Type 'exit' to quit, '/reset' to start over, '/compress' to compact history.\n");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if matches!(input, "exit" | "quit" | "q") {
            break;
        }

        if input.is_empty() {
            continue;
        }

        if input == "/reset" {
            manager.reset_chat();
            println!("Session reset: {}", manager.chat().id());
            continue;
        }

        if input == "/compress" {
            match manager.try_compress(true).await {
                Ok(Some(stats)) => println!(
                    "Compacted: {} -> {} tokens",
                    stats.original_token_count, stats.new_token_count
                ),
                Ok(None) => println!("Nothing to compact."),
                Err(e) => eprintln!("Error: {e}"),
            }
            continue;
        }

        if let Err(e) = stream_one_message(manager, input, max_turns).await {
            eprintln!("Error: {e}");
        }

        let pending = manager.last_turn().pending_tool_calls();
        if !pending.is_empty() {
            info!("{} tool calls await external resolution", pending.len());
        }
    }

    let stats = history_stats(manager.history());
    println!(
        "\nSession ended. {} entries, ~{} tokens.",
        stats.total_entries, stats.estimated_tokens
    );
    Ok(())
}
