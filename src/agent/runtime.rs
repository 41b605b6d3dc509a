use crate::agent::agent::Agent;
use crate::io::input::{Command, InputSource};
use crate::io::output::OutputSink;
use anyhow::Result;
use futures_util::StreamExt;
use tokio::signal;

pub async fn run(
    mut input: impl InputSource,
    mut output: impl OutputSink,
    mut agent: Agent,
) -> Result<()> {
    tracing::info!("Checking which models Ollama has available...");
    match agent.models().await {
        Ok(models) => tracing::info!("Ollama is up with {} local models", models.len()),
        Err(e) => {
            output
                .emit_error(&format!("Ollama is not reachable: {:#}", e))
                .await?;
            output.emit("Continuing anyway...").await?;
        }
    }

    output
        .emit(&format!(
            "Chatting with {}. Commands: /models, /model <name>, /embed <text>. Ctrl+D or Ctrl+C to exit.",
            agent.chat_model()
        ))
        .await?;
    output.emit("").await?;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C signal");
    };

    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                output.emit("\nGoodbye!").await?;
                break;
            }

            result = input.next() => {
                match result {
                    Ok(Some(command)) => {
                        if let Err(e) = process_input(&mut output, &mut agent, command).await {
                            tracing::error!("Error processing input: {:#}", e);
                            output.emit_error(&format!("{:#}", e)).await?;
                            output.emit("").await?;
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Reached EOF");
                        output.emit("\nGoodbye!").await?;
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Input error: {}", e);
                        output.emit_error(&format!("Input error: {}", e)).await?;
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Runtime shutting down");
    Ok(())
}

async fn process_input(
    output: &mut impl OutputSink,
    agent: &mut Agent,
    command: Command,
) -> Result<()> {
    match command {
        Command::Empty => Ok(()),
        Command::ListModels => {
            for model in agent.models().await? {
                output.emit(&format!("  {}", model.label)).await?;
            }
            output.emit("").await
        }
        Command::UseModel(model) => {
            agent.set_chat_model(&model)?;
            output
                .emit(&format!("Chat model is now {}\n", agent.chat_model()))
                .await
        }
        Command::Embed(text) => {
            let result = agent.embed(&text).await?;
            output
                .emit(&format!(
                    "{}: {} dimensions, starting {:?}\n",
                    result.model,
                    result.length,
                    &result.embeddings[..result.length.min(4)]
                ))
                .await
        }
        Command::Chat(text) => {
            output.emit("Assistant: ").await?;

            let mut stream = agent.handle_input(text).await?;
            let mut last = None;
            let mut failure = None;

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        output.emit_chunk(&chunk).await?;
                        last = Some(chunk);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            output.finish_reply().await?;

            if let Some(e) = failure {
                return Err(e.into());
            }
            if let Some(last) = last {
                agent.record_reply(last);
            }
            Ok(())
        }
    }
}
