//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::format_push_string)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentConfig, PromptSet, ToolRegistry, create_provider, spawn_turn};
use crate::cli::output::{OutputFormat, format_answer, format_tools};
use crate::cli::parser::{Cli, Commands};
use crate::client::{ChatClient, Conversation, DecoderRegistry, FoldEffect, StreamDecoder};
use crate::core::Message;
use crate::error::{ClientError, CommandError, DecodeError, Error, Result};
use crate::server::encoder::encode_stream;
use crate::server::{AppState, SubmitRequest, serve};

/// Parameters for the ask command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The question to ask.
    pub question: &'a str,
    /// Enabled plugin ids.
    pub plugins: &'a [String],
    /// Model for this turn.
    pub model: Option<&'a str>,
    /// Synthesis system prompt.
    pub system_prompt: Option<&'a str>,
    /// Submission endpoint; `None` runs in process.
    pub endpoint: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Serve {
            host,
            port,
            origin,
            prompt_dir,
        } => cmd_serve(host, *port, origin.clone(), prompt_dir.as_deref()),
        Commands::Ask {
            question,
            plugins,
            model,
            system_prompt,
            endpoint,
            prompt_dir,
        } => {
            let params = AskParams {
                question,
                plugins,
                model: model.as_deref(),
                system_prompt: system_prompt.as_deref(),
                endpoint: endpoint.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
            };
            cmd_ask(&params, format)
        }
        Commands::Tools => cmd_tools(format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds agent configuration from env plus CLI overrides.
fn agent_config(prompt_dir: Option<&Path>) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into()
    })
}

/// Creates the provider, tools and prompts shared by every turn.
fn app_state(prompt_dir: Option<&Path>) -> Result<AppState> {
    let config = agent_config(prompt_dir)?;
    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let registry = ToolRegistry::builtin(&config)?;
    let prompts = PromptSet::load(config.prompt_dir.as_deref());
    Ok(AppState::new(Arc::from(provider), config, registry, prompts))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Runs the HTTP endpoint until Ctrl-C.
fn cmd_serve(
    host: &str,
    port: u16,
    origin: Option<String>,
    prompt_dir: Option<&Path>,
) -> Result<String> {
    let state = app_state(prompt_dir)?.with_origin(origin);
    let rt = runtime()?;

    rt.block_on(serve(state, host, port))
        .map_err(|e| CommandError::ExecutionFailed(format!("Server error: {e}")))?;

    Ok(String::new())
}

/// Asks one question, streaming the answer to stdout in text mode.
fn cmd_ask(params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let mut conversation = Conversation::new();
    conversation.push_user(params.question);

    let request = SubmitRequest {
        system_prompt: params.system_prompt.unwrap_or_default().to_string(),
        model_name: params.model.map(str::to_string),
        ..SubmitRequest::new(conversation.messages.clone())
    }
    .with_plugins(params.plugins.iter().cloned());

    let registry = DecoderRegistry::new();
    let mut decoder = registry.bind(Message::new_id())?;
    let rt = runtime()?;

    let streamed: Result<()> = rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        let render = |effect: &FoldEffect| render_effect(effect, format);
        match params.endpoint {
            Some(endpoint) => {
                let client = ChatClient::new(endpoint)?;
                client
                    .submit(&request, &mut decoder, &cancel, render)
                    .await
                    .map(|_| ())
                    .map_err(Error::from)
            }
            None => {
                let state = app_state(params.prompt_dir)?;
                ask_local(&state, request, &mut decoder, &cancel, render).await
            }
        }
    });

    let notice = match streamed {
        Ok(()) => None,
        Err(Error::Decode(DecodeError::Remote { message })) => Some(message),
        Err(Error::Client(ClientError::Decode(DecodeError::Remote { message }))) => Some(message),
        Err(e) => return Err(e),
    };

    match notice {
        None => {
            let message = decoder.finish()?;
            conversation.complete(message);
        }
        Some(text) => {
            conversation.observe(&decoder);
            conversation.push_notice(decoder.message_id(), text);
        }
    }

    let answer = conversation
        .messages
        .last()
        .cloned()
        .unwrap_or_else(|| Message::assistant(String::new()));
    let notice = conversation.notices.last().map(|n| n.text.as_str());
    Ok(format_answer(&answer, notice, format))
}

/// Runs the encoder and decoder back to back in this process.
async fn ask_local<F>(
    state: &AppState,
    request: SubmitRequest,
    decoder: &mut StreamDecoder,
    cancel: &CancellationToken,
    mut on_effect: F,
) -> Result<()>
where
    F: FnMut(&FoldEffect),
{
    let orchestrator = state.orchestrator(&request.enabled_plugin_ids)?;

    let turn = cancel.child_token();
    let events = spawn_turn(orchestrator, request.into_turn(), turn.clone());
    let mut body = Box::pin(encode_stream(
        decoder.message_id().to_string(),
        events,
        turn,
    ));

    while let Some(Ok(chunk)) = body.next().await {
        for effect in decoder.feed(&chunk)? {
            on_effect(&effect);
        }
        decoder.ensure_live()?;
    }
    Ok(())
}

/// Writes deltas to stdout and status lines to stderr.
fn render_effect(effect: &FoldEffect, format: OutputFormat) {
    if format != OutputFormat::Text {
        return;
    }
    match effect {
        FoldEffect::Delta(text) => {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{text}");
            let _ = out.flush();
        }
        FoldEffect::Status(status) | FoldEffect::ToolFinished { status, .. } => {
            let _ = writeln!(io::stderr(), "» {status}");
        }
        FoldEffect::Failed(_) | FoldEffect::Ignored => {}
    }
}

/// Lists the built-in plugins.
fn cmd_tools(format: OutputFormat) -> Result<String> {
    // Tool construction does not use the provider key.
    let config = AgentConfig::builder()
        .api_key(String::new())
        .from_env()
        .build()?;
    let registry = ToolRegistry::builtin(&config)?;
    Ok(format_tools(&registry.descriptors(), format))
}

/// Writes the default prompt templates.
fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");
                output.push_str(&format!("  {name}\n"));
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
