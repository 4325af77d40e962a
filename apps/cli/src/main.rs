use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tubetalk_core::{
    Config, HttpBackend, SessionOptions, SessionUpdate, UserAction, start_session,
};

use crate::{
    command::{Command, HELP, parse_line},
    render::Renderer,
};

mod command;
mod render;

#[derive(Parser)]
#[command(name = "tubetalk")]
#[command(about = "Load a YouTube video's transcript and ask questions about it")]
struct Cli {
    /// Video URL to load right away
    url: Option<String>,

    /// Assistant backend base URL. Defaults to $TUBETALK_BACKEND_URL or http://127.0.0.1:8000/
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Start without the greeting message
    #[arg(long)]
    no_greeting: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::resolve(cli.backend_url.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let mut renderer = Renderer::new();
    renderer.banner(config.backend_url.as_str());

    let backend = Arc::new(HttpBackend::new(&config));
    let mut handle = start_session(
        backend,
        SessionOptions {
            greeting: !cli.no_greeting,
            ..SessionOptions::default()
        },
    );
    tracing::debug!(session = %handle.session_id, "session started");
    let actions = handle.sender();

    if let Some(url) = cli.url {
        actions.send(UserAction::EditReference(url)).await?;
        actions.send(UserAction::LoadVideo).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_closed = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    input_closed = true;
                    break;
                };
                match parse_line(&line) {
                    Command::Empty => {}
                    Command::Ask(text) => actions.send(UserAction::Submit(text)).await?,
                    Command::Load(url) => {
                        actions.send(UserAction::EditReference(url)).await?;
                        actions.send(UserAction::LoadVideo).await?;
                    }
                    Command::History => renderer.history(),
                    Command::Status => renderer.status(),
                    Command::Help => renderer.info(HELP),
                    Command::Quit => break,
                    Command::Unknown(name) => {
                        renderer.info(&format!("unknown command /{name}, try /help"))
                    }
                }
            }
            update = handle.next_update() => match update {
                Some(SessionUpdate::MessageAppended(message)) => renderer.message(message),
                Some(SessionUpdate::StateChanged(status)) => renderer.status_changed(status),
                Some(SessionUpdate::Rejected(rejection)) => renderer.rejected(rejection),
                None => break,
            },
        }
    }

    // End of input still lets a pending load or answer arrive; /quit does not wait.
    let session = if input_closed {
        drop(actions);
        handle
            .finish(|update| match update {
                SessionUpdate::MessageAppended(message) => renderer.message(message),
                SessionUpdate::StateChanged(status) => renderer.status_changed(status),
                SessionUpdate::Rejected(rejection) => renderer.rejected(rejection),
            })
            .await?
    } else {
        handle.join().await?
    };
    renderer.finish();
    println!(
        "\n{} {}\n",
        style("Turns:").dim(),
        style(session.history().len()).cyan().bold()
    );

    Ok(())
}
