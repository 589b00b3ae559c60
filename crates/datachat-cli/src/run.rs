use crate::cli::OutputFormat;
use crate::render::{format_flow, Renderer};
use anyhow::bail;
use datachat_config::Config;
use datachat_session::{ChatSession, ViewEvent};
use datachat_stream::HttpTransport;
use datachat_types::TurnPhase;
use parking_lot::Mutex;
use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

pub(crate) struct ChatArgs {
    pub(crate) message: Vec<String>,
    pub(crate) session: Option<String>,
    pub(crate) format: OutputFormat,
}

type Session = ChatSession<HttpTransport>;

fn collect_input(message: Vec<String>) -> anyhow::Result<Option<String>> {
    let joined = message.join(" ");
    if !joined.trim().is_empty() {
        return Ok(Some(joined));
    }
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut piped = String::new();
    std::io::stdin().read_to_string(&mut piped)?;
    if piped.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(piped))
    }
}

pub(crate) async fn run_chat(config: &Config, args: ChatArgs) -> anyhow::Result<()> {
    let transport = HttpTransport::new(config.chat_url(), config.connect_timeout())?;
    let mut chat = ChatSession::new(transport, config.turn_settings());
    if let Some(session_id) = args.session {
        chat = chat.with_session_id(session_id);
    }
    chat.set_model(config.model.clone());
    chat.select_data_context(config.data_context.clone());

    let renderer = Arc::new(Mutex::new(Renderer::new(args.format)));
    let finished = Arc::new(Notify::new());
    {
        let renderer = renderer.clone();
        let finished = finished.clone();
        chat.bus().subscribe(move |event| {
            renderer.lock().handle(event);
            if matches!(event, ViewEvent::TurnFinished { .. }) {
                finished.notify_one();
            }
        });
    }

    tracing::info!(
        session_id = %chat.session_id(),
        url = %config.chat_url(),
        "chat session ready"
    );

    match collect_input(args.message)? {
        Some(text) => {
            let phase = run_turn(&chat, &finished, text).await?;
            if phase != TurnPhase::Completed {
                bail!("Turn ended with {:?}", phase);
            }
            Ok(())
        }
        None => interactive(&chat, &finished).await,
    }
}

/// Runs one turn and returns once the turn has been released. A timed-out
/// turn keeps streaming into its message in the background.
async fn run_turn(chat: &Session, finished: &Notify, text: String) -> anyhow::Result<TurnPhase> {
    let runner = chat.clone();
    let mut handle = tokio::spawn(async move { runner.submit(&text).await });

    tokio::select! {
        biased;
        _ = finished.notified() => Ok(chat.phase()),
        joined = &mut handle => Ok(joined??.phase),
    }
}

async fn interactive(chat: &Session, finished: &Notify) -> anyhow::Result<()> {
    println!("DataChat interactive mode. Type 'exit' to quit, '/help' for commands.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        if let Some(command) = input.strip_prefix('/') {
            handle_command(chat, command);
            continue;
        }

        if let Err(error) = run_turn(chat, finished, input.to_string()).await {
            eprintln!("Error: {}", error);
        }
        println!();
    }

    Ok(())
}

fn handle_command(chat: &Session, command: &str) {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "help" => {
            println!("  /flow             show the current analysis flow");
            println!("  /reset            clear the flow display");
            println!("  /context <name>   select a data source");
            println!("  /model <id>       switch model");
            println!("  /session          show session details");
        }
        "flow" => println!("{}", format_flow(&chat.snapshot().flow)),
        "reset" => {
            chat.reset_flow();
            println!("Flow cleared");
        }
        "context" => {
            chat.select_data_context(Some(arg.to_string()));
            match chat.snapshot().data_context {
                Some(context) => println!("Data source: {}", context),
                None => println!("Data source cleared"),
            }
        }
        "model" => {
            let model = (!arg.is_empty()).then(|| arg.to_string());
            println!("Model: {}", model.as_deref().unwrap_or("(server default)"));
            chat.set_model(model);
        }
        "session" => {
            let snapshot = chat.snapshot();
            println!("Session:  {}", snapshot.session_id);
            println!("Phase:    {:?}", snapshot.phase);
            println!("Messages: {}", snapshot.messages.len());
        }
        other => eprintln!("Unknown command: /{}", other),
    }
}
