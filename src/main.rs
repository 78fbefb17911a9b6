//! chatgate - terminal client
//!
//! Plain lines are questions. Slash commands answer the email gate and
//! manage the session.

use chatgate::runtime::ChatError;
use chatgate::state_machine::{Message, MessageId, MessageKind, Role};
use chatgate::{
    ClientConfig, GateResolution, HttpChatApi, SessionController, SqliteSessionStore, ViewEvent,
};
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Type a question and press enter.
  /email <address>  answer the email prompt
  /skip             skip the email prompt when offered
  /reset            start a new conversation
  /session          show the session id
  /help             show this help
  /quit             exit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Query(String),
    Email(String),
    Skip,
    Reset,
    Session,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Query(line.to_string());
        };

        let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match name.to_ascii_lowercase().as_str() {
            "email" => Command::Email(arg.trim().to_string()),
            "skip" => Command::Skip,
            "reset" | "clear" => Command::Reset,
            "session" => Command::Session,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => Command::Unknown(name.to_string()),
        }
    }
}

/// Renders view events as plain text
struct TerminalView<W: Write> {
    out: W,
    /// Answer being streamed and the text already printed for it
    current: Option<(MessageId, String)>,
}

impl<W: Write> TerminalView<W> {
    fn new(out: W) -> Self {
        Self { out, current: None }
    }

    fn handle(&mut self, event: &ViewEvent) -> std::io::Result<()> {
        match event {
            ViewEvent::MessageAdded { message } => self.message_added(message)?,
            ViewEvent::MessageUpdated { message } => self.message_updated(message)?,
            ViewEvent::MessageRemoved { id } => {
                if self.current.as_ref().is_some_and(|(current, _)| current == id) {
                    self.current = None;
                    writeln!(self.out)?;
                }
            }
            ViewEvent::GateOpened { gate } => {
                if gate.skip_allowed {
                    writeln!(self.out, "  (reply with /email <address>, or /skip)")?;
                } else {
                    writeln!(self.out, "  (reply with /email <address>)")?;
                }
            }
            ViewEvent::GateError { message } => writeln!(self.out, "! {message}")?,
            ViewEvent::GateClosed => {}
            ViewEvent::SessionChanged { session_id } => {
                tracing::debug!(session_id = %session_id, "Session changed");
            }
            ViewEvent::Cleared => writeln!(self.out, "-- new conversation --")?,
            ViewEvent::Error { message } => writeln!(self.out, "! {message}")?,
        }
        self.out.flush()
    }

    fn message_added(&mut self, message: &Message) -> std::io::Result<()> {
        match (message.role, message.kind) {
            (Role::User, _) => Ok(()),
            (Role::Bot, MessageKind::Gate) => writeln!(self.out, "bot> {}", message.content),
            (Role::Bot, MessageKind::Normal) => {
                write!(self.out, "bot> {}", message.content)?;
                self.current = Some((message.id, message.content.clone()));
                if message.streaming {
                    Ok(())
                } else {
                    self.finish(message)
                }
            }
        }
    }

    fn message_updated(&mut self, message: &Message) -> std::io::Result<()> {
        let Some((id, printed)) = self.current.as_mut() else {
            return Ok(());
        };
        if *id != message.id {
            return Ok(());
        }

        // Content is resent in full; print only what is new
        if let Some(suffix) = message.content.strip_prefix(printed.as_str()) {
            write!(self.out, "{suffix}")?;
        } else {
            write!(self.out, "\nbot> {}", message.content)?;
        }
        printed.clone_from(&message.content);

        if message.streaming {
            Ok(())
        } else {
            self.finish(message)
        }
    }

    fn finish(&mut self, message: &Message) -> std::io::Result<()> {
        self.current = None;
        writeln!(self.out)?;
        if let Some(sources) = &message.sources {
            writeln!(self.out, "     sources: {sources}")?;
        }
        Ok(())
    }
}

/// Run a controller operation while rendering its events as they arrive
async fn drive<W: Write>(
    op: impl Future<Output = Result<(), ChatError>>,
    rx: &mut broadcast::Receiver<ViewEvent>,
    view: &mut TerminalView<W>,
) -> std::io::Result<()> {
    tokio::pin!(op);
    let result = loop {
        tokio::select! {
            result = &mut op => break result,
            event = rx.recv() => match event {
                Ok(event) => view.handle(&event)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "View fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
        }
    };
    drain(rx, view)?;

    if let Err(e) = result {
        // Gate errors were already rendered inline
        if !matches!(
            e,
            ChatError::GateRejected(_) | ChatError::InvalidEmail | ChatError::SkipNotAllowed
        ) {
            writeln!(view.out, "! {e}")?;
        }
    }
    Ok(())
}

fn drain<W: Write>(
    rx: &mut broadcast::Receiver<ViewEvent>,
    view: &mut TerminalView<W>,
) -> std::io::Result<()> {
    loop {
        match rx.try_recv() {
            Ok(event) => view.handle(&event)?,
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with answers
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatgate=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        base_url = %config.base_url,
        db_path = %config.db_path.display(),
        "Starting chatgate"
    );

    let store = SqliteSessionStore::open(&config.db_path)?;
    let api = HttpChatApi::new(&config.base_url, config.request_timeout)?;
    let shutdown = api.shutdown_token();
    let mut controller = SessionController::new(api, store, config);

    match controller.health().await {
        Ok(health) if health.is_ready() => tracing::info!("Service is ready"),
        Ok(health) => tracing::warn!(status = %health.status, "Service reports it is not ready"),
        Err(e) => tracing::warn!(error = %e, "Service health check failed"),
    }

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    let mut rx = controller.subscribe();
    let mut view = TerminalView::new(std::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Session => println!("session: {}", controller.session_id()),
            Command::Unknown(name) => println!("unknown command /{name}, try /help"),
            Command::Reset => {
                controller.reset();
                drain(&mut rx, &mut view)?;
            }
            Command::Email(address) => {
                let op = controller.resolve_gate(GateResolution::Submit(address));
                drive(op, &mut rx, &mut view).await?;
            }
            Command::Skip => {
                drive(controller.resolve_gate(GateResolution::Skip), &mut rx, &mut view).await?;
            }
            Command::Query(text) => {
                drive(controller.send_query(&text), &mut rx, &mut view).await?;
            }
        }

        if shutdown.is_cancelled() {
            break;
        }
    }

    Ok(())
}
