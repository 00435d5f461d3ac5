// src/cli/chat.rs — Interactive REPL

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::chat::controller::{Controller, Conversation, CURSOR};
use crate::chat::message::{Message, Role};
use crate::chat::{RenderSink, SinkClosed, SubmitOutcome};

/// Run the interactive chat REPL.
pub async fn run_chat(controller: Arc<Controller>) -> anyhow::Result<()> {
    eprintln!(
        "charla v{} | {} | /help for commands\n",
        env!("CARGO_PKG_VERSION"),
        controller.options().model,
    );

    let mut conv = controller.conversation();

    while let Some(input) = read_input() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }

        if trimmed.starts_with('/') {
            handle_slash_command(trimmed, &controller, &mut conv).await;
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        let mut sink = TerminalSink::new();
        match controller.submit(&mut conv, trimmed, &mut sink).await {
            Ok(SubmitOutcome::Completed {
                stream_error: Some(e),
                ..
            }) => {
                eprintln!("\n[error] Reply may be incomplete: {e}");
            }
            Ok(_) => {}
            Err(e) => eprintln!("[error] {e}"),
        }
        println!();
    }

    Ok(())
}

fn read_input() -> Option<String> {
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}

async fn handle_slash_command(input: &str, controller: &Controller, conv: &mut Conversation) {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/new" => {
            let id = controller.start_new(conv);
            eprintln!("  New conversation {id}");
        }

        "/sessions" => match controller.list_sessions().await {
            Ok(sessions) if sessions.is_empty() => {
                eprintln!("  No stored conversations yet.");
            }
            Ok(sessions) => {
                for s in sessions {
                    eprintln!(
                        "  {}  {}  {}",
                        s.created_at.format("%Y-%m-%d %H:%M"),
                        s.id,
                        s.first_message,
                    );
                }
            }
            Err(e) => eprintln!("  [error] {e}"),
        },

        "/open" => {
            if arg.is_empty() {
                eprintln!("  Usage: /open <session-id>");
                return;
            }
            if let Err(e) = controller.select_session(conv, arg).await {
                eprintln!("  [error] History unavailable, starting empty: {e}");
            }
            render_window(conv);
        }

        "/more" => {
            conv.load_more();
            render_window(conv);
        }

        "/help" => {
            eprintln!("Slash commands:");
            eprintln!("  /new               Start a new conversation");
            eprintln!("  /sessions          List stored conversations");
            eprintln!("  /open <id>         Open a stored conversation");
            eprintln!("  /more              Reveal older messages");
            eprintln!("  /help              Show this help");
            eprintln!("  /quit, quit, exit  End session");
        }

        _ => {
            eprintln!("Unknown command: {cmd}. Type /help for commands.");
        }
    }
}

fn render_window(conv: &Conversation) {
    if conv.has_more() {
        let hidden = conv.transcript.len() - conv.visible().len();
        eprintln!("  ({hidden} older message(s) hidden; /more to reveal)");
    }
    for message in conv.visible() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "bot",
            Role::System => "sys",
        };
        println!("[{who}] {}", message.content);
    }
}

/// Streams partials onto the terminal by printing only the newly appended
/// suffix of each replacement.
struct TerminalSink {
    printed: usize,
}

impl TerminalSink {
    fn new() -> Self {
        Self { printed: 0 }
    }
}

impl RenderSink for TerminalSink {
    fn partial(&mut self, text: &str) -> Result<(), SinkClosed> {
        let text = text.strip_suffix(CURSOR).unwrap_or(text);
        if text.len() > self.printed {
            print!("{}", &text[self.printed..]);
            io::stdout().flush().ok();
            self.printed = text.len();
        }
        Ok(())
    }

    fn message(&mut self, _message: &Message) -> Result<(), SinkClosed> {
        Ok(())
    }

    fn notice(&mut self, text: &str) {
        eprintln!("\n[notice] {text}");
    }
}
