//! Interactive terminal chat against a running relay.
//!
//! ```text
//! CHAT_RELAY_URL=http://127.0.0.1:8787/ cargo run --example chat
//! ```

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use vitals_chat::client::{ChatSession, Notice, SendOutcome, TranscriptListener};
use vitals_chat::model::Message;
use vitals_chat::options::ClientConfig;

/// Prints the assistant reply as it grows.
#[derive(Default)]
struct TerminalListener {
    printed: std::sync::Mutex<usize>,
}

impl TranscriptListener for TerminalListener {
    fn transcript_changed(&self, transcript: &[Message]) {
        let Some(last) = transcript.last().filter(|m| m.is_assistant()) else {
            return;
        };
        let Ok(mut printed) = self.printed.lock() else {
            return;
        };
        if let Some(new_text) = last.content.get(*printed..) {
            print!("{}", new_text);
            let _ = std::io::stdout().flush();
        }
        *printed = last.content.len();
    }

    fn loading_changed(&self, loading: bool) {
        if let Ok(mut printed) = self.printed.lock() {
            *printed = 0;
        }
        if loading {
            print!("assistant> ");
        } else {
            println!();
        }
        let _ = std::io::stdout().flush();
    }

    fn notify(&self, notice: &Notice) {
        eprintln!("\n[{}] {}", notice.title, notice.description);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;
    let session = ChatSession::new(config)?.with_listener(Arc::new(TerminalListener::default()));

    for message in session.transcript().await {
        println!("assistant> {}", message.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("you> ");
    std::io::stdout().flush()?;
    while let Some(line) = lines.next_line().await? {
        if let SendOutcome::Skipped = session.send_message(&line).await {
            println!("(nothing sent)");
        }
        print!("you> ");
        std::io::stdout().flush()?;
    }

    Ok(())
}
