//! `shopchat chat` — interactive terminal chat through the same turn service.

use crate::startup;
use shopchat_core::SessionId;
use std::io::Write;
use std::path::Path;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// Inputs that end the conversation.
const CLOSE_WORDS: &[&str] = &["close", "exit"];

pub async fn run(
    config_path: Option<&Path>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let chat = startup::build_chat_service(&config).await?;
    let session = session.map(SessionId::from).unwrap_or_default();

    println!();
    println!("  ShopChat — interactive mode");
    println!();
    println!("  Model:    {}", config.model);
    println!("  Session:  {session}");
    println!();
    println!("  Type your message and press Enter. Type 'close' to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if CLOSE_WORDS.iter().any(|w| line.eq_ignore_ascii_case(w)) {
            break;
        }

        match chat.handle_turn(&session, line).await {
            Ok(reply) => {
                println!();
                for text in reply.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {}", e.user_message());
                println!();
            }
        }
    }

    println!();
    println!("  Conversation closed.");
    Ok(())
}
