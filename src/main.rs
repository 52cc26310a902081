use anyhow::Result;
use clap::Parser;
use lingualand::cli::{Cli, Commands};
use lingualand::{utils, ServiceError, Settings, System};
use std::io::Write;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let cli = Cli::parse();
    let api_key = if cli.command.needs_provider() {
        Settings::api_key()?
    } else {
        // the client is built but never called
        Settings::api_key().unwrap_or_default()
    };
    let system = System::from_settings(&settings, api_key).await?;
    let user = cli.user.as_str();

    match cli.command {
        Commands::Chat { language, text } => handle_chat(&system, user, &language, &text).await,
        Commands::Interactive { language } => handle_interactive(&system, user, &language).await,
        Commands::New { language, title } => {
            let thread_id = system
                .conversations
                .start_new_conversation(user, &language, title.as_deref())
                .await?;
            utils::print_success(&format!(
                "Started new {} conversation (thread {})",
                language, thread_id
            ));
            Ok(())
        }
        Commands::History { language } => handle_history(&system, user, &language).await,
        Commands::List => handle_list(&system, user).await,
        Commands::Delete { language } => {
            if system.conversations.delete_conversation(user, &language).await? {
                utils::print_success(&format!("Conversation for {} deleted", language));
            } else {
                utils::print_error(&format!("No conversation for {}", language));
            }
            Ok(())
        }
        Commands::Rename { language, title } => {
            if system.conversations.rename_conversation(user, &language, &title).await? {
                utils::print_success("Conversation title updated");
            } else {
                utils::print_error(&format!("No conversation for {}", language));
            }
            Ok(())
        }
        Commands::Grammar { text, language } => {
            print_result(system.text_ops.check_grammar(&text, &language).await?);
            Ok(())
        }
        Commands::Translate { text, from, to } => {
            print_result(system.text_ops.translate(&text, &from, &to).await?);
            Ok(())
        }
        Commands::Summarize { text, language } => {
            print_result(system.text_ops.summarize(&text, &language).await?);
            Ok(())
        }
        Commands::Paraphrase { text, language } => {
            print_result(system.text_ops.paraphrase(&text, &language).await?);
            Ok(())
        }
    }
}

fn print_result(result: String) {
    println!("\n{}", result);
}

/// Send one message. A durability failure still prints the reply, then
/// retries the save once without asking the model again.
async fn send(system: &System, user: &str, language: &str, text: &str) -> Result<()> {
    match system.conversations.converse(user, language, text).await {
        Ok(reply) => {
            utils::print_turn("Tutor", &reply.reply);
            Ok(())
        }
        Err(ServiceError::Persistence { reply, pending, source }) => {
            utils::print_turn("Tutor", &reply.reply);
            utils::print_warning(&format!("Reply not saved yet ({}), retrying...", source));
            match system.conversations.retry_persist(&pending).await {
                Ok(()) => utils::print_success("Saved."),
                Err(e) => utils::print_error(&format!("Still not saved: {}", e)),
            }
            Ok(())
        }
        Err(e) if e.is_retryable() => {
            utils::print_error(&format!("The tutor is unavailable right now, try again: {}", e));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_chat(system: &System, user: &str, language: &str, text: &str) -> Result<()> {
    send(system, user, language, text).await
}

async fn handle_interactive(system: &System, user: &str, language: &str) -> Result<()> {
    utils::print_header(&format!("{} practice", language));
    utils::print_info(
        "Type your messages (Ctrl+D to exit, /new to start over, /help for commands)\n",
    );

    let mut reader = BufReader::new(io::stdin());

    loop {
        utils::print_prompt("You: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/new" => {
                let thread_id = system
                    .conversations
                    .start_new_conversation(user, language, None)
                    .await?;
                utils::print_success(&format!("New conversation started (thread {})\n", thread_id));
            }
            "/history" => handle_history(system, user, language).await?,
            "/help" => {
                println!("Special commands:");
                println!("  /new      - Start a fresh conversation");
                println!("  /history  - Show stored messages");
                println!("  /help     - Show this help");
                println!("  Ctrl+D    - Exit\n");
            }
            text => {
                send(system, user, language, text).await?;
                println!();
            }
        }
    }

    Ok(())
}

async fn handle_history(system: &System, user: &str, language: &str) -> Result<()> {
    let Some(history) = system.conversations.history(user, language).await? else {
        utils::print_info(&format!("No conversation for {} yet", language));
        return Ok(());
    };

    utils::print_header(&history.conversation.title);
    for message in &history.messages {
        let speaker = match message.role {
            lingualand::session::Role::User => "You",
            lingualand::session::Role::Assistant => "Tutor",
        };
        utils::print_turn(speaker, &message.content);
    }
    Ok(())
}

async fn handle_list(system: &System, user: &str) -> Result<()> {
    let conversations = system.conversations.list_conversations(user).await?;
    if conversations.is_empty() {
        utils::print_info("No conversations yet");
        return Ok(());
    }

    utils::print_header("Conversations");
    for record in conversations {
        println!(
            "  {} - {} (updated {})",
            record.language,
            record.title,
            record.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
