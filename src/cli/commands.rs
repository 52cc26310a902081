use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lingualand")]
#[command(author, version, about = "Practice languages with an LLM tutor", long_about = None)]
pub struct Cli {
    /// User the conversations belong to
    #[arg(short, long, global = true, default_value = "local")]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message in your conversation for a language
    Chat {
        #[arg(short, long)]
        language: String,

        text: String,
    },

    /// Keep chatting in a language until EOF
    Interactive {
        #[arg(short, long)]
        language: String,
    },

    /// Throw away the conversation for a language and start a fresh one
    New {
        #[arg(short, long)]
        language: String,

        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show the stored messages of a conversation
    History {
        #[arg(short, long)]
        language: String,
    },

    /// List all conversations of the user
    List,

    /// Delete the conversation for a language
    Delete {
        #[arg(short, long)]
        language: String,
    },

    /// Change the title of a conversation
    Rename {
        #[arg(short, long)]
        language: String,

        title: String,
    },

    /// Check the grammar of a text
    Grammar {
        text: String,

        #[arg(short, long, default_value = "English")]
        language: String,
    },

    /// Translate a text
    Translate {
        text: String,

        #[arg(long, default_value = "English")]
        from: String,

        #[arg(long, default_value = "Spanish")]
        to: String,
    },

    /// Summarize a text
    Summarize {
        text: String,

        #[arg(short, long, default_value = "English")]
        language: String,
    },

    /// Paraphrase a text
    Paraphrase {
        text: String,

        #[arg(short, long, default_value = "English")]
        language: String,
    },
}

impl Commands {
    /// Whether the command calls the generation provider and so needs an API key.
    pub fn needs_provider(&self) -> bool {
        !matches!(
            self,
            Self::New { .. }
                | Self::History { .. }
                | Self::List
                | Self::Delete { .. }
                | Self::Rename { .. }
        )
    }
}
