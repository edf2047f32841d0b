use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatkeep")]
#[command(author, version, about = "Inspect and administer chat-bot configuration and history", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the storage key an identifier maps to
    Sanitize { raw: String },

    /// Read or change configuration records
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect conversation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Delete a configuration or conversation record
    Purge {
        #[command(flatten)]
        target: PurgeTarget,
    },

    /// List every stored document key
    Keys,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print a user's or guild's options
    Show {
        #[command(flatten)]
        owner: ConfigOwner,
    },

    /// Set one option, leaving the others untouched
    Set {
        #[command(flatten)]
        owner: ConfigOwner,

        /// switch-model | modify-capacity | message-stream | toggle-chat
        option: String,

        value: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ConfigOwner {
    /// User name
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Guild identifier
    #[arg(short = 'g', long)]
    pub group: Option<String>,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Print the stored messages of a channel
    Show {
        #[arg(short = 'c', long)]
        channel: String,

        #[command(flatten)]
        owner: HistoryOwner,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct HistoryOwner {
    /// History owned by this user
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// History shared by the whole channel
    #[arg(long)]
    pub shared: bool,
}

#[derive(Args)]
pub struct PurgeTarget {
    /// User configuration, or with --channel that user's history
    #[arg(short = 'u', long, conflicts_with = "group")]
    pub user: Option<String>,

    /// Guild configuration
    #[arg(short = 'g', long)]
    pub group: Option<String>,

    /// Channel whose history to delete
    #[arg(short = 'c', long, conflicts_with = "group")]
    pub channel: Option<String>,

    /// With --channel: the shared history
    #[arg(long, requires = "channel", conflicts_with = "user")]
    pub shared: bool,
}
