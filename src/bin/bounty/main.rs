//! Bounty Board CLI
//!
//! Command-line interface for the Bounty Board server.

mod client;
mod commands;
mod style;

use bounty_board::models::Currency;
use clap::{Parser, Subcommand};
use style::*;

#[derive(Parser)]
#[command(name = "bounty")]
#[command(version)]
#[command(about = "Bounty Board - Award bounty pledges to winning entries", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Bounty Board server URL
    #[arg(
        short,
        long,
        env = "BOUNTY_SERVER",
        default_value = "http://localhost:8080",
        global = true
    )]
    server: String,

    /// Act as this user
    #[arg(short, long, env = "BOUNTY_USER_ID", global = true)]
    user: Option<i64>,

    /// Send requests with moderator rights
    #[arg(long, global = true)]
    moderator: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a bounty with its benefactors
    #[command(visible_alias = "b")]
    Bounty { bounty_id: i64 },

    /// List entries submitted to a bounty
    #[command(visible_alias = "ls")]
    Entries {
        bounty_id: i64,

        /// Continue after this entry id
        #[arg(long)]
        cursor: Option<i64>,

        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// List an entry's files as the current user sees them
    #[command(visible_alias = "f")]
    Files { entry_id: i64 },

    /// Award your pledge to an entry
    #[command(visible_alias = "a")]
    Award { entry_id: i64 },

    /// Delete an entry that has not been awarded
    Delete { entry_id: i64 },

    /// Pledge funds to a bounty
    #[command(visible_alias = "p")]
    Pledge {
        bounty_id: i64,
        amount: i64,

        /// BUZZ or USD
        #[arg(short, long, default_value = "BUZZ")]
        currency: Currency,
    },

    /// Create a bounty funded by your own pledge
    #[command(visible_alias = "c")]
    Create {
        name: String,
        amount: i64,

        /// BUZZ or USD
        #[arg(short, long, default_value = "BUZZ")]
        currency: Currency,

        #[arg(short, long)]
        description: Option<String>,

        /// Cover image URL (repeatable)
        #[arg(long = "image")]
        images: Vec<String>,
    },

    /// Submit an entry to a bounty, or update one with --entry
    #[command(visible_alias = "s")]
    Submit {
        bounty_id: i64,

        /// Existing entry to update
        #[arg(long)]
        entry: Option<i64>,

        #[arg(short, long)]
        description: Option<String>,

        /// File as name=url (repeatable)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Preview image URL (repeatable)
        #[arg(long = "image")]
        images: Vec<String>,

        /// Awarded total needed before files are visible
        #[arg(long)]
        unlock: Option<i64>,

        /// Currency of the unlock amount
        #[arg(long)]
        unlock_currency: Option<Currency>,

        /// Only benefactors who awarded the entry may see files
        #[arg(long)]
        benefactors_only: bool,
    },

    /// Re-run the completion check on a bounty (moderators)
    Complete { bounty_id: i64 },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    let client = client::BountyClient::new(&cli.server, cli.user, cli.moderator);

    let result = match cli.command {
        Commands::Bounty { bounty_id } => commands::bounty::run(&client, bounty_id).await,
        Commands::Entries {
            bounty_id,
            cursor,
            limit,
        } => commands::entries::run(&client, bounty_id, cursor, limit).await,
        Commands::Files { entry_id } => commands::files::run(&client, entry_id).await,
        Commands::Award { entry_id } => commands::award::run(&client, entry_id).await,
        Commands::Delete { entry_id } => commands::delete::run(&client, entry_id).await,
        Commands::Pledge {
            bounty_id,
            amount,
            currency,
        } => commands::pledge::run(&client, bounty_id, amount, currency).await,
        Commands::Create {
            name,
            amount,
            currency,
            description,
            images,
        } => commands::create::run(&client, name, amount, currency, description, images).await,
        Commands::Submit {
            bounty_id,
            entry,
            description,
            files,
            images,
            unlock,
            unlock_currency,
            benefactors_only,
        } => {
            let gate = commands::submit::FileGate {
                unlock_amount: unlock,
                currency: unlock_currency,
                benefactors_only,
            };
            commands::submit::run(&client, bounty_id, entry, description, files, images, gate)
                .await
        }
        Commands::Complete { bounty_id } => commands::complete::run(&client, bounty_id).await,
    };

    if let Err(e) = result {
        print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
