use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod history;
pub mod init;
pub mod serve;

use crate::ai::chat::Order;
use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Start an interactive chat session with the assistant
    Chat {},
    /// Print the conversation log
    History {
        #[arg(long, value_enum, default_value = "desc")]
        order: OrderArg,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete every message in the conversation log
    Clear {},
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for Order {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Asc => Order::Asc,
            OrderArg::Desc => Order::Desc,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::from_env();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat {}) => {
            chat::run(&config).await?;
        }
        Some(Command::History { order, limit }) => {
            history::list(&config, order.into(), limit).await?;
        }
        Some(Command::Clear {}) => {
            history::clear(&config).await?;
        }
        None => {}
    }

    Ok(())
}
