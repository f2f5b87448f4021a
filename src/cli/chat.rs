use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::ai::chat::ChatRelay;
use crate::core::AppConfig;
use crate::core::db::async_db;

// Everything typed at the prompt is rate limited as one client
const CLI_IDENTITY: &str = "cli";

pub async fn run(config: &AppConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let db = async_db(&config.db_path).await?;
    let relay = ChatRelay::from_config(config, db)?;

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                let outcome = relay.submit_message(CLI_IDENTITY, &line).await;
                println!("{}", outcome.reply);
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
