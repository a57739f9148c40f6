//! Files command - list entry files visible to the current user

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &BountyClient, entry_id: i64) -> Result<()> {
    print_header(&format!("Files for entry #{}", entry_id));

    let files = client.list_files(entry_id).await?;
    if files.is_empty() {
        print_info("This entry has no files.");
        return Ok(());
    }

    for file in &files {
        let unlock = match (file.metadata.unlock_amount, file.metadata.currency) {
            (Some(amount), Some(currency)) => format!(" unlocks at {}", format_amount(amount, currency)),
            (Some(amount), None) => format!(" unlocks at {}", amount),
            _ => String::new(),
        };
        let scope = if file.metadata.benefactors_only {
            " (awarding benefactors only)"
        } else {
            ""
        };

        println!(
            "{} {} {}",
            style_bold(&file.name),
            style_dim(&format!("{:.1} KB", file.size_kb)),
            style_dim(&format!("{}{}", unlock, scope))
        );
        match &file.url {
            Some(url) => println!("    {}", style_cyan(url)),
            None => println!("    {}", style_yellow("locked")),
        }
    }

    Ok(())
}
