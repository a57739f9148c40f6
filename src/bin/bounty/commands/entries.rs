//! Entries command - list entries submitted to a bounty

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(
    client: &BountyClient,
    bounty_id: i64,
    cursor: Option<i64>,
    limit: u32,
) -> Result<()> {
    print_header(&format!("Entries for bounty #{}", bounty_id));

    let page = client.list_entries(bounty_id, cursor, limit).await?;
    if page.items.is_empty() {
        print_info("No entries yet.");
        return Ok(());
    }

    println!();
    println!("{:>6}  {:>8}  {:<20}  Description", "Entry", "Owner", "Submitted");
    println!("{}", "─".repeat(75));
    for entry in &page.items {
        let owner = entry
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| style_dim("deleted"));
        println!(
            "{:>6}  {:>8}  {:<20}  {}",
            format!("#{}", entry.id),
            owner,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&entry.description, 32)
        );
    }

    if let Some(next) = page.next_cursor {
        println!();
        println!(
            "More entries: {}",
            style_cyan(&format!("bounty entries {} --cursor {}", bounty_id, next))
        );
    }

    Ok(())
}
