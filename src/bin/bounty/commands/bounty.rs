//! Bounty command - show a bounty and its benefactors

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &BountyClient, bounty_id: i64) -> Result<()> {
    let details = client.get_bounty(bounty_id).await?;
    let bounty = &details.bounty;

    print_header(&format!("Bounty #{}: {}", bounty.id, bounty.name));
    if !bounty.description.is_empty() {
        println!("{}", style_dim(&truncate(&bounty.description, 72)));
        println!();
    }

    println!(
        "Status:   {}",
        if bounty.complete {
            style_green("complete")
        } else {
            style_yellow("open")
        }
    );
    println!("Entries:  {}", style_bold(&details.entry_count.to_string()));
    println!();

    if details.benefactors.is_empty() {
        print_info("No benefactors yet.");
        return Ok(());
    }

    println!("{:>8}  {:>12}  Awarded to", "User", "Pledge");
    println!("{}", "─".repeat(40));
    for benefactor in &details.benefactors {
        let awarded = match benefactor.awarded_to_id {
            Some(entry_id) => style_green(&format!("entry #{}", entry_id)),
            None => style_dim("-"),
        };
        println!(
            "{:>8}  {:>12}  {}",
            benefactor.user_id,
            format_amount(benefactor.unit_amount, benefactor.currency),
            awarded
        );
    }

    let unawarded = details
        .benefactors
        .iter()
        .filter(|b| !b.is_awarded())
        .count();
    println!();
    println!(
        "{} of {} pledges awarded",
        details.benefactors.len() - unawarded,
        details.benefactors.len()
    );

    Ok(())
}
