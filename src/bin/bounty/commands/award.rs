//! Award command - award the current user's pledge to an entry

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &BountyClient, entry_id: i64) -> Result<()> {
    let benefactor = client.award(entry_id).await?;

    print_success(&format!(
        "Awarded {} on bounty #{} to entry #{}",
        format_amount(benefactor.unit_amount, benefactor.currency),
        benefactor.bounty_id,
        entry_id
    ));

    let bounty = client.get_bounty(benefactor.bounty_id).await?;
    if bounty.bounty.complete {
        print_info("Every pledge has been awarded; the bounty is now complete.");
    }

    Ok(())
}
