//! Complete command - moderator re-check of a bounty's completion

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &BountyClient, bounty_id: i64) -> Result<()> {
    let check = client.recheck_completion(bounty_id).await?;

    if check.completed_now {
        print_success(&format!("Bounty #{} is now complete", bounty_id));
    } else if check.complete {
        print_info(&format!("Bounty #{} was already complete", bounty_id));
    } else {
        print_info(&format!(
            "Bounty #{} stays open: {} pledge(s) not awarded yet",
            bounty_id,
            style_yellow(&check.unawarded.to_string())
        ));
    }

    Ok(())
}
