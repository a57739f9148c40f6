//! Delete command - remove an entry that has not been awarded

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &BountyClient, entry_id: i64) -> Result<()> {
    match client.delete_entry(entry_id).await? {
        Some(entry) => print_success(&format!(
            "Deleted entry #{} from bounty #{}",
            entry.id, entry.bounty_id
        )),
        None => print_info(&format!("Entry #{} does not exist", entry_id)),
    }

    Ok(())
}
