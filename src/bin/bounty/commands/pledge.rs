//! Pledge command - add funds to a bounty

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;
use bounty_board::models::Currency;

pub async fn run(client: &BountyClient, bounty_id: i64, amount: i64, currency: Currency) -> Result<()> {
    let benefactor = client.pledge(bounty_id, amount, currency).await?;

    print_success(&format!(
        "Pledged {} to bounty #{}",
        format_amount(amount, currency),
        bounty_id
    ));
    println!(
        "Your total pledge: {}",
        style_bold(&format_amount(benefactor.unit_amount, benefactor.currency))
    );

    Ok(())
}
