//! Create command - post a new bounty funded by the caller's pledge

use crate::client::BountyClient;
use crate::style::*;
use anyhow::Result;
use bounty_board::bounties::CreateBountyInput;
use bounty_board::models::{Currency, ImageInput};

pub async fn run(
    client: &BountyClient,
    name: String,
    amount: i64,
    currency: Currency,
    description: Option<String>,
    images: Vec<String>,
) -> Result<()> {
    let input = CreateBountyInput {
        name,
        description: description.unwrap_or_default(),
        unit_amount: amount,
        currency,
        images: images.into_iter().map(|url| ImageInput { url }).collect(),
    };
    let bounty = client.create_bounty(&input).await?;

    print_success(&format!("Created bounty #{}: {}", bounty.id, bounty.name));
    println!(
        "Your pledge: {}",
        style_bold(&format_amount(input.unit_amount, input.currency))
    );
    print_info(&format!(
        "Share it with: bounty pledge {} <amount>",
        bounty.id
    ));

    Ok(())
}
