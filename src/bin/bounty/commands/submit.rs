//! Submit command - create or update an entry on a bounty

use crate::client::BountyClient;
use crate::style::*;
use anyhow::{bail, Result};
use bounty_board::entries::UpsertEntryInput;
use bounty_board::models::{Currency, FileInput, FileMetadata, ImageInput};

/// Access rules applied to every file passed on the command line
pub struct FileGate {
    pub unlock_amount: Option<i64>,
    pub currency: Option<Currency>,
    pub benefactors_only: bool,
}

/// Parse `name=url`
fn parse_file(spec: &str, gate: &FileGate) -> Result<FileInput> {
    let Some((name, url)) = spec.split_once('=') else {
        bail!("Invalid file '{}': expected name=url", spec);
    };
    if name.trim().is_empty() || url.trim().is_empty() {
        bail!("Invalid file '{}': name and url are required", spec);
    }

    Ok(FileInput {
        id: None,
        name: name.trim().to_string(),
        url: url.trim().to_string(),
        size_kb: 0.0,
        metadata: FileMetadata {
            unlock_amount: gate.unlock_amount,
            currency: gate.currency,
            benefactors_only: gate.benefactors_only,
        },
    })
}

pub async fn run(
    client: &BountyClient,
    bounty_id: i64,
    entry_id: Option<i64>,
    description: Option<String>,
    files: Vec<String>,
    images: Vec<String>,
    gate: FileGate,
) -> Result<()> {
    let files = files
        .iter()
        .map(|spec| parse_file(spec, &gate))
        .collect::<Result<Vec<_>>>()?;
    let file_count = files.len();

    let input = UpsertEntryInput {
        id: entry_id,
        bounty_id,
        description: description.unwrap_or_default(),
        files,
        images: images.into_iter().map(|url| ImageInput { url }).collect(),
    };
    let entry = client.upsert_entry(&input).await?;

    let verb = if entry_id.is_some() { "Updated" } else { "Submitted" };
    print_success(&format!(
        "{} entry #{} on bounty #{}",
        verb, entry.id, entry.bounty_id
    ));
    if file_count > 0 {
        let gate_note = match gate.unlock_amount {
            Some(amount) => format!(
                "unlock at {} awarded",
                format_amount(amount, gate.currency.unwrap_or(Currency::Buzz))
            ),
            None => "unlocked".to_string(),
        };
        println!("Files:  {} ({})", file_count, style_dim(&gate_note));
    }

    Ok(())
}
