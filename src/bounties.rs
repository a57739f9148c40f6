//! Bounties and benefactor pledges

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::board::{report_orphaned_transfer, BountyBoard};
use crate::error::{BountyError, Result};
use crate::files;
use crate::ledger::TransferRequest;
use crate::models::{Bounty, BountyBenefactor, BountyDetails, Currency, EntityType, ImageInput};

const BOUNTY_COLUMNS: &str = "id, user_id, name, description, complete, created_at";
const BENEFACTOR_COLUMNS: &str =
    "id, bounty_id, user_id, unit_amount, currency, awarded_to_id, awarded_at, created_at";

// ============================================================================
// QUERIES
// ============================================================================

fn bounty_from_row(row: &Row<'_>) -> rusqlite::Result<Bounty> {
    Ok(Bounty {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        complete: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn benefactor_from_row(row: &Row<'_>) -> rusqlite::Result<BountyBenefactor> {
    Ok(BountyBenefactor {
        id: row.get(0)?,
        bounty_id: row.get(1)?,
        user_id: row.get(2)?,
        unit_amount: row.get(3)?,
        currency: row.get(4)?,
        awarded_to_id: row.get(5)?,
        awarded_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn get_bounty(conn: &Connection, bounty_id: i64) -> Result<Option<Bounty>> {
    let bounty = conn
        .query_row(
            &format!("SELECT {} FROM bounties WHERE id = ?1", BOUNTY_COLUMNS),
            params![bounty_id],
            bounty_from_row,
        )
        .optional()?;
    Ok(bounty)
}

pub fn get_benefactor(
    conn: &Connection,
    bounty_id: i64,
    user_id: i64,
) -> Result<Option<BountyBenefactor>> {
    let benefactor = conn
        .query_row(
            &format!(
                "SELECT {} FROM bounty_benefactors WHERE bounty_id = ?1 AND user_id = ?2",
                BENEFACTOR_COLUMNS
            ),
            params![bounty_id, user_id],
            benefactor_from_row,
        )
        .optional()?;
    Ok(benefactor)
}

pub fn list_benefactors(conn: &Connection, bounty_id: i64) -> Result<Vec<BountyBenefactor>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bounty_benefactors WHERE bounty_id = ?1 ORDER BY id",
        BENEFACTOR_COLUMNS
    ))?;
    let benefactors = stmt
        .query_map(params![bounty_id], benefactor_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(benefactors)
}

/// Benefactors of the bounty that have not awarded their pledge yet
pub fn count_unawarded(conn: &Connection, bounty_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM bounty_benefactors WHERE bounty_id = ?1 AND awarded_to_id IS NULL",
        params![bounty_id],
        |row| row.get(0),
    )?)
}

/// Returns true if this call flipped the flag
pub fn mark_complete(conn: &Connection, bounty_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE bounties SET complete = 1 WHERE id = ?1 AND complete = 0",
        params![bounty_id],
    )?;
    Ok(changed > 0)
}

fn insert_benefactor(
    conn: &Connection,
    bounty_id: i64,
    user_id: i64,
    unit_amount: i64,
    currency: Currency,
) -> Result<()> {
    conn.execute(
        "INSERT INTO bounty_benefactors (bounty_id, user_id, unit_amount, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![bounty_id, user_id, unit_amount, currency, Utc::now()],
    )?;
    Ok(())
}

fn require_benefactor(conn: &Connection, bounty_id: i64, user_id: i64) -> Result<BountyBenefactor> {
    get_benefactor(conn, bounty_id, user_id)?.ok_or_else(|| {
        BountyError::not_found(format!(
            "No benefactor for user {} on bounty {}",
            user_id, bounty_id
        ))
    })
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBountyInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit_amount: i64,
    pub currency: Currency,
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

impl BountyBoard {
    /// Create a bounty funded by its creator's own pledge
    pub fn create_bounty(&self, user_id: i64, input: &CreateBountyInput) -> Result<Bounty> {
        if input.name.trim().is_empty() {
            return Err(BountyError::invalid_state("Bounty name is required"));
        }
        if input.unit_amount <= 0 {
            return Err(BountyError::invalid_state("Bounty amount must be positive"));
        }

        let mut uow = self.db().unit_of_work()?;
        uow.execute(
            "INSERT INTO bounties (user_id, name, description, complete, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![user_id, input.name.trim(), input.description, Utc::now()],
        )?;
        let bounty_id = uow.last_insert_rowid();
        insert_benefactor(&uow, bounty_id, user_id, input.unit_amount, input.currency)?;
        files::attach_images(
            &uow,
            bounty_id,
            EntityType::Bounty,
            Some(user_id),
            &input.images,
        )?;

        let bounty = get_bounty(&uow, bounty_id)?
            .ok_or_else(|| BountyError::Database("bounty vanished after insert".to_string()))?;

        let charge = match input.currency {
            Currency::Buzz => Some(self.transfer(
                &mut uow,
                TransferRequest::bounty(
                    user_id,
                    self.system_account_id(),
                    input.unit_amount,
                    "Bounty created",
                    json!({ "bountyId": bounty_id }),
                ),
            )?),
            Currency::Usd => None,
        };

        if let Err(e) = uow.commit() {
            if let Some(charge) = &charge {
                report_orphaned_transfer(charge, "bounty creation");
            }
            return Err(e);
        }

        info!(
            "Created bounty {} by user {} ({} {})",
            bounty_id, user_id, input.unit_amount, input.currency
        );
        Ok(bounty)
    }

    /// Pledge funds to a bounty, topping up an existing unawarded pledge
    pub fn add_benefactor_amount(
        &self,
        bounty_id: i64,
        user_id: i64,
        amount: i64,
        currency: Currency,
    ) -> Result<BountyBenefactor> {
        if amount <= 0 {
            return Err(BountyError::invalid_state("Pledge amount must be positive"));
        }

        let mut uow = self.db().unit_of_work()?;
        let bounty = get_bounty(&uow, bounty_id)?
            .ok_or_else(|| BountyError::not_found(format!("Bounty {} not found", bounty_id)))?;
        if bounty.complete {
            return Err(BountyError::invalid_state("Bounty is already complete"));
        }

        match get_benefactor(&uow, bounty_id, user_id)? {
            Some(existing) if existing.is_awarded() => {
                return Err(BountyError::invalid_state(
                    "Benefactor has already awarded this bounty",
                ));
            }
            Some(existing) if existing.currency != currency => {
                return Err(BountyError::invalid_state(format!(
                    "Pledge currency must be {}",
                    existing.currency
                )));
            }
            Some(existing) => {
                uow.execute(
                    "UPDATE bounty_benefactors SET unit_amount = unit_amount + ?1 WHERE id = ?2",
                    params![amount, existing.id],
                )?;
            }
            None => insert_benefactor(&uow, bounty_id, user_id, amount, currency)?,
        }

        let benefactor = require_benefactor(&uow, bounty_id, user_id)?;

        let charge = match currency {
            Currency::Buzz => Some(self.transfer(
                &mut uow,
                TransferRequest::bounty(
                    user_id,
                    self.system_account_id(),
                    amount,
                    "Added to bounty",
                    json!({ "bountyId": bounty_id }),
                ),
            )?),
            Currency::Usd => None,
        };

        if let Err(e) = uow.commit() {
            if let Some(charge) = &charge {
                report_orphaned_transfer(charge, "bounty pledge");
            }
            return Err(e);
        }

        info!(
            "User {} pledged {} {} to bounty {} (total {})",
            user_id, amount, currency, bounty_id, benefactor.unit_amount
        );
        Ok(benefactor)
    }

    pub fn get_bounty(&self, bounty_id: i64) -> Result<Bounty> {
        self.db()
            .with_conn(|conn| get_bounty(conn, bounty_id))?
            .ok_or_else(|| BountyError::not_found(format!("Bounty {} not found", bounty_id)))
    }

    pub fn get_bounty_details(&self, bounty_id: i64) -> Result<BountyDetails> {
        self.db().with_conn(|conn| {
            let bounty = get_bounty(conn, bounty_id)?
                .ok_or_else(|| BountyError::not_found(format!("Bounty {} not found", bounty_id)))?;
            let benefactors = list_benefactors(conn, bounty_id)?;
            let entry_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM bounty_entries WHERE bounty_id = ?1",
                params![bounty_id],
                |row| row.get(0),
            )?;
            Ok(BountyDetails {
                bounty,
                benefactors,
                entry_count,
                images: files::list_images_by_entity(conn, bounty_id, EntityType::Bounty)?,
            })
        })
    }

    pub fn list_benefactors(&self, bounty_id: i64) -> Result<Vec<BountyBenefactor>> {
        self.db().with_conn(|conn| list_benefactors(conn, bounty_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{board_with_ledger, write};

    fn input(amount: i64, currency: Currency) -> CreateBountyInput {
        CreateBountyInput {
            name: "Anime style LoRA".to_string(),
            description: "Train a LoRA".to_string(),
            unit_amount: amount,
            currency,
            images: vec![ImageInput {
                url: "https://img.example.com/cover.png".to_string(),
            }],
        }
    }

    #[test]
    fn test_create_bounty_charges_creator() {
        let (board, ledger) = board_with_ledger();
        ledger.deposit(5, 500).unwrap();

        let bounty = board.create_bounty(5, &input(200, Currency::Buzz)).unwrap();
        assert!(!bounty.complete);
        assert_eq!(ledger.balance(5), 300);
        assert_eq!(ledger.balance(0), 200);

        let details = board.get_bounty_details(bounty.id).unwrap();
        assert_eq!(details.benefactors.len(), 1);
        assert_eq!(details.benefactors[0].user_id, 5);
        assert_eq!(details.entry_count, 0);
        assert_eq!(details.images.len(), 1);
    }

    #[test]
    fn test_create_bounty_without_funds_rolls_back() {
        let (board, ledger) = board_with_ledger();

        let err = board
            .create_bounty(5, &input(200, Currency::Buzz))
            .unwrap_err();
        assert!(matches!(err, BountyError::Ledger(_)));
        assert!(ledger.transactions().is_empty());

        let count: i64 = board
            .db()
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM bounties", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_pledge_tops_up_existing_benefactor() {
        let (board, ledger) = board_with_ledger();
        let bounty = board.create_bounty(5, &input(10, Currency::Usd)).unwrap();

        ledger.deposit(8, 100).unwrap();
        board
            .add_benefactor_amount(bounty.id, 8, 30, Currency::Buzz)
            .unwrap();
        let topped = board
            .add_benefactor_amount(bounty.id, 8, 20, Currency::Buzz)
            .unwrap();
        assert_eq!(topped.unit_amount, 50);
        assert_eq!(ledger.balance(8), 50);
        assert_eq!(board.list_benefactors(bounty.id).unwrap().len(), 2);
    }

    #[test]
    fn test_pledge_rejects_currency_mismatch_and_bad_amount() {
        let (board, _ledger) = board_with_ledger();
        let bounty = board.create_bounty(5, &input(10, Currency::Usd)).unwrap();

        let err = board
            .add_benefactor_amount(bounty.id, 5, 10, Currency::Buzz)
            .unwrap_err();
        assert!(matches!(err, BountyError::InvalidState(_)));

        let err = board
            .add_benefactor_amount(bounty.id, 5, 0, Currency::Usd)
            .unwrap_err();
        assert!(matches!(err, BountyError::InvalidState(_)));
    }

    #[test]
    fn test_pledge_to_missing_bounty() {
        let (board, _ledger) = board_with_ledger();
        let err = board
            .add_benefactor_amount(42, 5, 10, Currency::Usd)
            .unwrap_err();
        assert!(matches!(err, BountyError::NotFound(_)));
    }

    #[test]
    fn test_completion_flag_cannot_be_reset() {
        let (board, _ledger) = board_with_ledger();
        let bounty = board.create_bounty(5, &input(10, Currency::Usd)).unwrap();

        let flipped = write(board.db(), |conn| mark_complete(conn, bounty.id)).unwrap();
        assert!(flipped);
        let again = write(board.db(), |conn| mark_complete(conn, bounty.id)).unwrap();
        assert!(!again);

        let reopen = write(board.db(), |conn| {
            Ok(conn.execute(
                "UPDATE bounties SET complete = 0 WHERE id = ?1",
                params![bounty.id],
            )?)
        });
        assert!(reopen.is_err());
        assert!(board.get_bounty(bounty.id).unwrap().complete);
    }
}
