//! Award coordination
//!
//! Awarding links one benefactor's pledge to a winning entry and pays the
//! entry owner. The sequence:
//!
//! 1. In one unit of work: validate the entry, bounty and benefactor, record
//!    the award on the benefactor, and for BUZZ pledges transfer the amount
//!    from the system account to the entry owner through the payment ledger.
//!    The transfer is the last step before commit and only starts while the
//!    unit of work still has budget left.
//! 2. After commit, in a second short unit of work: if no benefactor of the
//!    bounty is left unawarded, mark the bounty complete.
//!
//! The ledger is external to the store. A transfer that succeeds is not
//! reverted if the award then fails to commit; that case is logged for
//! reconciliation. Payouts carry a per-benefactor idempotency key, so a
//! retried award does not pay the owner twice.

use chrono::Utc;
use rusqlite::params;
use serde_json::json;
use tracing::{info, warn};

use crate::board::{report_orphaned_transfer, BountyBoard};
use crate::bounties::{count_unawarded, get_benefactor, get_bounty, mark_complete};
use crate::entries::get_entry;
use crate::error::{BountyError, Result};
use crate::ledger::TransferRequest;
use crate::models::{BountyBenefactor, CompletionCheck, Currency};

impl BountyBoard {
    /// Award the caller's pledge on the entry's bounty to `entry_id`
    pub fn award_entry(&self, entry_id: i64, awarding_user_id: i64) -> Result<BountyBenefactor> {
        let mut uow = self.db().unit_of_work()?;

        let entry = get_entry(&uow, entry_id)?
            .ok_or_else(|| BountyError::invalid_state(format!("Entry {} not found", entry_id)))?;
        let owner_id = entry
            .user_id
            .ok_or_else(|| BountyError::invalid_state("Entry has no owner to award"))?;

        let bounty = get_bounty(&uow, entry.bounty_id)?.ok_or_else(|| {
            BountyError::invalid_state(format!("Bounty {} not found", entry.bounty_id))
        })?;
        if bounty.complete {
            return Err(BountyError::invalid_state("Bounty is already complete"));
        }

        let benefactor = get_benefactor(&uow, bounty.id, awarding_user_id)?.ok_or_else(|| {
            BountyError::not_found(format!(
                "User {} is not a benefactor of bounty {}",
                awarding_user_id, bounty.id
            ))
        })?;
        if benefactor.is_awarded() {
            return Err(BountyError::invalid_state(
                "Benefactors can only award entries once",
            ));
        }

        let awarded_at = Utc::now();
        let updated = uow.execute(
            "UPDATE bounty_benefactors SET awarded_to_id = ?1, awarded_at = ?2
             WHERE id = ?3 AND awarded_to_id IS NULL",
            params![entry_id, awarded_at, benefactor.id],
        )?;
        if updated != 1 {
            return Err(BountyError::invalid_state(
                "Benefactors can only award entries once",
            ));
        }

        let payout = match benefactor.currency {
            Currency::Buzz => Some(self.transfer(
                &mut uow,
                TransferRequest::bounty(
                    self.system_account_id(),
                    owner_id,
                    benefactor.unit_amount,
                    "Awarded bounty",
                    json!({ "bountyId": bounty.id, "entryId": entry_id }),
                )
                .with_external_id(format!("bounty-award-{}", benefactor.id)),
            )?),
            // No payout rail for other currencies; the award is recorded only
            Currency::Usd => None,
        };

        if let Err(e) = uow.commit() {
            if let Some(payout) = &payout {
                report_orphaned_transfer(payout, "the bounty award");
            }
            return Err(e);
        }

        info!(
            "User {} awarded {} {} on bounty {} to entry {} (owner {})",
            awarding_user_id,
            benefactor.unit_amount,
            benefactor.currency,
            bounty.id,
            entry_id,
            owner_id
        );

        // Award already committed; completion failures are only logged
        if let Err(e) = self.complete_if_fully_awarded(bounty.id) {
            warn!("Completion check for bounty {} failed: {}", bounty.id, e);
        }

        Ok(BountyBenefactor {
            awarded_to_id: Some(entry_id),
            awarded_at: Some(awarded_at),
            ..benefactor
        })
    }

    /// Mark the bounty complete once every benefactor has awarded.
    /// Returns true if this call completed it.
    pub fn complete_if_fully_awarded(&self, bounty_id: i64) -> Result<bool> {
        let uow = self.db().unit_of_work()?;
        if count_unawarded(&uow, bounty_id)? > 0 {
            return Ok(false);
        }
        let completed = mark_complete(&uow, bounty_id)?;
        uow.commit()?;

        if completed {
            info!("Bounty {} complete: every benefactor has awarded", bounty_id);
        }
        Ok(completed)
    }

    /// Re-run the completion check, e.g. after the post-award step failed
    pub fn recheck_completion(&self, bounty_id: i64) -> Result<CompletionCheck> {
        self.get_bounty(bounty_id)?;
        let completed_now = self.complete_if_fully_awarded(bounty_id)?;

        self.db().with_conn(|conn| {
            let bounty = get_bounty(conn, bounty_id)?
                .ok_or_else(|| BountyError::not_found(format!("Bounty {} not found", bounty_id)))?;
            Ok(CompletionCheck {
                bounty_id,
                completed_now,
                complete: bounty.complete,
                unawarded: count_unawarded(conn, bounty_id)?,
            })
        })
    }
}
