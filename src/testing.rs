//! Fixtures shared by unit tests

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::board::BountyBoard;
use crate::db::Database;
use crate::entries::UpsertEntryInput;
use crate::error::Result;
use crate::ledger::{MemoryLedger, PaymentLedger, SYSTEM_ACCOUNT_ID};
use crate::models::{Currency, FileInput};

pub fn board_with_ledger() -> (BountyBoard, Arc<MemoryLedger>) {
    let db = Arc::new(Database::scratch().unwrap());
    let ledger = Arc::new(MemoryLedger::new(SYSTEM_ACCOUNT_ID));
    let board = BountyBoard::new(db, Arc::clone(&ledger) as Arc<dyn PaymentLedger>);
    (board, ledger)
}

/// Run `f` in its own committed unit of work
pub fn write<T>(db: &Database, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    let uow = db.unit_of_work()?;
    let out = f(&uow)?;
    uow.commit()?;
    Ok(out)
}

/// Insert a bounty with BUZZ pledges `(user_id, amount)`, bypassing the ledger
pub fn seed_bounty(board: &BountyBoard, pledges: &[(i64, i64)]) -> i64 {
    write(board.db(), |conn| {
        conn.execute(
            "INSERT INTO bounties (user_id, name, description, complete, created_at)
             VALUES (?1, 'seeded', '', 0, ?2)",
            params![pledges.first().map(|(user, _)| *user), Utc::now()],
        )?;
        let bounty_id = conn.last_insert_rowid();
        for (user_id, amount) in pledges {
            conn.execute(
                "INSERT INTO bounty_benefactors (bounty_id, user_id, unit_amount, currency, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![bounty_id, user_id, amount, Currency::Buzz, Utc::now()],
            )?;
        }
        Ok(bounty_id)
    })
    .unwrap()
}

pub fn seed_entry(board: &BountyBoard, bounty_id: i64, user_id: i64, files: Vec<FileInput>) -> i64 {
    board
        .upsert_entry(
            user_id,
            &UpsertEntryInput {
                id: None,
                bounty_id,
                description: format!("entry by {}", user_id),
                files,
                images: vec![],
            },
        )
        .unwrap()
        .id
}

/// Entry whose owning account has been detached
pub fn seed_entry_without_owner(board: &BountyBoard, bounty_id: i64) -> i64 {
    let entry_id = seed_entry(board, bounty_id, 1, vec![]);
    write(board.db(), |conn| {
        conn.execute(
            "UPDATE bounty_entries SET user_id = NULL WHERE id = ?1",
            params![entry_id],
        )?;
        Ok(())
    })
    .unwrap();
    entry_id
}
