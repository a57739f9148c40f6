//! Bounty board service handle

use std::sync::Arc;

use tracing::error;

use crate::db::{Database, UnitOfWork};
use crate::error::Result;
use crate::ledger::{PaymentLedger, TransactionResult, TransferRequest, SYSTEM_ACCOUNT_ID};

/// Entry point for bounty, entry and award operations.
///
/// Holds the store and the payment ledger explicitly; every operation runs
/// against these handles rather than process-wide clients. All methods block
/// and should run on a blocking thread when called from async code.
pub struct BountyBoard {
    db: Arc<Database>,
    ledger: Arc<dyn PaymentLedger>,
    system_account_id: i64,
}

impl BountyBoard {
    pub fn new(db: Arc<Database>, ledger: Arc<dyn PaymentLedger>) -> Self {
        Self {
            db,
            ledger,
            system_account_id: SYSTEM_ACCOUNT_ID,
        }
    }

    pub fn with_system_account(mut self, account_id: i64) -> Self {
        self.system_account_id = account_id;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_handle(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn system_account_id(&self) -> i64 {
        self.system_account_id
    }

    /// Move funds as the last step of `uow`; the caller commits right after.
    /// Fails with Timeout, before calling the ledger, if the unit of work has
    /// no budget left.
    pub(crate) fn transfer(
        &self,
        uow: &mut UnitOfWork<'_>,
        request: TransferRequest,
    ) -> Result<TransactionResult> {
        let remaining = uow.begin_external_call()?;
        self.ledger.transfer(&request, remaining)
    }
}

/// Log a ledger transfer whose enclosing unit of work failed to commit
pub(crate) fn report_orphaned_transfer(transfer: &TransactionResult, context: &str) {
    error!(
        "Ledger transaction {} completed but {} was not committed; manual reconciliation required",
        transfer.transaction_id, context
    );
}
