//! Payment ledger collaborator
//!
//! Virtual-currency transfers between accounts. The ledger lives outside the
//! bounty store, so a transfer that succeeded is not undone when the caller's
//! unit of work later rolls back.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BountyError, Result};

/// Reserved platform account bounty pledges are held in
pub const SYSTEM_ACCOUNT_ID: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    Bounty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Idempotency key; a repeated key returns the original transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_transaction_id: Option<String>,
}

impl TransferRequest {
    pub fn bounty(
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
        description: &str,
        details: serde_json::Value,
    ) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            transaction_type: TransactionType::Bounty,
            description: description.to_string(),
            details: Some(details),
            external_transaction_id: None,
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_transaction_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub transaction_id: String,
}

/// Balance-transfer service. Calls are synchronous and fail on invalid
/// accounts or insufficient funds. `timeout` bounds the call; it is the time
/// left in the caller's unit of work.
pub trait PaymentLedger: Send + Sync {
    fn transfer(&self, request: &TransferRequest, timeout: Duration)
        -> Result<TransactionResult>;
}

// ============================================================================
// HTTP LEDGER
// ============================================================================

/// Client for a remote balance service
pub struct HttpLedger {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpLedger {
    /// Build the client. Must not be called from inside an async context.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BountyError::Ledger(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn transactions_url(&self) -> String {
        format!("{}/transactions", self.endpoint)
    }
}

impl PaymentLedger for HttpLedger {
    fn transfer(&self, request: &TransferRequest, timeout: Duration) -> Result<TransactionResult> {
        let url = self.transactions_url();
        debug!(
            "POST {} ({} -> {}, {})",
            url, request.from_account_id, request.to_account_id, request.amount
        );

        let resp = self
            .client
            .post(&url)
            .timeout(timeout.min(self.timeout))
            .json(request)
            .send()
            .map_err(|e| BountyError::Ledger(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            resp.json()
                .map_err(|e| BountyError::Ledger(format!("invalid response: {}", e)))
        } else {
            let error_text = resp.text().unwrap_or_else(|_| "Unknown error".into());
            Err(BountyError::Ledger(format!("({}) {}", status, error_text)))
        }
    }
}

// ============================================================================
// IN-PROCESS LEDGER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerTransaction {
    pub transaction_id: String,
    pub request: TransferRequest,
    pub created_at: DateTime<Utc>,
}

/// Ledger kept in memory. The system account may run negative; every other
/// account must cover the amount it sends.
pub struct MemoryLedger {
    system_account_id: i64,
    balances: Mutex<HashMap<i64, i64>>,
    history: Mutex<Vec<LedgerTransaction>>,
}

impl MemoryLedger {
    pub fn new(system_account_id: i64) -> Self {
        Self {
            system_account_id,
            balances: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn deposit(&self, account_id: i64, amount: i64) -> Result<()> {
        let mut balances = self.balances.lock();
        let balance = balances.entry(account_id).or_insert(0);
        *balance = checked_balance(balance.checked_add(amount), account_id)?;
        Ok(())
    }

    pub fn balance(&self, account_id: i64) -> i64 {
        self.balances.lock().get(&account_id).copied().unwrap_or(0)
    }

    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.history.lock().clone()
    }
}

fn checked_balance(balance: Option<i64>, account_id: i64) -> Result<i64> {
    balance.ok_or_else(|| BountyError::Ledger(format!("balance overflow in account {}", account_id)))
}

impl PaymentLedger for MemoryLedger {
    fn transfer(&self, request: &TransferRequest, _timeout: Duration) -> Result<TransactionResult> {
        if request.amount <= 0 {
            return Err(BountyError::Ledger(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        if request.from_account_id == request.to_account_id {
            return Err(BountyError::Ledger(
                "cannot transfer to the same account".to_string(),
            ));
        }

        // History stays locked until the transfer is recorded; keys are unique
        let mut history = self.history.lock();
        if let Some(key) = &request.external_transaction_id {
            if let Some(existing) = history
                .iter()
                .find(|t| t.request.external_transaction_id.as_ref() == Some(key))
            {
                debug!(
                    "Ledger transfer {} already recorded for key {}",
                    existing.transaction_id, key
                );
                return Ok(TransactionResult {
                    transaction_id: existing.transaction_id.clone(),
                });
            }
        }

        let mut balances = self.balances.lock();
        let available = balances.get(&request.from_account_id).copied().unwrap_or(0);
        if request.from_account_id != self.system_account_id && available < request.amount {
            return Err(BountyError::Ledger(format!(
                "insufficient funds in account {}: {} < {}",
                request.from_account_id, available, request.amount
            )));
        }

        let from_balance = checked_balance(
            available.checked_sub(request.amount),
            request.from_account_id,
        )?;
        let to_balance = checked_balance(
            balances
                .get(&request.to_account_id)
                .copied()
                .unwrap_or(0)
                .checked_add(request.amount),
            request.to_account_id,
        )?;
        balances.insert(request.from_account_id, from_balance);
        balances.insert(request.to_account_id, to_balance);
        drop(balances);

        let transaction_id = uuid::Uuid::new_v4().to_string();
        history.push(LedgerTransaction {
            transaction_id: transaction_id.clone(),
            request: request.clone(),
            created_at: Utc::now(),
        });

        info!(
            "Ledger transfer {}: {} -> {} ({})",
            transaction_id, request.from_account_id, request.to_account_id, request.amount
        );
        Ok(TransactionResult { transaction_id })
    }
}
