//! Records stored by the bounty board

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

// ============================================================================
// CURRENCY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Platform virtual currency, paid out through the payment ledger
    Buzz,
    /// No payout rail; awards record the link only
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Buzz => "BUZZ",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUZZ" => Ok(Currency::Buzz),
            "USD" => Ok(Currency::Usd),
            other => Err(format!("unknown currency: {}", other)),
        }
    }
}

impl ToSql for Currency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Currency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

// ============================================================================
// ENTITY TAGS
// ============================================================================

/// Owner tag for the entity-keyed file and image association tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Bounty,
    BountyEntry,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Bounty => "Bounty",
            EntityType::BountyEntry => "BountyEntry",
        }
    }
}

impl ToSql for EntityType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounty {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BountyEntry {
    pub id: i64,
    pub bounty_id: i64,
    /// None once the owning account has been detached
    pub user_id: Option<i64>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BountyBenefactor {
    pub id: i64,
    pub bounty_id: i64,
    pub user_id: i64,
    pub unit_amount: i64,
    pub currency: Currency,
    pub awarded_to_id: Option<i64>,
    pub awarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BountyBenefactor {
    pub fn is_awarded(&self) -> bool {
        self.awarded_to_id.is_some()
    }
}

/// Access rules attached to an uploaded file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub unlock_amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub benefactors_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: i64,
    pub name: String,
    /// Nulled when the caller has not unlocked the file
    pub url: Option<String>,
    pub size_kb: f64,
    pub metadata: FileMetadata,
}

/// File payload supplied when creating or updating an entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInput {
    /// Present for files already attached to the entry
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size_kb: f64,
    #[serde(default)]
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub url: String,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub url: String,
}

// ============================================================================
// VIEWS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BountyDetails {
    pub bounty: Bounty,
    pub benefactors: Vec<BountyBenefactor>,
    pub entry_count: i64,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDetails {
    pub entry: BountyEntry,
    pub awarded_total: i64,
    pub images: Vec<Image>,
}

/// Outcome of re-running the completion check on a bounty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCheck {
    pub bounty_id: i64,
    /// True if this check flipped the bounty to complete
    pub completed_now: bool,
    pub complete: bool,
    pub unawarded: i64,
}

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<i64>,
}
