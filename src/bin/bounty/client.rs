//! Bounty Board API Client
//!
//! Thin wrapper over the server's JSON endpoints. Identity is sent in the
//! same headers the gateway would set.

use anyhow::{anyhow, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use bounty_board::auth::{MODERATOR_HEADER, USER_ID_HEADER};
use bounty_board::bounties::CreateBountyInput;
use bounty_board::entries::UpsertEntryInput;
use bounty_board::models::{
    Bounty, BountyBenefactor, BountyDetails, BountyEntry, CompletionCheck, Currency,
    FileDescriptor, Page,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct PledgeRequest {
    amount: i64,
    currency: Currency,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Bounty Board API client
pub struct BountyClient {
    client: Client,
    base_url: String,
    user_id: Option<i64>,
    moderator: bool,
}

impl BountyClient {
    pub fn new(server_url: &str, user_id: Option<i64>, moderator: bool) -> Self {
        // Build HTTP client with timeout, falling back to default client if builder fails
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
            user_id,
            moderator,
        }
    }

    fn api_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/api/{}", self.base_url, path)
    }

    fn with_identity(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = match self.user_id {
            Some(user_id) => builder.header(USER_ID_HEADER, user_id.to_string()),
            None => builder,
        };
        if self.moderator {
            builder.header(MODERATOR_HEADER, "true")
        } else {
            builder
        }
    }

    async fn parse<T: DeserializeOwned>(resp: Response, action: &str) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp.json().await?)
        } else {
            let error_text = match resp.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => "Unknown error".to_string(),
            };
            Err(anyhow!("{} failed ({}): {}", action, status, error_text))
        }
    }

    pub async fn create_bounty(&self, input: &CreateBountyInput) -> Result<Bounty> {
        let url = self.api_url("bounties");
        let resp = self
            .with_identity(self.client.post(&url))
            .json(input)
            .send()
            .await?;
        Self::parse(resp, "Creating bounty").await
    }

    pub async fn recheck_completion(&self, bounty_id: i64) -> Result<CompletionCheck> {
        let url = self.api_url(&format!("bounties/{}/complete", bounty_id));
        let resp = self.with_identity(self.client.post(&url)).send().await?;
        Self::parse(resp, "Completion check").await
    }

    pub async fn upsert_entry(&self, input: &UpsertEntryInput) -> Result<BountyEntry> {
        let url = self.api_url("entries");
        let resp = self
            .with_identity(self.client.post(&url))
            .json(input)
            .send()
            .await?;
        Self::parse(resp, "Submitting entry").await
    }

    pub async fn get_bounty(&self, bounty_id: i64) -> Result<BountyDetails> {
        let url = self.api_url(&format!("bounties/{}", bounty_id));
        let resp = self.client.get(&url).send().await?;
        Self::parse(resp, "Fetching bounty").await
    }

    pub async fn list_entries(
        &self,
        bounty_id: i64,
        cursor: Option<i64>,
        limit: u32,
    ) -> Result<Page<BountyEntry>> {
        let mut path = format!("bounties/{}/entries?limit={}", bounty_id, limit);
        if let Some(cursor) = cursor {
            path.push_str(&format!("&cursor={}", cursor));
        }
        let resp = self.client.get(self.api_url(&path)).send().await?;
        Self::parse(resp, "Listing entries").await
    }

    pub async fn list_files(&self, entry_id: i64) -> Result<Vec<FileDescriptor>> {
        let url = self.api_url(&format!("entries/{}/files", entry_id));
        let resp = self.with_identity(self.client.get(&url)).send().await?;
        Self::parse(resp, "Listing files").await
    }

    pub async fn award(&self, entry_id: i64) -> Result<BountyBenefactor> {
        let url = self.api_url(&format!("entries/{}/award", entry_id));
        let resp = self.with_identity(self.client.post(&url)).send().await?;
        Self::parse(resp, "Award").await
    }

    pub async fn delete_entry(&self, entry_id: i64) -> Result<Option<BountyEntry>> {
        let url = self.api_url(&format!("entries/{}", entry_id));
        let resp = self.with_identity(self.client.delete(&url)).send().await?;
        Self::parse(resp, "Delete").await
    }

    pub async fn pledge(
        &self,
        bounty_id: i64,
        amount: i64,
        currency: Currency,
    ) -> Result<BountyBenefactor> {
        let url = self.api_url(&format!("bounties/{}/benefactors", bounty_id));
        let resp = self
            .with_identity(self.client.post(&url))
            .json(&PledgeRequest { amount, currency })
            .send()
            .await?;
        Self::parse(resp, "Pledge").await
    }
}
