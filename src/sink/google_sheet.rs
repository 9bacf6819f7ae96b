//! Google Sheets sink authenticated with a service account
//!
//! Publishing writes the header plus all rows from `A1` and then clears any
//! rows left below them by a longer earlier run. A failed write leaves the
//! previous snapshot in place.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, instrument};
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

use super::OutputSink;
use crate::models::ResultTable;
use crate::{AirsheetError, Result};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct GoogleSheetSink {
    client: Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    worksheet: String,
    endpoint: String,
}

impl GoogleSheetSink {
    /// Parse the credentials and fetch a first token so that a broken sink
    /// fails the run before any weather request is made.
    pub async fn connect(
        sheet_url: &str,
        service_account: &str,
        worksheet: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id(sheet_url).ok_or_else(|| {
            AirsheetError::config(format!("Cannot find a spreadsheet id in '{sheet_url}'"))
        })?;
        let key = load_key(service_account).await?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AirsheetError::config(format!("Failed to build HTTP client: {e}")))?;

        let sink = Self {
            client,
            key,
            spreadsheet_id,
            worksheet: worksheet.to_string(),
            endpoint: SHEETS_ENDPOINT.to_string(),
        };
        sink.access_token()
            .await
            .map_err(|e| AirsheetError::config(format!("Spreadsheet authentication failed: {e}")))?;

        info!(spreadsheet = %sink.spreadsheet_id, worksheet, "Spreadsheet sink ready");
        Ok(sink)
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let auth = ServiceAccountAuthenticator::builder(self.key.clone())
            .build()
            .await
            .context("Failed to create service account authenticator")?;
        let token = auth
            .token(&[SHEETS_SCOPE])
            .await
            .context("Failed to acquire token with spreadsheet scope")?;
        token
            .token()
            .map(str::to_string)
            .context("Token response carried no access token")
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.endpoint,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    /// Clear everything below the first `written_rows` rows
    async fn clear_below(&self, token: &str, written_rows: usize) -> Result<()> {
        let range = leftover_range(&self.worksheet, written_rows);
        let url = format!("{}:clear", self.values_url(&range));
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| AirsheetError::sink(format!("Clearing leftover rows failed: {e}")))?;
        check_response(response, "clear").await
    }

    async fn write(&self, token: &str, table: &ResultTable) -> Result<()> {
        let range = a1_range(&self.worksheet, "A1");
        let url = format!("{}?valueInputOption=RAW", self.values_url(&range));
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": table.to_values(),
        });
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AirsheetError::sink(format!("Writing worksheet failed: {e}")))?;
        check_response(response, "update").await
    }
}

#[async_trait]
impl OutputSink for GoogleSheetSink {
    #[instrument(skip(self, table), fields(rows = table.len()))]
    async fn publish(&self, table: &ResultTable) -> Result<()> {
        let token = self
            .access_token()
            .await
            .map_err(|e| AirsheetError::sink(format!("{e:#}")))?;

        let written_rows = table.len() + 1;
        self.write(&token, table).await?;
        debug!(written_rows, "Snapshot written");
        self.clear_below(&token, written_rows).await?;

        info!(spreadsheet = %self.spreadsheet_id, "Published snapshot");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("spreadsheet {} ({})", self.spreadsheet_id, self.worksheet)
    }
}

async fn check_response(response: reqwest::Response, operation: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(AirsheetError::sink(format!(
        "Sheets API {operation} returned {status}: {error_text}"
    )))
}

/// Inline JSON or a path to the key file
async fn load_key(source: &str) -> Result<ServiceAccountKey> {
    let trimmed = source.trim();
    if trimmed.starts_with('{') {
        yup_oauth2::parse_service_account_key(trimmed)
            .map_err(|e| AirsheetError::config(format!("Invalid service account JSON: {e}")))
    } else {
        yup_oauth2::read_service_account_key(trimmed)
            .await
            .map_err(|e| {
                AirsheetError::config(format!("Cannot read service account key '{trimmed}': {e}"))
            })
    }
}

/// Id from `https://docs.google.com/spreadsheets/d/<id>/edit`, or a bare id
fn spreadsheet_id(sheet_url: &str) -> Option<String> {
    let id = match sheet_url.split_once("/d/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or_default(),
        None if !sheet_url.contains('/') => sheet_url,
        None => "",
    };
    (!id.is_empty()).then(|| id.to_string())
}

fn a1_range(worksheet: &str, cell: &str) -> String {
    format!("'{}'!{cell}", worksheet.replace('\'', "''"))
}

/// Rows below a block of `written_rows` rows starting at `A1`, to the last
/// column a sheet can have
fn leftover_range(worksheet: &str, written_rows: usize) -> String {
    a1_range(worksheet, &format!("A{}:ZZZ", written_rows + 1))
}
