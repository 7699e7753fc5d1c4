use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::auth::{ServiceAccountAuth, TokenSource};
use super::{SheetStatus, Workbook};
use crate::models::Cell;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
const NEW_SHEET_ROWS: usize = 2000;

/// Google Sheets v4 client bound to one spreadsheet
pub struct GoogleSheetsClient {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    auth: Box<dyn TokenSource>,
    sheet_ids: Mutex<HashMap<String, i64>>,
}

impl GoogleSheetsClient {
    /// Client authenticated with a service account key JSON string
    pub fn from_service_account_json(json: &str, spreadsheet_id: &str) -> Result<Self> {
        let auth = ServiceAccountAuth::from_json(json)?;
        Self::new(SHEETS_API_BASE, spreadsheet_id, Box::new(auth))
    }

    pub fn new(base_url: &str, spreadsheet_id: &str, auth: Box<dyn TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("krx-daily-sheets/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url).context("invalid Sheets API base URL")?,
            spreadsheet_id: spreadsheet_id.to_string(),
            auth,
            sheet_ids: Mutex::new(HashMap::new()),
        })
    }

    /// `<base>/v4/spreadsheets/<id>` followed by `segments`, each percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    /// Make authenticated request to the Sheets API
    async fn make_request(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        let access_token = self.auth.access_token().await?;
        debug!("Sheets {} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Sheets request failed with status {}: {}", status, error_text));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn batch_update(&self, requests: Value) -> Result<Value> {
        let url = self.url(&[])?;
        // batchUpdate is a custom method on the spreadsheet resource
        let url = Url::parse(&format!("{}:batchUpdate", url))?;
        self.make_request(Method::POST, url, Some(json!({ "requests": requests })))
            .await
    }

    /// Numeric sheet id for a title, refreshing the cache from the spreadsheet metadata
    async fn sheet_id(&self, title: &str) -> Result<Option<i64>> {
        if let Some(id) = self.sheet_ids.lock().await.get(title) {
            return Ok(Some(*id));
        }

        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let metadata = self.make_request(Method::GET, url, None).await?;

        let mut sheet_ids = self.sheet_ids.lock().await;
        for sheet in metadata["sheets"].as_array().into_iter().flatten() {
            let properties = &sheet["properties"];
            if let (Some(name), Some(id)) = (properties["title"].as_str(), properties["sheetId"].as_i64()) {
                sheet_ids.insert(name.to_string(), id);
            }
        }
        Ok(sheet_ids.get(title).copied())
    }

    async fn require_sheet_id(&self, title: &str) -> Result<i64> {
        self.sheet_id(title)
            .await?
            .ok_or_else(|| anyhow!("sheet {:?} not found", title))
    }

    fn first_row_range(sheet_id: i64) -> Value {
        json!({
            "sheetId": sheet_id,
            "dimension": "ROWS",
            "startIndex": 0,
            "endIndex": 1,
        })
    }
}

/// A1 range covering a whole sheet; quotes doubled per A1 notation
pub fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl Workbook for GoogleSheetsClient {
    async fn open_or_create(&self, title: &str, columns: usize) -> Result<SheetStatus> {
        if self.sheet_id(title).await?.is_some() {
            return Ok(SheetStatus::Existing);
        }

        let reply = self
            .batch_update(json!([{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": columns.max(1),
                        }
                    }
                }
            }]))
            .await?;

        let sheet_id = reply["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .ok_or_else(|| anyhow!("addSheet reply without sheetId"))?;
        self.sheet_ids.lock().await.insert(title.to_string(), sheet_id);
        info!("📄 Created sheet {:?}", title);
        Ok(SheetStatus::Created)
    }

    async fn read_all(&self, title: &str) -> Result<Vec<Vec<String>>> {
        let mut url = self.url(&["values", &sheet_range(title)])?;
        url.query_pairs_mut().append_pair("majorDimension", "ROWS");
        let data = self.make_request(Method::GET, url, None).await?;

        let rows = data["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(cell_string).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn delete_first_row(&self, title: &str) -> Result<()> {
        let sheet_id = self.require_sheet_id(title).await?;
        self.batch_update(json!([{
            "deleteDimension": { "range": Self::first_row_range(sheet_id) }
        }]))
        .await?;
        Ok(())
    }

    async fn insert_first_row(&self, title: &str, row: &[String]) -> Result<()> {
        let sheet_id = self.require_sheet_id(title).await?;
        self.batch_update(json!([{
            "insertDimension": {
                "range": Self::first_row_range(sheet_id),
                "inheritFromBefore": false,
            }
        }]))
        .await?;

        let mut url = self.url(&["values", &format!("{}!A1", sheet_range(title))])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.make_request(
            Method::PUT,
            url,
            Some(json!({ "majorDimension": "ROWS", "values": [row] })),
        )
        .await?;
        Ok(())
    }

    async fn append_rows(&self, title: &str, rows: &[Vec<Cell>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut url = self.url(&["values", &format!("{}:append", sheet_range(title))])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.make_request(
            Method::POST,
            url,
            Some(json!({ "majorDimension": "ROWS", "values": rows })),
        )
        .await?;
        Ok(())
    }
}
