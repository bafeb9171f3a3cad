// src/client/mod.rs

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::FetchError;

const MAX_RETRIES: u32 = 3;
const BACKOFF_MS: u64 = 500;

const ITEMS_QUERY: &str = r#"
query ($board_id: [ID!]) {
  boards(ids: $board_id) {
    name
    columns { id title type }
    items_page(limit: 500) {
      cursor
      items { name column_values { id text } }
    }
  }
}
"#;

const ITEMS_QUERY_CURSOR: &str = r#"
query ($board_id: [ID!], $cursor: String!) {
  boards(ids: $board_id) {
    name
    columns { id title type }
    items_page(limit: 500, cursor: $cursor) {
      cursor
      items { name column_values { id text } }
    }
  }
}
"#;

const COLUMNS_QUERY: &str = r#"
query ($board_id: [ID!]) {
  boards(ids: $board_id) {
    name
    columns { id title type }
  }
}
"#;

const ME_QUERY: &str = "query { me { name email } }";

/// Column metadata as reported by the board API.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMeta {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnValue {
    pub id: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub name: String,
    pub column_values: Vec<ColumnValue>,
}

/// One fully paginated board: every item plus the column metadata needed to
/// normalize it.
#[derive(Debug, Clone)]
pub struct BoardData {
    pub name: String,
    pub columns: Vec<ColumnMeta>,
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BoardsPayload {
    boards: Vec<BoardNode>,
}

#[derive(Debug, Deserialize)]
struct BoardNode {
    name: String,
    #[serde(default)]
    columns: Vec<ColumnMeta>,
    items_page: Option<ItemsPage>,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    cursor: Option<String>,
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct MePayload {
    me: MeNode,
}

#[derive(Debug, Deserialize)]
struct MeNode {
    name: String,
}

/// GraphQL client for the board API. Pagination and retries live here; the
/// query core only ever sees a finished `BoardData`.
pub struct BoardClient {
    http: Client,
    api_url: Url,
    token: String,
}

impl BoardClient {
    pub fn new(api_url: Url, token: impl Into<String>) -> Self {
        BoardClient {
            http: Client::new(),
            api_url,
            token: token.into(),
        }
    }

    async fn post_once<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, FetchError> {
        let resp = self
            .http
            .post(self.api_url.clone())
            .header("Authorization", &self.token)
            .timeout(Duration::from_secs(60))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                status: status.as_u16(),
            });
        }
        let resp = resp.error_for_status()?;

        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        if let Some(errors) = envelope.errors {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::Api(joined));
        }
        envelope
            .data
            .ok_or_else(|| FetchError::Decode("response had neither data nor errors".into()))
    }

    /// Post a query, retrying transport failures with exponential backoff.
    /// API-level errors (bad query, bad credentials) are not retried.
    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, FetchError> {
        let mut attempts = 0;
        loop {
            match self.post_once(query, variables.clone()).await {
                Ok(t) => return Ok(t),
                Err(FetchError::Http { source }) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    let backoff = BACKOFF_MS * 2u64.pow(attempts - 1);
                    warn!(attempt = attempts, delay_ms = backoff, error = %source, "retrying board API call");
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch all items from a board, following the items-page cursor until
    /// exhausted.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_board(&self, board_id: &str) -> Result<BoardData, FetchError> {
        let mut cursor: Option<String> = None;
        let mut out = BoardData {
            name: String::new(),
            columns: Vec::new(),
            items: Vec::new(),
        };

        loop {
            let payload: BoardsPayload = match &cursor {
                Some(c) => {
                    self.post(
                        ITEMS_QUERY_CURSOR,
                        json!({ "board_id": [board_id], "cursor": c }),
                    )
                    .await?
                }
                None => {
                    self.post(ITEMS_QUERY, json!({ "board_id": [board_id] }))
                        .await?
                }
            };

            let board = payload
                .boards
                .into_iter()
                .next()
                .ok_or_else(|| FetchError::MissingBoard(board_id.to_string()))?;
            out.name = board.name;
            out.columns = board.columns;

            let page = board
                .items_page
                .ok_or_else(|| FetchError::Decode("board response had no items_page".into()))?;
            debug!(page_items = page.items.len(), "fetched items page");
            out.items.extend(page.items);

            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        debug!(board = %out.name, items = out.items.len(), columns = out.columns.len(), "board fetch complete");
        Ok(out)
    }

    /// Fetch only the column metadata for a board.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_columns(&self, board_id: &str) -> Result<Vec<ColumnMeta>, FetchError> {
        let payload: BoardsPayload = self
            .post(COLUMNS_QUERY, json!({ "board_id": [board_id] }))
            .await?;
        let board = payload
            .boards
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MissingBoard(board_id.to_string()))?;
        Ok(board.columns)
    }

    /// Connection probe; returns the account name on success.
    pub async fn me(&self) -> Result<String, FetchError> {
        let payload: MePayload = self.post(ME_QUERY, json!({})).await?;
        Ok(payload.me.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_response_deserializes() {
        let raw = r#"{
            "data": {
                "boards": [{
                    "name": "Work Orders",
                    "columns": [
                        {"id": "text_1", "title": "Sector", "type": "status"},
                        {"id": "num_1", "title": "Amount", "type": "numbers"}
                    ],
                    "items_page": {
                        "cursor": "abc",
                        "items": [{
                            "name": "WO-1",
                            "column_values": [
                                {"id": "text_1", "text": "Mining"},
                                {"id": "num_1", "text": null}
                            ]
                        }]
                    }
                }]
            }
        }"#;
        let env: Envelope<BoardsPayload> = serde_json::from_str(raw).unwrap();
        assert!(env.errors.is_none());
        let board = env.data.unwrap().boards.into_iter().next().unwrap();
        assert_eq!(board.name, "Work Orders");
        assert_eq!(board.columns.len(), 2);
        assert_eq!(board.columns[1].kind, "numbers");
        let page = board.items_page.unwrap();
        assert_eq!(page.cursor.as_deref(), Some("abc"));
        assert_eq!(page.items[0].column_values[1].text, None);
    }

    #[test]
    fn graphql_errors_deserialize() {
        let raw = r#"{"errors": [{"message": "board not found"}]}"#;
        let env: Envelope<BoardsPayload> = serde_json::from_str(raw).unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.errors.unwrap()[0].message, "board not found");
    }
}
