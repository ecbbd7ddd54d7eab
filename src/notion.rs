//! The Notion-backed implementation of [`RemoteSync`].
//!
//! One note maps to one page inside a dedicated database. The client finds
//! or creates that database by title on first use, dedups pages by the
//! stored remote id or the `Note ID` property, and validates every payload
//! against the database's fetched schema before sending it.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::blocks::{markdown_to_blocks, MAX_BLOCKS_PER_APPEND};
use crate::{Config, Note, NotionAuth, NsError, RemoteError, RemoteResult, RemoteSync, Result};

const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Property names of the notes database schema.
const PROP_TITLE: &str = "Title";
const PROP_NOTE_ID: &str = "Note ID";
const PROP_TAGS: &str = "Tags";
const PROP_CATEGORY: &str = "Category";
const PROP_CREATED: &str = "Created";
const PROP_LAST_EDITED: &str = "Last Edited";

type NotionResult<T> = std::result::Result<T, RemoteError>;

/// A resolved notes database: its id plus the property schema Notion
/// reported for it, as property name to property type.
#[derive(Debug, Clone)]
struct DatabaseHandle {
    id: String,
    schema: HashMap<String, String>,
}

pub struct NotionClient {
    http: Client,
    api_base: String,
    token: String,
    database_title: String,

    /// Resolved once per client lifetime, then reused for every push.
    database: Mutex<Option<DatabaseHandle>>,
}

impl NotionClient {
    pub fn new(config: &Config, auth: &NotionAuth) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NsError::app(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.notion_api_base.trim_end_matches('/').to_string(),
            token: auth.access_token.clone(),
            database_title: config.database_title.clone(),
            database: Mutex::new(None),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Sends a request and decodes the response body, mapping transport and
    /// HTTP failures onto [`RemoteError`].
    async fn send(&self, request: RequestBuilder) -> NotionResult<Value> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|_| Value::Null);

        if status.is_success() {
            Ok(body)
        } else {
            Err(map_status(status, &body))
        }
    }

    /// Returns the notes database, resolving it on the first call.
    async fn ensure_database(&self) -> NotionResult<DatabaseHandle> {
        let mut slot = self.database.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let handle = match self.find_database().await? {
            Some(handle) => handle,
            None => self.create_database().await?,
        };

        info!("Using Notion database {}", handle.id);
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Searches the workspace for a database whose title matches the
    /// configured one.
    async fn find_database(&self) -> NotionResult<Option<DatabaseHandle>> {
        let body = self
            .send(self.request(Method::POST, "/v1/search").json(&json!({
                "query": self.database_title,
                "filter": { "property": "object", "value": "database" },
            })))
            .await?;

        let results = body["results"].as_array().cloned().unwrap_or_default();
        for result in results {
            let title = plain_title(&result["title"]);
            if title == self.database_title {
                let id = result["id"].as_str().unwrap_or_default().to_string();
                debug!("Found existing notes database {}", id);
                return Ok(Some(DatabaseHandle {
                    id,
                    schema: parse_schema(&result["properties"]),
                }));
            }
        }
        Ok(None)
    }

    /// Creates the notes database under the first page the integration can
    /// see. Without any shared page there is nowhere to create it, which is
    /// a setup problem the user has to fix in Notion.
    async fn create_database(&self) -> NotionResult<DatabaseHandle> {
        let parent_id = self.find_parent_page().await?.ok_or_else(|| {
            RemoteError::ValidationRejected(
                "no Notion page is shared with the integration; share one to hold the notes database"
                    .to_string(),
            )
        })?;

        let body = self
            .send(self.request(Method::POST, "/v1/databases").json(&json!({
                "parent": { "type": "page_id", "page_id": parent_id },
                "title": [{ "type": "text", "text": { "content": self.database_title } }],
                "properties": {
                    PROP_TITLE: { "title": {} },
                    PROP_NOTE_ID: { "rich_text": {} },
                    PROP_TAGS: { "multi_select": {} },
                    PROP_CATEGORY: { "select": {} },
                    PROP_CREATED: { "date": {} },
                    PROP_LAST_EDITED: { "date": {} },
                },
            })))
            .await?;

        let id = body["id"].as_str().unwrap_or_default().to_string();
        info!("Created notes database {}", id);
        Ok(DatabaseHandle {
            id,
            schema: parse_schema(&body["properties"]),
        })
    }

    async fn find_parent_page(&self) -> NotionResult<Option<String>> {
        let body = self
            .send(self.request(Method::POST, "/v1/search").json(&json!({
                "filter": { "property": "object", "value": "page" },
                "page_size": 1,
            })))
            .await?;

        Ok(body["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|p| p["id"].as_str())
            .map(|s| s.to_string()))
    }

    /// Locates the page backing this note, if one already exists: first by
    /// the stored remote id, then by `Note ID` equality. This is what makes
    /// a retried push update instead of duplicating.
    async fn find_page(&self, database_id: &str, note: &Note) -> NotionResult<Option<String>> {
        if let Some(remote_id) = &note.remote_id {
            match self
                .send(self.request(Method::GET, &format!("/v1/pages/{}", remote_id)))
                .await
            {
                Ok(page) => {
                    if page["archived"].as_bool() != Some(true) {
                        return Ok(Some(remote_id.clone()));
                    }
                    debug!("Remote page {} is archived, falling back to lookup", remote_id);
                }
                Err(RemoteError::ValidationRejected(_)) => {
                    // stale id; fall through to the property lookup
                    debug!("Stored remote id {} no longer resolves", remote_id);
                }
                Err(e) => return Err(e),
            }
        }

        let body = self
            .send(
                self.request(Method::POST, &format!("/v1/databases/{}/query", database_id))
                    .json(&json!({
                        "filter": {
                            "property": PROP_NOTE_ID,
                            "rich_text": { "equals": note.id },
                        },
                        "page_size": 1,
                    })),
            )
            .await?;

        Ok(body["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|p| p["id"].as_str())
            .map(|s| s.to_string()))
    }

    async fn create_page(&self, database: &DatabaseHandle, note: &Note) -> NotionResult<String> {
        let properties = build_properties(note, &database.schema)?;
        let body = self
            .send(self.request(Method::POST, "/v1/pages").json(&json!({
                "parent": { "database_id": database.id },
                "properties": properties,
            })))
            .await?;

        let page_id = body["id"]
            .as_str()
            .ok_or_else(|| {
                RemoteError::ValidationRejected("page creation returned no id".to_string())
            })?
            .to_string();

        self.append_content(&page_id, &note.content).await?;
        info!("Created Notion page {} for note {}", page_id, note.id);
        Ok(page_id)
    }

    async fn update_page(&self, database: &DatabaseHandle, page_id: &str, note: &Note) -> NotionResult<()> {
        let properties = build_properties(note, &database.schema)?;
        self.send(
            self.request(Method::PATCH, &format!("/v1/pages/{}", page_id))
                .json(&json!({ "properties": properties })),
        )
        .await?;
        debug!("Updated Notion page {} for note {}", page_id, note.id);
        Ok(())
    }

    /// Appends the note body as child blocks, split into Notion's maximum
    /// append size.
    async fn append_content(&self, page_id: &str, markdown: &str) -> NotionResult<()> {
        let blocks = markdown_to_blocks(markdown);
        for chunk in blocks.chunks(MAX_BLOCKS_PER_APPEND) {
            self.send(
                self.request(Method::PATCH, &format!("/v1/blocks/{}/children", page_id))
                    .json(&json!({ "children": chunk })),
            )
            .await?;
        }
        Ok(())
    }
}

impl RemoteSync for NotionClient {
    fn push(&self, note: &Note) -> impl std::future::Future<Output = RemoteResult> + Send {
        let note = note.clone();
        async move {
            let database = self.ensure_database().await?;

            match self.find_page(&database.id, &note).await? {
                Some(page_id) => {
                    self.update_page(&database, &page_id, &note).await?;
                    Ok(page_id)
                }
                None => self.create_page(&database, &note).await,
            }
        }
    }
}

/// Builds the page property payload, including only properties the fetched
/// schema actually declares with the expected type.
///
/// The two properties sync correctness depends on fail closed: a database
/// missing `Title` or `Note ID` (or carrying them with the wrong type)
/// rejects the push instead of silently writing an unfindable page.
fn build_properties(note: &Note, schema: &HashMap<String, String>) -> NotionResult<Value> {
    let has = |name: &str, kind: &str| schema.get(name).map(String::as_str) == Some(kind);

    if !has(PROP_TITLE, "title") {
        return Err(RemoteError::ValidationRejected(format!(
            "database schema lacks a '{}' title property",
            PROP_TITLE
        )));
    }
    if !has(PROP_NOTE_ID, "rich_text") {
        return Err(RemoteError::ValidationRejected(format!(
            "database schema lacks a '{}' rich_text property",
            PROP_NOTE_ID
        )));
    }

    let mut properties = json!({
        PROP_TITLE: {
            "title": [{ "type": "text", "text": { "content": note.title } }],
        },
        PROP_NOTE_ID: {
            "rich_text": [{ "type": "text", "text": { "content": note.id } }],
        },
    });

    if has(PROP_TAGS, "multi_select") && !note.tags.is_empty() {
        properties[PROP_TAGS] = json!({
            "multi_select": note
                .tags
                .iter()
                .map(|t| json!({ "name": t.name }))
                .collect::<Vec<_>>(),
        });
    }

    if has(PROP_CATEGORY, "select") {
        if let Some(category) = &note.category {
            properties[PROP_CATEGORY] = json!({ "select": { "name": category } });
        }
    }

    if has(PROP_CREATED, "date") {
        properties[PROP_CREATED] = json!({
            "date": { "start": note.created_at.to_rfc3339() },
        });
    }

    if has(PROP_LAST_EDITED, "date") {
        properties[PROP_LAST_EDITED] = json!({
            "date": { "start": note.updated_at.to_rfc3339() },
        });
    }

    Ok(properties)
}

/// Flattens a database's `properties` object to property name -> type.
fn parse_schema(properties: &Value) -> HashMap<String, String> {
    properties
        .as_object()
        .map(|props| {
            props
                .iter()
                .filter_map(|(name, def)| {
                    def["type"]
                        .as_str()
                        .map(|t| (name.clone(), t.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts the plain text of a Notion title rich-text array.
fn plain_title(title: &Value) -> String {
    title
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn map_transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::RemoteUnavailable("request timed out".to_string())
    } else {
        RemoteError::RemoteUnavailable(e.to_string())
    }
}

/// Maps a non-success HTTP status onto the failure taxonomy. Rate limits
/// and server errors are transient; 4xx payload rejections are not, but the
/// note is still retried on later passes.
fn map_status(status: StatusCode, body: &Value) -> RemoteError {
    let message = body["message"]
        .as_str()
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        StatusCode::UNAUTHORIZED => RemoteError::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::RemoteUnavailable(format!("rate limited: {}", message))
        }
        s if s.is_server_error() => RemoteError::RemoteUnavailable(message),
        s if s.is_client_error() => {
            warn!("Notion rejected a request: {} {}", status, message);
            RemoteError::ValidationRejected(message)
        }
        _ => RemoteError::RemoteUnavailable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tag;

    fn full_schema() -> HashMap<String, String> {
        [
            (PROP_TITLE, "title"),
            (PROP_NOTE_ID, "rich_text"),
            (PROP_TAGS, "multi_select"),
            (PROP_CATEGORY, "select"),
            (PROP_CREATED, "date"),
            (PROP_LAST_EDITED, "date"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn sample_note() -> Note {
        Note::new(
            "Standup".to_string(),
            "- yesterday\n- today".to_string(),
            vec![Tag::new("Work"), Tag::new("Meetings")],
            Some("Meeting Notes".to_string()),
        )
    }

    #[test]
    fn full_schema_maps_every_property() {
        let note = sample_note();
        let props = build_properties(&note, &full_schema()).unwrap();

        assert_eq!(
            props[PROP_TITLE]["title"][0]["text"]["content"],
            "Standup"
        );
        assert_eq!(
            props[PROP_NOTE_ID]["rich_text"][0]["text"]["content"],
            Value::String(note.id.clone())
        );
        assert_eq!(props[PROP_TAGS]["multi_select"][0]["name"], "Work");
        assert_eq!(props[PROP_TAGS]["multi_select"][1]["name"], "Meetings");
        assert_eq!(props[PROP_CATEGORY]["select"]["name"], "Meeting Notes");
        assert!(props[PROP_CREATED]["date"]["start"].is_string());
        assert!(props[PROP_LAST_EDITED]["date"]["start"].is_string());
    }

    #[test]
    fn missing_required_property_fails_closed() {
        let note = sample_note();

        let mut schema = full_schema();
        schema.remove(PROP_NOTE_ID);
        assert!(matches!(
            build_properties(&note, &schema),
            Err(RemoteError::ValidationRejected(_))
        ));

        let mut schema = full_schema();
        schema.insert(PROP_TITLE.to_string(), "rich_text".to_string());
        assert!(matches!(
            build_properties(&note, &schema),
            Err(RemoteError::ValidationRejected(_))
        ));
    }

    #[test]
    fn optional_properties_are_dropped_when_absent_from_schema() {
        let note = sample_note();
        let schema: HashMap<String, String> = [
            (PROP_TITLE.to_string(), "title".to_string()),
            (PROP_NOTE_ID.to_string(), "rich_text".to_string()),
        ]
        .into_iter()
        .collect();

        let props = build_properties(&note, &schema).unwrap();
        assert!(props.get(PROP_TAGS).is_none());
        assert!(props.get(PROP_CATEGORY).is_none());
        assert!(props.get(PROP_CREATED).is_none());
    }

    #[test]
    fn type_mismatch_on_optional_property_drops_it() {
        let note = sample_note();
        let mut schema = full_schema();
        // e.g. the user repurposed Tags as a text column
        schema.insert(PROP_TAGS.to_string(), "rich_text".to_string());

        let props = build_properties(&note, &schema).unwrap();
        assert!(props.get(PROP_TAGS).is_none());
    }

    #[test]
    fn category_is_omitted_when_note_has_none() {
        let mut note = sample_note();
        note.category = None;
        let props = build_properties(&note, &full_schema()).unwrap();
        assert!(props.get(PROP_CATEGORY).is_none());
    }

    #[test]
    fn status_mapping_matches_failure_taxonomy() {
        let body = json!({ "message": "boom" });
        assert_eq!(
            map_status(StatusCode::UNAUTHORIZED, &body),
            RemoteError::AuthExpired
        );
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, &body),
            RemoteError::RemoteUnavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::SERVICE_UNAVAILABLE, &body),
            RemoteError::RemoteUnavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, &body),
            RemoteError::ValidationRejected(_)
        ));
    }

    #[test]
    fn schema_parsing_flattens_property_types() {
        let raw = json!({
            "Title": { "id": "a", "type": "title", "title": {} },
            "Tags": { "id": "b", "type": "multi_select", "multi_select": {} },
        });
        let schema = parse_schema(&raw);
        assert_eq!(schema.get("Title").map(String::as_str), Some("title"));
        assert_eq!(schema.get("Tags").map(String::as_str), Some("multi_select"));
    }

    #[test]
    fn title_extraction_concatenates_parts() {
        let title = json!([
            { "plain_text": "Notes " },
            { "plain_text": "Database" },
        ]);
        assert_eq!(plain_title(&title), "Notes Database");
    }
}
