//! ==============================================================================
//! collection.rs - client for the remote record collection
//! ==============================================================================
//!
//! purpose:
//!     the hosted REST collection is the only storage in the system. this
//!     module wraps its three calls:
//!     - recent(limit): GET <url>?sortBy=date&order=desc&limit=N
//!     - all():         GET <url>
//!     - create(rec):   POST <url> (json body)
//!
//! relationships:
//!     - used by: poller.rs (primary + fallback reads)
//!     - used by: recorder.rs (create)
//!
//! body handling:
//!     a body that parses as json but is not an array reads as an empty list.
//!     null entries are kept here as `None`; callers decide what to drop.
//!
//! ==============================================================================

use crate::domain::{NewRecord, Record};
use crate::error::CollectionError;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Collection: Send + Sync {
    /// server-sorted, server-limited read (newest first when honored)
    async fn recent(&self, limit: usize) -> Result<Vec<Option<Record>>, CollectionError>;

    /// the whole collection, unordered
    async fn all(&self) -> Result<Vec<Option<Record>>, CollectionError>;

    /// store a new record; returns it with the assigned id
    async fn create(&self, record: &NewRecord) -> Result<Record, CollectionError>;

    /// where records live, for display
    fn url(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct HttpCollection {
    client: Client,
    url: String,
}

impl HttpCollection {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollectionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectionError::Client(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }

    async fn read(&self, query: &[(&str, String)]) -> Result<Vec<Option<Record>>, CollectionError> {
        let response = self
            .client
            .get(&self.url)
            .query(query)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| CollectionError::ReadFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectionError::ReadFailure(format!("HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CollectionError::ReadFailure(format!("invalid json: {e}")))?;

        Ok(records_from_body(body))
    }
}

#[async_trait]
impl Collection for HttpCollection {
    async fn recent(&self, limit: usize) -> Result<Vec<Option<Record>>, CollectionError> {
        let query = [
            ("sortBy", "date".to_string()),
            ("order", "desc".to_string()),
            ("limit", limit.to_string()),
        ];
        self.read(&query).await
    }

    async fn all(&self) -> Result<Vec<Option<Record>>, CollectionError> {
        self.read(&[]).await
    }

    async fn create(&self, record: &NewRecord) -> Result<Record, CollectionError> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .map_err(|e| CollectionError::WriteFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectionError::WriteFailure(format!("HTTP {status}")));
        }

        // the write already happened; an odd echo body is not a failure
        match response.json::<Record>().await {
            Ok(created) => Ok(created),
            Err(e) => {
                debug!("create succeeded but echo body was unreadable: {e}");
                Ok(Record {
                    id: None,
                    name: Some(record.name.clone()),
                    status: Some(record.status.clone()),
                    ip: record.ip.clone(),
                    date: Some(record.date.clone()),
                })
            }
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// interpret a read body: arrays become entries, anything else is empty
///
/// entries that are not objects (numbers, strings) cannot be shown as a row
/// and are dropped.
pub fn records_from_body(body: serde_json::Value) -> Vec<Option<Record>> {
    let serde_json::Value::Array(items) = body else {
        debug!("collection body is not an array, treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::Null => Some(None),
            serde_json::Value::Object(_) => match serde_json::from_value::<Record>(item) {
                Ok(record) => Some(Some(record)),
                Err(e) => {
                    debug!("skipping unreadable record: {e}");
                    None
                }
            },
            other => {
                debug!("skipping non-object entry: {other}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Seen {
        queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
        posted: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    async fn list(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let sorted = params.contains_key("sortBy");
        seen.queries.lock().unwrap().push(params);
        if sorted {
            // the service rejects the sorted query
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({})));
        }
        (
            StatusCode::OK,
            Json(serde_json::json!([
                {"id": "1", "name": "a", "status": "on", "ip": null, "date": "2024-01-01 00:00:00"},
                null,
            ])),
        )
    }

    async fn create(
        State(seen): State<Seen>,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        seen.posted.lock().unwrap().push(body.clone());
        let mut created = body;
        created["id"] = serde_json::json!("42");
        (StatusCode::CREATED, Json(created))
    }

    async fn serve(seen: Seen) -> String {
        let app = Router::new()
            .route("/records", get(list).post(create))
            .route("/broken", get(|| async { (StatusCode::OK, "not json") }).post(|| async { StatusCode::BAD_GATEWAY }))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn recent_sends_sort_query_and_reports_status_failures() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let collection = HttpCollection::new(format!("{base}/records"), Duration::from_secs(5)).unwrap();

        let err = collection.recent(5).await.unwrap_err();
        assert!(matches!(err, CollectionError::ReadFailure(_)));

        let queries = seen.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].get("sortBy").map(String::as_str), Some("date"));
        assert_eq!(queries[0].get("order").map(String::as_str), Some("desc"));
        assert_eq!(queries[0].get("limit").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn all_keeps_nulls_for_the_caller() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let collection = HttpCollection::new(format!("{base}/records"), Duration::from_secs(5)).unwrap();

        let entries = collection.all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().and_then(|r| r.status.as_deref()), Some("on"));
        assert!(entries[1].is_none());
        assert!(seen.queries.lock().unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn create_posts_json_payload() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let collection = HttpCollection::new(format!("{base}/records"), Duration::from_secs(5)).unwrap();

        let payload = NewRecord {
            name: "lab-node".into(),
            status: "online".into(),
            ip: None,
            date: "2024-05-05 10:00:00".into(),
        };
        let created = collection.create(&payload).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("42"));

        let posted = seen.posted.lock().unwrap().clone();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["ip"], serde_json::Value::Null);
        assert_eq!(posted[0]["name"], "lab-node");
    }

    #[tokio::test]
    async fn unparseable_body_and_failed_post_are_errors() {
        let base = serve(Seen::default()).await;
        let collection = HttpCollection::new(format!("{base}/broken"), Duration::from_secs(5)).unwrap();

        assert!(matches!(collection.all().await, Err(CollectionError::ReadFailure(_))));

        let payload = NewRecord {
            name: "x".into(),
            status: "offline".into(),
            ip: Some("10.0.0.2".into()),
            date: "2024-05-05 10:00:00".into(),
        };
        assert!(matches!(collection.create(&payload).await, Err(CollectionError::WriteFailure(_))));
    }

    #[test]
    fn client_setup_error_is_its_own_kind() {
        let err = CollectionError::Client("no tls backend".into());
        assert_eq!(err.to_string(), "failed to create HTTP client: no tls backend");
        assert!(!err.to_string().starts_with("read failed"));
    }

    #[test]
    fn non_array_body_reads_as_empty() {
        assert!(records_from_body(serde_json::json!({"error": "nope"})).is_empty());
        assert!(records_from_body(serde_json::json!("text")).is_empty());
    }

    #[test]
    fn non_object_entries_are_dropped() {
        let entries = records_from_body(serde_json::json!([1, null, {"status": "on"}, "x"]));
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_none());
        assert!(entries[1].is_some());
    }
}
