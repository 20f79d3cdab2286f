//! Upload targets for cached sessions.

use std::future::Future;

use reqwest::Client;
use url::Url;

use crate::error::SyncError;
use crate::session::{SessionRecord, TaskId};

/// Durable per-user storage that accepts session records one at a time.
pub trait SessionSink: Send + Sync {
    fn upload(&self, record: &SessionRecord) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Posts each record as JSON to `{base}/api/tasks/{taskId}/sessions`.
pub struct HttpSink {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpSink {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(
                url::ParseError::RelativeUrlWithCannotBeABaseBase,
            ));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            api_token: api_token.filter(|t| !t.is_empty()),
        })
    }

    fn endpoint(&self, task_id: &TaskId) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["api", "tasks", task_id.as_str(), "sessions"]);
        Ok(url)
    }
}

impl SessionSink for HttpSink {
    async fn upload(&self, record: &SessionRecord) -> Result<(), SyncError> {
        let mut request = self.client.post(self.endpoint(record.task_id())?).json(record);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    fn record(task: &str, secs: i64) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        SessionRecord::new(TaskId::new(task).unwrap(), start, start + Duration::seconds(secs))
    }

    #[test]
    fn endpoint_appends_task_path() {
        let sink = HttpSink::new("https://example.com/base/", None).unwrap();
        let url = sink.endpoint(&TaskId::new("a b").unwrap()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/base/api/tasks/a%20b/sessions");
    }

    #[test]
    fn rejects_non_base_url() {
        assert!(HttpSink::new("mailto:me@example.com", None).is_err());
        assert!(HttpSink::new("not a url", None).is_err());
    }

    #[tokio::test]
    async fn upload_posts_json_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/tasks/abc/sessions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "taskId": "abc",
                "duration": 30,
                "startedAt": "2026-03-01T09:00:00Z",
            })))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let sink = HttpSink::new(&server.url(), Some("secret".into())).unwrap();
        sink.upload(&record("abc", 30)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/tasks/abc/sessions")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let sink = HttpSink::new(&server.url(), None).unwrap();
        let err = sink.upload(&record("abc", 30)).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 401, ref body } if body == "unauthorized"));
    }
}
