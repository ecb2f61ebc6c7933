use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::filter::filter_applications;
use crate::models::{ApplicationFilter, JobApplication, NewApplication, StatusFilter};
use crate::store::{ApplicationStore, StoreError, StoreResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationsResponse {
    applications: Vec<JobApplication>,
    #[serde(default)]
    total: usize,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    success: bool,
}

/// Talks to the applications REST API (`/applications`, `/applications/{id}`,
/// `/applications/suggestions`) under a base URL such as
/// `http://localhost:3000/api/v1`.
#[derive(Debug)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "Request failed".to_string())
}

fn filter_query(filter: &ApplicationFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if !filter.search.is_empty() {
        query.push(("search", filter.search.clone()));
    }
    if let StatusFilter::Only(status) = filter.status {
        query.push(("status", status.to_string()));
    }
    query.push(("sortBy", filter.sort_by.to_string()));
    query.push(("sortDirection", filter.sort_direction.to_string()));
    query
}

#[async_trait]
impl ApplicationStore for HttpStore {
    async fn list(&self, filter: &ApplicationFilter) -> StoreResult<Vec<JobApplication>> {
        let request = self
            .client
            .get(self.url("/applications"))
            .query(&filter_query(filter));
        let page: ApplicationsResponse = self.send_json(request).await?;
        debug!(
            returned = page.applications.len(),
            total = page.total,
            has_more = page.has_more,
            "fetched applications"
        );
        // the server filters too; re-applying pins the exact ordering rules
        Ok(filter_applications(&page.applications, filter))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<JobApplication>> {
        let response = self
            .client
            .get(self.url(&format!("/applications/{}", id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn create(&self, fields: &NewApplication) -> StoreResult<JobApplication> {
        let request = self.client.post(self.url("/applications")).json(fields);
        self.send_json(request).await
    }

    async fn update(&self, id: &str, fields: &NewApplication) -> StoreResult<JobApplication> {
        let response = self
            .client
            .put(self.url(&format!("/applications/{}", id)))
            .json(fields)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let response = self
            .client
            .delete(self.url(&format!("/applications/{}", id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = check_status(response).await?;
        let body: DeleteResponse = response.json().await?;
        Ok(body.success)
    }

    async fn suggestions(&self) -> StoreResult<Value> {
        let request = self.client.get(self.url("/applications/suggestions"));
        self.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, SortDirection, SortField};
    use chrono::NaiveDate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const APPLICATION_JSON: &str = r#"{
        "id": "abc",
        "company": "Acme",
        "jobTitle": "Dev",
        "jobDescription": "Build it",
        "dateApplied": "2024-01-01",
        "status": "applied",
        "source": "LinkedIn",
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    }"#;

    /// Answers a single request with `status` and `body`; the handle yields
    /// the request line that was received.
    async fn respond_once(status: &'static str, body: String) -> (HttpStore, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            let header_end = loop {
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed before headers");
                request.extend_from_slice(&buf[..n]);
            };

            let head = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            head.lines().next().unwrap_or_default().to_string()
        });

        let client = Client::builder().no_proxy().build().unwrap();
        let store = HttpStore::with_client(&format!("http://{}/api/v1/", addr), client);
        (store, handle)
    }

    fn fields() -> NewApplication {
        NewApplication {
            company: "Acme".to_string(),
            job_title: "Dev".to_string(),
            job_description: "Build it".to_string(),
            date_applied: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status: ApplicationStatus::Interview,
            notes: None,
            source: "LinkedIn".to_string(),
            recruiter: None,
            recruiting_firm: None,
            contact_email: None,
            contact_phone: None,
            application_url: None,
        }
    }

    #[tokio::test]
    async fn test_get_found_and_missing() {
        let (store, request) = respond_once("200 OK", APPLICATION_JSON.to_string()).await;
        let app = store.get("abc").await.unwrap().unwrap();
        assert_eq!(app.company, "Acme");
        assert_eq!(request.await.unwrap(), "GET /api/v1/applications/abc HTTP/1.1");

        let (store, _) = respond_once("404 Not Found", r#"{"message": "nope"}"#.to_string()).await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (store, request) =
            respond_once("404 Not Found", r#"{"message": "Not found"}"#.to_string()).await;
        let err = store.update("gone", &fields()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "gone"));
        assert_eq!(request.await.unwrap(), "PUT /api/v1/applications/gone HTTP/1.1");
    }

    #[tokio::test]
    async fn test_delete_reports_success_flag() {
        let (store, request) = respond_once("200 OK", r#"{"success": true}"#.to_string()).await;
        assert!(store.delete("abc").await.unwrap());
        assert_eq!(request.await.unwrap(), "DELETE /api/v1/applications/abc HTTP/1.1");

        let (store, _) = respond_once("200 OK", r#"{"success": false}"#.to_string()).await;
        assert!(!store.delete("abc").await.unwrap());

        let (store, _) = respond_once("404 Not Found", String::new()).await;
        assert!(!store.delete("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_server_error_carries_message() {
        let (store, request) = respond_once(
            "500 Internal Server Error",
            r#"{"message": "Database unavailable"}"#.to_string(),
        )
        .await;
        let err = store.create(&fields()).await.unwrap_err();
        match err {
            StoreError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Database unavailable");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(request.await.unwrap(), "POST /api/v1/applications HTTP/1.1");
    }

    #[tokio::test]
    async fn test_list_sends_filter_and_reorders() {
        let second = APPLICATION_JSON
            .replace("\"abc\"", "\"def\"")
            .replace("\"Acme\"", "\"Zeta\"");
        let body = format!(
            r#"{{"applications": [{}, {}], "total": 2, "hasMore": false}}"#,
            APPLICATION_JSON, second
        );
        let (store, request) = respond_once("200 OK", body).await;
        let filter = ApplicationFilter {
            sort_by: SortField::Company,
            sort_direction: SortDirection::Desc,
            ..ApplicationFilter::default()
        };

        let apps = store.list(&filter).await.unwrap();
        let companies: Vec<&str> = apps.iter().map(|a| a.company.as_str()).collect();
        assert_eq!(companies, vec!["Zeta", "Acme"]);
        assert_eq!(
            request.await.unwrap(),
            "GET /api/v1/applications?sortBy=company&sortDirection=desc HTTP/1.1"
        );
    }

    #[test]
    fn test_default_filter_query() {
        let query = filter_query(&ApplicationFilter::default());
        assert_eq!(
            query,
            vec![
                ("sortBy", "dateApplied".to_string()),
                ("sortDirection", "desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_filter_query_with_search_and_status() {
        let filter = ApplicationFilter {
            search: "acme corp".to_string(),
            status: StatusFilter::Only(ApplicationStatus::Offer),
            sort_by: SortField::JobTitle,
            sort_direction: SortDirection::Asc,
        };
        assert_eq!(
            filter_query(&filter),
            vec![
                ("search", "acme corp".to_string()),
                ("status", "offer".to_string()),
                ("sortBy", "jobTitle".to_string()),
                ("sortDirection", "asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(api_error_message(r#"{"message": "Not allowed"}"#), "Not allowed");
        assert_eq!(api_error_message(r#"{"error": "x"}"#), "Request failed");
        assert_eq!(api_error_message("<html>502</html>"), "Request failed");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let store = HttpStore::new("http://localhost:3000/api/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.url("/applications/suggestions"),
            "http://localhost:3000/api/v1/applications/suggestions"
        );
    }

    #[test]
    fn test_applications_response_shape() {
        let body = r#"{
            "applications": [{
                "id": "1",
                "company": "Acme",
                "jobTitle": "Dev",
                "jobDescription": "",
                "dateApplied": "2024-01-01",
                "status": "applied",
                "source": "LinkedIn",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }],
            "total": 1,
            "hasMore": false
        }"#;
        let page: ApplicationsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.applications.len(), 1);
        assert_eq!(page.total, 1);
        assert!(!page.has_more);
    }
}
