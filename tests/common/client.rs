//! Test API client.
//!
//! Sends JSON requests with the identity header set and returns the
//! status with the decoded body.

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

/// A test client bound to one identity.
pub struct TestClient {
    http: reqwest::Client,
    base: String,
    user_id: Option<String>,
}

impl TestClient {
    pub fn new(base: &str, user_id: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.to_string(),
            user_id: user_id.map(String::from),
        }
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("")
    }

    /// Sync a profile derived from the user id.
    pub async fn sync_profile(&self) -> anyhow::Result<Value> {
        let id = self.user_id();
        let profile = json!({
            "id": id,
            "first_name": id,
            "last_name": "Tester",
            "email": format!("{}@example.com", id),
            "username": id,
        });
        let (status, body) = self.post("/api/session/sync", profile).await?;
        anyhow::ensure!(status == StatusCode::OK, "sync failed: {} {}", status, body);
        Ok(body)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut req = self.http.request(method, format!("{}{}", self.base, path));
        if let Some(id) = &self.user_id {
            req = req.header("x-user-id", id);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }

    /// POST a raw body labelled as JSON.
    pub async fn post_raw(&self, path: &str, body: &str) -> anyhow::Result<(StatusCode, Value)> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base, path))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(id) = &self.user_id {
            req = req.header("x-user-id", id);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, serde_json::from_str(&text).unwrap_or(Value::String(text))))
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::DELETE, path, None).await
    }

    /// Create a template and return its id.
    pub async fn create_template(&self, body: Value) -> anyhow::Result<i64> {
        let (status, created) = self.post("/api/templates", body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, created);
        created["id"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("template id missing in {}", created))
    }
}
