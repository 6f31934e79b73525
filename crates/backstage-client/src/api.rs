//! Typed wrapper over the Backstage HTTP API using [`reqwest`].

use bytes::Bytes;
use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use backstage_types::api::{
    AdminEventListing, AuthResponse, ChapterAnalytics, ChapterSummary, ErrorBody, EventRequest,
    ImportLeadsResponse, IsAdminResponse, LeadRequest, LeadStatusRequest, LoginRequest,
    MeResponse, RegisterRequest, UpdateProfileRequest, UserSummary,
};
use backstage_types::models::{
    Chapter, DocumentSlot, Event, EventPartition, Lead, LeadStatus, MediaItem, Profile, Role,
};

use crate::error::{ClientError, ClientResult};

/// A file to send as the multipart `file` field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    fn into_form(self) -> ClientResult<Form> {
        let part = Part::bytes(self.data)
            .file_name(self.file_name)
            .mime_str(&self.content_type)?;
        Ok(Form::new().part("file", part))
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// * `base_url` - server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// `ws://` / `wss://` address of the realtime gateway.
    pub fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/gateway")
    }

    fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::Unauthenticated)?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token))
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("Request failed").to_string()
                } else {
                    body
                }
            });
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        Ok(Self::check(response).await?.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.request(method, path)?.json(body).send().await?;
        Self::parse(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.request(Method::GET, path)?.send().await?;
        Self::parse(response).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        let response = self.request(Method::DELETE, path)?.send().await?;
        Self::check(response).await?;
        Ok(())
    }

    // -- Identity --

    /// Create an account; the returned token is kept for later calls.
    pub async fn register(&mut self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let url = format!("{}/auth/register", self.base_url);
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        let auth: AuthResponse = Self::parse(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let url = format!("{}/auth/login", self.base_url);
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.client.post(url).json(&body).send().await?;
        let auth: AuthResponse = Self::parse(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn refresh(&mut self) -> ClientResult<AuthResponse> {
        let response = self.request(Method::POST, "/auth/refresh")?.send().await?;
        let auth: AuthResponse = Self::parse(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub fn logout(&mut self) {
        self.token = None;
    }

    pub async fn me(&self) -> ClientResult<MeResponse> {
        self.get("/auth/me").await
    }

    pub async fn is_admin(&self) -> ClientResult<bool> {
        let response: IsAdminResponse = self.get("/auth/is-admin").await?;
        Ok(response.is_admin)
    }

    // -- Profile --

    pub async fn profile(&self) -> ClientResult<Profile> {
        self.get("/profile").await
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> ClientResult<Profile> {
        self.send_json(Method::PUT, "/profile", req).await
    }

    pub async fn upload_avatar(&self, file: Upload) -> ClientResult<Profile> {
        let response = self
            .request(Method::POST, "/profile/avatar")?
            .multipart(file.into_form()?)
            .send()
            .await?;
        Self::parse(response).await
    }

    // -- Events --

    pub async fn list_events(&self) -> ClientResult<EventPartition> {
        self.get("/events").await
    }

    pub async fn get_event(&self, event_id: Uuid) -> ClientResult<Event> {
        self.get(&format!("/events/{event_id}")).await
    }

    pub async fn create_event(&self, req: &EventRequest) -> ClientResult<Event> {
        self.send_json(Method::POST, "/events", req).await
    }

    /// Owner-scoped update. Use [`Self::admin_update_event`] for events the
    /// caller does not own.
    pub async fn update_event(&self, event_id: Uuid, req: &EventRequest) -> ClientResult<Event> {
        self.send_json(Method::PUT, &format!("/events/{event_id}"), req).await
    }

    pub async fn admin_update_event(&self, event_id: Uuid, req: &EventRequest) -> ClientResult<Event> {
        self.send_json(Method::PUT, &format!("/admin/events/{event_id}"), req).await
    }

    pub async fn admin_user_events(&self, user_id: Uuid) -> ClientResult<EventPartition> {
        self.get(&format!("/admin/users/{user_id}/events")).await
    }

    pub async fn admin_events(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ClientResult<Vec<AdminEventListing>> {
        let mut query = Vec::new();
        if let Some(from) = from {
            query.push(format!("from={from}"));
        }
        if let Some(to) = to {
            query.push(format!("to={to}"));
        }
        let path = if query.is_empty() {
            "/admin/events".to_string()
        } else {
            format!("/admin/events?{}", query.join("&"))
        };
        self.get(&path).await
    }

    // -- Documents --

    pub async fn upload_document(&self, event_id: Uuid, slot: DocumentSlot, file: Upload) -> ClientResult<Event> {
        let response = self
            .request(Method::PUT, &format!("/events/{event_id}/documents/{slot}"))?
            .multipart(file.into_form()?)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn delete_document(&self, event_id: Uuid, slot: DocumentSlot) -> ClientResult<Event> {
        let response = self
            .request(Method::DELETE, &format!("/events/{event_id}/documents/{slot}"))?
            .send()
            .await?;
        Self::parse(response).await
    }

    // -- Media --

    pub async fn upload_media(&self, event_id: Uuid, file: Upload) -> ClientResult<MediaItem> {
        let response = self
            .request(Method::POST, &format!("/events/{event_id}/media"))?
            .multipart(file.into_form()?)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn list_media(&self, event_id: Uuid) -> ClientResult<Vec<MediaItem>> {
        self.get(&format!("/events/{event_id}/media")).await
    }

    pub async fn delete_media(&self, media_id: Uuid) -> ClientResult<()> {
        self.delete(&format!("/media/{media_id}")).await
    }

    pub async fn download_media(&self, media_id: Uuid) -> ClientResult<Bytes> {
        let response = self
            .request(Method::GET, &format!("/media/{media_id}/download"))?
            .send()
            .await?;
        Ok(Self::check(response).await?.bytes().await?)
    }

    // -- Leads --

    pub async fn list_leads(&self, q: Option<&str>, status: Option<&str>) -> ClientResult<Vec<Lead>> {
        let mut query = Vec::new();
        if let Some(q) = q {
            query.push(("q", q));
        }
        if let Some(status) = status {
            query.push(("status", status));
        }
        let response = self.request(Method::GET, "/leads")?.query(&query).send().await?;
        Self::parse(response).await
    }

    pub async fn create_lead(&self, req: &LeadRequest) -> ClientResult<Lead> {
        self.send_json(Method::POST, "/leads", req).await
    }

    pub async fn update_lead(&self, lead_id: Uuid, req: &LeadRequest) -> ClientResult<Lead> {
        self.send_json(Method::PUT, &format!("/leads/{lead_id}"), req).await
    }

    pub async fn update_lead_status(&self, lead_id: Uuid, status: LeadStatus) -> ClientResult<Lead> {
        self.send_json(
            Method::PATCH,
            &format!("/leads/{lead_id}/status"),
            &LeadStatusRequest { status },
        )
        .await
    }

    pub async fn delete_lead(&self, lead_id: Uuid) -> ClientResult<()> {
        self.delete(&format!("/leads/{lead_id}")).await
    }

    // -- Administrative functions --

    async fn function<T: DeserializeOwned>(&self, name: &str, body: Value) -> ClientResult<T> {
        self.send_json(Method::POST, &format!("/functions/v1/{name}"), &body).await
    }

    pub async fn all_user_profiles(&self) -> ClientResult<Vec<UserSummary>> {
        self.function("get-all-user-profiles", json!({})).await
    }

    pub async fn all_chapters(&self) -> ClientResult<Vec<ChapterSummary>> {
        self.function("get-all-chapters", json!({})).await
    }

    pub async fn chapter_analytics(&self, chapter_id: Uuid) -> ClientResult<ChapterAnalytics> {
        self.function("get-chapter-analytics", json!({ "chapterId": chapter_id }))
            .await
    }

    pub async fn update_user_chapter(&self, user_id: Uuid, chapter_id: Option<Uuid>) -> ClientResult<Profile> {
        self.function(
            "update-user-chapter",
            json!({ "userId": user_id, "chapterId": chapter_id }),
        )
        .await
    }

    pub async fn update_user_role(&self, user_id: Uuid, role: Role) -> ClientResult<Profile> {
        self.function(
            "update-user-role",
            json!({ "userId": user_id, "newRole": role.as_str() }),
        )
        .await
    }

    pub async fn create_chapter(&self, name: &str) -> ClientResult<Chapter> {
        self.function("create-chapter", json!({ "name": name })).await
    }

    pub async fn import_leads(&self, csv: Upload) -> ClientResult<ImportLeadsResponse> {
        let response = self
            .request(Method::POST, "/functions/v1/import-leads")?
            .multipart(csv.into_form()?)
            .send()
            .await?;
        Self::parse(response).await
    }
}
