use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Chapter, Event, LeadStatus, Role};
use crate::validation::validate_phone;

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the websocket gateway.
/// Deliberately carries no role: privilege is always re-read server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IsAdminResponse {
    pub is_admin: bool,
}

// -- Events --

/// Fields accepted by both create and update. The hiring-artist toggle is a
/// form concern; by the time a request is built `artist_name` is final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EventRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[validate(range(min = 0.0, message = "Budget must be zero or greater"))]
    pub budget: f64,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EventWindowQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// An event as seen from the admin calendar / document overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminEventListing {
    #[serde(flatten)]
    pub event: Event,
    pub owner_label: String,
}

// -- Profiles --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub fraternity: Option<String>,
}

// -- Leads --

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LeadRequest {
    #[validate(length(min = 1, message = "School is required"))]
    pub school: String,
    #[validate(length(min = 1, message = "Fraternity is required"))]
    pub fraternity: String,
    #[validate(custom(function = "validate_phone"))]
    pub contact_phone: String,
    #[serde(default)]
    pub instagram_handle: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LeadStatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LeadQuery {
    pub q: Option<String>,
    pub status: Option<String>,
}

// -- Administrative functions --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAnalyticsRequest {
    pub chapter_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserChapterRequest {
    pub user_id: Uuid,
    pub chapter_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRoleRequest {
    pub user_id: Uuid,
    pub new_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChapterRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: Uuid,
    pub email: String,
    pub school: Option<String>,
    pub fraternity: Option<String>,
    pub role: Role,
    pub chapter_id: Option<Uuid>,
    pub chapter_name: Option<String>,
    pub total_events: u64,
    pub average_budget: f64,
    pub signed_contracts: u64,
    pub last_event_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: Uuid,
    pub name: String,
    pub member_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterAnalytics {
    pub chapter: Chapter,
    pub total_members: u64,
    pub total_events: u64,
    pub average_budget: f64,
    pub ltv: f64,
    pub close_percentage: f64,
    pub members: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLeadsResponse {
    pub inserted_count: usize,
    pub error_count: usize,
    pub errors: Vec<ImportRowError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// 1-based line number in the uploaded file.
    pub row: usize,
    /// Identifies the offending record (school / fraternity / email as given).
    pub record: String,
    pub message: String,
}
