use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned by the `FromStr` impls below when a stored or submitted value
/// is outside its closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

fn unknown(kind: &'static str, value: &str) -> UnknownVariant {
    UnknownVariant::new(kind, value)
}

// -- Roles --

/// Capability of an identity. Only ever derived from the profile row on the
/// server; clients receive it from `/auth/is-admin`, never from a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "admin" => Ok(Self::Admin),
            other => Err(unknown("role", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Document slots --

/// Who may write a given document slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWriter {
    /// Only the event's owner.
    Owner,
    /// Only an administrator.
    Admin,
}

/// The six fixed document fields of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    Invoice,
    Contract,
    Renders,
    ProductionSchedule,
    RunOfShow,
    SignedContract,
}

impl DocumentSlot {
    /// Fixed iteration order. Notification diffing relies on it.
    pub const ALL: [DocumentSlot; 6] = [
        Self::Invoice,
        Self::Contract,
        Self::Renders,
        Self::ProductionSchedule,
        Self::RunOfShow,
        Self::SignedContract,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Contract => "contract",
            Self::Renders => "renders",
            Self::ProductionSchedule => "production_schedule",
            Self::RunOfShow => "run_of_show",
            Self::SignedContract => "signed_contract",
        }
    }

    /// Human-readable name used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Contract => "Contract",
            Self::Renders => "Renders",
            Self::ProductionSchedule => "Production Schedule",
            Self::RunOfShow => "Run of Show",
            Self::SignedContract => "Signed Contract",
        }
    }

    pub fn writer(self) -> SlotWriter {
        match self {
            Self::SignedContract => SlotWriter::Owner,
            _ => SlotWriter::Admin,
        }
    }

    /// Whether a caller with `role` who does (or does not) own the event may
    /// upload into this slot.
    pub fn can_write(self, role: Role, is_owner: bool) -> bool {
        match self.writer() {
            SlotWriter::Owner => is_owner,
            SlotWriter::Admin => role.is_admin(),
        }
    }

    /// The signed contract has no delete transition for either role.
    pub fn is_deletable(self) -> bool {
        self != Self::SignedContract
    }
}

impl FromStr for DocumentSlot {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| unknown("document slot", s))
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A present document: its public URL plus the canonical object key it was
/// stored under. Rows written before keys were recorded have `key: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSet {
    #[serde(default)]
    pub invoice: Option<DocumentRef>,
    #[serde(default)]
    pub contract: Option<DocumentRef>,
    #[serde(default)]
    pub renders: Option<DocumentRef>,
    #[serde(default)]
    pub production_schedule: Option<DocumentRef>,
    #[serde(default)]
    pub run_of_show: Option<DocumentRef>,
    #[serde(default)]
    pub signed_contract: Option<DocumentRef>,
}

impl DocumentSet {
    pub fn get(&self, slot: DocumentSlot) -> Option<&DocumentRef> {
        match slot {
            DocumentSlot::Invoice => self.invoice.as_ref(),
            DocumentSlot::Contract => self.contract.as_ref(),
            DocumentSlot::Renders => self.renders.as_ref(),
            DocumentSlot::ProductionSchedule => self.production_schedule.as_ref(),
            DocumentSlot::RunOfShow => self.run_of_show.as_ref(),
            DocumentSlot::SignedContract => self.signed_contract.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: DocumentSlot) -> &mut Option<DocumentRef> {
        match slot {
            DocumentSlot::Invoice => &mut self.invoice,
            DocumentSlot::Contract => &mut self.contract,
            DocumentSlot::Renders => &mut self.renders,
            DocumentSlot::ProductionSchedule => &mut self.production_schedule,
            DocumentSlot::RunOfShow => &mut self.run_of_show,
            DocumentSlot::SignedContract => &mut self.signed_contract,
        }
    }

    pub fn is_present(&self, slot: DocumentSlot) -> bool {
        self.get(slot).is_some()
    }
}

// -- Events --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub name: Option<String>,
    pub date: NaiveDate,
    pub artist_name: Option<String>,
    pub budget: f64,
    pub phone: String,
    pub documents: DocumentSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Event on {}", self.date.format("%b %-d, %Y")),
        }
    }
}

/// Events split around "today": `upcoming` holds dates on or after today
/// (ascending), `past` holds dates strictly before today (descending).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPartition {
    pub upcoming: Vec<Event>,
    pub past: Vec<Event>,
}

pub fn partition_events(events: Vec<Event>, today: NaiveDate) -> EventPartition {
    let (mut upcoming, mut past): (Vec<Event>, Vec<Event>) =
        events.into_iter().partition(|e| e.date >= today);

    upcoming.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
    past.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

    EventPartition { upcoming, past }
}

// -- Media --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Other,
}

impl MediaType {
    /// Classify by MIME prefix.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Other => "other",
        }
    }
}

impl FromStr for MediaType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "other" => Ok(Self::Other),
            other => Err(unknown("media type", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub event_id: Uuid,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub media_type: MediaType,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

// -- Profiles & chapters --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub school: Option<String>,
    pub fraternity: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub chapter_id: Option<Uuid>,
}

/// Generic actor used when a profile has neither school nor fraternity.
pub const FALLBACK_ACTOR: &str = "A client";

/// Human-readable label for an event owner, e.g. "State University Sigma Chi".
pub fn actor_label(school: Option<&str>, fraternity: Option<&str>) -> String {
    let parts: Vec<&str> = [school, fraternity]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        FALLBACK_ACTOR.to_string()
    } else {
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// -- Leads --

/// Status set offered by the lead database screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Contacted,
    NoAnswer,
    Declined,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contacted => "contacted",
            Self::NoAnswer => "no_answer",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contacted" => Ok(Self::Contacted),
            "no_answer" => Ok(Self::NoAnswer),
            "declined" => Ok(Self::Declined),
            other => Err(unknown("lead status", other)),
        }
    }
}

/// Status set accepted by the CSV import. Kept separate from
/// [`LeadStatus`] until product settles on one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportLeadStatus {
    #[default]
    New,
    Contacted,
    Converted,
    Rejected,
}

impl ImportLeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Rejected => "rejected",
        }
    }

    /// Invalid or missing values fall back to [`ImportLeadStatus::New`].
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contacted" => Self::Contacted,
            "converted" => Self::Converted,
            "rejected" => Self::Rejected,
            _ => Self::New,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub school: String,
    pub fraternity: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
    pub instagram_handle: Option<String>,
    pub contact_name: Option<String>,
    /// Free text: either status set may be stored here.
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Case-insensitive substring match over the searchable columns.
    /// An empty (or whitespace-only) query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [
            Some(self.school.as_str()),
            Some(self.fraternity.as_str()),
            Some(self.contact_phone.as_str()),
            self.instagram_handle.as_deref(),
            self.contact_name.as_deref(),
            Some(self.status.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}
