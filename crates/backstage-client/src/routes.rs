//! Route table and the admin gate.

use std::fmt;

use uuid::Uuid;

use backstage_types::models::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Profile,
    Dashboard,
    Admin,
    AdminAnalytics,
    AdminCalendar,
    AdminClients,
    AdminChapter(Uuid),
    AdminEventDocuments,
    Event(Uuid),
    EventMedia(Uuid),
    /// Placeholder for the stage builder.
    EventStage(Uuid),
    NotFound(String),
}

impl Route {
    /// Unknown paths and malformed ids map to [`Route::NotFound`].
    pub fn parse(path: &str) -> Self {
        let trimmed = path.split(['?', '#']).next().unwrap_or(path);
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        let id = |raw: &str| raw.parse::<Uuid>().ok();

        let route = match segments.as_slice() {
            ["login"] => Some(Self::Login),
            ["profile"] => Some(Self::Profile),
            [] | ["dashboard"] => Some(Self::Dashboard),
            ["admin"] => Some(Self::Admin),
            ["admin", "analytics"] => Some(Self::AdminAnalytics),
            ["admin", "calendar"] => Some(Self::AdminCalendar),
            ["admin", "clients"] => Some(Self::AdminClients),
            ["admin", "event-documents"] => Some(Self::AdminEventDocuments),
            ["admin", "chapters", chapter] => id(*chapter).map(Self::AdminChapter),
            ["events", event] => id(*event).map(Self::Event),
            ["events", event, "media"] => id(*event).map(Self::EventMedia),
            ["events", event, "stage"] => id(*event).map(Self::EventStage),
            _ => None,
        };
        route.unwrap_or_else(|| Self::NotFound(path.to_string()))
    }

    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".into(),
            Self::Profile => "/profile".into(),
            Self::Dashboard => "/dashboard".into(),
            Self::Admin => "/admin".into(),
            Self::AdminAnalytics => "/admin/analytics".into(),
            Self::AdminCalendar => "/admin/calendar".into(),
            Self::AdminClients => "/admin/clients".into(),
            Self::AdminChapter(id) => format!("/admin/chapters/{id}"),
            Self::AdminEventDocuments => "/admin/event-documents".into(),
            Self::Event(id) => format!("/events/{id}"),
            Self::EventMedia(id) => format!("/events/{id}/media"),
            Self::EventStage(id) => format!("/events/{id}/stage"),
            Self::NotFound(path) => path.clone(),
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::Admin
                | Self::AdminAnalytics
                | Self::AdminCalendar
                | Self::AdminClients
                | Self::AdminChapter(_)
                | Self::AdminEventDocuments
        )
    }

    /// Clients asking for an admin route land on the dashboard.
    pub fn authorize(self, role: Role) -> Self {
        if self.requires_admin() && !role.is_admin() {
            Self::Dashboard
        } else {
            self
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_path_agree() {
        let id = Uuid::from_u128(42);
        for route in [
            Route::Login,
            Route::Profile,
            Route::Dashboard,
            Route::Admin,
            Route::AdminAnalytics,
            Route::AdminCalendar,
            Route::AdminClients,
            Route::AdminChapter(id),
            Route::AdminEventDocuments,
            Route::Event(id),
            Route::EventMedia(id),
            Route::EventStage(id),
        ] {
            assert_eq!(Route::parse(&route.path()), route);
        }
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(Route::parse("/events/not-a-uuid"), Route::NotFound("/events/not-a-uuid".into()));
        assert_eq!(Route::parse("/nope"), Route::NotFound("/nope".into()));
        assert_eq!(Route::parse("/dashboard?tab=past"), Route::Dashboard);
    }

    #[test]
    fn clients_are_sent_to_the_dashboard() {
        assert_eq!(Route::AdminClients.authorize(Role::Client), Route::Dashboard);
        assert_eq!(Route::AdminClients.authorize(Role::Admin), Route::AdminClients);
        let event = Route::Event(Uuid::nil());
        assert_eq!(event.clone().authorize(Role::Client), event);
    }
}
