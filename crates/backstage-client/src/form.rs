//! Create/edit event form.
//!
//! The hiring-artist toggle lives here: while it is off the artist name is
//! forced absent, while it is on a non-empty name is required.

use chrono::NaiveDate;
use validator::Validate;

use backstage_types::api::EventRequest;
use backstage_types::models::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw form input, as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventForm {
    pub name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub budget: String,
    pub phone: String,
    hiring_artist: bool,
    artist_name: String,
}

impl EventForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefill for editing; the toggle starts on when the event names an
    /// artist.
    pub fn from_event(event: &Event) -> Self {
        Self {
            name: event.name.clone().unwrap_or_default(),
            date: event.date.format("%Y-%m-%d").to_string(),
            budget: event.budget.to_string(),
            phone: event.phone.clone(),
            hiring_artist: event.artist_name.is_some(),
            artist_name: event.artist_name.clone().unwrap_or_default(),
        }
    }

    pub fn hiring_artist(&self) -> bool {
        self.hiring_artist
    }

    pub fn artist_name(&self) -> &str {
        &self.artist_name
    }

    /// Turning the toggle off discards any typed artist name.
    pub fn set_hiring_artist(&mut self, on: bool) {
        self.hiring_artist = on;
        if !on {
            self.artist_name.clear();
        }
    }

    /// Ignored while the toggle is off.
    pub fn set_artist_name(&mut self, name: impl Into<String>) {
        if self.hiring_artist {
            self.artist_name = name.into();
        }
    }

    /// Validate and build the request, or report every problem at once.
    pub fn to_request(&self) -> Result<EventRequest, Vec<FieldError>> {
        let mut errors = Vec::new();

        let date = match NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(FieldError::new("date", "Date is required"));
                None
            }
        };

        let budget = match self.budget.trim().parse::<f64>() {
            Ok(budget) if budget.is_finite() => Some(budget),
            _ => {
                errors.push(FieldError::new("budget", "Budget must be a number"));
                None
            }
        };

        let artist_name = if self.hiring_artist {
            let name = self.artist_name.trim();
            if name.is_empty() {
                errors.push(FieldError::new("artist_name", "Artist name is required when hiring an artist"));
            }
            Some(name.to_string()).filter(|n| !n.is_empty())
        } else {
            None
        };

        let name = Some(self.name.trim().to_string()).filter(|n| !n.is_empty());

        let (Some(date), Some(budget)) = (date, budget) else {
            return Err(errors);
        };
        let request = EventRequest {
            name,
            date,
            artist_name,
            budget,
            phone: self.phone.trim().to_string(),
        };

        if let Err(validation) = request.validate() {
            let mut fields: Vec<_> = validation.field_errors().into_iter().collect();
            fields.sort_by_key(|(field, _)| field.to_string());
            for (field, errs) in fields {
                let field = match field.as_ref() {
                    "budget" => "budget",
                    "phone" => "phone",
                    _ => "form",
                };
                for e in errs {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    errors.push(FieldError::new(field, message));
                }
            }
        }

        if errors.is_empty() { Ok(request) } else { Err(errors) }
    }
}
