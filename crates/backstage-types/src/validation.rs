use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use validator::{ValidationError, ValidationErrors};

/// Loose E.164: optional `+`, no leading zero, 2 to 15 digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone pattern compiles"));

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// `validator` custom hook for phone fields.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_phone(phone) {
        return Ok(());
    }
    let mut err = ValidationError::new("phone");
    err.message = Some(Cow::Borrowed(
        "Phone number must look like +15551234567 (digits only, optional leading +)",
    ));
    Err(err)
}

/// Flatten `validator` output into one line suitable for an `{error}` body.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
