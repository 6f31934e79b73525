//! `import-leads`: bulk lead creation from an uploaded CSV file.
//!
//! Columns are positional: school, fraternity, contact_email, contact_name,
//! status, notes. A first row whose first cell reads `school` is treated as
//! a header. Valid rows are inserted together; invalid rows are reported
//! back with their line number.

use axum::{
    Json,
    extract::{Multipart, State},
};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;
use validator::ValidateEmail;

use backstage_types::api::{ImportLeadsResponse, ImportRowError};
use backstage_types::models::{ImportLeadStatus, Lead};

use crate::error::{AppError, AppResult};
use crate::middleware::RequireAdmin;
use crate::state::AppState;
use crate::upload::read_file_field;

/// One parsed record and the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Split CSV text into records. Handles quoted fields (with `""` escapes,
/// embedded commas and newlines), CRLF line endings and blank lines.
pub fn parse_csv(text: &str) -> Vec<CsvRecord> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    let mut finish = |fields: &mut Vec<String>, field: &mut String, record_line: usize| {
        fields.push(std::mem::take(field));
        let blank = fields.iter().all(|f| f.trim().is_empty());
        if !blank {
            records.push(CsvRecord {
                line: record_line,
                fields: std::mem::take(fields),
            });
        }
        fields.clear();
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish(&mut fields, &mut field, record_line);
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !fields.is_empty() {
        finish(&mut fields, &mut field, record_line);
    }

    records
}

fn is_header(record: &CsvRecord) -> bool {
    record
        .fields
        .first()
        .is_some_and(|f| f.trim().eq_ignore_ascii_case("school"))
}

/// Validate records into insertable leads and per-row errors.
pub fn build_leads(
    records: &[CsvRecord],
    created_by: Uuid,
    now: DateTime<Utc>,
) -> (Vec<Lead>, Vec<ImportRowError>) {
    let mut leads = Vec::new();
    let mut errors = Vec::new();

    let data = match records.first() {
        Some(first) if is_header(first) => &records[1..],
        _ => records,
    };

    for record in data {
        let cell = |i: usize| record.fields.get(i).map(|f| f.trim()).unwrap_or("");
        let optional = |i: usize| Some(cell(i)).filter(|v| !v.is_empty()).map(str::to_string);

        let (school, fraternity, email) = (cell(0), cell(1), cell(2));

        let mut problems = Vec::new();
        if school.is_empty() {
            problems.push("school is required");
        }
        if fraternity.is_empty() {
            problems.push("fraternity is required");
        }
        if email.is_empty() {
            problems.push("contact_email is required");
        } else if !email.validate_email() {
            problems.push("contact_email is not a valid email address");
        }

        if !problems.is_empty() {
            errors.push(ImportRowError {
                row: record.line,
                record: format!("{school} / {fraternity} / {email}"),
                message: problems.join("; "),
            });
            continue;
        }

        leads.push(Lead {
            id: Uuid::new_v4(),
            school: school.to_string(),
            fraternity: fraternity.to_string(),
            // The import format has no phone column.
            contact_phone: String::new(),
            contact_email: Some(email.to_string()),
            instagram_handle: None,
            contact_name: optional(3),
            status: ImportLeadStatus::parse_or_default(cell(4)).as_str().to_string(),
            notes: optional(5),
            created_by,
            created_at: now,
            updated_at: now,
        });
    }

    (leads, errors)
}

/// POST /functions/v1/import-leads
pub async fn import_leads(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> AppResult<Json<ImportLeadsResponse>> {
    let file = read_file_field(multipart, state.max_upload_bytes).await?;
    let text = String::from_utf8(file.data.to_vec())
        .map_err(|_| AppError::BadRequest("CSV file must be UTF-8 text".into()))?;

    let records = parse_csv(&text);
    let (leads, errors) = build_leads(&records, admin.sub, Utc::now());
    if leads.is_empty() && errors.is_empty() {
        return Err(AppError::BadRequest("CSV file contains no data rows".into()));
    }

    let inserted_count = state.db(move |db| db.insert_leads(&leads)).await?;
    info!(
        "{} imported {} leads ({} rows rejected)",
        admin.sub,
        inserted_count,
        errors.len()
    );

    Ok(Json(ImportLeadsResponse {
        inserted_count,
        error_count: errors.len(),
        errors,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_and_line_numbers() {
        let text = "school,fraternity,contact_email\r\n\
                    \"State, University\",\"Sigma \"\"Chi\"\"\",a@example.com\r\n\
                    \r\n\
                    Tech,\"Alpha\nBeta\",b@example.com\n\
                    Poly,Kappa,c@example.com";
        let records = parse_csv(text);
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].fields[0], "State, University");
        assert_eq!(records[1].fields[1], "Sigma \"Chi\"");
        assert_eq!(records[1].line, 2);
        assert_eq!(records[2].fields[1], "Alpha\nBeta");
        assert_eq!(records[2].line, 4);
        assert_eq!(records[3].line, 6);
    }

    #[test]
    fn header_is_optional() {
        let now = Utc::now();
        let admin = Uuid::new_v4();
        let with_header = parse_csv("School,Fraternity,contact_email\nA,B,a@example.com\n");
        let without = parse_csv("A,B,a@example.com\n");
        assert_eq!(build_leads(&with_header, admin, now).0.len(), 1);
        assert_eq!(build_leads(&without, admin, now).0.len(), 1);
    }

    #[test]
    fn row_validation_and_status_default() {
        let text = "A,B,a@example.com,Pat,converted,VIP\n\
                    C,D,c@example.com,,bogus,\n\
                    E,F,,,,\n\
                    ,G,not-an-email\n";
        let (leads, errors) = build_leads(&parse_csv(text), Uuid::new_v4(), Utc::now());

        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].status, "converted");
        assert_eq!(leads[0].contact_name.as_deref(), Some("Pat"));
        assert_eq!(leads[0].notes.as_deref(), Some("VIP"));
        assert_eq!(leads[0].contact_phone, "");
        assert_eq!(leads[1].status, "new");
        assert_eq!(leads[1].contact_name, None);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].row, 3);
        assert_eq!(errors[0].message, "contact_email is required");
        assert_eq!(errors[1].row, 4);
        assert_eq!(
            errors[1].message,
            "school is required; contact_email is not a valid email address"
        );
    }
}
