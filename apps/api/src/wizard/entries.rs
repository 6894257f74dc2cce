//! Payloads for the list steps (education, experience, projects,
//! achievements) and their validated forms.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::storage::UploadedFile;
use crate::wizard::form::FormData;
use crate::wizard::validation::{
    after_or_equal, date, file_type, http_url, json_list, json_object, json_string, max_chars,
    optional_text, parse_uuid, required, FieldErrors,
};

const SHORT_TEXT: Option<usize> = Some(255);
const CERTIFICATE_TYPES: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// One element of a JSON list step. Fields are read one at a time so a
/// wrongly typed value is reported under `list.i.field`.
struct JsonRow<'a> {
    prefix: String,
    fields: Option<&'a Map<String, Value>>,
}

impl JsonRow<'_> {
    fn key(&self, field: &str) -> String {
        format!("{}.{field}", self.prefix)
    }

    fn text(&self, errors: &mut FieldErrors, field: &str) -> Option<String> {
        let value = self.fields.and_then(|fields| fields.get(field));
        json_string(errors, &self.key(field), value)
    }

    fn optional(
        &self,
        errors: &mut FieldErrors,
        field: &str,
        max: Option<usize>,
    ) -> Option<String> {
        let value = self.text(errors, field);
        optional_text(errors, &self.key(field), value, max)
    }

    /// `legacy` when only the legacy name was sent, otherwise `field`.
    fn name_or<'n>(&self, field: &'n str, legacy: &'n str) -> &'n str {
        match self.fields {
            Some(fields) if !fields.contains_key(field) && fields.contains_key(legacy) => legacy,
            _ => field,
        }
    }

    fn id(&self, errors: &mut FieldErrors) -> Option<Uuid> {
        let raw = self.text(errors, "id");
        parse_uuid(errors, &self.key("id"), raw)
    }

    fn date_range(&self, errors: &mut FieldErrors) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let start = self.text(errors, "start_date");
        let end = self.text(errors, "end_date");
        date_range(
            errors,
            (&self.key("start_date"), start),
            (&self.key("end_date"), end),
        )
    }
}

fn json_rows<'a>(errors: &mut FieldErrors, body: &'a Value, list: &str) -> Vec<JsonRow<'a>> {
    json_list(errors, list, body.get(list))
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let prefix = format!("{list}.{i}");
            let fields = json_object(errors, &prefix, raw);
            JsonRow { prefix, fields }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Education
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EducationEntry {
    pub id: Option<Uuid>,
    pub institution_name: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// `{"education": [{id, institution, degree, field, start_date, end_date, description}]}`
pub fn education_from_json(body: &Value) -> Result<Vec<EducationEntry>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let entries = json_rows(&mut errors, body, "education")
        .iter()
        .map(|row| {
            let (start_date, end_date) = row.date_range(&mut errors);
            EducationEntry {
                id: row.id(&mut errors),
                institution_name: row.optional(&mut errors, "institution", SHORT_TEXT),
                degree: row.optional(&mut errors, "degree", SHORT_TEXT),
                field_of_study: row.optional(&mut errors, "field", SHORT_TEXT),
                start_date,
                end_date,
                description: row.optional(&mut errors, "description", None),
            }
        })
        .collect();
    errors.finish(entries)
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceEntry {
    pub id: Option<Uuid>,
    pub kind: String,
    pub title: Option<String>,
    pub company_or_org: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// `{"experience": [{id, type, title, company_or_org, location, start_date, end_date,
/// description}]}`. `position` and `organization` are read when the newer names are absent.
pub fn experience_from_json(body: &Value) -> Result<Vec<ExperienceEntry>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let entries = json_rows(&mut errors, body, "experience")
        .iter()
        .map(|row| {
            let kind = row.text(&mut errors, "type");
            let kind = required(&mut errors, &row.key("type"), kind).unwrap_or_default();
            max_chars(&mut errors, &row.key("type"), Some(kind.as_str()), 255);
            let (start_date, end_date) = row.date_range(&mut errors);
            let title = row.name_or("title", "position");
            let company = row.name_or("company_or_org", "organization");
            ExperienceEntry {
                id: row.id(&mut errors),
                kind,
                title: row.optional(&mut errors, title, SHORT_TEXT),
                company_or_org: row.optional(&mut errors, company, SHORT_TEXT),
                location: row.optional(&mut errors, "location", SHORT_TEXT),
                start_date,
                end_date,
                description: row.optional(&mut errors, "description", None),
            }
        })
        .collect();
    errors.finish(entries)
}

// ────────────────────────────────────────────────────────────────────────────
// Projects
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectEntry {
    pub id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    /// Comma-separated display string.
    pub technologies_used: String,
    pub link: Option<String>,
}

/// `{"projects": [{id, name, description, technologies_used, url}]}` where
/// `technologies_used` is a JSON-encoded list of `{"value": ...}` tag objects.
pub fn projects_from_json(body: &Value) -> Result<Vec<ProjectEntry>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let entries = json_rows(&mut errors, body, "projects")
        .iter()
        .map(|row| {
            let name = row.text(&mut errors, "name");
            let title = required(&mut errors, &row.key("name"), name).unwrap_or_default();
            max_chars(&mut errors, &row.key("name"), Some(title.as_str()), 255);
            let technologies = row.optional(&mut errors, "technologies_used", Some(1000));
            let link = row.optional(&mut errors, "url", SHORT_TEXT);
            http_url(&mut errors, &row.key("url"), link.as_deref());
            ProjectEntry {
                id: row.id(&mut errors),
                title,
                description: row.optional(&mut errors, "description", None),
                technologies_used: technologies_display(technologies.as_deref()),
                link,
            }
        })
        .collect();
    errors.finish(entries)
}

/// Joins the `value` of each element of a JSON tag list with `", "`.
/// Anything that is not a JSON array yields an empty string.
pub fn technologies_display(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let tags: Vec<Value> = serde_json::from_str(raw).unwrap_or_default();
    tags.iter()
        .filter_map(|tag| match tag.get("value")? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

// ────────────────────────────────────────────────────────────────────────────
// Achievements
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AchievementEntry {
    pub id: Option<Uuid>,
    pub title: String,
    pub issuer: Option<String>,
    pub date_awarded: Option<NaiveDate>,
    pub description: Option<String>,
    /// Stored path, filled in once the upload has been written.
    pub certificate: Option<String>,
}

/// Reads `achievements[i][...]` entries out of a multipart form. Each entry
/// comes back with its certificate upload, if any.
pub fn achievements_from_form(
    form: &mut FormData,
) -> Result<Vec<(AchievementEntry, Option<UploadedFile>)>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut entries = Vec::new();

    for i in form.indices("achievements") {
        let key = |f: &str| format!("achievements.{i}.{f}");

        let id = parse_uuid(&mut errors, &key("id"), form.text(&key("id")));
        let title =
            required(&mut errors, &key("title"), form.text(&key("title"))).unwrap_or_default();
        max_chars(&mut errors, &key("title"), Some(title.as_str()), 255);
        let mut text = |f: &str, max: Option<usize>| {
            optional_text(&mut errors, &key(f), form.text(&key(f)), max)
        };
        let issuer = text("issuer", SHORT_TEXT);
        let awarded = text("date_awarded", None);
        let description = text("description", None);
        let date_awarded = date(&mut errors, &key("date_awarded"), awarded.as_deref());

        let certificate = form.take_file(&key("certificate"));
        match &certificate {
            Some(file) => file_type(
                &mut errors,
                &key("certificate"),
                file.extension().as_deref(),
                CERTIFICATE_TYPES,
            ),
            None => {
                let sent_as_text = form
                    .text(&key("certificate"))
                    .is_some_and(|t| !t.trim().is_empty());
                if sent_as_text {
                    errors.add(key("certificate"), "The certificate field must be a file.");
                }
            }
        }

        entries.push((
            AchievementEntry {
                id,
                title,
                issuer,
                date_awarded,
                description,
                certificate: None,
            },
            certificate,
        ));
    }

    errors.finish(entries)
}

/// Parses a start/end pair and checks that the end does not precede the start.
fn date_range(
    errors: &mut FieldErrors,
    (start_key, start): (&str, Option<String>),
    (end_key, end): (&str, Option<String>),
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = optional_text(errors, start_key, start, None);
    let end = optional_text(errors, end_key, end, None);
    let start = date(errors, start_key, start.as_deref());
    let end = date(errors, end_key, end.as_deref());
    after_or_equal(errors, end_key, end, start_key, start);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    #[test]
    fn test_education_preserves_order_and_count() {
        let body = json!({"education": [
            {"institution": "MIT", "start_date": "2015-09-01", "end_date": "2019-06-30"},
            {"institution": "Stanford"},
            {},
        ]});
        let entries = education_from_json(&body).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].institution_name.as_deref(), Some("MIT"));
        assert_eq!(entries[1].institution_name.as_deref(), Some("Stanford"));
        assert_eq!(
            entries[2],
            EducationEntry {
                id: None,
                institution_name: None,
                degree: None,
                field_of_study: None,
                start_date: None,
                end_date: None,
                description: None,
            }
        );
    }

    #[test]
    fn test_education_end_before_start_is_field_error() {
        let body = json!({"education": [
            {"start_date": "2020-01-01", "end_date": "2020-01-01"},
            {"start_date": "2020-01-01", "end_date": "2019-12-31"},
        ]});
        let errors = education_from_json(&body).unwrap_err();
        assert!(errors.contains("education.1.end_date"));
        assert!(!errors.contains("education.0.end_date"));
    }

    #[test]
    fn test_missing_education_list_is_empty_replace() {
        assert!(education_from_json(&json!({})).unwrap().is_empty());
        assert!(education_from_json(&json!({"education": null}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_education_wrong_types_are_field_errors() {
        let body = json!({"education": [
            {"id": "x", "institution": "MIT"},
            {"start_date": 20200101, "degree": ["BSc"]},
            "Stanford",
        ]});
        let errors = education_from_json(&body).unwrap_err();
        assert_eq!(
            errors.messages("education.0.id"),
            ["The id field must be a valid UUID."]
        );
        assert_eq!(
            errors.messages("education.1.start_date"),
            ["The start date field must be a string."]
        );
        assert!(errors.contains("education.1.degree"));
        assert!(errors.contains("education.2"));
        assert!(!errors.contains("education.0.institution"));
    }

    #[test]
    fn test_echoed_id_kept() {
        let id = Uuid::new_v4();
        let body = json!({"education": [{"id": id.to_string()}, {"id": ""}]});
        let entries = education_from_json(&body).unwrap();
        assert_eq!(entries[0].id, Some(id));
        assert_eq!(entries[1].id, None);
    }

    #[test]
    fn test_experience_requires_type() {
        let body = json!({"experience": [{"title": "Engineer"}]});
        let errors = experience_from_json(&body).unwrap_err();
        assert_eq!(
            errors.messages("experience.0.type"),
            ["The type field is required."]
        );
    }

    #[test]
    fn test_experience_type_length_limit() {
        let body = json!({"experience": [{"type": "x".repeat(256)}, {"type": "x".repeat(255)}]});
        let errors = experience_from_json(&body).unwrap_err();
        assert_eq!(
            errors.messages("experience.0.type"),
            ["The type field must not be greater than 255 characters."]
        );
        assert!(!errors.contains("experience.1.type"));
    }

    #[test]
    fn test_experience_accepts_legacy_field_names() {
        let body = json!({"experience": [
            {"type": "job", "position": "Backend Engineer", "organization": "Acme"},
        ]});
        let entries = experience_from_json(&body).unwrap();
        assert_eq!(entries[0].kind, "job");
        assert_eq!(entries[0].title.as_deref(), Some("Backend Engineer"));
        assert_eq!(entries[0].company_or_org.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_experience_legacy_name_errors_use_sent_key() {
        let body = json!({"experience": [{"type": "job", "position": 42}]});
        let errors = experience_from_json(&body).unwrap_err();
        assert!(errors.contains("experience.0.position"));
    }

    #[test]
    fn test_experience_date_order() {
        let body = json!({"experience": [
            {"type": "internship", "start_date": "2022-06-01", "end_date": "2022-05-01"},
        ]});
        assert!(experience_from_json(&body)
            .unwrap_err()
            .contains("experience.0.end_date"));
    }

    #[test]
    fn test_technologies_joined() {
        assert_eq!(
            technologies_display(Some(r#"[{"value":"Go"},{"value":"Rust"}]"#)),
            "Go, Rust"
        );
    }

    #[test]
    fn test_technologies_malformed_json_is_empty() {
        assert_eq!(technologies_display(Some("[{value: Go")), "");
        assert_eq!(technologies_display(Some(r#"{"value":"Go"}"#)), "");
        assert_eq!(technologies_display(None), "");
    }

    #[test]
    fn test_technologies_skips_elements_without_value() {
        assert_eq!(
            technologies_display(Some(r#"[{"value":"Go"},{"label":"x"},{"value":3}]"#)),
            "Go, 3"
        );
    }

    #[test]
    fn test_project_requires_name_and_valid_url() {
        let body = json!({"projects": [{"url": "not-a-url"}]});
        let errors = projects_from_json(&body).unwrap_err();
        assert!(errors.contains("projects.0.name"));
        assert!(errors.contains("projects.0.url"));
    }

    #[test]
    fn test_project_malformed_technologies_do_not_fail_step() {
        let body = json!({"projects": [{
            "name": "Crawler",
            "technologies_used": "not json",
            "url": "https://example.com",
        }]});
        let entries = projects_from_json(&body).unwrap();
        assert_eq!(entries[0].title, "Crawler");
        assert_eq!(entries[0].technologies_used, "");
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com"));
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: Some(name.into()),
            bytes: Bytes::from_static(b"data"),
        }
    }

    #[test]
    fn test_achievements_pair_certificates_with_entries() {
        let mut form = FormData::default();
        form.insert_text("achievements.0.title", "Dean's List");
        form.insert_text("achievements.1.title", "Hackathon Winner");
        form.insert_text("achievements.1.date_awarded", "2023-04-02");
        form.insert_file("achievements.1.certificate", file("cert.png"));

        let entries = achievements_from_form(&mut form).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].1.is_none());
        assert_eq!(entries[1].0.title, "Hackathon Winner");
        assert!(entries[1].1.is_some());
        assert_eq!(
            entries[1].0.date_awarded,
            NaiveDate::from_ymd_opt(2023, 4, 2)
        );
    }

    #[test]
    fn test_achievement_certificate_type_checked() {
        let mut form = FormData::default();
        form.insert_text("achievements.0.title", "Award");
        form.insert_file("achievements.0.certificate", file("cert.exe"));
        let errors = achievements_from_form(&mut form).unwrap_err();
        assert!(errors.contains("achievements.0.certificate"));
    }

    #[test]
    fn test_achievement_bad_id_reported() {
        let mut form = FormData::default();
        form.insert_text("achievements.0.title", "Award");
        form.insert_text("achievements.0.id", "42");
        let errors = achievements_from_form(&mut form).unwrap_err();
        assert_eq!(
            errors.messages("achievements.0.id"),
            ["The id field must be a valid UUID."]
        );
    }

    #[test]
    fn test_achievement_title_required() {
        let mut form = FormData::default();
        form.insert_text("achievements.0.issuer", "IEEE");
        let errors = achievements_from_form(&mut form).unwrap_err();
        assert_eq!(
            errors.messages("achievements.0.title"),
            ["The title field is required."]
        );
    }
}
