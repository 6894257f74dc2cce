use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Accepted wire format for every date field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Per-field validation messages keyed by dotted path (`education.0.end_date`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
impl FieldErrors {
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Trims a submitted string; blank input counts as absent.
pub fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

pub fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = clean(value);
    if value.is_none() {
        errors.add(field, format!("The {} field is required.", label(field)));
    }
    value
}

pub fn max_chars(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.add(
                field,
                format!(
                    "The {} field must not be greater than {max} characters.",
                    label(field)
                ),
            );
        }
    }
}

/// Cleans an optional string and checks its length in one go.
pub fn optional_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max: Option<usize>,
) -> Option<String> {
    let value = clean(value);
    if let Some(max) = max {
        max_chars(errors, field, value.as_deref(), max);
    }
    value
}

pub fn date(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let raw = value?;
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.add(
                field,
                format!("The {} field must be a valid date.", label(field)),
            );
            None
        }
    }
}

/// Rejects an end date that precedes its start date. Equal dates pass.
pub fn after_or_equal(
    errors: &mut FieldErrors,
    field: &str,
    end: Option<NaiveDate>,
    other_field: &str,
    start: Option<NaiveDate>,
) {
    if let (Some(end), Some(start)) = (end, start) {
        if end < start {
            errors.add(
                field,
                format!(
                    "The {} field must be a date after or equal to {}.",
                    label(field),
                    label(other_field)
                ),
            );
        }
    }
}

pub fn http_url(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(raw) = value {
        let valid = url::Url::parse(raw)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            errors.add(
                field,
                format!("The {} field must be a valid URL.", label(field)),
            );
        }
    }
}

/// Checks the extension of an uploaded file name against an allow-list.
pub fn file_type(errors: &mut FieldErrors, field: &str, extension: Option<&str>, allowed: &[&str]) {
    let ok = extension
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false);
    if !ok {
        errors.add(
            field,
            format!(
                "The {} field must be a file of type: {}.",
                label(field),
                allowed.join(", ")
            ),
        );
    }
}

/// Parses a client-echoed row id. Blank means "new row".
pub fn parse_uuid(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<Uuid> {
    let raw = clean(value)?;
    match raw.parse::<Uuid>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(
                field,
                format!("The {} field must be a valid UUID.", label(field)),
            );
            None
        }
    }
}

// JSON bodies are read as `Value` so a wrongly typed field is reported under
// its own key instead of failing the whole body.

/// Elements of a JSON list. Absent or `null` is an empty list.
pub fn json_list<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a Value>,
) -> &'a [Value] {
    match value {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.add(field, format!("The {} field must be an array.", label(field)));
            &[]
        }
    }
}

/// A JSON object in a list, reported under `field` when it is anything else.
pub fn json_object<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: &'a Value,
) -> Option<&'a serde_json::Map<String, Value>> {
    let object = value.as_object();
    if object.is_none() {
        errors.add(field, format!("The {} field must be an object.", label(field)));
    }
    object
}

/// A JSON string. Absent or `null` is `None`; any other type is a field error.
pub fn json_string(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(field, format!("The {} field must be a string.", label(field)));
            None
        }
    }
}

/// Human label for a dotted path: `education.0.end_date` -> `end date`,
/// `skills.3` -> `skills`.
fn label(field: &str) -> String {
    field
        .rsplit('.')
        .find(|segment| segment.parse::<usize>().is_err())
        .unwrap_or(field)
        .replace('_', " ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_required_rejects_blank() {
        let mut errors = FieldErrors::new();
        assert_eq!(required(&mut errors, "location", Some("   ".into())), None);
        assert_eq!(
            errors.messages("location"),
            ["The location field is required."]
        );
    }

    #[test]
    fn test_required_trims() {
        let mut errors = FieldErrors::new();
        let v = required(&mut errors, "location", Some("  Lagos ".into()));
        assert_eq!(v.as_deref(), Some("Lagos"));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_max_chars_counts_characters_not_bytes() {
        let mut errors = FieldErrors::new();
        max_chars(&mut errors, "phone", Some("ééééé"), 5);
        assert!(errors.is_empty());
        max_chars(&mut errors, "phone", Some("123456"), 5);
        assert!(errors.contains("phone"));
    }

    #[test]
    fn test_invalid_date_reported() {
        let mut errors = FieldErrors::new();
        assert_eq!(date(&mut errors, "birth_date", Some("31/12/1990")), None);
        assert_eq!(
            errors.messages("birth_date"),
            ["The birth date field must be a valid date."]
        );
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut errors = FieldErrors::new();
        after_or_equal(
            &mut errors,
            "education.0.end_date",
            ymd(2020, 1, 1),
            "education.0.start_date",
            ymd(2021, 1, 1),
        );
        assert_eq!(
            errors.messages("education.0.end_date"),
            ["The end date field must be a date after or equal to start date."]
        );
    }

    #[test]
    fn test_equal_dates_accepted() {
        let mut errors = FieldErrors::new();
        after_or_equal(&mut errors, "e", ymd(2021, 5, 5), "s", ymd(2021, 5, 5));
        after_or_equal(&mut errors, "e", ymd(2021, 5, 5), "s", None);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_url_requires_http_scheme() {
        let mut errors = FieldErrors::new();
        http_url(&mut errors, "url", Some("https://github.com/x/y"));
        assert!(errors.is_empty());
        http_url(&mut errors, "url", Some("javascript:alert(1)"));
        http_url(&mut errors, "other", Some("not a url"));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_file_type_case_insensitive() {
        let mut errors = FieldErrors::new();
        file_type(&mut errors, "cv", Some("PDF"), &["pdf", "doc", "docx"]);
        assert!(errors.is_empty());
        file_type(&mut errors, "cv", Some("exe"), &["pdf", "doc", "docx"]);
        file_type(&mut errors, "cv2", None, &["pdf"]);
        assert_eq!(
            errors.messages("cv"),
            ["The cv field must be a file of type: pdf, doc, docx."]
        );
        assert!(errors.contains("cv2"));
    }

    #[test]
    fn test_json_type_mismatches_keyed_by_field() {
        let body = json!({"skills": ["rust", 1], "education": "none", "id": 7});
        let mut errors = FieldErrors::new();

        let skills = json_list(&mut errors, "skills", body.get("skills"));
        assert_eq!(
            json_string(&mut errors, "skills.0", Some(&skills[0])).as_deref(),
            Some("rust")
        );
        assert_eq!(json_string(&mut errors, "skills.1", Some(&skills[1])), None);
        assert!(json_list(&mut errors, "education", body.get("education")).is_empty());
        assert!(json_list(&mut errors, "projects", body.get("projects")).is_empty());
        assert_eq!(json_string(&mut errors, "id", body.get("id")), None);

        assert_eq!(
            errors.messages("skills.1"),
            ["The skills field must be a string."]
        );
        assert_eq!(
            errors.messages("education"),
            ["The education field must be an array."]
        );
        assert!(errors.contains("id"));
        assert!(!errors.contains("skills.0"));
        assert!(!errors.contains("projects"));
    }

    #[test]
    fn test_json_object_rejects_scalars() {
        let mut errors = FieldErrors::new();
        assert!(json_object(&mut errors, "education.0", &json!({})).is_some());
        assert!(json_object(&mut errors, "education.1", &json!("MIT")).is_none());
        assert_eq!(
            errors.messages("education.1"),
            ["The education field must be an object."]
        );
    }

    #[test]
    fn test_parse_uuid_blank_is_new_row() {
        let mut errors = FieldErrors::new();
        assert_eq!(parse_uuid(&mut errors, "education.0.id", Some("  ".into())), None);
        assert!(errors.is_empty());
        assert_eq!(parse_uuid(&mut errors, "education.0.id", Some("x".into())), None);
        assert_eq!(
            errors.messages("education.0.id"),
            ["The id field must be a valid UUID."]
        );
    }

    #[test]
    fn test_finish() {
        assert_eq!(FieldErrors::new().finish(7), Ok(7));
        let mut errors = FieldErrors::new();
        errors.add("a", "bad");
        assert!(errors.finish(()).is_err());
    }
}
