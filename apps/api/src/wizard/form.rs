use std::collections::{BTreeSet, HashMap};

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

use crate::errors::AppError;
use crate::storage::UploadedFile;

/// A multipart body flattened into text fields and files keyed by dotted
/// path, so `achievements[0][title]` is stored as `achievements.0.title`.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error("Malformed multipart body", e))?
        {
            let Some(key) = field.name().map(normalize_key) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(&format!("Unreadable file '{key}'"), e))?;
                    // Browsers send an empty, unnamed part for untouched file inputs.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.insert_file(
                        key,
                        UploadedFile {
                            file_name: Some(file_name),
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(&format!("Unreadable field '{key}'"), e))?;
                    form.insert_text(key, text);
                }
            }
        }

        Ok(form)
    }

    pub fn insert_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn insert_file(&mut self, key: impl Into<String>, file: UploadedFile) {
        self.files.insert(key.into(), file);
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.fields.get(key).cloned()
    }

    pub fn take_file(&mut self, key: &str) -> Option<UploadedFile> {
        self.files.remove(key)
    }

    /// Distinct list indices used under `prefix`, ascending.
    pub fn indices(&self, prefix: &str) -> Vec<usize> {
        let lead = format!("{prefix}.");
        let indices: BTreeSet<usize> = self
            .fields
            .keys()
            .chain(self.files.keys())
            .filter_map(|k| k.strip_prefix(&lead))
            .filter_map(|rest| rest.split('.').next())
            .filter_map(|idx| idx.parse().ok())
            .collect();
        indices.into_iter().collect()
    }
}

/// Keeps the status axum assigns, so an oversized body is a 413 rather than a 400.
fn multipart_error(context: &str, e: MultipartError) -> AppError {
    let message = format!("{context}: {}", e.body_text());
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(message)
    }
}

/// `a[0][b]` -> `a.0.b`; `a[]` keeps its bracket-less base.
pub fn normalize_key(raw: &str) -> String {
    let mut parts = Vec::new();
    let (base, rest) = raw.split_once('[').unwrap_or((raw, ""));
    parts.push(base.to_string());
    for segment in rest.split('[') {
        let segment = segment.trim_end_matches(']');
        if !segment.is_empty() {
            parts.push(segment.to_string());
        }
    }
    parts.join(".")
}
