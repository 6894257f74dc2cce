use chrono::NaiveDate;

use crate::storage::UploadedFile;
use crate::wizard::form::FormData;
use crate::wizard::validation::{
    clean, date, file_type, max_chars, optional_text, required, FieldErrors,
};

const CV_TYPES: &[&str] = &["pdf", "doc", "docx"];

/// Validated basic-info submission. The picture is still base64 here; it is
/// transcoded before anything is written.
#[derive(Debug)]
pub struct BasicInfo {
    pub location: String,
    pub birth_date: NaiveDate,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_cropped: String,
    pub cv: Option<UploadedFile>,
}

impl BasicInfo {
    pub fn from_form(form: &mut FormData) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let location = required(&mut errors, "location", form.text("location"));
        max_chars(&mut errors, "location", location.as_deref(), 255);

        let birth_date = match required(&mut errors, "birth_date", form.text("birth_date")) {
            Some(raw) => date(&mut errors, "birth_date", Some(raw.as_str())),
            None => None,
        };

        let phone = optional_text(&mut errors, "phone", form.text("phone"), Some(20));
        let bio = optional_text(&mut errors, "bio", form.text("bio"), Some(1000));

        let picture = required(
            &mut errors,
            "profile_picture_cropped",
            form.text("profile_picture_cropped"),
        );

        let cv = form.take_file("cv");
        match &cv {
            Some(file) => file_type(&mut errors, "cv", file.extension().as_deref(), CV_TYPES),
            None => {
                if clean(form.text("cv")).is_some() {
                    errors.add("cv", "The cv field must be a file.");
                }
            }
        }

        match (location, birth_date, picture) {
            (Some(location), Some(birth_date), Some(profile_picture_cropped))
                if errors.is_empty() =>
            {
                Ok(BasicInfo {
                    location,
                    birth_date,
                    phone,
                    bio,
                    profile_picture_cropped,
                    cv,
                })
            }
            _ => Err(errors),
        }
    }
}
