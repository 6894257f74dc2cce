//! Axum route handlers for the profile wizard.
//!
//! Each POST step validates its payload, writes inside a locked
//! [`StepTransaction`] and answers with a 303 to the next step.

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    response::Redirect,
    Json,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::Principal;
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::{generate_path, store_upload, CERTIFICATES_DIR, CVS_DIR, PROFILE_PICTURES_DIR};
use crate::wizard::basic_info::BasicInfo;
use crate::wizard::entries::{
    achievements_from_form, education_from_json, experience_from_json, projects_from_json,
};
use crate::wizard::form::FormData;
use crate::wizard::persistence::{
    sync_entries, upsert_profile, ChildRecord, ProfileUpdate, StepTransaction,
};
use crate::wizard::picture::transcode_to_jpeg;
use crate::wizard::skills::{skills_from_json, sync_user_skills};
use crate::wizard::steps::WizardStep;
use crate::wizard::summary::{
    load_profile, load_summary, picture_view, PictureView, ProfileSummary,
};
use crate::wizard::validation::FieldErrors;

/// The body as loose JSON. Only unparseable or non-object bodies are a 400;
/// wrongly typed fields are left for the step's validation to key.
fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    let Json(body) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    if !body.is_object() {
        return Err(AppError::BadRequest("Request body must be a JSON object".to_string()));
    }
    Ok(body)
}

/// POST /profile/basic-info
///
/// Multipart: location, birth_date, phone, bio, cv (file), profile_picture_cropped (base64).
pub async fn handle_basic_info(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let info = BasicInfo::from_form(&mut form)?;

    // Decode before touching storage so a bad picture commits nothing.
    let encoded = info.profile_picture_cropped.clone();
    let jpeg = tokio::task::spawn_blocking(move || transcode_to_jpeg(&encoded))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| {
            warn!("Unreadable profile picture from user {}: {e}", principal.user_id);
            let mut errors = FieldErrors::new();
            errors.add(
                "profile_picture_cropped",
                "The profile picture cropped field must be a valid image.",
            );
            AppError::InvalidFields(errors)
        })?;

    let mut step =
        StepTransaction::begin(&state.db, principal.user_id, WizardStep::BasicInfo).await?;

    let picture_path = generate_path(PROFILE_PICTURES_DIR, "jpg");
    state
        .storage
        .put(&picture_path, Bytes::from(jpeg), "image/jpeg")
        .await?;

    let cv_url = match info.cv {
        Some(file) => Some(store_upload(state.storage.as_ref(), CVS_DIR, file).await?),
        None => None,
    };

    upsert_profile(
        step.conn(),
        principal.user_id,
        ProfileUpdate {
            location: &info.location,
            birth_date: info.birth_date,
            phone: info.phone.as_deref(),
            bio: info.bio.as_deref(),
            profile_picture: &picture_path,
            cv_url: cv_url.as_deref(),
        },
    )
    .await?;
    let progress = step.commit().await?;

    info!(
        "Saved basic info for user {} (picture {picture_path}, progress {progress})",
        principal.user_id
    );
    Ok(Redirect::to(WizardStep::BasicInfo.next().path()))
}

/// POST /profile/skills
pub async fn handle_skills(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Redirect, AppError> {
    let names = skills_from_json(&json_body(payload)?)?;

    let mut step =
        StepTransaction::begin(&state.db, principal.user_id, WizardStep::Skills).await?;
    let skill_ids = sync_user_skills(step.conn(), principal.user_id, &names).await?;
    let progress = step.commit().await?;

    info!(
        "Synced {} skills for user {} (progress {progress})",
        skill_ids.len(),
        principal.user_id
    );
    Ok(Redirect::to(WizardStep::Skills.next().path()))
}

/// POST /profile/education
pub async fn handle_education(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Redirect, AppError> {
    let entries = education_from_json(&json_body(payload)?)?;
    replace_entries(&state, principal, WizardStep::Education, &entries).await
}

/// POST /profile/experience
pub async fn handle_experience(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Redirect, AppError> {
    let entries = experience_from_json(&json_body(payload)?)?;
    replace_entries(&state, principal, WizardStep::Experience, &entries).await
}

/// POST /profile/projects
pub async fn handle_projects(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Redirect, AppError> {
    let entries = projects_from_json(&json_body(payload)?)?;
    replace_entries(&state, principal, WizardStep::Projects, &entries).await
}

/// POST /profile/achievements
///
/// Multipart: `achievements[i][title|issuer|date_awarded|description|certificate]`.
pub async fn handle_achievements(
    State(state): State<AppState>,
    principal: Principal,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut form = FormData::from_multipart(multipart).await?;
    let submitted = achievements_from_form(&mut form)?;

    let mut step =
        StepTransaction::begin(&state.db, principal.user_id, WizardStep::Achievements).await?;

    let mut entries = Vec::with_capacity(submitted.len());
    for (mut entry, certificate) in submitted {
        if let Some(file) = certificate {
            entry.certificate =
                Some(store_upload(state.storage.as_ref(), CERTIFICATES_DIR, file).await?);
        }
        entries.push(entry);
    }

    let count = sync_entries(step.conn(), principal.user_id, &entries).await?;
    let progress = step.commit().await?;

    info!(
        "Stored {count} achievements for user {} (progress {progress})",
        principal.user_id
    );
    Ok(Redirect::to(WizardStep::Achievements.next().path()))
}

/// GET /profile/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ProfileSummary>, AppError> {
    let summary = load_summary(&state.db, state.storage.as_ref(), principal.user_id).await?;
    Ok(Json(summary))
}

/// GET /profile/picture
///
/// Current picture for the standalone editor. There is no matching update route.
pub async fn handle_edit_picture(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<PictureView>, AppError> {
    let profile = load_profile(&state.db, principal.user_id).await?;
    Ok(Json(picture_view(profile.as_ref(), state.storage.as_ref())))
}

async fn replace_entries<T: ChildRecord>(
    state: &AppState,
    principal: Principal,
    wizard_step: WizardStep,
    entries: &[T],
) -> Result<Redirect, AppError> {
    let mut step = StepTransaction::begin(&state.db, principal.user_id, wizard_step).await?;
    let count = sync_entries(step.conn(), principal.user_id, entries).await?;
    let progress = step.commit().await?;

    info!(
        "Stored {count} {} for user {} (progress {progress})",
        T::TABLE,
        principal.user_id
    );
    Ok(Redirect::to(wizard_step.next().path()))
}
