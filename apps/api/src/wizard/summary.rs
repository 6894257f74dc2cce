use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{
    AchievementRow, EducationRow, ExperienceRow, ProfileRow, ProjectRow, SkillRow,
};
use crate::models::user::User;
use crate::storage::FileStore;

#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub row: ProfileRow,
    pub profile_picture_url: Option<String>,
    pub cv_public_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AchievementView {
    #[serde(flatten)]
    pub row: AchievementRow,
    pub certificate_url: Option<String>,
}

/// Everything the wizard has collected for one user.
#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub user: User,
    pub profile: Option<ProfileView>,
    pub skills: Vec<SkillRow>,
    pub educations: Vec<EducationRow>,
    pub experiences: Vec<ExperienceRow>,
    pub projects: Vec<ProjectRow>,
    pub achievements: Vec<AchievementView>,
}

#[derive(Debug, Serialize)]
pub struct PictureView {
    pub profile_picture: Option<String>,
    pub profile_picture_url: Option<String>,
}

pub async fn load_user(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn load_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, AppError> {
    Ok(
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Loads the user with every related collection, children in submission order.
pub async fn load_summary(
    pool: &PgPool,
    store: &dyn FileStore,
    user_id: Uuid,
) -> Result<ProfileSummary, AppError> {
    let user = load_user(pool, user_id).await?;
    let profile = load_profile(pool, user_id).await?;

    let skills = sqlx::query_as::<_, SkillRow>(
        r#"
        SELECT s.id, s.name
        FROM skills s
        JOIN user_skills us ON us.skill_id = s.id
        WHERE us.user_id = $1
        ORDER BY s.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let educations = sqlx::query_as::<_, EducationRow>(
        "SELECT * FROM educations WHERE user_id = $1 ORDER BY position",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let experiences = sqlx::query_as::<_, ExperienceRow>(
        "SELECT * FROM experiences WHERE user_id = $1 ORDER BY position",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let projects = sqlx::query_as::<_, ProjectRow>(
        "SELECT * FROM projects WHERE user_id = $1 ORDER BY position",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let achievements = sqlx::query_as::<_, AchievementRow>(
        "SELECT * FROM achievements WHERE user_id = $1 ORDER BY position",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(ProfileSummary {
        user,
        profile: profile.map(|row| profile_view(row, store)),
        skills,
        educations,
        experiences,
        projects,
        achievements: achievements
            .into_iter()
            .map(|row| achievement_view(row, store))
            .collect(),
    })
}

pub fn picture_view(profile: Option<&ProfileRow>, store: &dyn FileStore) -> PictureView {
    let profile_picture = profile.and_then(|p| p.profile_picture.clone());
    PictureView {
        profile_picture_url: profile_picture.as_deref().map(|p| store.public_url(p)),
        profile_picture,
    }
}

fn profile_view(row: ProfileRow, store: &dyn FileStore) -> ProfileView {
    ProfileView {
        profile_picture_url: row.profile_picture.as_deref().map(|p| store.public_url(p)),
        cv_public_url: row.cv_url.as_deref().map(|p| store.public_url(p)),
        row,
    }
}

fn achievement_view(row: AchievementRow, store: &dyn FileStore) -> AchievementView {
    AchievementView {
        certificate_url: row.certificate.as_deref().map(|p| store.public_url(p)),
        row,
    }
}
