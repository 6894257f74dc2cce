//! Transactional writes behind the wizard steps.
//!
//! Every step runs in one transaction that first locks the user's row, so two
//! overlapping submissions from the same user serialise rather than interleave.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::wizard::entries::{AchievementEntry, EducationEntry, ExperienceEntry, ProjectEntry};
use crate::wizard::steps::WizardStep;

/// An open step submission: user row locked, step order already checked.
pub struct StepTransaction {
    tx: Transaction<'static, Postgres>,
    user_id: Uuid,
    step: WizardStep,
    progress: Option<WizardStep>,
}

impl StepTransaction {
    pub async fn begin(pool: &PgPool, user_id: Uuid, step: WizardStep) -> Result<Self, AppError> {
        let mut tx = pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::Unauthorized);
        }

        let stored: Option<String> =
            sqlx::query_scalar("SELECT wizard_step FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let progress = stored.map(|s| s.parse::<WizardStep>()).transpose()?;

        step.ensure_reachable(progress)?;

        Ok(Self {
            tx,
            user_id,
            step,
            progress,
        })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Records the advanced progress and commits. Returns the new progress.
    pub async fn commit(mut self) -> Result<WizardStep, AppError> {
        let progress = self.step.advance(self.progress);
        sqlx::query("UPDATE profiles SET wizard_step = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(self.user_id)
            .bind(progress.as_str())
            .execute(&mut *self.tx)
            .await?;
        self.tx.commit().await?;
        Ok(progress)
    }
}

/// Parameters for the basic-info upsert.
pub struct ProfileUpdate<'a> {
    pub location: &'a str,
    pub birth_date: NaiveDate,
    pub phone: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub profile_picture: &'a str,
    /// `None` keeps the CV already on file.
    pub cv_url: Option<&'a str>,
}

/// Creates the user's profile row or overwrites its scalar fields.
pub async fn upsert_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
    update: ProfileUpdate<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO profiles
            (id, user_id, location, birth_date, phone, bio, profile_picture, cv_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id) DO UPDATE SET
            location = EXCLUDED.location,
            birth_date = EXCLUDED.birth_date,
            phone = EXCLUDED.phone,
            bio = EXCLUDED.bio,
            profile_picture = EXCLUDED.profile_picture,
            cv_url = COALESCE(EXCLUDED.cv_url, profiles.cv_url),
            updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(update.location)
    .bind(update.birth_date)
    .bind(update.phone)
    .bind(update.bio)
    .bind(update.profile_picture)
    .bind(update.cv_url)
    .execute(conn)
    .await?;
    Ok(())
}

/// A row type owned by a user and replaced wholesale by one wizard step.
#[async_trait]
pub trait ChildRecord: Send + Sync {
    const TABLE: &'static str;

    /// Row id the client sent back, if it is editing an existing entry.
    fn id(&self) -> Option<Uuid>;

    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error>;
}

/// Row ids to write (one per submitted entry, in order) and rows to prune.
#[derive(Debug, PartialEq)]
pub struct SyncPlan {
    pub ids: Vec<Uuid>,
    pub stale: Vec<Uuid>,
}

/// Matches submitted ids against the user's current rows. Unknown or
/// repeated ids get a fresh id; current rows not resubmitted are stale.
pub fn plan_sync(existing: &[Uuid], submitted: &[Option<Uuid>]) -> SyncPlan {
    let owned: HashSet<Uuid> = existing.iter().copied().collect();
    let mut kept = HashSet::new();

    let ids = submitted
        .iter()
        .map(|id| match id {
            Some(id) if owned.contains(id) && kept.insert(*id) => *id,
            _ => Uuid::new_v4(),
        })
        .collect();
    let stale = existing
        .iter()
        .filter(|id| !kept.contains(*id))
        .copied()
        .collect();

    SyncPlan { ids, stale }
}

/// Makes the user's rows in `T::TABLE` exactly `entries`, in order.
pub async fn sync_entries<T: ChildRecord>(
    conn: &mut PgConnection,
    user_id: Uuid,
    entries: &[T],
) -> Result<usize, sqlx::Error> {
    let existing: Vec<Uuid> =
        sqlx::query_scalar(&format!("SELECT id FROM {} WHERE user_id = $1", T::TABLE))
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    let submitted: Vec<Option<Uuid>> = entries.iter().map(ChildRecord::id).collect();
    let plan = plan_sync(&existing, &submitted);

    if !plan.stale.is_empty() {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND id = ANY($2)",
            T::TABLE
        ))
        .bind(user_id)
        .bind(&plan.stale)
        .execute(&mut *conn)
        .await?;
    }

    for (position, (entry, id)) in entries.iter().zip(&plan.ids).enumerate() {
        entry
            .upsert(&mut *conn, user_id, *id, position as i32)
            .await?;
    }

    Ok(entries.len())
}

#[async_trait]
impl ChildRecord for EducationEntry {
    const TABLE: &'static str = "educations";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO educations
                (id, user_id, position, institution_name, degree, field_of_study,
                 start_date, end_date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                position = EXCLUDED.position,
                institution_name = EXCLUDED.institution_name,
                degree = EXCLUDED.degree,
                field_of_study = EXCLUDED.field_of_study,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                description = EXCLUDED.description,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(position)
        .bind(&self.institution_name)
        .bind(&self.degree)
        .bind(&self.field_of_study)
        .bind(self.start_date)
        .bind(self.end_date)
        .bind(&self.description)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChildRecord for ExperienceEntry {
    const TABLE: &'static str = "experiences";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO experiences
                (id, user_id, position, type, title, company_or_org, location,
                 start_date, end_date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                position = EXCLUDED.position,
                type = EXCLUDED.type,
                title = EXCLUDED.title,
                company_or_org = EXCLUDED.company_or_org,
                location = EXCLUDED.location,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                description = EXCLUDED.description,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(position)
        .bind(&self.kind)
        .bind(&self.title)
        .bind(&self.company_or_org)
        .bind(&self.location)
        .bind(self.start_date)
        .bind(self.end_date)
        .bind(&self.description)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChildRecord for ProjectEntry {
    const TABLE: &'static str = "projects";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, user_id, position, title, description, technologies_used, link)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                position = EXCLUDED.position,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                technologies_used = EXCLUDED.technologies_used,
                link = EXCLUDED.link,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(position)
        .bind(&self.title)
        .bind(&self.description)
        .bind(&self.technologies_used)
        .bind(&self.link)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChildRecord for AchievementEntry {
    const TABLE: &'static str = "achievements";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        id: Uuid,
        position: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO achievements
                (id, user_id, position, title, issuer, date_awarded, description, certificate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                position = EXCLUDED.position,
                title = EXCLUDED.title,
                issuer = EXCLUDED.issuer,
                date_awarded = EXCLUDED.date_awarded,
                description = EXCLUDED.description,
                certificate = EXCLUDED.certificate,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(position)
        .bind(&self.title)
        .bind(&self.issuer)
        .bind(self.date_awarded)
        .bind(&self.description)
        .bind(&self.certificate)
        .execute(conn)
        .await?;
        Ok(())
    }
}
