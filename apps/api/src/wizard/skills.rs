use std::collections::HashSet;

use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::wizard::validation::{json_list, json_string, max_chars, FieldErrors};

pub const MAX_SKILL_CHARS: usize = 255;

/// `{"skills": ["Rust", " go ", ...]}` to canonical, deduplicated names.
/// Lengths are checked on the canonical form, which is what gets stored.
pub fn skills_from_json(body: &Value) -> Result<Vec<String>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut raw = Vec::new();
    for (i, item) in json_list(&mut errors, "skills", body.get("skills"))
        .iter()
        .enumerate()
    {
        let key = format!("skills.{i}");
        if let Some(name) = json_string(&mut errors, &key, Some(item)) {
            let canonical = normalize_skill(&name);
            max_chars(&mut errors, &key, Some(canonical.as_str()), MAX_SKILL_CHARS);
            raw.push(name);
        }
    }
    errors.finish(normalize_skill_names(&raw))
}

/// Trimmed and lower-cased. Lower-casing can lengthen some strings (`İ`).
pub fn normalize_skill(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Canonical skill names: blanks dropped, first occurrence kept.
pub fn normalize_skill_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| normalize_skill(n.as_ref()))
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// Names sorted, so concurrent submissions touch shared `skills` rows in
/// one global order.
fn insertion_order(names: &[String]) -> Vec<String> {
    let mut ordered = names.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}

/// Resolves or creates a global skill row per name, then makes the user's
/// associations exactly that set.
pub async fn sync_user_skills(
    conn: &mut PgConnection,
    user_id: Uuid,
    names: &[String],
) -> Result<Vec<Uuid>, sqlx::Error> {
    let ordered = insertion_order(names);
    let fresh_ids: Vec<Uuid> = ordered.iter().map(|_| Uuid::new_v4()).collect();

    // DO NOTHING takes no lock on rows that already exist.
    sqlx::query(
        r#"
        INSERT INTO skills (id, name)
        SELECT id, name FROM UNNEST($1::uuid[], $2::text[]) AS s(id, name)
        ORDER BY name
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(&fresh_ids)
    .bind(&ordered)
    .execute(&mut *conn)
    .await?;

    let skill_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM skills WHERE name = ANY($1)")
        .bind(&ordered)
        .fetch_all(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM user_skills WHERE user_id = $1 AND NOT (skill_id = ANY($2))")
        .bind(user_id)
        .bind(&skill_ids)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO user_skills (user_id, skill_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&skill_ids)
    .execute(&mut *conn)
    .await?;

    Ok(skill_ids)
}
