use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use compline_core::approvals::{StoreError, TemplateStore};
use compline_core::domain::approval::{
    ApprovalLineTemplate, ApproverRule, StepType, TemplateId, TemplateStep,
};

use super::{parse_u32, RepositoryError};
use crate::DbPool;

pub struct SqlTemplateRepository {
    pool: DbPool,
}

impl SqlTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replaces the template and its whole step list in one transaction.
    ///
    /// Callers are expected to have run [`ApprovalLineTemplate::validate`]; the store itself
    /// keeps whatever it is given so a broken template surfaces at case creation.
    pub async fn save_template(
        &self,
        template: &ApprovalLineTemplate,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO approval_template (id, work_type, name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                work_type = excluded.work_type,
                name = excluded.name,
                updated_at = excluded.updated_at",
        )
        .bind(&template.id.0)
        .bind(&template.work_type)
        .bind(&template.name)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM approval_template_step WHERE template_id = ?")
            .bind(&template.id.0)
            .execute(&mut *tx)
            .await?;

        for step in &template.steps {
            sqlx::query(
                "INSERT INTO approval_template_step (
                    template_id, step_order, name, step_type, approver_rule, approver_ref, required
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&template.id.0)
            .bind(i64::from(step.order))
            .bind(&step.name)
            .bind(step.step_type.as_str())
            .bind(step.approver_rule.as_str())
            .bind(&step.approver_ref)
            .bind(step.required)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_template(
        &self,
        id: &TemplateId,
    ) -> Result<Option<ApprovalLineTemplate>, RepositoryError> {
        let Some(row) =
            sqlx::query("SELECT id, work_type, name FROM approval_template WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let steps = sqlx::query(
            "SELECT step_order, name, step_type, approver_rule, approver_ref, required
             FROM approval_template_step
             WHERE template_id = ?
             ORDER BY step_order ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(step_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ApprovalLineTemplate {
            id: TemplateId(row.try_get("id")?),
            work_type: row.try_get("work_type")?,
            name: row.try_get("name")?,
            steps,
        }))
    }
}

#[async_trait]
impl TemplateStore for SqlTemplateRepository {
    async fn resolve_template(
        &self,
        id: &TemplateId,
    ) -> Result<Option<ApprovalLineTemplate>, StoreError> {
        Ok(self.find_template(id).await?)
    }
}

fn step_from_row(row: SqliteRow) -> Result<TemplateStep, RepositoryError> {
    let step_type_raw = row.try_get::<String, _>("step_type")?;
    let step_type = StepType::parse(&step_type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown step type `{step_type_raw}`")))?;

    let rule_raw = row.try_get::<String, _>("approver_rule")?;
    let approver_rule = ApproverRule::parse(&rule_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown approver rule `{rule_raw}`")))?;

    Ok(TemplateStep {
        order: parse_u32("step_order", row.try_get("step_order")?)?,
        name: row.try_get("name")?,
        step_type,
        approver_rule,
        approver_ref: row.try_get("approver_ref")?,
        required: row.try_get("required")?,
    })
}
