use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use compline_core::approvals::{CaseRepository, CaseWrite, StagedWrite, StoreError};
use compline_core::domain::approval::{
    ActionCode, ActorId, ApprovalCase, CaseId, CaseRecord, CaseStatus, HistoryEntry, HistoryId,
    Priority, StepType, TemplateId,
};
use compline_core::numbering::SequenceKind;

use super::{parse_optional_timestamp, parse_timestamp, parse_u32, RepositoryError};
use crate::DbPool;

const CASE_COLUMNS: &str = "id, case_number, template_id, reference_type, reference_id, drafter_id,
    current_step_order, total_steps, current_approver_id, final_approver_id, status, priority,
    created_at, completed_at, rejected_at, withdrawn_at, reject_reason, version, updated_at";

const HISTORY_COLUMNS: &str = "id, case_id, step_order, step_name, step_type, actor_id,
    action_code, acted_at, comment, delegate_from";

pub struct SqlCaseRepository {
    pool: DbPool,
}

impl SqlCaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_history(&self, case_id: &CaseId) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let query = format!(
            "SELECT {HISTORY_COLUMNS} FROM approval_history WHERE case_id = ?
             ORDER BY LENGTH(id) ASC, id ASC"
        );
        sqlx::query(&query)
            .bind(&case_id.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(history_from_row)
            .collect()
    }

    async fn with_history(
        &self,
        rows: Vec<SqliteRow>,
    ) -> Result<Vec<CaseRecord>, RepositoryError> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let case = case_from_row(row)?;
            let history = self.load_history(&case.id).await?;
            records.push(CaseRecord { case, history });
        }
        Ok(records)
    }
}

#[async_trait]
impl CaseRepository for SqlCaseRepository {
    async fn next_sequence(&self, kind: SequenceKind) -> Result<u64, StoreError> {
        let value: i64 = sqlx::query(
            "INSERT INTO id_sequence (name, value) VALUES (?, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1
             RETURNING value",
        )
        .bind(kind.key())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .try_get("value")
        .map_err(RepositoryError::from)?;

        u64::try_from(value).map_err(|_| {
            StoreError::Backend(format!("sequence `{}` holds a negative value", kind.key()))
        })
    }

    async fn find_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, StoreError> {
        let query = format!("SELECT {CASE_COLUMNS} FROM approval_case WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => {
                let case = case_from_row(row)?;
                let history = self.load_history(&case.id).await?;
                Ok(Some(CaseRecord { case, history }))
            }
            None => Ok(None),
        }
    }

    async fn find_active_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<Option<ApprovalCase>, StoreError> {
        let query = format!(
            "SELECT {CASE_COLUMNS} FROM approval_case
             WHERE reference_type = ? AND reference_id = ? AND status IN ('draft', 'in_progress')"
        );
        let row = sqlx::query(&query)
            .bind(reference_type)
            .bind(reference_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(case_from_row).transpose()?)
    }

    async fn list_awaiting(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError> {
        let query = format!(
            "SELECT {CASE_COLUMNS} FROM approval_case
             WHERE current_approver_id = ? AND status IN ('draft', 'in_progress')
             ORDER BY created_at ASC, LENGTH(id) ASC, id ASC"
        );
        let rows = sqlx::query(&query)
            .bind(&actor.0)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(self.with_history(rows).await?)
    }

    async fn list_drafted_by(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError> {
        let query = format!(
            "SELECT {CASE_COLUMNS} FROM approval_case
             WHERE drafter_id = ?
             ORDER BY created_at DESC, LENGTH(id) DESC, id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(&actor.0)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(self.with_history(rows).await?)
    }

    async fn list_decided_by(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError> {
        let query = format!(
            "SELECT {CASE_COLUMNS} FROM approval_case
             WHERE id IN (
                SELECT case_id FROM approval_history
                WHERE actor_id = ? AND action_code IN ('approve', 'reject')
             )
             ORDER BY created_at DESC, LENGTH(id) DESC, id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(&actor.0)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(self.with_history(rows).await?)
    }

    async fn stage(&self, write: CaseWrite) -> Result<Box<dyn StagedWrite>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        match write {
            CaseWrite::Insert { case, history } => {
                insert_case(&mut tx, &case).await?;
                for entry in &history {
                    insert_history(&mut tx, entry).await?;
                }
            }
            CaseWrite::Update { case, expected_version, settled, appended } => {
                update_case(&mut tx, &case, expected_version).await?;
                if let Some(entry) = &settled {
                    settle_pending(&mut tx, entry).await?;
                }
                for entry in &appended {
                    insert_history(&mut tx, entry).await?;
                }
            }
        }

        Ok(Box::new(SqlStagedWrite { tx }))
    }
}

/// Open transaction holding an applied case write. Dropping it rolls back.
pub struct SqlStagedWrite {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StagedWrite for SqlStagedWrite {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }
}

async fn insert_case(
    tx: &mut Transaction<'static, Sqlite>,
    case: &ApprovalCase,
) -> Result<(), StoreError> {
    let query = format!(
        "INSERT INTO approval_case ({CASE_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );

    sqlx::query(&query)
        .bind(&case.id.0)
        .bind(&case.case_number)
        .bind(&case.template_id.0)
        .bind(&case.reference_type)
        .bind(&case.reference_id)
        .bind(&case.drafter.0)
        .bind(i64::from(case.current_step_order))
        .bind(i64::from(case.total_steps))
        .bind(case.current_approver.as_ref().map(|actor| actor.0.as_str()))
        .bind(case.final_approver.as_ref().map(|actor| actor.0.as_str()))
        .bind(case.status.as_str())
        .bind(case.priority.as_str())
        .bind(case.created_at.to_rfc3339())
        .bind(case.completed_at.map(|value| value.to_rfc3339()))
        .bind(case.rejected_at.map(|value| value.to_rfc3339()))
        .bind(case.withdrawn_at.map(|value| value.to_rfc3339()))
        .bind(case.reject_reason.as_deref())
        .bind(i64::from(case.version))
        .bind(case.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|error| insert_error(error, case))?;

    Ok(())
}

fn insert_error(error: sqlx::Error, case: &ApprovalCase) -> StoreError {
    if let sqlx::Error::Database(database_error) = &error {
        if database_error.is_unique_violation() && database_error.message().contains("reference")
        {
            return StoreError::DuplicateReference {
                reference_type: case.reference_type.clone(),
                reference_id: case.reference_id.clone(),
            };
        }
    }
    RepositoryError::from(error).into()
}

async fn update_case(
    tx: &mut Transaction<'static, Sqlite>,
    case: &ApprovalCase,
    expected_version: u32,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE approval_case SET
            current_step_order = ?,
            current_approver_id = ?,
            final_approver_id = ?,
            status = ?,
            completed_at = ?,
            rejected_at = ?,
            withdrawn_at = ?,
            reject_reason = ?,
            version = ?,
            updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(i64::from(case.current_step_order))
    .bind(case.current_approver.as_ref().map(|actor| actor.0.as_str()))
    .bind(case.final_approver.as_ref().map(|actor| actor.0.as_str()))
    .bind(case.status.as_str())
    .bind(case.completed_at.map(|value| value.to_rfc3339()))
    .bind(case.rejected_at.map(|value| value.to_rfc3339()))
    .bind(case.withdrawn_at.map(|value| value.to_rfc3339()))
    .bind(case.reject_reason.as_deref())
    .bind(i64::from(case.version))
    .bind(case.updated_at.to_rfc3339())
    .bind(&case.id.0)
    .bind(i64::from(expected_version))
    .execute(&mut **tx)
    .await
    .map_err(RepositoryError::from)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(case.id.clone()));
    }
    Ok(())
}

async fn settle_pending(
    tx: &mut Transaction<'static, Sqlite>,
    entry: &HistoryEntry,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE approval_history SET
            actor_id = ?,
            action_code = ?,
            acted_at = ?,
            comment = ?,
            delegate_from = ?
         WHERE id = ? AND action_code = 'pending'",
    )
    .bind(&entry.actor.0)
    .bind(entry.action.as_str())
    .bind(entry.acted_at.to_rfc3339())
    .bind(entry.comment.as_deref())
    .bind(entry.delegate_from.as_ref().map(|actor| actor.0.as_str()))
    .bind(&entry.id.0)
    .execute(&mut **tx)
    .await
    .map_err(RepositoryError::from)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(entry.case_id.clone()));
    }
    Ok(())
}

async fn insert_history(
    tx: &mut Transaction<'static, Sqlite>,
    entry: &HistoryEntry,
) -> Result<(), StoreError> {
    let query = format!(
        "INSERT INTO approval_history ({HISTORY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );

    sqlx::query(&query)
        .bind(&entry.id.0)
        .bind(&entry.case_id.0)
        .bind(i64::from(entry.step_order))
        .bind(&entry.step_name)
        .bind(entry.step_type.as_str())
        .bind(&entry.actor.0)
        .bind(entry.action.as_str())
        .bind(entry.acted_at.to_rfc3339())
        .bind(entry.comment.as_deref())
        .bind(entry.delegate_from.as_ref().map(|actor| actor.0.as_str()))
        .execute(&mut **tx)
        .await
        .map_err(RepositoryError::from)?;

    Ok(())
}

fn case_from_row(row: SqliteRow) -> Result<ApprovalCase, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = CaseStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown case status `{status_raw}`")))?;

    let priority_raw = row.try_get::<String, _>("priority")?;
    let priority = Priority::parse(&priority_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown priority `{priority_raw}`")))?;

    Ok(ApprovalCase {
        id: CaseId(row.try_get("id")?),
        case_number: row.try_get("case_number")?,
        template_id: TemplateId(row.try_get("template_id")?),
        reference_type: row.try_get("reference_type")?,
        reference_id: row.try_get("reference_id")?,
        drafter: ActorId(row.try_get("drafter_id")?),
        current_step_order: parse_u32("current_step_order", row.try_get("current_step_order")?)?,
        total_steps: parse_u32("total_steps", row.try_get("total_steps")?)?,
        current_approver: row.try_get::<Option<String>, _>("current_approver_id")?.map(ActorId),
        final_approver: row.try_get::<Option<String>, _>("final_approver_id")?.map(ActorId),
        status,
        priority,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        completed_at: parse_optional_timestamp("completed_at", row.try_get("completed_at")?)?,
        rejected_at: parse_optional_timestamp("rejected_at", row.try_get("rejected_at")?)?,
        withdrawn_at: parse_optional_timestamp("withdrawn_at", row.try_get("withdrawn_at")?)?,
        reject_reason: row.try_get("reject_reason")?,
        version: parse_u32("version", row.try_get("version")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn history_from_row(row: SqliteRow) -> Result<HistoryEntry, RepositoryError> {
    let step_type_raw = row.try_get::<String, _>("step_type")?;
    let step_type = StepType::parse(&step_type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown step type `{step_type_raw}`")))?;

    let action_raw = row.try_get::<String, _>("action_code")?;
    let action = ActionCode::parse(&action_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown action code `{action_raw}`")))?;

    Ok(HistoryEntry {
        id: HistoryId(row.try_get("id")?),
        case_id: CaseId(row.try_get("case_id")?),
        step_order: parse_u32("step_order", row.try_get("step_order")?)?,
        step_name: row.try_get("step_name")?,
        step_type,
        actor: ActorId(row.try_get("actor_id")?),
        action,
        acted_at: parse_timestamp("acted_at", row.try_get("acted_at")?)?,
        comment: row.try_get("comment")?,
        delegate_from: row.try_get::<Option<String>, _>("delegate_from")?.map(ActorId),
    })
}
