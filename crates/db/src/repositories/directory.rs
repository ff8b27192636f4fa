use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use compline_core::approvals::resolver::{fixed_user, normalize_key};
use compline_core::approvals::{ApproverResolver, StoreError};
use compline_core::domain::approval::{ActorId, ApproverRule, CaseContext};

use super::RepositoryError;
use crate::DbPool;

/// Resolves approvers from the organisation tables (`org_department_head`,
/// `org_position_holder`). Keys are stored normalised to lower case.
pub struct SqlApproverResolver {
    pool: DbPool,
}

impl SqlApproverResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn assign_department_head(
        &self,
        department: &str,
        head: &ActorId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO org_department_head (department, head_actor_id, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(department) DO UPDATE SET
                head_actor_id = excluded.head_actor_id,
                updated_at = excluded.updated_at",
        )
        .bind(normalize_key(department))
        .bind(&head.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn assign_position_holder(
        &self,
        position: &str,
        holder: &ActorId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO org_position_holder (position, holder_actor_id, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(position) DO UPDATE SET
                holder_actor_id = excluded.holder_actor_id,
                updated_at = excluded.updated_at",
        )
        .bind(normalize_key(position))
        .bind(&holder.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(&self, query: &str, key: &str) -> Result<Option<ActorId>, RepositoryError> {
        let row = sqlx::query(query).bind(normalize_key(key)).fetch_optional(&self.pool).await?;
        Ok(row.map(|row| row.try_get::<String, _>("actor_id")).transpose()?.map(ActorId))
    }
}

#[async_trait]
impl ApproverResolver for SqlApproverResolver {
    async fn resolve(
        &self,
        rule: ApproverRule,
        approver_ref: &str,
        _context: &CaseContext,
    ) -> Result<Option<ActorId>, StoreError> {
        let resolved = match rule {
            ApproverRule::FixedUser => fixed_user(approver_ref),
            ApproverRule::DepartmentHead => {
                self.lookup(
                    "SELECT head_actor_id AS actor_id FROM org_department_head WHERE department = ?",
                    approver_ref,
                )
                .await?
            }
            ApproverRule::PositionHolder => {
                self.lookup(
                    "SELECT holder_actor_id AS actor_id FROM org_position_holder WHERE position = ?",
                    approver_ref,
                )
                .await?
            }
        };
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use compline_core::approvals::ApproverResolver;
    use compline_core::domain::approval::{ActorId, ApproverRule, CaseContext, TemplateId};

    use super::SqlApproverResolver;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlApproverResolver {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlApproverResolver::new(pool)
    }

    fn context() -> CaseContext {
        CaseContext {
            template_id: TemplateId("TPL-1".to_string()),
            reference_type: "inspection".to_string(),
            reference_id: "INS-1".to_string(),
            drafter: ActorId("U-D".to_string()),
        }
    }

    #[tokio::test]
    async fn department_head_assignment_is_case_insensitive_and_replaceable() {
        let resolver = setup().await;
        resolver
            .assign_department_head("Quality", &ActorId("U-OLD".to_string()))
            .await
            .expect("assign");
        resolver
            .assign_department_head("quality", &ActorId("U-NEW".to_string()))
            .await
            .expect("reassign");

        let head = resolver
            .resolve(ApproverRule::DepartmentHead, "QUALITY", &context())
            .await
            .expect("resolve");

        assert_eq!(head, Some(ActorId("U-NEW".to_string())));
    }

    #[tokio::test]
    async fn position_holder_and_fixed_user_resolve() {
        let resolver = setup().await;
        resolver
            .assign_position_holder("cco", &ActorId("U-CCO".to_string()))
            .await
            .expect("assign");

        let holder =
            resolver.resolve(ApproverRule::PositionHolder, "cco", &context()).await.expect("pos");
        let fixed =
            resolver.resolve(ApproverRule::FixedUser, "U-9", &context()).await.expect("fixed");
        let vacant =
            resolver.resolve(ApproverRule::PositionHolder, "ceo", &context()).await.expect("none");

        assert_eq!(holder, Some(ActorId("U-CCO".to_string())));
        assert_eq!(fixed, Some(ActorId("U-9".to_string())));
        assert_eq!(vacant, None);
    }
}
