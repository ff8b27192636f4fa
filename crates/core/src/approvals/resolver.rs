use std::collections::HashMap;

use async_trait::async_trait;

use crate::approvals::ports::{ApproverResolver, StoreError};
use crate::domain::approval::{ActorId, ApproverRule, CaseContext};

/// Resolver over fixed in-process directories of department heads and position holders.
#[derive(Clone, Debug, Default)]
pub struct StaticApproverResolver {
    department_heads: HashMap<String, ActorId>,
    position_holders: HashMap<String, ActorId>,
}

impl StaticApproverResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_department_head(mut self, department: &str, head: &str) -> Self {
        self.department_heads.insert(normalize_key(department), ActorId(head.to_string()));
        self
    }

    pub fn with_position_holder(mut self, position: &str, holder: &str) -> Self {
        self.position_holders.insert(normalize_key(position), ActorId(holder.to_string()));
        self
    }
}

#[async_trait]
impl ApproverResolver for StaticApproverResolver {
    async fn resolve(
        &self,
        rule: ApproverRule,
        approver_ref: &str,
        _context: &CaseContext,
    ) -> Result<Option<ActorId>, StoreError> {
        let resolved = match rule {
            ApproverRule::FixedUser => fixed_user(approver_ref),
            ApproverRule::DepartmentHead => {
                self.department_heads.get(&normalize_key(approver_ref)).cloned()
            }
            ApproverRule::PositionHolder => {
                self.position_holders.get(&normalize_key(approver_ref)).cloned()
            }
        };
        Ok(resolved)
    }
}

/// A fixed-user rule names its approver directly; a blank reference resolves to nobody.
pub fn fixed_user(approver_ref: &str) -> Option<ActorId> {
    let trimmed = approver_ref.trim();
    (!trimmed.is_empty()).then(|| ActorId(trimmed.to_string()))
}

pub fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
