use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use compline_core::approvals::{
    CaseRepository, CaseWrite, StagedWrite, StoreError, TemplateStore,
};
use compline_core::domain::approval::{
    ActorId, ApprovalCase, ApprovalLineTemplate, CaseId, CaseRecord, HistoryEntry, TemplateId,
};
use compline_core::numbering::SequenceKind;

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, ApprovalLineTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn with_templates(templates: impl IntoIterator<Item = ApprovalLineTemplate>) -> Self {
        let templates =
            templates.into_iter().map(|template| (template.id.0.clone(), template)).collect();
        Self { templates: RwLock::new(templates) }
    }

    pub async fn save(&self, template: ApprovalLineTemplate) {
        let mut templates = self.templates.write().await;
        templates.insert(template.id.0.clone(), template);
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn resolve_template(
        &self,
        id: &TemplateId,
    ) -> Result<Option<ApprovalLineTemplate>, StoreError> {
        let templates = self.templates.read().await;
        Ok(templates.get(&id.0).cloned())
    }
}

#[derive(Default)]
struct CaseTables {
    cases: HashMap<String, ApprovalCase>,
    history: HashMap<String, Vec<HistoryEntry>>,
    sequences: HashMap<String, u64>,
}

impl CaseTables {
    fn record(&self, case: &ApprovalCase) -> CaseRecord {
        CaseRecord {
            case: case.clone(),
            history: self.history.get(&case.id.0).cloned().unwrap_or_default(),
        }
    }

    fn records_where(
        &self,
        predicate: impl Fn(&ApprovalCase) -> bool,
        newest_first: bool,
    ) -> Vec<CaseRecord> {
        let mut cases: Vec<&ApprovalCase> =
            self.cases.values().filter(|case| predicate(case)).collect();
        cases.sort_by(|left, right| {
            (left.created_at, left.id.0.len(), &left.id.0).cmp(&(
                right.created_at,
                right.id.0.len(),
                &right.id.0,
            ))
        });
        if newest_first {
            cases.reverse();
        }
        cases.into_iter().map(|case| self.record(case)).collect()
    }

    /// Rejects a write that could not be applied, without touching anything.
    fn check(&self, write: &CaseWrite) -> Result<(), StoreError> {
        match write {
            CaseWrite::Insert { case, .. } => {
                if self.cases.contains_key(&case.id.0) {
                    return Err(StoreError::Backend(format!("case `{}` already exists", case.id)));
                }
                let duplicate = self.cases.values().any(|existing| {
                    existing.status.accepts_actions()
                        && existing.reference_type == case.reference_type
                        && existing.reference_id == case.reference_id
                });
                if duplicate {
                    return Err(StoreError::DuplicateReference {
                        reference_type: case.reference_type.clone(),
                        reference_id: case.reference_id.clone(),
                    });
                }
            }
            CaseWrite::Update { case, expected_version, settled, .. } => {
                let current = self
                    .cases
                    .get(&case.id.0)
                    .filter(|current| current.version == *expected_version);
                if current.is_none() {
                    return Err(StoreError::Conflict(case.id.clone()));
                }

                if let Some(settled) = settled {
                    let still_pending = self
                        .history
                        .get(&case.id.0)
                        .and_then(|entries| entries.iter().find(|entry| entry.id == settled.id))
                        .is_some_and(HistoryEntry::is_pending);
                    if !still_pending {
                        return Err(StoreError::Conflict(case.id.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: CaseWrite) {
        match write {
            CaseWrite::Insert { case, history } => {
                self.history.insert(case.id.0.clone(), history);
                self.cases.insert(case.id.0.clone(), case);
            }
            CaseWrite::Update { case, settled, appended, .. } => {
                let entries = self.history.entry(case.id.0.clone()).or_default();
                if let Some(settled) = settled {
                    if let Some(slot) = entries.iter_mut().find(|entry| entry.id == settled.id) {
                        *slot = settled;
                    }
                }
                entries.extend(appended);
                self.cases.insert(case.id.0.clone(), case);
            }
        }
    }
}

/// Case store kept in process memory. Staging takes the table lock and holds it until
/// the write is committed or dropped, so a staged write is invisible to everyone else.
#[derive(Clone, Default)]
pub struct InMemoryCaseRepository {
    tables: Arc<Mutex<CaseTables>>,
}

#[async_trait]
impl CaseRepository for InMemoryCaseRepository {
    async fn next_sequence(&self, kind: SequenceKind) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let value = tables.sequences.entry(kind.key()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn find_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.cases.get(&id.0).map(|case| tables.record(case)))
    }

    async fn find_active_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<Option<ApprovalCase>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .cases
            .values()
            .find(|case| {
                case.status.accepts_actions()
                    && case.reference_type == reference_type
                    && case.reference_id == reference_id
            })
            .cloned())
    }

    async fn list_awaiting(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.records_where(
            |case| case.status.accepts_actions() && case.current_approver.as_ref() == Some(actor),
            false,
        ))
    }

    async fn list_drafted_by(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.records_where(|case| case.drafter == *actor, true))
    }

    async fn list_decided_by(&self, actor: &ActorId) -> Result<Vec<CaseRecord>, StoreError> {
        let tables = self.tables.lock().await;
        let decided = |case: &ApprovalCase| {
            tables.history.get(&case.id.0).is_some_and(|entries| {
                entries.iter().any(|entry| entry.actor == *actor && entry.action.is_decision())
            })
        };
        Ok(tables.records_where(decided, true))
    }

    async fn stage(&self, write: CaseWrite) -> Result<Box<dyn StagedWrite>, StoreError> {
        let tables = Arc::clone(&self.tables).lock_owned().await;
        tables.check(&write)?;
        Ok(Box::new(InMemoryStagedWrite { tables, write }))
    }
}

struct InMemoryStagedWrite {
    tables: OwnedMutexGuard<CaseTables>,
    write: CaseWrite,
}

#[async_trait]
impl StagedWrite for InMemoryStagedWrite {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryStagedWrite { mut tables, write } = *self;
        tables.apply(write);
        Ok(())
    }
}
