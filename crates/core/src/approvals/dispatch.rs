use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::approvals::ports::{DispatchError, OutcomeDispatcher, OutcomeNotice};

/// Logs outcomes without delivering them anywhere. Used when dispatch is disabled.
#[derive(Clone, Debug, Default)]
pub struct TracingOutcomeDispatcher;

#[async_trait]
impl OutcomeDispatcher for TracingOutcomeDispatcher {
    async fn notify(&self, notice: &OutcomeNotice) -> Result<(), DispatchError> {
        info!(
            event_name = "approval.outcome.logged",
            case_id = %notice.case_id,
            reference_type = %notice.reference_type,
            reference_id = %notice.reference_id,
            outcome = notice.outcome.as_str(),
            "outcome dispatch disabled; notice logged only"
        );
        Ok(())
    }
}

/// Keeps every notice it receives; optionally refuses them all.
#[derive(Clone, Default)]
pub struct RecordingOutcomeDispatcher {
    notices: Arc<Mutex<Vec<OutcomeNotice>>>,
    failure: Option<DispatchError>,
}

impl RecordingOutcomeDispatcher {
    pub fn failing(failure: DispatchError) -> Self {
        Self { notices: Arc::default(), failure: Some(failure) }
    }

    pub fn notices(&self) -> Vec<OutcomeNotice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl OutcomeDispatcher for RecordingOutcomeDispatcher {
    async fn notify(&self, notice: &OutcomeNotice) -> Result<(), DispatchError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice.clone()),
            Err(poisoned) => poisoned.into_inner().push(notice.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{RecordingOutcomeDispatcher, TracingOutcomeDispatcher};
    use crate::approvals::ports::{DispatchError, Outcome, OutcomeDispatcher, OutcomeNotice};
    use crate::domain::approval::{ActorId, CaseId};

    fn notice() -> OutcomeNotice {
        OutcomeNotice {
            reference_type: "audit_detail".to_string(),
            reference_id: "AD-1".to_string(),
            outcome: Outcome::Completed,
            case_id: CaseId("APR00000001".to_string()),
            case_number: "APR-2026-00001".to_string(),
            decided_by: Some(ActorId("U-A".to_string())),
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recording_dispatcher_keeps_notices_in_order() {
        let dispatcher = RecordingOutcomeDispatcher::default();
        let clone = dispatcher.clone();

        dispatcher.notify(&notice()).await.expect("first");
        let mut rejected = notice();
        rejected.outcome = Outcome::Rejected;
        clone.notify(&rejected).await.expect("second");

        let outcomes: Vec<Outcome> =
            dispatcher.notices().into_iter().map(|notice| notice.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::Completed, Outcome::Rejected]);
    }

    #[tokio::test]
    async fn failing_dispatcher_records_nothing() {
        let dispatcher = RecordingOutcomeDispatcher::failing(DispatchError::Unreachable {
            endpoint: "http://audit.internal".to_string(),
            message: "connection refused".to_string(),
        });

        assert!(dispatcher.notify(&notice()).await.is_err());
        assert!(dispatcher.notices().is_empty());
    }

    #[tokio::test]
    async fn tracing_dispatcher_always_succeeds() {
        assert!(TracingOutcomeDispatcher.notify(&notice()).await.is_ok());
    }
}
