//! Single-slot approval gate: at most one task waits for human
//! confirmation at any time, process-wide. Submitting while a task is
//! pending replaces it; the replaced command is never executed. This is an
//! explicit policy, not an accident of shared state.

use chrono::{DateTime, Utc};
use dh_channels::SenderId;
use dh_command::Command;
use dh_control::CommandExecutor;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PendingTask {
    pub id: Uuid,
    pub command: Command,
    pub preview: String,
    pub requester: SenderId,
    pub created_at: DateTime<Utc>,
}

impl PendingTask {
    pub fn new(command: Command, preview: String, requester: SenderId) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            preview,
            requester,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    /// No task was waiting; approve/reject when idle is a no-op.
    NothingPending,
    /// The actor is not the configured admin; no side effects.
    NotAuthorized,
    /// Approved and executed; carries the executor's outcome string.
    Executed(String),
    /// Rejected without execution.
    Cancelled,
}

pub struct ApprovalGate {
    admin_sender: Option<String>,
    slot: Mutex<Option<PendingTask>>,
}

impl ApprovalGate {
    /// When `admin_sender` is unset, any authenticated sender may decide;
    /// the check only applies once an admin identity is configured.
    pub fn new(admin_sender: Option<String>) -> Self {
        Self {
            admin_sender,
            slot: Mutex::new(None),
        }
    }

    /// Holds `task` for confirmation. Returns true when a previously
    /// pending task was overwritten.
    pub async fn submit(&self, task: PendingTask) -> bool {
        let mut slot = self.slot.lock().await;
        let replaced = slot.is_some();
        if let Some(prior) = slot.as_ref() {
            tracing::warn!(
                prior_id = %prior.id,
                new_id = %task.id,
                "pending task overwritten before a decision was made"
            );
        }
        *slot = Some(task);
        replaced
    }

    pub async fn approve(&self, actor: &str, executor: &CommandExecutor) -> Decision {
        if !self.is_authorized(actor) {
            return Decision::NotAuthorized;
        }
        // Free the slot before executing: the gate is Idle again the moment
        // the decision lands, and execution must not hold the lock across
        // capability calls.
        let task = self.slot.lock().await.take();
        let Some(task) = task else {
            return Decision::NothingPending;
        };
        tracing::info!(task_id = %task.id, requester = %task.requester, "task approved");
        let result = executor.execute(&task.command).await;
        Decision::Executed(result)
    }

    pub async fn reject(&self, actor: &str) -> Decision {
        if !self.is_authorized(actor) {
            return Decision::NotAuthorized;
        }
        let task = self.slot.lock().await.take();
        let Some(task) = task else {
            return Decision::NothingPending;
        };
        tracing::info!(task_id = %task.id, requester = %task.requester, "task rejected");
        Decision::Cancelled
    }

    pub async fn pending_preview(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|task| task.preview.clone())
    }

    fn is_authorized(&self, actor: &str) -> bool {
        match self.admin_sender.as_deref() {
            Some(admin) => actor == admin,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_control::{SimControl, SimEvent};
    use std::sync::Arc;

    fn executor_with_sim() -> (CommandExecutor, Arc<SimControl>) {
        let sim = Arc::new(SimControl::new());
        let executor = CommandExecutor::new(sim.clone(), sim.clone(), sim.clone(), sim.clone());
        (executor, sim)
    }

    fn task(text: &str) -> PendingTask {
        let command = dh_command::rules::interpret(text);
        PendingTask::new(command, text.to_string(), "operator".into())
    }

    #[tokio::test]
    async fn approve_executes_exactly_once_and_returns_to_idle() {
        let gate = ApprovalGate::new(None);
        let (executor, sim) = executor_with_sim();

        assert!(!gate.submit(task("напиши hello")).await);
        let decision = gate.approve("operator", &executor).await;
        assert_eq!(
            decision,
            Decision::Executed("typed 'hello' and pressed enter".to_string())
        );
        assert_eq!(
            sim.take_events(),
            vec![
                SimEvent::PasteText("hello".to_string()),
                SimEvent::PressKey("enter".to_string()),
            ]
        );

        // Gate is idle again: a second approve is a no-op.
        assert_eq!(
            gate.approve("operator", &executor).await,
            Decision::NothingPending
        );
    }

    #[tokio::test]
    async fn reject_never_executes() {
        let gate = ApprovalGate::new(None);
        let (executor, sim) = executor_with_sim();

        gate.submit(task("напиши hello")).await;
        assert_eq!(gate.reject("operator").await, Decision::Cancelled);
        assert!(sim.take_events().is_empty());
        assert_eq!(
            gate.approve("operator", &executor).await,
            Decision::NothingPending
        );
    }

    #[tokio::test]
    async fn resubmission_replaces_and_the_prior_command_never_runs() {
        let gate = ApprovalGate::new(None);
        let (executor, sim) = executor_with_sim();

        assert!(!gate.submit(task("напиши first")).await);
        assert!(gate.submit(task("напиши second")).await);

        let Decision::Executed(result) = gate.approve("operator", &executor).await else {
            panic!("expected execution");
        };
        assert_eq!(result, "typed 'second' and pressed enter");
        let events = sim.take_events();
        assert_eq!(events, vec![
            SimEvent::PasteText("second".to_string()),
            SimEvent::PressKey("enter".to_string()),
        ]);
    }

    #[tokio::test]
    async fn only_the_configured_admin_may_decide() {
        let gate = ApprovalGate::new(Some("admin".to_string()));
        let (executor, sim) = executor_with_sim();

        gate.submit(task("напиши hello")).await;
        assert_eq!(
            gate.approve("intruder", &executor).await,
            Decision::NotAuthorized
        );
        assert!(sim.take_events().is_empty());
        assert!(gate.pending_preview().await.is_some());

        assert!(matches!(
            gate.approve("admin", &executor).await,
            Decision::Executed(_)
        ));
    }
}
