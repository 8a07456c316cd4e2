//! Inbound multiplexer: every channel adapter feeds one queue, and one
//! loop drains it through the interpret → approve → execute pipeline.

use crate::approval::{ApprovalGate, Decision, PendingTask};
use crate::auth::AuthManager;
use crate::commands::{self, HELP_TEXT, OperatorCommand};
use crate::config::DeskhandConfig;
use crate::journal::TaskJournal;
use crate::ledger::ChangeLedger;
use anyhow::Result;
use dh_channels::{Attachment, ChannelAdapter, InboundMessage, OutboundMessage};
use dh_command::TaskResolver;
use dh_control::{CommandExecutor, Screen, ShortcutRunner};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};

const NOT_AUTHENTICATED: &str =
    "you are not authenticated; use /register <secret> or /login <secret>";

pub struct Gateway {
    cfg: DeskhandConfig,
    started_at: Instant,
    auth: Arc<AuthManager>,
    gate: Arc<ApprovalGate>,
    ledger: Arc<ChangeLedger>,
    journal: Arc<TaskJournal>,
    resolver: Arc<TaskResolver>,
    executor: Arc<CommandExecutor>,
    shortcuts: Arc<ShortcutRunner>,
    screen: Arc<dyn Screen>,
    channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    inbound_rx: Arc<Mutex<mpsc::Receiver<InboundMessage>>>,
    /// Senders that issued a bare `/task`; their next plain message is the
    /// task body.
    awaiting_task: Mutex<HashSet<String>>,
}

impl Gateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: DeskhandConfig,
        auth: Arc<AuthManager>,
        gate: Arc<ApprovalGate>,
        ledger: Arc<ChangeLedger>,
        journal: Arc<TaskJournal>,
        resolver: Arc<TaskResolver>,
        executor: Arc<CommandExecutor>,
        shortcuts: Arc<ShortcutRunner>,
        screen: Arc<dyn Screen>,
        channels: HashMap<String, Arc<dyn ChannelAdapter>>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
    ) -> Self {
        Self {
            cfg,
            started_at: Instant::now(),
            auth,
            gate,
            ledger,
            journal,
            resolver,
            executor,
            shortcuts,
            screen,
            channels,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            awaiting_task: Mutex::new(HashSet::new()),
        }
    }

    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            if let Err(e) = self.run_loop().await {
                tracing::error!(%e, "gateway loop exited");
            }
        });
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_loop(&self) -> Result<()> {
        loop {
            let msg = {
                let mut rx = self.inbound_rx.lock().await;
                rx.recv().await
            };
            let Some(inbound) = msg else {
                return Ok(());
            };

            if let Err(e) = self.handle_inbound(inbound).await {
                tracing::warn!(%e, "handle_inbound failed");
            }
        }
    }

    async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        let channel = self
            .channels
            .get(inbound.channel_id.as_str())
            .ok_or_else(|| anyhow::anyhow!("unknown channel: {}", inbound.channel_id))?
            .clone();

        let mut reply = self
            .handle_message(inbound.sender_id.as_str(), &inbound.content)
            .await;
        reply.reply_to_message_id = Some(inbound.message_id.clone());
        channel.send(inbound.sender_id.as_str(), reply).await?;
        Ok(())
    }

    /// One operator message in, one reply out. Never fails: every outcome,
    /// including a bad command, is a descriptive reply.
    #[tracing::instrument(level = "info", skip_all, fields(sender_id = %sender_id))]
    pub async fn handle_message(&self, sender_id: &str, content: &str) -> OutboundMessage {
        let Some(command) = commands::parse(content) else {
            return self.handle_plain_text(sender_id, content).await;
        };

        // Registration and login must work before authentication; the help
        // surface is harmless. Everything else is gated.
        let exempt = matches!(
            command,
            OperatorCommand::Start
                | OperatorCommand::Help
                | OperatorCommand::Register { .. }
                | OperatorCommand::Login { .. }
        );
        if !exempt && !self.auth.is_authenticated(sender_id) {
            return OutboundMessage::text(NOT_AUTHENTICATED);
        }

        match command {
            OperatorCommand::Start => self.handle_start(sender_id),
            OperatorCommand::Help => OutboundMessage::text(HELP_TEXT),
            OperatorCommand::Register { secret } => match secret {
                None => OutboundMessage::text("usage: /register <secret>"),
                Some(secret) => {
                    let username = format!("user_{sender_id}");
                    let (_, message) = self.auth.register(sender_id, &username, &secret).await;
                    OutboundMessage::text(message)
                }
            },
            OperatorCommand::Login { secret } => match secret {
                None => OutboundMessage::text("usage: /login <secret>"),
                Some(secret) => {
                    let (_, message) = self.auth.login(sender_id, &secret).await;
                    OutboundMessage::text(message)
                }
            },
            OperatorCommand::Logout => {
                let (_, message) = self.auth.logout(sender_id);
                OutboundMessage::text(message)
            }
            OperatorCommand::Task { text } => match text {
                Some(text) => self.submit_task(sender_id, &text).await,
                None => {
                    self.awaiting_task
                        .lock()
                        .await
                        .insert(sender_id.to_string());
                    OutboundMessage::text("enter the task:")
                }
            },
            OperatorCommand::Approve => {
                match self.gate.approve(sender_id, &self.executor).await {
                    Decision::Executed(result) => {
                        OutboundMessage::text(format!("task executed\n\n{result}"))
                    }
                    Decision::NothingPending => {
                        OutboundMessage::text("no task is waiting for approval")
                    }
                    Decision::NotAuthorized => OutboundMessage::text(
                        "only the configured admin can approve or cancel tasks",
                    ),
                    Decision::Cancelled => OutboundMessage::text("task cancelled"),
                }
            }
            OperatorCommand::Cancel => match self.gate.reject(sender_id).await {
                Decision::Cancelled => OutboundMessage::text("task cancelled"),
                Decision::NothingPending => {
                    OutboundMessage::text("no task is waiting for approval")
                }
                Decision::NotAuthorized => OutboundMessage::text(
                    "only the configured admin can approve or cancel tasks",
                ),
                // reject() never executes; kept for match completeness.
                Decision::Executed(result) => OutboundMessage::text(result),
            },
            OperatorCommand::Screenshot => match self.screen.capture().await {
                Ok(path) => OutboundMessage {
                    content: "current screen state".to_string(),
                    reply_to_message_id: None,
                    attachments: vec![Attachment {
                        name: "screenshot.png".to_string(),
                        path: path.display().to_string(),
                    }],
                },
                Err(e) => OutboundMessage::text(format!("screenshot failed: {e}")),
            },
            OperatorCommand::Shortcut { name } => match name {
                None => OutboundMessage::text(self.shortcuts.list()),
                Some(name) => OutboundMessage::text(self.shortcuts.run(&name).await),
            },
            OperatorCommand::Changes => {
                let records = self.ledger.list().await;
                if records.is_empty() {
                    return OutboundMessage::text("no changes");
                }
                let mut lines = vec![format!("{} change(s):", records.len())];
                for record in &records {
                    let data = serde_json::to_string(&record.data)
                        .unwrap_or_else(|_| "{}".to_string());
                    lines.push(format!("{} [{}] {}", record.id, record.status.as_str(), data));
                }
                OutboundMessage::text(lines.join("\n"))
            }
            OperatorCommand::Accept { id } => match id {
                None => OutboundMessage::text("usage: /accept <change_id>"),
                Some(id) => OutboundMessage::text(self.ledger.accept(&id).await.1),
            },
            OperatorCommand::Reject { id } => match id {
                None => OutboundMessage::text("usage: /reject <change_id>"),
                Some(id) => OutboundMessage::text(self.ledger.reject(&id).await.1),
            },
            OperatorCommand::Propose { data } => match data {
                None => OutboundMessage::text("usage: /propose <json>"),
                Some(data) => match serde_json::from_str::<serde_json::Value>(&data) {
                    Err(_) => OutboundMessage::text("warning: proposal must be valid json"),
                    Ok(value) => match self.ledger.create(value).await {
                        Ok(id) => {
                            OutboundMessage::text(format!("recorded {id} (pending review)"))
                        }
                        Err(e) => {
                            tracing::error!(%e, "change proposal could not be stored");
                            OutboundMessage::text("change store unavailable")
                        }
                    },
                },
            },
            OperatorCommand::Status => self.handle_status().await,
            OperatorCommand::Unknown { command } => {
                OutboundMessage::text(format!("unknown command {command}; use /help"))
            }
        }
    }

    async fn handle_plain_text(&self, sender_id: &str, content: &str) -> OutboundMessage {
        if !self.auth.is_authenticated(sender_id) {
            return OutboundMessage::text(NOT_AUTHENTICATED);
        }
        if self.awaiting_task.lock().await.remove(sender_id) {
            return self.submit_task(sender_id, content.trim()).await;
        }
        OutboundMessage::text("I don't understand that; use /help for the command list")
    }

    async fn submit_task(&self, sender_id: &str, text: &str) -> OutboundMessage {
        let interpretation = self.resolver.resolve(text).await;
        if let dh_command::InterpretationSource::RuleFallback { reason } = &interpretation.source {
            tracing::debug!(%reason, "task interpreted by rules");
        }

        if let Err(e) = self.journal.record(sender_id, text).await {
            tracing::warn!(%e, "task journal write failed");
        }

        let preview = self.executor.prepare(&interpretation.command);
        let replaced = self
            .gate
            .submit(PendingTask::new(
                interpretation.command,
                preview.clone(),
                sender_id.into(),
            ))
            .await;

        let mut reply =
            format!("ready to execute:\n\n{preview}\n\napprove with /approve or discard with /cancel");
        if replaced {
            reply.push_str("\n\nnote: this replaced a previously pending task");
        }
        OutboundMessage::text(reply)
    }

    fn handle_start(&self, sender_id: &str) -> OutboundMessage {
        if !self.auth.is_authenticated(sender_id) {
            return OutboundMessage::text(format!(
                "welcome to deskhand\n\n{NOT_AUTHENTICATED}"
            ));
        }
        let username = self
            .auth
            .username(sender_id)
            .unwrap_or_else(|| "operator".to_string());
        OutboundMessage::text(format!(
            "hello, {username}! send /task <text> to control the desktop, /help for all commands"
        ))
    }

    async fn handle_status(&self) -> OutboundMessage {
        let interpreter = if self.resolver.has_model() {
            format!("{} with rule fallback", self.cfg.model.model)
        } else {
            "rules only".to_string()
        };
        let pending = if self.gate.pending_preview().await.is_some() {
            "yes"
        } else {
            "no"
        };
        OutboundMessage::text(format!(
            "bot: online\ninterpreter: {interpreter}\npending approval: {pending}\nuptime: {} s",
            self.started_at.elapsed().as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use dh_control::{SimControl, SimEvent};

    async fn gateway_with_sim(admin: Option<&str>) -> (Gateway, Arc<SimControl>) {
        let cfg = DeskhandConfig::from_toml_str(
            r#"
[security]
shared_secret = "sesame"
"#,
        )
        .unwrap();
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let sim = Arc::new(SimControl::new());
        let auth = Arc::new(
            AuthManager::load(
                Arc::new(crate::auth::SharedSecretVerifier::new("sesame")),
                store.clone(),
            )
            .await,
        );
        let executor = Arc::new(CommandExecutor::new(
            sim.clone(),
            sim.clone(),
            sim.clone(),
            sim.clone(),
        ));
        let (_tx, rx) = mpsc::channel(4);
        let gateway = Gateway::new(
            cfg,
            auth,
            Arc::new(ApprovalGate::new(admin.map(str::to_string))),
            Arc::new(ChangeLedger::new(store.clone())),
            Arc::new(TaskJournal::new(store.clone())),
            Arc::new(TaskResolver::rules_only()),
            executor,
            Arc::new(ShortcutRunner::new(sim.clone(), sim.clone())),
            sim.clone(),
            HashMap::new(),
            rx,
        );
        (gateway, sim)
    }

    #[tokio::test]
    async fn task_flows_through_interpretation_approval_and_execution() {
        let (gateway, sim) = gateway_with_sim(None).await;
        gateway.handle_message("7", "/register sesame").await;

        let reply = gateway.handle_message("7", "/task напиши hello").await;
        assert!(reply.content.contains("hello"));
        assert!(reply.content.contains("/approve"));
        assert!(sim.take_events().is_empty(), "nothing runs before approval");

        let reply = gateway.handle_message("7", "/approve").await;
        assert!(reply.content.contains("typed 'hello' and pressed enter"));
        assert_eq!(
            sim.take_events(),
            vec![
                SimEvent::PasteText("hello".to_string()),
                SimEvent::PressKey("enter".to_string()),
            ]
        );

        let reply = gateway.handle_message("7", "/approve").await;
        assert_eq!(reply.content, "no task is waiting for approval");
    }

    #[tokio::test]
    async fn commands_require_authentication() {
        let (gateway, _sim) = gateway_with_sim(None).await;

        let reply = gateway.handle_message("7", "/task напиши hi").await;
        assert_eq!(reply.content, NOT_AUTHENTICATED);

        let reply = gateway.handle_message("7", "/register wrong").await;
        assert_eq!(reply.content, "wrong secret");

        gateway.handle_message("7", "/register sesame").await;
        let reply = gateway.handle_message("7", "/status").await;
        assert!(reply.content.contains("bot: online"));
        assert!(reply.content.contains("rules only"));
    }

    #[tokio::test]
    async fn bare_task_arms_a_prompt_for_the_next_message() {
        let (gateway, sim) = gateway_with_sim(None).await;
        gateway.handle_message("7", "/register sesame").await;

        let reply = gateway.handle_message("7", "/task").await;
        assert_eq!(reply.content, "enter the task:");

        let reply = gateway.handle_message("7", "напиши hi").await;
        assert!(reply.content.contains("ready to execute"));

        // The prompt is one-shot.
        let reply = gateway.handle_message("7", "напиши again").await;
        assert!(reply.content.contains("/help"));
        assert!(sim.take_events().is_empty());
    }

    #[tokio::test]
    async fn resubmission_warns_and_the_first_task_never_runs() {
        let (gateway, sim) = gateway_with_sim(None).await;
        gateway.handle_message("7", "/register sesame").await;

        gateway.handle_message("7", "/task напиши first").await;
        let reply = gateway.handle_message("7", "/task напиши second").await;
        assert!(reply.content.contains("replaced a previously pending task"));

        let reply = gateway.handle_message("7", "/approve").await;
        assert!(reply.content.contains("second"));
        let events = sim.take_events();
        assert!(!events.contains(&SimEvent::PasteText("first".to_string())));
    }

    #[tokio::test]
    async fn admin_gating_applies_to_decisions_only() {
        let (gateway, sim) = gateway_with_sim(Some("admin")).await;
        gateway.handle_message("7", "/register sesame").await;
        gateway.handle_message("admin", "/register sesame").await;

        gateway.handle_message("7", "/task напиши hello").await;
        let reply = gateway.handle_message("7", "/approve").await;
        assert_eq!(
            reply.content,
            "only the configured admin can approve or cancel tasks"
        );
        assert!(sim.take_events().is_empty());

        let reply = gateway.handle_message("admin", "/approve").await;
        assert!(reply.content.contains("typed 'hello'"));
    }

    #[tokio::test]
    async fn change_review_flow_over_the_operator_surface() {
        let (gateway, _sim) = gateway_with_sim(None).await;
        gateway.handle_message("7", "/register sesame").await;

        let reply = gateway
            .handle_message("7", r#"/propose {"file": "main.rs", "change": "rename"}"#)
            .await;
        assert_eq!(reply.content, "recorded change_001 (pending review)");

        let reply = gateway.handle_message("7", "/changes").await;
        assert!(reply.content.contains("change_001 [pending]"));
        assert!(reply.content.contains("main.rs"));

        let reply = gateway.handle_message("7", "/accept change_001").await;
        assert_eq!(reply.content, "change change_001 accepted");

        let reply = gateway.handle_message("7", "/reject change_999").await;
        assert_eq!(reply.content, "change change_999 not found");

        let reply = gateway.handle_message("7", "/propose not-json").await;
        assert_eq!(reply.content, "warning: proposal must be valid json");
    }

    #[tokio::test]
    async fn screenshot_returns_an_attachment() {
        let (gateway, _sim) = gateway_with_sim(None).await;
        gateway.handle_message("7", "/register sesame").await;

        let reply = gateway.handle_message("7", "/screenshot").await;
        assert_eq!(reply.attachments.len(), 1);
        assert!(reply.attachments[0].path.contains("sim_screenshot"));
    }

    #[tokio::test]
    async fn shortcuts_run_without_the_approval_gate() {
        let (gateway, sim) = gateway_with_sim(None).await;
        gateway.handle_message("7", "/register sesame").await;

        let reply = gateway.handle_message("7", "/shortcut copy").await;
        assert_eq!(reply.content, "pressed ctrl+c");
        assert_eq!(
            sim.take_events(),
            vec![SimEvent::Hotkey(vec!["ctrl".to_string(), "c".to_string()])]
        );

        let reply = gateway.handle_message("7", "/shortcut").await;
        assert!(reply.content.contains("available shortcuts"));
    }
}
