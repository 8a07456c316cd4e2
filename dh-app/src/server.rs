//! Runtime wiring: config → store → auth/gate/ledger → gateway, plus the
//! serve / doctor / one-shot entrypoints used by the CLI.

use crate::approval::ApprovalGate;
use crate::auth::{AuthManager, SharedSecretVerifier};
use crate::config::{CONFIG_TEMPLATE, DeskhandConfig, default_config_path};
use crate::gateway::Gateway;
use crate::journal::TaskJournal;
use crate::ledger::ChangeLedger;
use crate::store::{DocumentStore, JsonFileStore};
use anyhow::Result;
use dh_channels::{ChannelAdapter, InboundMessage, LoopbackAdapter, OutboundMessage};
use dh_command::{ModelInterpreter, TaskResolver};
use dh_control::{CommandExecutor, Keyboard, Pointer, Screen, ShortcutRunner, SimControl, Windows};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const LOCAL_OPERATOR: &str = "local-operator";
const REPLY_TIMEOUT: Duration = Duration::from_secs(120);

/// The four capability seams bundled for wiring. Real desktop backends are
/// external; the simulated backend stands in everywhere else.
pub struct ControlBackend {
    pub pointer: Arc<dyn Pointer>,
    pub keyboard: Arc<dyn Keyboard>,
    pub screen: Arc<dyn Screen>,
    pub windows: Arc<dyn Windows>,
}

impl ControlBackend {
    pub fn simulated(screenshot_dir: &Path) -> Self {
        let sim = Arc::new(SimControl::with_screenshot_dir(screenshot_dir));
        Self {
            pointer: sim.clone(),
            keyboard: sim.clone(),
            screen: sim.clone(),
            windows: sim,
        }
    }
}

pub async fn build_gateway(
    cfg: DeskhandConfig,
    backend: ControlBackend,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    store: Arc<dyn DocumentStore>,
) -> Result<(Arc<Gateway>, mpsc::Sender<InboundMessage>)> {
    let model = match cfg.model.api_key.as_deref() {
        Some(api_key) => {
            match ModelInterpreter::new(api_key, &cfg.model.model, cfg.model.base_url.as_deref()) {
                Ok(model) => Some(model),
                Err(e) => {
                    tracing::warn!(%e, "model interpreter unavailable; using rules only");
                    None
                }
            }
        }
        None => {
            tracing::info!("no model api key configured; using the rule interpreter alone");
            None
        }
    };
    let resolver = Arc::new(TaskResolver::new(model));

    let auth = Arc::new(
        AuthManager::load(
            Arc::new(SharedSecretVerifier::new(&cfg.security.shared_secret)),
            store.clone(),
        )
        .await,
    );
    let gate = Arc::new(ApprovalGate::new(cfg.general.admin_sender.clone()));
    let ledger = Arc::new(ChangeLedger::new(store.clone()));
    let journal = Arc::new(TaskJournal::new(store));
    let executor = Arc::new(CommandExecutor::new(
        backend.pointer.clone(),
        backend.keyboard.clone(),
        backend.screen.clone(),
        backend.windows,
    ));
    let shortcuts = Arc::new(ShortcutRunner::new(backend.keyboard, backend.pointer));

    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
    for adapter in adapters {
        adapter.start(inbound_tx.clone()).await?;
        channels.insert(adapter.channel_id().to_string(), adapter);
    }

    let gateway = Arc::new(Gateway::new(
        cfg,
        auth,
        gate,
        ledger,
        journal,
        resolver,
        executor,
        shortcuts,
        backend.screen,
        channels,
        inbound_rx,
    ));
    Ok((gateway, inbound_tx))
}

#[tracing::instrument(level = "info", skip_all)]
pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = DeskhandConfig::load(config_path).await?;
    tokio::fs::create_dir_all(&cfg.storage.screenshot_dir).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(&cfg.storage.data_dir));

    // Real pointer/keyboard/screen/window backends plug in through the
    // dh-control traits; without one linked in, serve runs simulated.
    tracing::warn!("no desktop control backend is linked; running with the simulated backend");
    let backend = ControlBackend::simulated(&cfg.storage.screenshot_dir);

    tracing::info!("no channel adapters configured; transports integrate via dh-channels");
    let (gateway, _inbound_tx) = build_gateway(cfg, backend, vec![], store).await?;
    gateway.start();

    tracing::info!("deskhand running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

/// One-shot: feed a task through the real operator surface (register →
/// submit → approve) over the loopback channel and print each reply.
pub async fn run_task(config_path: Option<PathBuf>, text: &str) -> Result<()> {
    let mut cfg = DeskhandConfig::load(config_path).await?;
    // The local invocation is the approving admin for its own task.
    cfg.general.admin_sender = Some(LOCAL_OPERATOR.to_string());
    let shared_secret = cfg.security.shared_secret.clone();
    tokio::fs::create_dir_all(&cfg.storage.screenshot_dir).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(&cfg.storage.data_dir));

    let backend = ControlBackend::simulated(&cfg.storage.screenshot_dir);
    let (loopback, mut outbound_rx) = LoopbackAdapter::new(LOCAL_OPERATOR);
    let adapters: Vec<Arc<dyn ChannelAdapter>> = vec![loopback.clone()];
    let (gateway, _inbound_tx) = build_gateway(cfg, backend, adapters, store).await?;
    gateway.start();

    let reply = ask(&loopback, &mut outbound_rx, &format!("/register {shared_secret}")).await?;
    if reply.content.contains("already registered") {
        ask(&loopback, &mut outbound_rx, &format!("/login {shared_secret}")).await?;
    }

    let reply = ask(&loopback, &mut outbound_rx, &format!("/task {text}")).await?;
    println!("{}", reply.content);
    let reply = ask(&loopback, &mut outbound_rx, "/approve").await?;
    println!("{}", reply.content);
    Ok(())
}

async fn ask(
    loopback: &LoopbackAdapter,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    message: &str,
) -> Result<OutboundMessage> {
    loopback.inject(message).await?;
    tokio::time::timeout(REPLY_TIMEOUT, outbound_rx.recv())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for a reply to {message:?}"))?
        .ok_or_else(|| anyhow::anyhow!("reply channel closed"))
}

/// Config and store health checks against the simulated backend.
pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = match DeskhandConfig::load(config_path).await {
        Ok(cfg) => {
            println!("config: ok");
            cfg
        }
        Err(e) => {
            println!("config: failed: {e}");
            return Ok(());
        }
    };

    let store = JsonFileStore::new(&cfg.storage.data_dir);
    let probe = serde_json::json!({ "ok": true });
    match store.write("doctor", &probe).await {
        Ok(()) => match store.read("doctor").await {
            Ok(Some(value)) if value == probe => println!("store: ok ({})", cfg.storage.data_dir.display()),
            Ok(_) => println!("store: failed: probe document did not round trip"),
            Err(e) => println!("store: failed: {e}"),
        },
        Err(e) => println!("store: failed: {e}"),
    }

    let sim = Arc::new(SimControl::new());
    let executor = CommandExecutor::new(sim.clone(), sim.clone(), sim.clone(), sim.clone());
    let command = dh_command::rules::interpret("напиши doctor");
    let outcome = executor.execute(&command).await;
    println!("executor: {outcome}");

    match cfg.model.api_key {
        Some(_) => println!("interpreter: {} with rule fallback", cfg.model.model),
        None => println!("interpreter: rules only"),
    }
    Ok(())
}

/// Initialize the config directory with a template (idempotent).
pub async fn init(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.unwrap_or_else(default_config_path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(&path).await? {
        println!("deskhand init: kept existing {}", path.display());
    } else {
        tokio::fs::write(&path, CONFIG_TEMPLATE).await?;
        println!("deskhand init: created {}", path.display());
    }
    println!("next: set security.shared_secret in {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(admin: Option<&str>) -> DeskhandConfig {
        let mut cfg = DeskhandConfig::from_toml_str(
            r#"
[security]
shared_secret = "sesame"
"#,
        )
        .unwrap();
        cfg.general.admin_sender = admin.map(str::to_string);
        cfg
    }

    #[tokio::test]
    async fn loopback_drives_the_full_pipeline() {
        let store: Arc<dyn DocumentStore> = Arc::new(crate::store::MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let backend = ControlBackend::simulated(dir.path());
        let (loopback, mut outbound_rx) = LoopbackAdapter::new("op");
        let adapters: Vec<Arc<dyn ChannelAdapter>> = vec![loopback.clone()];
        let (gateway, _tx) = build_gateway(test_config(None), backend, adapters, store)
            .await
            .unwrap();
        gateway.start();

        let reply = ask(&loopback, &mut outbound_rx, "/register sesame").await.unwrap();
        assert!(reply.content.contains("registered"));

        let reply = ask(&loopback, &mut outbound_rx, "/task напиши hello").await.unwrap();
        assert!(reply.content.contains("ready to execute"));

        let reply = ask(&loopback, &mut outbound_rx, "/approve").await.unwrap();
        assert!(reply.content.contains("typed 'hello' and pressed enter"));
    }
}
