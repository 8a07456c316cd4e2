//! Simulated control backend: records every capability invocation instead
//! of touching a desktop. Used by tests and `deskhand doctor`.

use crate::error::Result;
use crate::traits::{Keyboard, Pointer, Screen, Windows};
use async_trait::async_trait;
use dh_command::MouseButton;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Click {
        x: i64,
        y: i64,
        button: MouseButton,
        clicks: u32,
    },
    Drag {
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
    },
    MoveTo {
        x: i64,
        y: i64,
    },
    PasteText(String),
    PressKey(String),
    Hotkey(Vec<String>),
    Capture,
    FindText(String),
    OpenApp(String),
    CloseApp(String),
    OpenUrl(String),
    RunProgram(String),
}

pub struct SimControl {
    events: Mutex<Vec<SimEvent>>,
    position: Mutex<(i64, i64)>,
    screen_size: (i64, i64),
    screenshot_dir: PathBuf,
    next_shot: AtomicU64,
    text_locations: Mutex<HashMap<String, (i64, i64)>>,
}

impl SimControl {
    pub fn new() -> Self {
        Self::with_screenshot_dir(std::env::temp_dir())
    }

    pub fn with_screenshot_dir(screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            position: Mutex::new((0, 0)),
            screen_size: (1920, 1080),
            screenshot_dir: screenshot_dir.into(),
            next_shot: AtomicU64::new(1),
            text_locations: Mutex::new(HashMap::new()),
        }
    }

    /// Makes `needle` findable on the simulated screen at the given point.
    pub fn place_text(&self, needle: &str, x: i64, y: i64) {
        self.text_locations
            .lock()
            .expect("text locations lock")
            .insert(needle.to_lowercase(), (x, y));
    }

    /// Drains and returns everything recorded so far.
    pub fn take_events(&self) -> Vec<SimEvent> {
        std::mem::take(&mut *self.events.lock().expect("events lock"))
    }

    fn record(&self, event: SimEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl Default for SimControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pointer for SimControl {
    async fn click(&self, x: i64, y: i64, button: MouseButton, clicks: u32) -> Result<()> {
        *self.position.lock().expect("position lock") = (x, y);
        self.record(SimEvent::Click {
            x,
            y,
            button,
            clicks,
        });
        Ok(())
    }

    async fn drag(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Result<()> {
        *self.position.lock().expect("position lock") = (x2, y2);
        self.record(SimEvent::Drag { x1, y1, x2, y2 });
        Ok(())
    }

    async fn move_to(&self, x: i64, y: i64) -> Result<()> {
        *self.position.lock().expect("position lock") = (x, y);
        self.record(SimEvent::MoveTo { x, y });
        Ok(())
    }

    async fn position(&self) -> Result<(i64, i64)> {
        Ok(*self.position.lock().expect("position lock"))
    }

    async fn screen_size(&self) -> Result<(i64, i64)> {
        Ok(self.screen_size)
    }
}

#[async_trait]
impl Keyboard for SimControl {
    async fn paste_text(&self, text: &str) -> Result<()> {
        self.record(SimEvent::PasteText(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.record(SimEvent::PressKey(key.to_string()));
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<()> {
        self.record(SimEvent::Hotkey(keys.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl Screen for SimControl {
    async fn capture(&self) -> Result<PathBuf> {
        self.record(SimEvent::Capture);
        let n = self.next_shot.fetch_add(1, Ordering::Relaxed);
        let path = self.screenshot_dir.join(format!("sim_screenshot_{n}.png"));
        tokio::fs::write(&path, b"").await?;
        Ok(path)
    }

    async fn find_text(&self, needle: &str) -> Result<Option<(i64, i64)>> {
        self.record(SimEvent::FindText(needle.to_string()));
        Ok(self
            .text_locations
            .lock()
            .expect("text locations lock")
            .get(&needle.to_lowercase())
            .copied())
    }
}

#[async_trait]
impl Windows for SimControl {
    async fn open_app(&self, executable: &str) -> Result<()> {
        self.record(SimEvent::OpenApp(executable.to_string()));
        Ok(())
    }

    async fn close_app(&self, name: &str) -> Result<()> {
        self.record(SimEvent::CloseApp(name.to_string()));
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        self.record(SimEvent::OpenUrl(url.to_string()));
        Ok(())
    }

    async fn run_program(&self, path: &str) -> Result<()> {
        self.record(SimEvent::RunProgram(path.to_string()));
        Ok(())
    }
}
