use crate::error::Result;
use async_trait::async_trait;
use dh_command::MouseButton;
use std::path::PathBuf;

#[async_trait]
pub trait Pointer: Send + Sync {
    async fn click(&self, x: i64, y: i64, button: MouseButton, clicks: u32) -> Result<()>;
    async fn drag(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Result<()>;
    async fn move_to(&self, x: i64, y: i64) -> Result<()>;
    async fn position(&self) -> Result<(i64, i64)>;
    async fn screen_size(&self) -> Result<(i64, i64)>;
}

#[async_trait]
pub trait Keyboard: Send + Sync {
    /// Insert text through the clipboard-paste path; plain key synthesis
    /// loses non-ASCII characters on most backends.
    async fn paste_text(&self, text: &str) -> Result<()>;
    async fn press_key(&self, key: &str) -> Result<()>;
    async fn hotkey(&self, keys: &[String]) -> Result<()>;
}

#[async_trait]
pub trait Screen: Send + Sync {
    /// Capture the screen; returns the stored artifact's path.
    async fn capture(&self) -> Result<PathBuf>;
    /// Locate `needle` on the current screen image; `Ok(None)` when the
    /// text is simply not visible. Returns the match's center point.
    async fn find_text(&self, needle: &str) -> Result<Option<(i64, i64)>>;
}

#[async_trait]
pub trait Windows: Send + Sync {
    async fn open_app(&self, executable: &str) -> Result<()>;
    async fn close_app(&self, name: &str) -> Result<()>;
    async fn open_url(&self, url: &str) -> Result<()>;
    async fn run_program(&self, path: &str) -> Result<()>;
}
