//! Maps commands onto the capability traits.
//!
//! Every arm validates its own parameters and formats its own outcome; a
//! bad command or a failing backend produces a warning/failure string, not
//! an error, so the surrounding session loop survives any single command.

use crate::traits::{Keyboard, Pointer, Screen, Windows};
use dh_command::{ActionKind, ActionParams, Command, MouseButton};
use std::sync::Arc;
use std::time::Duration;

/// Pause between pasting text and confirming with Enter, so the focused
/// UI has time to register the inserted text.
const TYPE_ENTER_DELAY: Duration = Duration::from_millis(200);
/// Post-launch pause for the application to initialize.
const APP_LAUNCH_DELAY: Duration = Duration::from_secs(2);

const APP_EXECUTABLES: &[(&str, &str)] = &[
    ("notepad", "notepad.exe"),
    ("calc", "calc.exe"),
    ("explorer", "explorer.exe"),
    ("chrome", "chrome.exe"),
    ("firefox", "firefox.exe"),
    ("word", "winword.exe"),
    ("excel", "excel.exe"),
];

/// Resolves a spoken application name to its executable, falling back to
/// the name itself.
pub fn resolve_app_executable(name: &str) -> &str {
    let lower = name.to_lowercase();
    APP_EXECUTABLES
        .iter()
        .find(|(known, _)| *known == lower)
        .map(|(_, executable)| *executable)
        .unwrap_or(name)
}

pub struct CommandExecutor {
    pointer: Arc<dyn Pointer>,
    keyboard: Arc<dyn Keyboard>,
    screen: Arc<dyn Screen>,
    windows: Arc<dyn Windows>,
}

impl CommandExecutor {
    pub fn new(
        pointer: Arc<dyn Pointer>,
        keyboard: Arc<dyn Keyboard>,
        screen: Arc<dyn Screen>,
        windows: Arc<dyn Windows>,
    ) -> Self {
        Self {
            pointer,
            keyboard,
            screen,
            windows,
        }
    }

    /// Side-effect-free preview of what `execute` would do, shown to the
    /// operator before approval.
    pub fn prepare(&self, command: &Command) -> String {
        let summary = match (&command.action, &command.params) {
            (ActionKind::Sequence, ActionParams::Sequence(tasks)) => {
                let mut lines = vec![format!("sequence of {} steps:", tasks.len())];
                for (i, sub) in tasks.iter().enumerate() {
                    lines.push(format!("  {}. {}", i + 1, preview_single(sub)));
                }
                lines.join("\n")
            }
            _ => preview_single(command),
        };
        if command.description.is_empty() {
            summary
        } else {
            format!("{summary}\ntask: {}", command.description)
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(action = %command.action))]
    pub async fn execute(&self, command: &Command) -> String {
        if let ActionParams::Sequence(tasks) = &command.params {
            if tasks.is_empty() {
                return "warning: sequence has no steps".to_string();
            }
            let mut lines = Vec::with_capacity(tasks.len());
            for (i, sub) in tasks.iter().enumerate() {
                let outcome = if matches!(sub.params, ActionParams::Sequence(_)) {
                    "warning: nested sequences are not supported".to_string()
                } else {
                    self.execute_single(sub).await
                };
                tracing::info!(step = i + 1, action = %sub.action, %outcome, "sequence step finished");
                lines.push(format!("step {}: {}", i + 1, outcome));
            }
            return lines.join("\n");
        }
        self.execute_single(command).await
    }

    async fn execute_single(&self, command: &Command) -> String {
        match command.action {
            ActionKind::Click => self.run_click(command).await,
            ActionKind::Type => self.run_type(command).await,
            ActionKind::Screenshot => match self.screen.capture().await {
                Ok(path) => format!("screenshot saved to {}", path.display()),
                Err(e) => format!("screenshot failed: {e}"),
            },
            ActionKind::OpenApp => self.run_open_app(command).await,
            ActionKind::CloseApp => {
                let Some(name) = non_empty_target(command) else {
                    return "warning: close_app needs an application name".to_string();
                };
                match self.windows.close_app(name).await {
                    Ok(()) => format!("closed '{name}'"),
                    Err(e) => format!("close failed: {e}"),
                }
            }
            ActionKind::Hotkey => {
                let keys = match &command.params {
                    ActionParams::Hotkey { keys } => keys.clone(),
                    _ => vec![],
                };
                if keys.is_empty() {
                    return "warning: no keys to press".to_string();
                }
                match self.keyboard.hotkey(&keys).await {
                    Ok(()) => format!("pressed {}", keys.join("+")),
                    Err(e) => format!("hotkey failed: {e}"),
                }
            }
            ActionKind::Wait => {
                let seconds = match command.params {
                    ActionParams::Wait { seconds } => seconds,
                    _ => 1,
                };
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                format!("waited {seconds} s")
            }
            ActionKind::Drag => {
                let ActionParams::Drag {
                    x1: Some(x1),
                    y1: Some(y1),
                    x2: Some(x2),
                    y2: Some(y2),
                } = command.params
                else {
                    return "warning: drag needs start and end coordinates".to_string();
                };
                match self.pointer.drag(x1, y1, x2, y2).await {
                    Ok(()) => format!("dragged from ({x1}, {y1}) to ({x2}, {y2})"),
                    Err(e) => format!("drag failed: {e}"),
                }
            }
            ActionKind::AltEnter => self.run_combo(&["alt", "enter"]).await,
            ActionKind::EnterAlt => self.run_combo(&["enter", "alt"]).await,
            ActionKind::MoveMouse => {
                let (x, y) = match command.params {
                    ActionParams::MoveMouse { x, y } => (x, y),
                    _ => (0, 0),
                };
                match self.pointer.move_to(x, y).await {
                    Ok(()) => format!("moved mouse to ({x}, {y})"),
                    Err(e) => format!("mouse move failed: {e}"),
                }
            }
            ActionKind::OpenUrl => {
                let url = match &command.params {
                    ActionParams::OpenUrl { url } if !url.is_empty() => url,
                    _ => return "warning: open_url needs a url".to_string(),
                };
                match self.windows.open_url(url).await {
                    Ok(()) => format!("opened url {url}"),
                    Err(e) => format!("open url failed: {e}"),
                }
            }
            ActionKind::SwitchTab => {
                let number = match command.params {
                    ActionParams::SwitchTab { number } => number,
                    _ => 1,
                };
                let keys = vec!["ctrl".to_string(), number.to_string()];
                match self.keyboard.hotkey(&keys).await {
                    Ok(()) => format!("switched to tab {number}"),
                    Err(e) => format!("switch tab failed: {e}"),
                }
            }
            ActionKind::RunProgram => {
                let path = match &command.params {
                    ActionParams::RunProgram { path } if !path.is_empty() => path,
                    _ => return "warning: run_program needs a path".to_string(),
                };
                match self.windows.run_program(path).await {
                    Ok(()) => format!("started {path}"),
                    Err(e) => format!("run failed: {e}"),
                }
            }
            ActionKind::Sequence => "warning: nested sequences are not supported".to_string(),
            ActionKind::Unknown => format!("warning: unknown action '{}'", command.description),
        }
    }

    async fn run_click(&self, command: &Command) -> String {
        let (x, y, double, button) = match command.params {
            ActionParams::Click {
                x,
                y,
                double,
                button,
            } => (x, y, double, button),
            _ => (None, None, false, MouseButton::Left),
        };

        if let (Some(x), Some(y)) = (x, y) {
            return self.click_at(x, y, double, button, None).await;
        }

        // No explicit coordinates: locate the target text on screen and
        // click the reported center.
        let Some(target) = non_empty_target(command) else {
            return "warning: click needs coordinates or a target".to_string();
        };
        match self.screen.find_text(target).await {
            Ok(Some((x, y))) => self.click_at(x, y, double, button, Some(target)).await,
            Ok(None) => format!("warning: '{target}' was not found on screen"),
            Err(e) => format!("click failed: {e}"),
        }
    }

    async fn click_at(
        &self,
        x: i64,
        y: i64,
        double: bool,
        button: MouseButton,
        target: Option<&str>,
    ) -> String {
        let (button, clicks, verb) = if double {
            (MouseButton::Left, 2, "double-clicked")
        } else if button == MouseButton::Right {
            (MouseButton::Right, 1, "right-clicked")
        } else {
            (MouseButton::Left, 1, "clicked")
        };
        match self.pointer.click(x, y, button, clicks).await {
            Ok(()) => match target {
                Some(target) => format!("{verb} '{target}' at ({x}, {y})"),
                None => format!("{verb} at ({x}, {y})"),
            },
            Err(e) => format!("click failed: {e}"),
        }
    }

    async fn run_type(&self, command: &Command) -> String {
        let text = command.target.as_deref().unwrap_or_default();
        if let Err(e) = self.keyboard.paste_text(text).await {
            return format!("type failed: {e}");
        }
        tokio::time::sleep(TYPE_ENTER_DELAY).await;
        match self.keyboard.press_key("enter").await {
            Ok(()) => format!("typed '{text}' and pressed enter"),
            Err(e) => format!("type failed: {e}"),
        }
    }

    async fn run_open_app(&self, command: &Command) -> String {
        let Some(name) = non_empty_target(command) else {
            return "warning: open_app needs an application name".to_string();
        };
        let executable = resolve_app_executable(name);
        if let Err(e) = self.windows.open_app(executable).await {
            return format!("open failed: {e}");
        }
        tokio::time::sleep(APP_LAUNCH_DELAY).await;
        format!("opened '{name}'")
    }

    async fn run_combo(&self, combo: &[&str]) -> String {
        let keys: Vec<String> = combo.iter().map(|k| k.to_string()).collect();
        match self.keyboard.hotkey(&keys).await {
            Ok(()) => format!("pressed {}", keys.join("+")),
            Err(e) => format!("hotkey failed: {e}"),
        }
    }
}

fn non_empty_target(command: &Command) -> Option<&str> {
    command.target.as_deref().filter(|t| !t.trim().is_empty())
}

fn preview_single(command: &Command) -> String {
    match (&command.action, &command.params) {
        (ActionKind::Click, _) => format!(
            "click on {}",
            command.target.as_deref().unwrap_or("the screen")
        ),
        (ActionKind::Type, _) => {
            format!("type text: {}", command.target.as_deref().unwrap_or(""))
        }
        (ActionKind::Screenshot, _) => "take a screenshot".to_string(),
        (ActionKind::OpenApp, _) => {
            format!("open {}", command.target.as_deref().unwrap_or("?"))
        }
        (ActionKind::CloseApp, _) => {
            format!("close {}", command.target.as_deref().unwrap_or("?"))
        }
        (ActionKind::Hotkey, ActionParams::Hotkey { keys }) if !keys.is_empty() => {
            format!("press {}", keys.join("+"))
        }
        (ActionKind::Hotkey, _) => "press a key combination".to_string(),
        (ActionKind::Wait, ActionParams::Wait { seconds }) => format!("wait {seconds} s"),
        (ActionKind::Wait, _) => "wait".to_string(),
        (ActionKind::Drag, _) => "drag the mouse".to_string(),
        (ActionKind::AltEnter, _) => "press alt+enter".to_string(),
        (ActionKind::EnterAlt, _) => "press enter+alt".to_string(),
        (ActionKind::MoveMouse, ActionParams::MoveMouse { x, y }) => {
            format!("move mouse to ({x}, {y})")
        }
        (ActionKind::MoveMouse, _) => "move the mouse".to_string(),
        (ActionKind::OpenUrl, ActionParams::OpenUrl { url }) => format!("open url {url}"),
        (ActionKind::OpenUrl, _) => "open a url".to_string(),
        (ActionKind::SwitchTab, ActionParams::SwitchTab { number }) => {
            format!("switch to tab {number}")
        }
        (ActionKind::SwitchTab, _) => "switch browser tab".to_string(),
        (ActionKind::RunProgram, _) => {
            format!("run {}", command.target.as_deref().unwrap_or("?"))
        }
        (ActionKind::Sequence, ActionParams::Sequence(tasks)) => {
            format!("sequence of {} steps", tasks.len())
        }
        (ActionKind::Sequence, _) => "sequence".to_string(),
        (ActionKind::Unknown, _) => "unrecognized action".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimControl, SimEvent};

    fn executor_with_sim() -> (CommandExecutor, Arc<SimControl>) {
        let sim = Arc::new(SimControl::new());
        let executor = CommandExecutor::new(sim.clone(), sim.clone(), sim.clone(), sim.clone());
        (executor, sim)
    }

    #[tokio::test]
    async fn type_pastes_then_confirms_with_enter() {
        let (executor, sim) = executor_with_sim();
        let command = dh_command::rules::interpret("напиши hello");
        let result = executor.execute(&command).await;
        assert_eq!(result, "typed 'hello' and pressed enter");
        assert_eq!(
            sim.take_events(),
            vec![
                SimEvent::PasteText("hello".to_string()),
                SimEvent::PressKey("enter".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn click_uses_explicit_coordinates() {
        let (executor, sim) = executor_with_sim();
        let command = dh_command::rules::interpret("double click 40, 60");
        let result = executor.execute(&command).await;
        assert_eq!(result, "double-clicked at (40, 60)");
        assert_eq!(
            sim.take_events(),
            vec![SimEvent::Click {
                x: 40,
                y: 60,
                button: MouseButton::Left,
                clicks: 2
            }]
        );
    }

    #[tokio::test]
    async fn click_falls_back_to_text_search() {
        let (executor, sim) = executor_with_sim();
        sim.place_text("Save", 300, 400);

        let command = dh_command::rules::interpret("click on Save");
        let result = executor.execute(&command).await;
        assert_eq!(result, "clicked 'Save' at (300, 400)");

        let command = dh_command::rules::interpret("click on Discard");
        let result = executor.execute(&command).await;
        assert_eq!(result, "warning: 'Discard' was not found on screen");
    }

    #[tokio::test]
    async fn insufficient_parameters_warn_instead_of_failing() {
        let (executor, sim) = executor_with_sim();

        let drag = dh_command::rules::interpret("drag it over there");
        assert_eq!(
            executor.execute(&drag).await,
            "warning: drag needs start and end coordinates"
        );

        let hotkey = Command {
            action: ActionKind::Hotkey,
            target: None,
            params: ActionParams::Hotkey { keys: vec![] },
            description: "press something".to_string(),
        };
        assert_eq!(executor.execute(&hotkey).await, "warning: no keys to press");
        assert!(sim.take_events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn open_app_resolves_the_executable_dictionary() {
        let (executor, sim) = executor_with_sim();
        let command = dh_command::rules::interpret("відкрий notepad");
        let result = executor.execute(&command).await;
        assert_eq!(result, "opened 'notepad'");
        assert_eq!(
            sim.take_events(),
            vec![SimEvent::OpenApp("notepad.exe".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_steps_run_strictly_in_order() {
        let (executor, sim) = executor_with_sim();
        let wire = serde_json::json!({
            "action": "sequence",
            "tasks": [
                { "action": "open_app", "target": "firefox" },
                { "action": "wait", "parameters": { "seconds": 3 } },
                { "action": "open_url", "url": "https://example.com" },
            ],
            "description": "open firefox and go to example.com"
        });
        let command = Command::from_wire(&wire).unwrap();
        let result = executor.execute(&command).await;
        assert_eq!(
            result,
            "step 1: opened 'firefox'\nstep 2: waited 3 s\nstep 3: opened url https://example.com"
        );
        assert_eq!(
            sim.take_events(),
            vec![
                SimEvent::OpenApp("firefox.exe".to_string()),
                SimEvent::OpenUrl("https://example.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn prepare_previews_without_side_effects() {
        let (executor, sim) = executor_with_sim();
        let command = dh_command::rules::interpret("напиши hello");
        let preview = executor.prepare(&command);
        assert!(preview.contains("hello"));
        assert!(preview.contains("напиши hello"));
        assert!(sim.take_events().is_empty());
    }

    #[test]
    fn unknown_app_names_pass_through() {
        assert_eq!(resolve_app_executable("Word"), "winword.exe");
        assert_eq!(resolve_app_executable("custom-tool"), "custom-tool");
    }
}
