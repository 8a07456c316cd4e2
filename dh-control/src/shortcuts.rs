//! Named shortcuts and custom modifier combinations, runnable without
//! going through the interpretation pipeline.

use crate::traits::{Keyboard, Pointer};
use dh_command::MouseButton;
use std::sync::Arc;

enum ShortcutAction {
    Hotkey(&'static [&'static str]),
    Key(&'static str),
    MouseMove { dx: i64, dy: i64 },
    MouseCenter,
    MouseClick { button: MouseButton, clicks: u32 },
}

struct Shortcut {
    name: &'static str,
    description: &'static str,
    action: ShortcutAction,
}

const SHORTCUTS: &[Shortcut] = &[
    Shortcut {
        name: "fullscreen",
        description: "toggle fullscreen (alt+enter)",
        action: ShortcutAction::Hotkey(&["alt", "enter"]),
    },
    Shortcut {
        name: "copy",
        description: "copy (ctrl+c)",
        action: ShortcutAction::Hotkey(&["ctrl", "c"]),
    },
    Shortcut {
        name: "paste",
        description: "paste (ctrl+v)",
        action: ShortcutAction::Hotkey(&["ctrl", "v"]),
    },
    Shortcut {
        name: "cut",
        description: "cut (ctrl+x)",
        action: ShortcutAction::Hotkey(&["ctrl", "x"]),
    },
    Shortcut {
        name: "undo",
        description: "undo (ctrl+z)",
        action: ShortcutAction::Hotkey(&["ctrl", "z"]),
    },
    Shortcut {
        name: "redo",
        description: "redo (ctrl+y)",
        action: ShortcutAction::Hotkey(&["ctrl", "y"]),
    },
    Shortcut {
        name: "save",
        description: "save (ctrl+s)",
        action: ShortcutAction::Hotkey(&["ctrl", "s"]),
    },
    Shortcut {
        name: "select_all",
        description: "select all (ctrl+a)",
        action: ShortcutAction::Hotkey(&["ctrl", "a"]),
    },
    Shortcut {
        name: "find",
        description: "find (ctrl+f)",
        action: ShortcutAction::Hotkey(&["ctrl", "f"]),
    },
    Shortcut {
        name: "replace",
        description: "replace (ctrl+h)",
        action: ShortcutAction::Hotkey(&["ctrl", "h"]),
    },
    Shortcut {
        name: "new_tab",
        description: "new tab (ctrl+t)",
        action: ShortcutAction::Hotkey(&["ctrl", "t"]),
    },
    Shortcut {
        name: "close_tab",
        description: "close tab (ctrl+w)",
        action: ShortcutAction::Hotkey(&["ctrl", "w"]),
    },
    Shortcut {
        name: "switch_window",
        description: "switch windows (alt+tab)",
        action: ShortcutAction::Hotkey(&["alt", "tab"]),
    },
    Shortcut {
        name: "task_manager",
        description: "task manager (ctrl+shift+esc)",
        action: ShortcutAction::Hotkey(&["ctrl", "shift", "esc"]),
    },
    Shortcut {
        name: "delete",
        description: "delete key",
        action: ShortcutAction::Key("delete"),
    },
    Shortcut {
        name: "backspace",
        description: "backspace key",
        action: ShortcutAction::Key("backspace"),
    },
    Shortcut {
        name: "enter",
        description: "enter key",
        action: ShortcutAction::Key("enter"),
    },
    Shortcut {
        name: "space",
        description: "space key",
        action: ShortcutAction::Key("space"),
    },
    Shortcut {
        name: "tab",
        description: "tab key",
        action: ShortcutAction::Key("tab"),
    },
    Shortcut {
        name: "escape",
        description: "escape key",
        action: ShortcutAction::Key("escape"),
    },
    Shortcut {
        name: "screenshot",
        description: "print screen key",
        action: ShortcutAction::Key("printscreen"),
    },
    Shortcut {
        name: "mouse_up",
        description: "nudge mouse up 50px",
        action: ShortcutAction::MouseMove { dx: 0, dy: -50 },
    },
    Shortcut {
        name: "mouse_down",
        description: "nudge mouse down 50px",
        action: ShortcutAction::MouseMove { dx: 0, dy: 50 },
    },
    Shortcut {
        name: "mouse_left",
        description: "nudge mouse left 50px",
        action: ShortcutAction::MouseMove { dx: -50, dy: 0 },
    },
    Shortcut {
        name: "mouse_right",
        description: "nudge mouse right 50px",
        action: ShortcutAction::MouseMove { dx: 50, dy: 0 },
    },
    Shortcut {
        name: "mouse_up_small",
        description: "nudge mouse up 10px",
        action: ShortcutAction::MouseMove { dx: 0, dy: -10 },
    },
    Shortcut {
        name: "mouse_down_small",
        description: "nudge mouse down 10px",
        action: ShortcutAction::MouseMove { dx: 0, dy: 10 },
    },
    Shortcut {
        name: "mouse_left_small",
        description: "nudge mouse left 10px",
        action: ShortcutAction::MouseMove { dx: -10, dy: 0 },
    },
    Shortcut {
        name: "mouse_right_small",
        description: "nudge mouse right 10px",
        action: ShortcutAction::MouseMove { dx: 10, dy: 0 },
    },
    Shortcut {
        name: "mouse_center",
        description: "move mouse to screen center",
        action: ShortcutAction::MouseCenter,
    },
    Shortcut {
        name: "mouse_click",
        description: "left click at current position",
        action: ShortcutAction::MouseClick {
            button: MouseButton::Left,
            clicks: 1,
        },
    },
    Shortcut {
        name: "mouse_right_click",
        description: "right click at current position",
        action: ShortcutAction::MouseClick {
            button: MouseButton::Right,
            clicks: 1,
        },
    },
    Shortcut {
        name: "mouse_double_click",
        description: "double click at current position",
        action: ShortcutAction::MouseClick {
            button: MouseButton::Left,
            clicks: 2,
        },
    },
];

const VALID_COMBO_KEYS: &[&str] = &[
    "ctrl",
    "alt",
    "shift",
    "enter",
    "tab",
    "escape",
    "delete",
    "backspace",
    "space",
    "f1",
    "f2",
    "f3",
    "f4",
    "f5",
    "f6",
    "f7",
    "f8",
    "f9",
    "f10",
    "f11",
    "f12",
    "home",
    "end",
    "pageup",
    "pagedown",
    "insert",
    "up",
    "down",
    "left",
    "right",
    "printscreen",
];

/// Parses a custom "alt+f4"-style combination against the closed valid-key
/// set. Returns `None` when any segment is not an allowed key.
pub fn parse_custom_combo(input: &str) -> Option<Vec<String>> {
    let keys: Vec<String> = input
        .trim()
        .to_lowercase()
        .split('+')
        .map(str::trim)
        .map(str::to_string)
        .collect();
    if keys.is_empty() || keys.iter().any(|k| !VALID_COMBO_KEYS.contains(&k.as_str())) {
        return None;
    }
    Some(keys)
}

pub struct ShortcutRunner {
    keyboard: Arc<dyn Keyboard>,
    pointer: Arc<dyn Pointer>,
}

impl ShortcutRunner {
    pub fn new(keyboard: Arc<dyn Keyboard>, pointer: Arc<dyn Pointer>) -> Self {
        Self { keyboard, pointer }
    }

    pub fn list(&self) -> String {
        let mut text = String::from("available shortcuts:\n");
        for shortcut in SHORTCUTS {
            text.push_str(&format!("  {} - {}\n", shortcut.name, shortcut.description));
        }
        text.push_str("\ncustom combinations also work: alt+f4, ctrl+alt+delete, shift+tab");
        text
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn run(&self, name: &str) -> String {
        let name = name.trim().to_lowercase();

        if let Some(shortcut) = SHORTCUTS.iter().find(|s| s.name == name) {
            return self.run_action(&shortcut.action).await;
        }

        if name.contains('+') {
            let Some(keys) = parse_custom_combo(&name) else {
                return format!(
                    "warning: invalid combination '{name}'; allowed keys: {}",
                    VALID_COMBO_KEYS.join(", ")
                );
            };
            return match self.keyboard.hotkey(&keys).await {
                Ok(()) => format!("pressed {}", keys.join("+")),
                Err(e) => format!("shortcut failed: {e}"),
            };
        }

        format!("warning: unknown shortcut '{name}'\n\n{}", self.list())
    }

    async fn run_action(&self, action: &ShortcutAction) -> String {
        match action {
            ShortcutAction::Hotkey(combo) => {
                let keys: Vec<String> = combo.iter().map(|k| k.to_string()).collect();
                match self.keyboard.hotkey(&keys).await {
                    Ok(()) => format!("pressed {}", keys.join("+")),
                    Err(e) => format!("shortcut failed: {e}"),
                }
            }
            ShortcutAction::Key(key) => match self.keyboard.press_key(key).await {
                Ok(()) => format!("pressed {key}"),
                Err(e) => format!("shortcut failed: {e}"),
            },
            ShortcutAction::MouseMove { dx, dy } => {
                let (x, y) = match self.pointer.position().await {
                    Ok(v) => v,
                    Err(e) => return format!("shortcut failed: {e}"),
                };
                let (x, y) = (x + dx, y + dy);
                match self.pointer.move_to(x, y).await {
                    Ok(()) => format!("moved mouse to ({x}, {y})"),
                    Err(e) => format!("shortcut failed: {e}"),
                }
            }
            ShortcutAction::MouseCenter => {
                let (w, h) = match self.pointer.screen_size().await {
                    Ok(v) => v,
                    Err(e) => return format!("shortcut failed: {e}"),
                };
                let (x, y) = (w / 2, h / 2);
                match self.pointer.move_to(x, y).await {
                    Ok(()) => format!("moved mouse to ({x}, {y})"),
                    Err(e) => format!("shortcut failed: {e}"),
                }
            }
            ShortcutAction::MouseClick { button, clicks } => {
                let (x, y) = match self.pointer.position().await {
                    Ok(v) => v,
                    Err(e) => return format!("shortcut failed: {e}"),
                };
                match self.pointer.click(x, y, *button, *clicks).await {
                    Ok(()) => format!("clicked at ({x}, {y})"),
                    Err(e) => format!("shortcut failed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimControl, SimEvent};

    fn runner_with_sim() -> (ShortcutRunner, Arc<SimControl>) {
        let sim = Arc::new(SimControl::new());
        (ShortcutRunner::new(sim.clone(), sim.clone()), sim)
    }

    #[tokio::test]
    async fn named_shortcuts_press_their_combination() {
        let (runner, sim) = runner_with_sim();
        assert_eq!(runner.run("copy").await, "pressed ctrl+c");
        assert_eq!(
            sim.take_events(),
            vec![SimEvent::Hotkey(vec!["ctrl".to_string(), "c".to_string()])]
        );
    }

    #[tokio::test]
    async fn custom_combinations_are_validated() {
        let (runner, sim) = runner_with_sim();
        assert_eq!(runner.run("alt+f4").await, "pressed alt+f4");
        assert_eq!(
            sim.take_events(),
            vec![SimEvent::Hotkey(vec!["alt".to_string(), "f4".to_string()])]
        );

        let reply = runner.run("alt+q").await;
        assert!(reply.starts_with("warning: invalid combination"));
        assert!(sim.take_events().is_empty());
    }

    #[tokio::test]
    async fn unknown_names_list_the_table() {
        let (runner, _sim) = runner_with_sim();
        let reply = runner.run("does_not_exist").await;
        assert!(reply.starts_with("warning: unknown shortcut"));
        assert!(reply.contains("available shortcuts"));
    }

    #[tokio::test]
    async fn mouse_nudges_are_relative_to_the_current_position() {
        let (runner, sim) = runner_with_sim();
        sim.move_to(100, 100).await.unwrap();
        sim.take_events();
        assert_eq!(runner.run("mouse_up").await, "moved mouse to (100, 50)");
    }

    #[test]
    fn combo_parsing_rejects_empty_segments() {
        assert_eq!(
            parse_custom_combo("ctrl+shift+escape"),
            Some(vec![
                "ctrl".to_string(),
                "shift".to_string(),
                "escape".to_string()
            ])
        );
        assert!(parse_custom_combo("ctrl++c").is_none());
        assert!(parse_custom_combo("meta+x").is_none());
    }
}
