//! Deterministic keyword interpreter. Always available, no external
//! dependency: this is the correctness floor the model-backed path falls
//! back to.

use crate::types::{ActionKind, ActionParams, Command, MouseButton};
use regex::Regex;
use std::sync::LazyLock;

/// Ordered rule table. The first entry with any keyword occurring as a
/// substring of the lower-cased input wins; several keyword sets overlap
/// ("press" vs "ctrl", "move" vs "mouse" phrasing), so the declaration
/// order here is load-bearing and pinned by tests.
pub const RULES: &[(ActionKind, &[&str])] = &[
    (
        ActionKind::Click,
        &["клік", "натисни", "нажми", "click", "press"],
    ),
    (
        ActionKind::Type,
        &["напиши", "введи", "набери", "type", "write"],
    ),
    (
        ActionKind::Screenshot,
        &["скріншот", "фото", "screenshot", "screen"],
    ),
    (
        ActionKind::OpenApp,
        &["відкрий", "запусти", "open", "start", "launch"],
    ),
    (
        ActionKind::CloseApp,
        &["закрий", "вимкни", "close", "exit"],
    ),
    (ActionKind::AltEnter, &["alt enter", "alt+enter"]),
    (ActionKind::EnterAlt, &["enter alt", "enter+alt"]),
    (ActionKind::Hotkey, &["ctrl", "shift", "tab", "escape"]),
    (ActionKind::Wait, &["чекай", "зачекай", "wait", "pause"]),
    (ActionKind::Drag, &["перетягни", "drag", "move"]),
];

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("quoted pattern compiles"));
static CLICK_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:on|на)\s+(\w+)").expect("click target pattern compiles"));
static APP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(notepad|calc|chrome|firefox|explorer|word|excel)")
        .expect("app name pattern compiles")
});
static COORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*,\s*(\d+)").expect("coords pattern compiles"));
static WAIT_SECONDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:сек|секунд|sec|second)").expect("wait pattern compiles")
});

/// Total over all input: every string produces exactly one command, with
/// `type` carrying the raw text when nothing matches.
pub fn interpret(text: &str) -> Command {
    let lower = text.to_lowercase();
    let action = detect_action(&lower);
    Command {
        action,
        target: extract_target(text, &lower, action),
        params: extract_params(&lower, action),
        description: text.to_string(),
    }
}

fn detect_action(lower: &str) -> ActionKind {
    for (action, keywords) in RULES {
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            return *action;
        }
    }
    // Typing is the most common request, so unmatched text becomes a type
    // command with the raw text as its target.
    ActionKind::Type
}

fn extract_target(text: &str, lower: &str, action: ActionKind) -> Option<String> {
    match action {
        ActionKind::Type => {
            if let Some(captures) = QUOTED.captures(text) {
                return Some(captures[1].to_string());
            }
            let words: Vec<&str> = text.split_whitespace().collect();
            let type_keywords = RULES
                .iter()
                .find(|(action, _)| *action == ActionKind::Type)
                .map(|(_, keywords)| *keywords)
                .unwrap_or_default();
            for (i, word) in words.iter().enumerate() {
                if type_keywords.contains(&word.to_lowercase().as_str()) {
                    return Some(words[i + 1..].join(" "));
                }
            }
            Some(text.to_string())
        }
        ActionKind::Click => CLICK_TARGET
            .captures(text)
            .map(|captures| captures[1].to_string())
            .or_else(|| Some(text.to_string())),
        ActionKind::OpenApp => APP_NAME
            .captures(lower)
            .map(|captures| captures[1].to_string())
            .or_else(|| Some(text.to_string())),
        _ => Some(text.to_string()),
    }
}

fn extract_params(lower: &str, action: ActionKind) -> ActionParams {
    match action {
        ActionKind::Click => {
            let (x, y) = match COORDS.captures(lower) {
                Some(captures) => (captures[1].parse().ok(), captures[2].parse().ok()),
                None => (None, None),
            };
            ActionParams::Click {
                x,
                y,
                double: lower.contains("double") || lower.contains("подвійний"),
                button: if lower.contains("right") || lower.contains("право") {
                    MouseButton::Right
                } else {
                    MouseButton::Left
                },
            }
        }
        ActionKind::Wait => ActionParams::Wait {
            seconds: WAIT_SECONDS
                .captures(lower)
                .and_then(|captures| captures[1].parse().ok())
                .unwrap_or(1),
        },
        ActionKind::Hotkey => {
            // Only modifiers are inferred from free text, in a fixed order.
            let mut keys = Vec::new();
            for modifier in ["ctrl", "alt", "shift"] {
                if lower.contains(modifier) {
                    keys.push(modifier.to_string());
                }
            }
            ActionParams::Hotkey { keys }
        }
        ActionKind::Drag => ActionParams::drag(),
        _ => ActionParams::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_order_is_pinned() {
        let order: Vec<ActionKind> = RULES.iter().map(|(action, _)| *action).collect();
        assert_eq!(
            order,
            vec![
                ActionKind::Click,
                ActionKind::Type,
                ActionKind::Screenshot,
                ActionKind::OpenApp,
                ActionKind::CloseApp,
                ActionKind::AltEnter,
                ActionKind::EnterAlt,
                ActionKind::Hotkey,
                ActionKind::Wait,
                ActionKind::Drag,
            ]
        );
    }

    #[test]
    fn earlier_rules_win_keyword_overlaps() {
        // "press" (click) appears before "ctrl" (hotkey) in the table.
        assert_eq!(interpret("press ctrl+c").action, ActionKind::Click);
        // Without a click keyword, the modifier resolves to hotkey.
        assert_eq!(interpret("ctrl+c").action, ActionKind::Hotkey);
    }

    #[test]
    fn unmatched_text_defaults_to_type_with_raw_target() {
        let command = interpret("xyz123");
        assert_eq!(command.action, ActionKind::Type);
        assert_eq!(command.target.as_deref(), Some("xyz123"));
        assert_eq!(command.description, "xyz123");
    }

    #[test]
    fn type_target_prefers_quotes_then_keyword_remainder() {
        assert_eq!(
            interpret(r#"напиши "hello world" будь ласка"#).target.as_deref(),
            Some("hello world")
        );
        let command = interpret("напиши hello");
        assert_eq!(command.action, ActionKind::Type);
        assert_eq!(command.target.as_deref(), Some("hello"));
    }

    #[test]
    fn click_extracts_target_and_coordinates() {
        let command = interpret("клікни на Зберегти");
        assert_eq!(command.action, ActionKind::Click);
        assert_eq!(command.target.as_deref(), Some("Зберегти"));

        let command = interpret("click 100, 200 double right");
        assert_eq!(
            command.params,
            ActionParams::Click {
                x: Some(100),
                y: Some(200),
                double: true,
                button: MouseButton::Right,
            }
        );
    }

    #[test]
    fn open_app_resolves_known_application_names() {
        let command = interpret("відкрий Notepad");
        assert_eq!(command.action, ActionKind::OpenApp);
        assert_eq!(command.target.as_deref(), Some("notepad"));

        let command = interpret("open the dashboard");
        assert_eq!(command.target.as_deref(), Some("open the dashboard"));
    }

    #[test]
    fn wait_seconds_parse_with_default() {
        assert_eq!(
            interpret("wait 5 seconds").params,
            ActionParams::Wait { seconds: 5 }
        );
        assert_eq!(interpret("wait").params, ActionParams::Wait { seconds: 1 });
        assert_eq!(
            interpret("зачекай 10 секунд").params,
            ActionParams::Wait { seconds: 10 }
        );
    }

    #[test]
    fn hotkey_modifiers_keep_a_fixed_order() {
        assert_eq!(
            interpret("shift and ctrl").params,
            ActionParams::Hotkey {
                keys: vec!["ctrl".to_string(), "shift".to_string()]
            }
        );
    }
}
