//! Normalized command model shared by the interpreters and the executor.
//!
//! Internally parameters are a typed per-action union; the untyped
//! `{action, target, parameters, description}` map only exists at the wire
//! boundary (model replies, persisted payloads).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Click,
    Type,
    Screenshot,
    OpenApp,
    CloseApp,
    Hotkey,
    Wait,
    Drag,
    AltEnter,
    EnterAlt,
    MoveMouse,
    OpenUrl,
    SwitchTab,
    RunProgram,
    Sequence,
    Unknown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Screenshot => "screenshot",
            Self::OpenApp => "open_app",
            Self::CloseApp => "close_app",
            Self::Hotkey => "hotkey",
            Self::Wait => "wait",
            Self::Drag => "drag",
            Self::AltEnter => "alt_enter",
            Self::EnterAlt => "enter_alt",
            Self::MoveMouse => "move_mouse",
            Self::OpenUrl => "open_url",
            Self::SwitchTab => "switch_tab",
            Self::RunProgram => "run_program",
            Self::Sequence => "sequence",
            Self::Unknown => "unknown",
        }
    }

    /// Total: unrecognized action names map to `Unknown`, never an error.
    pub fn parse(name: &str) -> Self {
        match name {
            "click" => Self::Click,
            "type" => Self::Type,
            "screenshot" => Self::Screenshot,
            "open_app" => Self::OpenApp,
            "close_app" => Self::CloseApp,
            "hotkey" => Self::Hotkey,
            "wait" => Self::Wait,
            "drag" => Self::Drag,
            "alt_enter" => Self::AltEnter,
            "enter_alt" => Self::EnterAlt,
            "move_mouse" => Self::MoveMouse,
            "open_url" => Self::OpenUrl,
            "switch_tab" => Self::SwitchTab,
            "run_program" => Self::RunProgram,
            "sequence" => Self::Sequence,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Per-action parameters. Required-field validation happens in the executor
/// arms; optional fields stay optional here so interpretation stays total.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionParams {
    Click {
        x: Option<i64>,
        y: Option<i64>,
        double: bool,
        button: MouseButton,
    },
    Wait {
        seconds: u64,
    },
    Hotkey {
        keys: Vec<String>,
    },
    Drag {
        x1: Option<i64>,
        y1: Option<i64>,
        x2: Option<i64>,
        y2: Option<i64>,
    },
    MoveMouse {
        x: i64,
        y: i64,
    },
    OpenUrl {
        url: String,
    },
    SwitchTab {
        number: i64,
    },
    RunProgram {
        path: String,
    },
    Sequence(Vec<Command>),
    None,
}

impl ActionParams {
    pub fn click() -> Self {
        Self::Click {
            x: None,
            y: None,
            double: false,
            button: MouseButton::Left,
        }
    }

    pub fn drag() -> Self {
        Self::Drag {
            x1: None,
            y1: None,
            x2: None,
            y2: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: ActionKind,
    pub target: Option<String>,
    pub params: ActionParams,
    pub description: String,
}

impl Command {
    /// Builds a `Command` from the boundary map shape. Returns `None` only
    /// when `value` is not a JSON object; every object produces a command,
    /// defaulting unrecognized pieces instead of failing.
    pub fn from_wire(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .map(ActionKind::parse)
            .unwrap_or(ActionKind::Unknown);
        let target = obj
            .get("target")
            .and_then(Value::as_str)
            .map(str::to_string);
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let params = params_from_wire(action, obj);

        Some(Self {
            action,
            target,
            params,
            description,
        })
    }

    pub fn to_wire(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("action".into(), json!(self.action.as_str()));
        if let Some(target) = &self.target {
            obj.insert("target".into(), json!(target));
        }
        match &self.params {
            ActionParams::Sequence(tasks) => {
                let tasks: Vec<Value> = tasks.iter().map(Command::to_wire).collect();
                obj.insert("tasks".into(), Value::Array(tasks));
                obj.insert("parameters".into(), Value::Object(Map::new()));
            }
            other => {
                obj.insert("parameters".into(), Value::Object(params_to_wire(other)));
            }
        }
        obj.insert("description".into(), json!(self.description));
        Value::Object(obj)
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Command::from_wire(&value).ok_or_else(|| D::Error::custom("command must be a JSON object"))
    }
}

/// Looks a field up in the `parameters` map first, falling back to the top
/// level: model replies flatten fields like `keys` and `url` onto the root
/// object.
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(params) = obj.get("parameters").and_then(Value::as_object) {
        if let Some(v) = params.get(key) {
            return Some(v);
        }
    }
    obj.get(key)
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    match field(obj, key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    field(obj, key).and_then(Value::as_str).map(str::to_string)
}

fn params_from_wire(action: ActionKind, obj: &Map<String, Value>) -> ActionParams {
    match action {
        ActionKind::Click => ActionParams::Click {
            x: int_field(obj, "x"),
            y: int_field(obj, "y"),
            double: field(obj, "double").and_then(Value::as_bool).unwrap_or(false),
            button: match string_field(obj, "button").as_deref() {
                Some("right") => MouseButton::Right,
                _ => MouseButton::Left,
            },
        },
        ActionKind::Wait => ActionParams::Wait {
            seconds: int_field(obj, "seconds")
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(1),
        },
        ActionKind::Hotkey => ActionParams::Hotkey {
            keys: field(obj, "keys")
                .and_then(Value::as_array)
                .map(|keys| {
                    keys.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        },
        ActionKind::Drag => ActionParams::Drag {
            x1: int_field(obj, "x1"),
            y1: int_field(obj, "y1"),
            x2: int_field(obj, "x2"),
            y2: int_field(obj, "y2"),
        },
        ActionKind::MoveMouse => ActionParams::MoveMouse {
            x: int_field(obj, "x").unwrap_or(0),
            y: int_field(obj, "y").unwrap_or(0),
        },
        ActionKind::OpenUrl => ActionParams::OpenUrl {
            url: string_field(obj, "url").unwrap_or_default(),
        },
        ActionKind::SwitchTab => ActionParams::SwitchTab {
            number: int_field(obj, "number").unwrap_or(1),
        },
        ActionKind::RunProgram => ActionParams::RunProgram {
            path: string_field(obj, "path").unwrap_or_default(),
        },
        ActionKind::Sequence => ActionParams::Sequence(
            field(obj, "tasks")
                .and_then(Value::as_array)
                .map(|tasks| tasks.iter().filter_map(Command::from_wire).collect())
                .unwrap_or_default(),
        ),
        _ => ActionParams::None,
    }
}

fn params_to_wire(params: &ActionParams) -> Map<String, Value> {
    let mut map = Map::new();
    match params {
        ActionParams::Click {
            x,
            y,
            double,
            button,
        } => {
            if let Some(x) = x {
                map.insert("x".into(), json!(x));
            }
            if let Some(y) = y {
                map.insert("y".into(), json!(y));
            }
            if *double {
                map.insert("double".into(), json!(true));
            }
            if *button == MouseButton::Right {
                map.insert("button".into(), json!("right"));
            }
        }
        ActionParams::Wait { seconds } => {
            map.insert("seconds".into(), json!(seconds));
        }
        ActionParams::Hotkey { keys } => {
            map.insert("keys".into(), json!(keys));
        }
        ActionParams::Drag { x1, y1, x2, y2 } => {
            for (key, value) in [("x1", x1), ("y1", y1), ("x2", x2), ("y2", y2)] {
                if let Some(value) = value {
                    map.insert(key.into(), json!(value));
                }
            }
        }
        ActionParams::MoveMouse { x, y } => {
            map.insert("x".into(), json!(x));
            map.insert("y".into(), json!(y));
        }
        ActionParams::OpenUrl { url } => {
            map.insert("url".into(), json!(url));
        }
        ActionParams::SwitchTab { number } => {
            map.insert("number".into(), json!(number));
        }
        ActionParams::RunProgram { path } => {
            map.insert("path".into(), json!(path));
        }
        ActionParams::Sequence(_) | ActionParams::None => {}
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_round_trips_through_the_wire_shape() {
        let wire = json!({
            "action": "click",
            "target": "save",
            "parameters": { "x": 100, "y": 200, "double": true },
            "description": "double click on save"
        });
        let command = Command::from_wire(&wire).expect("object parses");
        assert_eq!(command.action, ActionKind::Click);
        assert_eq!(command.target.as_deref(), Some("save"));
        assert_eq!(
            command.params,
            ActionParams::Click {
                x: Some(100),
                y: Some(200),
                double: true,
                button: MouseButton::Left,
            }
        );
        assert_eq!(command.to_wire(), wire);
    }

    #[test]
    fn sequence_tasks_parse_from_the_top_level() {
        let wire = json!({
            "action": "sequence",
            "tasks": [
                { "action": "open_app", "target": "firefox" },
                { "action": "open_url", "url": "https://example.com" },
            ],
        });
        let command = Command::from_wire(&wire).expect("object parses");
        let ActionParams::Sequence(tasks) = &command.params else {
            panic!("expected sequence params, got {:?}", command.params);
        };
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].action, ActionKind::OpenApp);
        assert_eq!(
            tasks[1].params,
            ActionParams::OpenUrl {
                url: "https://example.com".to_string()
            }
        );
    }

    #[test]
    fn flattened_model_fields_are_accepted() {
        // "press ctrl+c" style replies put `keys` on the root object.
        let wire = json!({ "action": "hotkey", "keys": ["ctrl", "c"] });
        let command = Command::from_wire(&wire).expect("object parses");
        assert_eq!(
            command.params,
            ActionParams::Hotkey {
                keys: vec!["ctrl".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn unknown_action_names_default_instead_of_failing() {
        let command = Command::from_wire(&json!({ "action": "levitate" })).expect("object parses");
        assert_eq!(command.action, ActionKind::Unknown);
        assert_eq!(command.params, ActionParams::None);

        assert!(Command::from_wire(&json!("just a string")).is_none());
    }

    #[test]
    fn wait_seconds_default_to_one() {
        let command = Command::from_wire(&json!({ "action": "wait" })).expect("object parses");
        assert_eq!(command.params, ActionParams::Wait { seconds: 1 });
    }
}
