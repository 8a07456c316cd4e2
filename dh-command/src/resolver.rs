use crate::model::ModelInterpreter;
use crate::rules;
use crate::types::Command;

/// How an interpretation was produced. Callers can tell "model succeeded"
/// from "model failed, rules used" without depending on log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretationSource {
    Model,
    RuleFallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct Interpretation {
    pub command: Command,
    pub source: InterpretationSource,
}

impl Interpretation {
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, InterpretationSource::RuleFallback { .. })
    }
}

/// Two-stage resolver: model first when configured, deterministic rules as
/// the floor. `resolve` is total and never fails outward.
pub struct TaskResolver {
    model: Option<ModelInterpreter>,
}

impl TaskResolver {
    pub fn new(model: Option<ModelInterpreter>) -> Self {
        Self { model }
    }

    pub fn rules_only() -> Self {
        Self { model: None }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn resolve(&self, text: &str) -> Interpretation {
        let Some(model) = self.model.as_ref() else {
            return Interpretation {
                command: rules::interpret(text),
                source: InterpretationSource::RuleFallback {
                    reason: "model interpreter not configured".to_string(),
                },
            };
        };

        match model.interpret(text).await {
            Ok(command) => {
                tracing::info!(model = %model.model(), action = %command.action, "model interpretation accepted");
                Interpretation {
                    command,
                    source: InterpretationSource::Model,
                }
            }
            Err(e) => {
                tracing::warn!(%e, "model interpretation failed; falling back to rules");
                Interpretation {
                    command: rules::interpret(text),
                    source: InterpretationSource::RuleFallback {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionKind;

    #[tokio::test]
    async fn missing_model_degrades_to_the_rule_interpreter() {
        let resolver = TaskResolver::rules_only();
        let interpretation = resolver.resolve("напиши hello").await;
        assert!(interpretation.is_degraded());
        assert_eq!(interpretation.command.action, ActionKind::Type);
        assert_eq!(interpretation.command.target.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn unreachable_model_yields_the_same_command_as_rules() {
        // Loopback port with nothing listening: the transport error must
        // degrade into exactly the rule-based result.
        let model =
            ModelInterpreter::new("test-key", "test-model", Some("http://127.0.0.1:9")).unwrap();
        let resolver = TaskResolver::new(Some(model));
        let interpretation = resolver.resolve("wait 5 seconds").await;
        assert!(interpretation.is_degraded());
        assert_eq!(interpretation.command, crate::rules::interpret("wait 5 seconds"));
    }
}
