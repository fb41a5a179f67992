//! `ask` options and sequential workflows.

use super::result::OrchestrationResult;
use crate::strategy::StrategyKind;
use crate::types::{ChatRequest, Constraints, Message, Requirements};
use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+)\.output\s*\}\}").unwrap());
/// Names a placeholder can refer to.
static STEP_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap());

/// Options for [`Orchestrator::ask`](super::Orchestrator::ask).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AskOptions {
    pub system: Option<String>,
    pub strategy: Option<StrategyKind>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub requirements: Option<Requirements>,
    pub constraints: Option<Constraints>,
}

impl AskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn to_request(&self, prompt: &str) -> Result<ChatRequest> {
        let mut builder = ChatRequest::builder();
        if let Some(system) = &self.system {
            builder = builder.message(Message::system(system.clone()));
        }
        builder = builder.message(Message::user(prompt));
        if let Some(s) = self.strategy {
            builder = builder.strategy(s);
        }
        if let Some(t) = self.temperature {
            builder = builder.temperature(t);
        }
        if let Some(m) = self.max_tokens {
            builder = builder.max_tokens(m);
        }
        if let Some(r) = self.requirements {
            builder = builder.requirements(r);
        }
        if let Some(c) = &self.constraints {
            builder = builder.constraints(c.clone());
        }
        builder.build()
    }
}

/// One named prompt in a workflow. The prompt may reference earlier steps as
/// `{{step_name.output}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub options: AskOptions,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            options: AskOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AskOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepResult {
    pub name: String,
    /// The prompt after placeholder substitution.
    pub prompt: String,
    pub result: OrchestrationResult,
}

impl WorkflowStepResult {
    pub fn output(&self) -> &str {
        self.result.content()
    }
}

/// Rejects empty, unreferenceable or duplicate names and references to steps that do not
/// run earlier.
pub(crate) fn validate_steps(steps: &[WorkflowStep]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::validation("workflow has no steps"));
    }
    let mut seen = HashSet::new();
    for step in steps {
        if step.name.trim().is_empty() {
            return Err(Error::validation("workflow step name must not be empty"));
        }
        if !STEP_NAME.is_match(&step.name) {
            return Err(Error::Validation {
                message: format!(
                    "workflow step name '{}' may only contain letters, digits, '_' and '-'",
                    step.name
                ),
                context: ErrorContext::new().with_source("workflow"),
            });
        }
        for caps in PLACEHOLDER.captures_iter(&step.prompt) {
            let target = &caps[1];
            if !seen.contains(target) {
                return Err(Error::Validation {
                    message: format!(
                        "step '{}' references '{}' which does not run before it",
                        step.name, target
                    ),
                    context: ErrorContext::new().with_source("workflow"),
                });
            }
        }
        if !seen.insert(step.name.as_str()) {
            return Err(Error::Validation {
                message: format!("duplicate workflow step '{}'", step.name),
                context: ErrorContext::new().with_source("workflow"),
            });
        }
    }
    Ok(())
}

/// Replaces every `{{name.output}}` with the named output. Unknown names are left as is;
/// [`validate_steps`] rules them out before a workflow runs.
pub fn substitute_outputs(template: &str, outputs: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            outputs
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution() {
        let mut outputs = HashMap::new();
        outputs.insert("outline".to_string(), "1. intro".to_string());
        assert_eq!(
            substitute_outputs("Expand {{outline.output}} and {{ outline.output }}", &outputs),
            "Expand 1. intro and 1. intro"
        );
        assert_eq!(
            substitute_outputs("keep {{missing.output}}", &outputs),
            "keep {{missing.output}}"
        );
    }

    #[test]
    fn test_validation() {
        let ok = vec![
            WorkflowStep::new("a", "first"),
            WorkflowStep::new("b", "use {{a.output}}"),
        ];
        assert!(validate_steps(&ok).is_ok());

        let forward = vec![
            WorkflowStep::new("a", "use {{b.output}}"),
            WorkflowStep::new("b", "second"),
        ];
        assert!(validate_steps(&forward).is_err());

        let own = vec![WorkflowStep::new("a", "use {{a.output}}")];
        assert!(validate_steps(&own).is_err());

        let dup = vec![WorkflowStep::new("a", "x"), WorkflowStep::new("a", "y")];
        assert!(validate_steps(&dup).is_err());
        assert!(validate_steps(&[]).is_err());
    }

    #[test]
    fn test_step_names_must_be_referenceable() {
        for name in ["draft v2", "draft.v2", "résumé", "a{b}"] {
            let steps = vec![WorkflowStep::new(name, "first")];
            let err = validate_steps(&steps).unwrap_err();
            assert!(err.to_string().contains("may only contain"), "name {:?}", name);
        }
        let steps = vec![
            WorkflowStep::new("draft-v2_final", "first"),
            WorkflowStep::new("Review", "check {{draft-v2_final.output}}"),
        ];
        assert!(validate_steps(&steps).is_ok());
    }

    #[test]
    fn test_ask_options_build_request() {
        let req = AskOptions::new()
            .with_system("be brief")
            .with_strategy(StrategyKind::Performance)
            .with_max_tokens(64)
            .to_request("hello")
            .unwrap();
        assert_eq!(req.messages().len(), 2);
        assert_eq!(req.prompt_text(), "hello");
        assert_eq!(req.strategy(), Some(StrategyKind::Performance));
        assert_eq!(req.params().max_tokens, Some(64));
    }
}
