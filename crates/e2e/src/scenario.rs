//! Declarative YAML scenarios

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::composer::{unique_suffix, TestWorkflowConfig};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::requirements::TestRequirements;

/// Placeholder in workflow names replaced by a fresh unique id
pub const ID_PLACEHOLDER: &str = "{id}";

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Session setup applied before the first step
    #[serde(default)]
    pub requirements: TestRequirements,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to base), optionally awaiting a response
    /// matching the `await_response` glob that the navigation triggers.
    /// `arm_response` arms the same kind of waiter but leaves it for a later
    /// `await_response` step.
    Goto {
        url: String,
        #[serde(default)]
        await_response: Option<String>,
        #[serde(default)]
        arm_response: Option<String>,
    },

    /// Await the response armed by the last `goto`
    AwaitResponse,

    GoHome,

    WaitForLoad,

    Click {
        target: Locator,
    },

    DoubleClick {
        target: Locator,
    },

    Fill {
        target: Locator,
        value: String,
    },

    Hover {
        target: Locator,
    },

    /// Press a key on the page keyboard
    Press {
        key: String,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Assert something about an element, retrying until the timeout
    Expect {
        target: Locator,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// End the scenario as skipped when an optional element is not shown
    SkipUnlessVisible {
        target: Locator,
        reason: String,
    },

    AddWorkflow,

    CreateWorkflow {
        #[serde(default)]
        name: Option<String>,
    },

    /// Import a fixture on the open canvas
    ImportWorkflow {
        file: String,
        #[serde(default)]
        name: Option<String>,
    },

    SetupWorkflow {
        workflow: TestWorkflowConfig,
    },

    OpenNode {
        name: String,
    },

    ExecuteNode,

    BackToCanvas,

    ZoomToFit,

    ExecuteWorkflow {
        notification: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    AssertInlineExpressionValid,

    OpenAssistant,

    CloseAssistant,

    SendAssistantMessage {
        text: String,
    },

    /// Open the assistant from the node error view
    AskAssistantAboutError,

    /// Confirm the warning shown before replacing the current chat session
    StartNewAssistantSession,

    CloseCta,

    OpenVersionsPanel,

    CloseVersionsPanel,

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    pub value: String,
}

impl Step {
    /// Short label used in logs and results
    pub fn name(&self) -> String {
        match self {
            Step::Goto { url, .. } => format!("goto:{}", url),
            Step::AwaitResponse => "await_response".to_string(),
            Step::GoHome => "go_home".to_string(),
            Step::WaitForLoad => "wait_for_load".to_string(),
            Step::Click { target } => format!("click:{}", target),
            Step::DoubleClick { target } => format!("dblclick:{}", target),
            Step::Fill { target, .. } => format!("fill:{}", target),
            Step::Hover { target } => format!("hover:{}", target),
            Step::Press { key } => format!("press:{}", key),
            Step::Sleep { ms } => format!("sleep:{}ms", ms),
            Step::Expect { target, .. } => format!("expect:{}", target),
            Step::SkipUnlessVisible { target, .. } => format!("skip_unless_visible:{}", target),
            Step::AddWorkflow => "add_workflow".to_string(),
            Step::CreateWorkflow { .. } => "create_workflow".to_string(),
            Step::ImportWorkflow { file, .. } => format!("import_workflow:{}", file),
            Step::SetupWorkflow { .. } => "setup_workflow".to_string(),
            Step::OpenNode { name } => format!("open_node:{}", name),
            Step::ExecuteNode => "execute_node".to_string(),
            Step::BackToCanvas => "back_to_canvas".to_string(),
            Step::ZoomToFit => "zoom_to_fit".to_string(),
            Step::ExecuteWorkflow { notification, .. } => format!("execute_workflow:{}", notification),
            Step::AssertInlineExpressionValid => "assert_inline_expression_valid".to_string(),
            Step::OpenAssistant => "open_assistant".to_string(),
            Step::CloseAssistant => "close_assistant".to_string(),
            Step::SendAssistantMessage { .. } => "send_assistant_message".to_string(),
            Step::AskAssistantAboutError => "ask_assistant_about_error".to_string(),
            Step::StartNewAssistantSession => "start_new_assistant_session".to_string(),
            Step::CloseCta => "close_cta".to_string(),
            Step::OpenVersionsPanel => "open_versions_panel".to_string(),
            Step::CloseVersionsPanel => "close_versions_panel".to_string(),
            Step::Log { message } => {
                let cut = message.char_indices().nth(30).map(|(i, _)| i).unwrap_or(message.len());
                format!("log:{}", &message[..cut])
            }
        }
    }
}

/// Replace every `{id}` in a name template with a fresh unique id
pub fn expand_name(template: &str) -> String {
    if template.contains(ID_PLACEHOLDER) {
        template.replace(ID_PLACEHOLDER, &unique_suffix())
    } else {
        template.to_string()
    }
}

impl Scenario {
    /// Parse a scenario from YAML string
    ///
    /// Requirements are validated here so a bad descriptor fails at load time.
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario
            .requirements
            .workflow_import()
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", scenario.name, e)))?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::ScenarioParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: cta-hidden
description: CTA stays hidden for ineligible users
tags:
  - cta
requirements:
  intercepts:
    cta:
      url: "**/rest/cta/become-creator"
      response: false
steps:
  - action: goto
    url: /
    await_response: "**/rest/cta/become-creator"
  - action: expect
    target: { kind: test_id, id: become-template-creator-cta }
    visible: false
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "cta-hidden");
        assert_eq!(scenario.steps.len(), 2);
        assert_eq!(scenario.requirements.intercepts.len(), 1);
        assert!(matches!(
            &scenario.steps[1],
            Step::Expect { visible: Some(false), .. }
        ));
    }

    #[test]
    fn test_unit_steps_and_setup_workflow() {
        let yaml = r#"
name: composite
steps:
  - action: go_home
  - action: setup_workflow
    workflow:
      nodes: [Manual Trigger, Edit Fields]
  - action: execute_workflow
    notification: Workflow executed successfully
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.steps[0].name(), "go_home");
        match &scenario.steps[1] {
            Step::SetupWorkflow { workflow } => {
                assert_eq!(workflow.nodes.as_ref().map(Vec::len), Some(2));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_page_object_steps() {
        let yaml = r#"
name: page-objects
steps:
  - action: goto
    url: /
    arm_response: "**/rest/cta/become-creator"
  - action: await_response
  - action: open_assistant
  - action: send_assistant_message
    text: Test message
  - action: setup_workflow
    workflow:
      importFile: Test_9999_SUG_38.json
  - action: close_versions_panel
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert!(matches!(
            &scenario.steps[0],
            Step::Goto { await_response: None, arm_response: Some(_), .. }
        ));
        assert_eq!(scenario.steps[1].name(), "await_response");
        assert!(matches!(&scenario.steps[3], Step::SendAssistantMessage { text } if text == "Test message"));
        match &scenario.steps[4] {
            Step::SetupWorkflow { workflow } => {
                assert_eq!(workflow.import_file.as_deref(), Some("Test_9999_SUG_38.json"));
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(scenario.steps[5].name(), "close_versions_panel");
    }

    #[test]
    fn test_multiple_workflows_rejected_at_load() {
        let yaml = r#"
name: two-workflows
requirements:
  workflow:
    a.json: A
    b.json: B
steps: []
"#;
        match Scenario::from_yaml(yaml) {
            Err(E2eError::ScenarioParse(msg)) => assert!(msg.contains("two-workflows")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_expand_name() {
        let name = expand_name("AI_Assistant_Test_Workflow_{id}");
        assert!(name.starts_with("AI_Assistant_Test_Workflow_"));
        assert_eq!(name.len(), "AI_Assistant_Test_Workflow_".len() + 8);
        assert_eq!(expand_name("Fixed"), "Fixed");
    }
}
