//! Declarative test requirements and the setup executor
//!
//! A test declares what it needs (feature flags, network intercepts, seeded
//! local storage, at most one imported workflow) as a [`TestRequirements`]
//! value. [`setup_test_requirements`] applies it to a fresh page in a fixed
//! order before the test body runs:
//!
//! 1. feature flags, one at a time
//! 2. network intercepts, alive for the page's lifetime
//! 3. local storage, written by an init script before any page script
//! 4. workflow import, leaving the page on the canvas

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::backend::FeatureControl;
use crate::error::{E2eError, E2eResult};
use crate::intercept::InterceptRule;
use crate::pages::AppPage;

/// What a test needs before its body runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RequirementsConfig>,

    /// Label -> rule; the label only names the rule
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intercepts: BTreeMap<String, InterceptRule>,

    /// localStorage key -> value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, String>,

    /// Fixture file name -> workflow display name, at most one entry
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub workflow: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementsConfig {
    /// Feature flag name -> desired state
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

/// A workflow to import before the test body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowImport<'r> {
    pub file_name: &'r str,
    pub workflow_name: &'r str,
}

impl TestRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>, enabled: bool) -> Self {
        self.config
            .get_or_insert_with(RequirementsConfig::default)
            .features
            .insert(feature.into(), enabled);
        self
    }

    #[must_use]
    pub fn with_intercept(mut self, label: impl Into<String>, rule: InterceptRule) -> Self {
        self.intercepts.insert(label.into(), rule);
        self
    }

    #[must_use]
    pub fn with_storage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.storage.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_workflow(mut self, file_name: impl Into<String>, workflow_name: impl Into<String>) -> Self {
        self.workflow.insert(file_name.into(), workflow_name.into());
        self
    }

    pub fn features(&self) -> impl Iterator<Item = (&str, bool)> {
        self.config
            .iter()
            .flat_map(|c| c.features.iter())
            .map(|(name, enabled)| (name.as_str(), *enabled))
    }

    /// The single workflow to import, if any
    ///
    /// More than one entry is a configuration error.
    pub fn workflow_import(&self) -> E2eResult<Option<WorkflowImport<'_>>> {
        let mut entries = self.workflow.iter();
        match (entries.next(), entries.next()) {
            (None, _) => Ok(None),
            (Some((file_name, workflow_name)), None) => Ok(Some(WorkflowImport {
                file_name,
                workflow_name,
            })),
            (Some(_), Some(_)) => Err(E2eError::Config(format!(
                "TestRequirements only supports a single workflow, got {}: {}",
                self.workflow.len(),
                self.workflow.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features().next().is_none()
            && self.intercepts.is_empty()
            && self.storage.is_empty()
            && self.workflow.is_empty()
    }
}

/// Apply `requirements` to the page behind `app`
///
/// The descriptor is validated first, so an invalid one causes no side
/// effect at all. Each phase completes before the next starts. Nothing is
/// rolled back when a later phase fails.
pub async fn setup_test_requirements(
    app: &AppPage<'_>,
    features: &dyn FeatureControl,
    requirements: &TestRequirements,
) -> E2eResult<()> {
    let import = requirements.workflow_import()?;
    let page = app.page();

    // 1. Feature flags
    for (feature, enabled) in requirements.features() {
        debug!("Feature '{}' -> {}", feature, enabled);
        features.set_feature(feature, enabled).await?;
    }

    // 2. Network intercepts
    for (label, rule) in &requirements.intercepts {
        debug!("Intercepting '{}' ({})", rule.url, label);
        page.route(rule).await?;
    }

    // 3. Browser storage
    if !requirements.storage.is_empty() {
        debug!("Seeding {} localStorage key(s)", requirements.storage.len());
        page.seed_local_storage(&requirements.storage).await?;
    }

    // 4. Workflow import, ending on the canvas
    if let Some(WorkflowImport {
        file_name,
        workflow_name,
    }) = import
    {
        info!("Importing workflow '{}' from {}", workflow_name, file_name);
        app.go_home().await?;
        app.workflows().click_add_workflow_button().await?;
        app.canvas().import_workflow(file_name, workflow_name).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_original_shape() {
        let yaml = r#"
config:
  features:
    aiAssistant: true
intercepts:
  chat:
    url: "**/rest/ai/chat"
    response:
      sessionId: "1"
storage:
  n8n-telemetry: '{"enabled":false}'
workflow:
  ai_assistant_test_workflow.json: AI Assistant Test
"#;
        let reqs: TestRequirements = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(reqs.features().collect::<Vec<_>>(), vec![("aiAssistant", true)]);
        assert_eq!(reqs.intercepts["chat"].url, "**/rest/ai/chat");
        assert_eq!(reqs.storage["n8n-telemetry"], "{\"enabled\":false}");
        assert_eq!(
            reqs.workflow_import().unwrap(),
            Some(WorkflowImport {
                file_name: "ai_assistant_test_workflow.json",
                workflow_name: "AI Assistant Test",
            })
        );
    }

    #[test]
    fn test_empty_descriptor() {
        let reqs = TestRequirements::new();
        assert!(reqs.is_empty());
        assert_eq!(reqs.workflow_import().unwrap(), None);
    }

    #[test]
    fn test_two_workflows_rejected() {
        let reqs = TestRequirements::new()
            .with_workflow("a.json", "A")
            .with_workflow("b.json", "B");
        match reqs.workflow_import() {
            Err(E2eError::Config(msg)) => assert!(msg.contains("single workflow")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
