//! Multi-step user journeys across pages
//!
//! Each journey returns once every intermediate network and UI wait has
//! resolved.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::E2eResult;
use crate::pages::AppPage;
use crate::page::{elapsed, ResponseMatcher};

/// Default bound for a notification to appear and close
pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(3000);

/// Bound for the run request triggered by the execute button
pub const RUN_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_WORKFLOW_NAME: &str = "My New Workflow";
pub const DEFAULT_BASE_NAME: &str = "Test Workflow";

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
const ID_LENGTH: usize = 8;

/// Random 8-character id over the URL-safe alphabet
pub fn unique_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Loose description of the workflow a test wants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWorkflowConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub nodes: Option<Vec<String>>,

    #[serde(default)]
    pub import_file: Option<String>,

    /// Carried for the test's own bookkeeping, not applied
    #[serde(default)]
    pub tags: Vec<String>,
}

/// How a workflow gets created, resolved from a [`TestWorkflowConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowSetup {
    ImportFile { file: String, name: Option<String> },
    Nodes { nodes: Vec<String>, name: Option<String> },
    Plain { name: Option<String> },
}

impl From<TestWorkflowConfig> for WorkflowSetup {
    /// An import file wins over a node list, which wins over a plain create.
    /// An empty node list counts as absent.
    fn from(config: TestWorkflowConfig) -> Self {
        let TestWorkflowConfig {
            name,
            nodes,
            import_file,
            ..
        } = config;

        match (import_file, nodes) {
            (Some(file), _) => WorkflowSetup::ImportFile { file, name },
            (None, Some(nodes)) if !nodes.is_empty() => WorkflowSetup::Nodes { nodes, name },
            _ => WorkflowSetup::Plain { name },
        }
    }
}

/// User journeys that span several page objects
pub struct WorkflowComposer<'a> {
    app: AppPage<'a>,
}

impl<'a> WorkflowComposer<'a> {
    pub fn new(app: AppPage<'a>) -> Self {
        Self { app }
    }

    /// Execute the open workflow and wait for the success notification
    ///
    /// Waits for both the run request and the notification, then closes the
    /// notification within `timeout` (3 s when `None`).
    pub async fn execute_workflow_and_wait_for_notification(
        &self,
        notification_message: &str,
        timeout: Option<Duration>,
    ) -> E2eResult<()> {
        let timeout = timeout.unwrap_or(DEFAULT_NOTIFICATION_TIMEOUT);
        let page = self.app.page();
        let notifications = self.app.notifications();

        let run_response = page
            .expect_response(
                ResponseMatcher::post_containing(["/rest/workflows/", "/run"]),
                RUN_RESPONSE_TIMEOUT,
            )
            .await?;

        self.app.canvas().click_execute_workflow_button().await?;

        let (response, ()) = tokio::try_join!(
            run_response,
            notifications.wait_for_notification(notification_message, timeout),
        )?;
        debug!("Run request answered {} ({})", response.status, response.url);

        tokio::time::timeout(
            timeout,
            notifications.close_notification(notification_message, timeout),
        )
        .await
        .map_err(elapsed(format!("notification '{}' to close", notification_message)))?
    }

    /// Create an empty workflow and save it, returning its name
    pub async fn create_workflow(&self, workflow_name: Option<&str>) -> E2eResult<String> {
        let name = workflow_name.unwrap_or(DEFAULT_WORKFLOW_NAME);
        let canvas = self.app.canvas();

        self.app.workflows().click_add_workflow_button().await?;
        canvas.set_workflow_name(name).await?;
        canvas.save_workflow().await?;
        Ok(name.to_string())
    }

    /// Import a fixture from the workflows folder, returning the name used
    ///
    /// Without an explicit name a unique `Imported Workflow <id>` is used so
    /// repeated runs do not collide.
    pub async fn create_workflow_from_json_file(&self, file_name: &str, name: Option<&str>) -> E2eResult<String> {
        let workflow_name = match name {
            Some(name) => name.to_string(),
            None => format!("Imported Workflow {}", unique_suffix()),
        };

        self.app.go_home().await?;
        self.app.workflows().click_add_workflow_button().await?;
        self.app
            .canvas()
            .import_workflow(file_name, &workflow_name)
            .await?;
        Ok(workflow_name)
    }

    /// Create a workflow containing `nodes`, in order, and save it
    pub async fn create_workflow_with_nodes(&self, nodes: &[String], workflow_name: Option<&str>) -> E2eResult<String> {
        let name = match workflow_name {
            Some(name) => name.to_string(),
            None => format!("Workflow with {} nodes {}", nodes.len(), unique_suffix()),
        };
        let canvas = self.app.canvas();

        self.app.workflows().click_add_workflow_button().await?;

        for node in nodes {
            canvas.add_node(node).await?;
            // The NDV may or may not have opened for this node
            if let Err(e) = self.app.page().press_key("Escape").await {
                debug!("No node details view to dismiss after '{}': {}", node, e);
            }
        }

        canvas.set_workflow_name(&name).await?;
        canvas.save_workflow().await?;
        Ok(name)
    }

    /// Create `count` workflows named `<base> <i> <id>`, returning home after each
    pub async fn create_multiple_workflows(&self, count: usize, base_name: Option<&str>) -> E2eResult<Vec<String>> {
        let base = base_name.unwrap_or(DEFAULT_BASE_NAME);
        let mut names = Vec::with_capacity(count);

        for i in 1..=count {
            let name = format!("{} {} {}", base, i, unique_suffix());
            self.create_workflow(Some(&name)).await?;
            names.push(name);
            self.app.go_home().await?;
        }

        info!("Created {} workflow(s) from base '{}'", names.len(), base);
        Ok(names)
    }

    /// Create the workflow described by `config`, returning its name
    pub async fn setup_test_workflow(&self, config: TestWorkflowConfig) -> E2eResult<String> {
        match WorkflowSetup::from(config) {
            WorkflowSetup::ImportFile { file, name } => {
                self.create_workflow_from_json_file(&file, name.as_deref())
                    .await
            }
            WorkflowSetup::Nodes { nodes, name } => {
                self.create_workflow_with_nodes(&nodes, name.as_deref())
                    .await
            }
            WorkflowSetup::Plain { name } => self.create_workflow(name.as_deref()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_suffix_shape() {
        let a = unique_suffix();
        let b = unique_suffix();
        assert_eq!(a.len(), 8);
        assert!(a.bytes().all(|c| ID_ALPHABET.contains(&c)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_config_keys_are_camel_case() {
        let config: TestWorkflowConfig = serde_yaml::from_str(
            r#"
name: From File
importFile: Test_9999_SUG_38.json
tags: [smoke]
"#,
        )
        .unwrap();
        assert_eq!(config.import_file.as_deref(), Some("Test_9999_SUG_38.json"));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["importFile"], "Test_9999_SUG_38.json");
        assert!(json.get("import_file").is_none());
    }

    #[test]
    fn test_setup_precedence() {
        let all = TestWorkflowConfig {
            name: Some("N".into()),
            nodes: Some(vec!["Manual Trigger".into()]),
            import_file: Some("f.json".into()),
            tags: vec![],
        };
        assert_eq!(
            WorkflowSetup::from(all.clone()),
            WorkflowSetup::ImportFile {
                file: "f.json".into(),
                name: Some("N".into())
            }
        );

        let nodes = TestWorkflowConfig {
            import_file: None,
            ..all.clone()
        };
        assert!(matches!(WorkflowSetup::from(nodes), WorkflowSetup::Nodes { .. }));

        let empty_nodes = TestWorkflowConfig {
            import_file: None,
            nodes: Some(vec![]),
            ..all
        };
        assert_eq!(
            WorkflowSetup::from(empty_nodes),
            WorkflowSetup::Plain {
                name: Some("N".into())
            }
        );
    }
}
