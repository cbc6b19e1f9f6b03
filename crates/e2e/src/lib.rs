//! Flowtest E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E testing framework for the
//! workflow editor UI that:
//! - Declares per-test requirements (feature flags, intercepts, storage,
//!   an imported workflow) and applies them before the test body
//! - Composes multi-step user journeys over page objects
//! - Controls Playwright through a long-lived node driver speaking JSON lines
//! - Parses declarative YAML scenarios
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── Driver::open_page() -> Arc<dyn Page>                 │
//! │    ├── setup_test_requirements(app, features, reqs)         │
//! │    │     1. feature flags   (FeatureControl)                │
//! │    │     2. intercepts      (Page::route)                   │
//! │    │     3. local storage   (Page::seed_local_storage)      │
//! │    │     4. workflow import (CanvasPage::import_workflow)   │
//! │    └── run_step(app, step) -> pass | fail | skip            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WorkflowComposer                                           │
//! │    ├── execute_workflow_and_wait_for_notification           │
//! │    ├── create_workflow / create_workflow_from_json_file     │
//! │    ├── create_workflow_with_nodes                           │
//! │    ├── create_multiple_workflows                            │
//! │    └── setup_test_workflow(TestWorkflowConfig)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (trait)                                               │
//! │    ├── PlaywrightSession  node + playwright, JSON lines     │
//! │    └── RecordingPage      in-process, records actions       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod composer;
pub mod error;
pub mod expect;
pub mod intercept;
pub mod locator;
pub mod page;
pub mod pages;
pub mod playwright;
pub mod recording;
pub mod requirements;
pub mod runner;
pub mod scenario;

pub use backend::{BackendApi, FeatureControl};
pub use composer::{TestWorkflowConfig, WorkflowComposer};
pub use error::{E2eError, E2eResult};
pub use intercept::InterceptRule;
pub use locator::Locator;
pub use page::Page;
pub use pages::AppPage;
pub use requirements::{setup_test_requirements, TestRequirements};
pub use runner::TestRunner;
pub use scenario::{Scenario, Step};
