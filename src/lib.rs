//! tfharness - Terraform module test harness
//!
//! Applies a module with a given variable set, decodes the resulting state, and inspects the
//! scripts it generates without running them.

pub mod extract;
pub mod locator;
pub mod terraform;
pub mod validator;

mod error;
mod workspace;

pub use error::HarnessError;
pub use extract::{Facts, LineMatcher, ScriptPattern, extract_facts, normalized_lines};
pub use locator::{Located, ResourceQuery, find, find_resource_instance};
pub use terraform::{
    ApplyWorkflow, AttributeValue, RunnerConfig, TerraformError, TerraformRunner, TerraformState,
    Variables, VariableSchema,
};
pub use validator::{ValidationError, assert_required_variables};
pub use workspace::ModuleWorkspace;
