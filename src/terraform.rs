mod error;
mod runner;
mod schema;
mod state;
mod value;

pub use error::TerraformError;
pub use runner::{ApplyWorkflow, RunnerConfig, TerraformRunner, Variables};
pub use schema::{VariableDecl, VariableSchema};
pub use state::{Instance, Resource, ResourceMode, StateOutput, TerraformState};
pub use value::{AttributeValue, ValueError};
