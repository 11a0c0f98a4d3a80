//! Required-variable sweep.
//!
//! For each required variable the module is applied once with only that variable removed
//! and must fail naming it; then the full set must apply cleanly. Combinations of two or
//! more missing variables are not exercised.

use thiserror::Error;

use crate::terraform::{ApplyWorkflow, TerraformError, TerraformState, Variables, VariableSchema};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("variable {name} is declared required but no value was supplied in the valid set")]
    NotInValidSet { name: String },

    #[error("{name} is not a required variable but it's set as required")]
    NotRequired { name: String },

    #[error("removing {expected} reported missing variable {actual} instead")]
    WrongVariable { expected: String, actual: String },

    #[error("removing {name} failed for another reason: {source}")]
    UnexpectedFailure {
        name: String,
        #[source]
        source: TerraformError,
    },

    #[error("apply with the full variable set failed: {0}")]
    ValidSetFailed(#[source] TerraformError),
}

/// Outcome of one removal check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableCheck {
    pub name: String,
    pub passed: bool,
}

/// Runs the sweep and returns the state produced by the full variable set.
///
/// Stops at the first failed check.
pub async fn assert_required_variables<W>(
    workflow: &W,
    schema: &VariableSchema,
    valid: &Variables,
) -> Result<TerraformState, ValidationError>
where
    W: ApplyWorkflow + ?Sized,
{
    for decl in schema.required() {
        check_variable(workflow, &decl.name, valid).await?;
    }

    tracing::info!("applying with full variable set");
    workflow
        .apply(valid)
        .await
        .map_err(ValidationError::ValidSetFailed)
}

/// Runs every removal check and the full apply without stopping, for reporting.
pub async fn check_required_variables<W>(
    workflow: &W,
    schema: &VariableSchema,
    valid: &Variables,
) -> (Vec<(VariableCheck, Option<ValidationError>)>, Result<TerraformState, ValidationError>)
where
    W: ApplyWorkflow + ?Sized,
{
    let mut checks = Vec::new();
    for decl in schema.required() {
        let result = check_variable(workflow, &decl.name, valid).await;
        let check = VariableCheck {
            name: decl.name.clone(),
            passed: result.is_ok(),
        };
        checks.push((check, result.err()));
    }

    let full = workflow
        .apply(valid)
        .await
        .map_err(ValidationError::ValidSetFailed);
    (checks, full)
}

async fn check_variable<W>(workflow: &W, name: &str, valid: &Variables) -> Result<(), ValidationError>
where
    W: ApplyWorkflow + ?Sized,
{
    if !valid.contains_key(name) {
        return Err(ValidationError::NotInValidSet {
            name: name.to_string(),
        });
    }

    let mut without = valid.clone();
    without.remove(name);

    tracing::info!(variable = name, "applying without required variable");

    match workflow.apply(&without).await {
        Err(TerraformError::MissingVariable { name: actual }) if actual == name => {
            tracing::debug!(variable = name, "missing variable reported as expected");
            Ok(())
        }
        Err(TerraformError::MissingVariable { name: actual }) => Err(ValidationError::WrongVariable {
            expected: name.to_string(),
            actual,
        }),
        Err(source) => Err(ValidationError::UnexpectedFailure {
            name: name.to_string(),
            source,
        }),
        Ok(_) => Err(ValidationError::NotRequired {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terraform::VariableDecl;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Evaluates like a module with the given required variables.
    struct FakeModule {
        required: Vec<&'static str>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeModule {
        fn new(required: Vec<&'static str>) -> Self {
            Self {
                required,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ApplyWorkflow for FakeModule {
        async fn apply(&self, variables: &Variables) -> Result<TerraformState, TerraformError> {
            self.calls
                .lock()
                .unwrap()
                .push(variables.keys().cloned().collect());
            if let Some(missing) = self.required.iter().find(|r| !variables.contains_key(**r)) {
                return Err(TerraformError::MissingVariable {
                    name: missing.to_string(),
                });
            }
            TerraformState::decode(r#"{"resources": []}"#)
        }
    }

    fn schema(names: &[(&str, bool)]) -> VariableSchema {
        VariableSchema::new(
            names
                .iter()
                .map(|(name, required)| VariableDecl {
                    name: name.to_string(),
                    required: *required,
                })
                .collect(),
        )
    }

    fn valid() -> Variables {
        Variables::from([
            ("agent_id".to_string(), "foo".to_string()),
            ("resource_id".to_string(), "bar".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_sweep_passes_one_variable_at_a_time() {
        let module = FakeModule::new(vec!["agent_id", "resource_id"]);
        let schema = schema(&[
            ("agent_id", true),
            ("resource_id", true),
            ("admin_username", false),
        ]);

        assert_required_variables(&module, &schema, &valid())
            .await
            .unwrap();

        let calls = module.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                vec!["resource_id".to_string()],
                vec!["agent_id".to_string()],
                vec!["agent_id".to_string(), "resource_id".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_detects_variable_that_is_not_required() {
        let module = FakeModule::new(vec!["agent_id"]);
        let schema = schema(&[("agent_id", true), ("resource_id", true)]);

        let err = assert_required_variables(&module, &schema, &valid())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotRequired { ref name } if name == "resource_id"));
        assert_eq!(
            err.to_string(),
            "resource_id is not a required variable but it's set as required"
        );
    }

    #[tokio::test]
    async fn test_sweep_detects_wrong_variable_reported() {
        let module = FakeModule::new(vec!["token", "agent_id"]);
        let schema = schema(&[("agent_id", true)]);
        let err = assert_required_variables(&module, &schema, &valid())
            .await
            .unwrap_err();
        match err {
            ValidationError::WrongVariable { expected, actual } => {
                assert_eq!(expected, "agent_id");
                assert_eq!(actual, "token");
            }
            other => panic!("expected WrongVariable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_required_variable_absent_from_valid_set() {
        let module = FakeModule::new(vec![]);
        let schema = schema(&[("workspace_id", true)]);

        let err = assert_required_variables(&module, &schema, &valid())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotInValidSet { .. }));
        assert!(module.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_reports_every_variable() {
        let module = FakeModule::new(vec!["agent_id"]);
        let schema = schema(&[("agent_id", true), ("resource_id", true)]);

        let (checks, full) = check_required_variables(&module, &schema, &valid()).await;
        let summary: Vec<(String, bool)> = checks
            .iter()
            .map(|(check, _)| (check.name.clone(), check.passed))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("agent_id".to_string(), true),
                ("resource_id".to_string(), false)
            ]
        );
        assert!(full.is_ok());
    }
}
