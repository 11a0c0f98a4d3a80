use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use uuid::Uuid;

use super::{TerraformError, TerraformState};

const DEFAULT_BINARY: &str = "terraform";
const TF_VAR_PREFIX: &str = "TF_VAR_";

static MISSING_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"input\s+variable\s+"([^"]+)"\s+is\s+not\s+set"#)
        .expect("valid missing-variable regex")
});

/// Variable name to value, passed to terraform as `TF_VAR_<name>`.
pub type Variables = BTreeMap<String, String>;

#[derive(Clone)]
pub struct RunnerConfig {
    pub binary: PathBuf,
    pub plugin_cache_dir: Option<PathBuf>,
    /// Extra environment for every terraform invocation (e.g. provider credentials).
    pub env: BTreeMap<String, String>,
}

impl RunnerConfig {
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    /// `<cache dir>/tfharness/plugins`, shared by every module so providers download once.
    pub fn default_plugin_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("tfharness").join("plugins"))
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            plugin_cache_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("binary", &self.binary)
            .field("plugin_cache_dir", &self.plugin_cache_dir)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Something that can turn a variable set into a decoded state.
#[async_trait]
pub trait ApplyWorkflow: Send + Sync {
    async fn apply(&self, variables: &Variables) -> Result<TerraformState, TerraformError>;
}

/// Drives `terraform init` / `terraform apply` for one module directory.
///
/// Every apply writes to its own throwaway state file, so runs never build on each other.
/// Runners must not share a module directory with another runner that is applying
/// concurrently; see [`crate::ModuleWorkspace`].
#[derive(Debug, Clone)]
pub struct TerraformRunner {
    module_dir: PathBuf,
    config: RunnerConfig,
}

impl TerraformRunner {
    pub fn new(module_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(module_dir, RunnerConfig::default())
    }

    pub fn with_config(module_dir: impl Into<PathBuf>, config: RunnerConfig) -> Self {
        Self {
            module_dir: module_dir.into(),
            config,
        }
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub async fn init(&self) -> Result<(), TerraformError> {
        tracing::info!(module = %self.module_dir.display(), "terraform init");

        let output = self
            .command()
            .await?
            .args(["init", "-input=false", "-no-color"])
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(TerraformError::InitFailed {
                diagnostics: diagnostics(&output),
            });
        }

        tracing::debug!(module = %self.module_dir.display(), "terraform init complete");
        Ok(())
    }

    pub async fn apply(&self, variables: &Variables) -> Result<TerraformState, TerraformError> {
        let state_file = format!("{}.tfstate", Uuid::new_v4());
        let state_path = self.module_dir.join(&state_file);

        tracing::info!(
            module = %self.module_dir.display(),
            variables = ?variables.keys().collect::<Vec<_>>(),
            "terraform apply"
        );

        let mut command = self.command().await?;
        command
            .args([
                "apply",
                "-compact-warnings",
                "-input=false",
                "-auto-approve",
                "-no-color",
            ])
            .arg(format!("-state={state_file}"));
        for (name, value) in variables {
            command.env(format!("{TF_VAR_PREFIX}{name}"), value);
        }

        let result = match command.output().await {
            Ok(output) if output.status.success() => read_state(&state_path).await,
            Ok(output) => Err(classify_failure(&output)),
            Err(e) => Err(self.spawn_error(e)),
        };

        remove_state_files(&state_path).await;

        match &result {
            Ok(state) => tracing::debug!(
                resources = state.resources.len(),
                instances = state.instance_count(),
                "terraform apply complete"
            ),
            Err(e) => tracing::debug!(error = %e, "terraform apply failed"),
        }

        result
    }

    async fn command(&self) -> Result<Command, TerraformError> {
        let mut command = Command::new(&self.config.binary);
        command
            .current_dir(&self.module_dir)
            .env("TF_IN_AUTOMATION", "1")
            .kill_on_drop(true);

        // Only the explicit variable set may reach the module.
        for key in ambient_tf_vars() {
            command.env_remove(key);
        }

        if let Some(cache) = &self.config.plugin_cache_dir {
            tokio::fs::create_dir_all(cache).await?;
            command.env("TF_PLUGIN_CACHE_DIR", cache);
        }

        command.envs(&self.config.env);
        Ok(command)
    }

    fn spawn_error(&self, source: std::io::Error) -> TerraformError {
        TerraformError::Spawn {
            binary: self.config.binary.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl ApplyWorkflow for TerraformRunner {
    async fn apply(&self, variables: &Variables) -> Result<TerraformState, TerraformError> {
        TerraformRunner::apply(self, variables).await
    }
}

fn ambient_tf_vars() -> Vec<OsString> {
    std::env::vars_os()
        .map(|(key, _)| key)
        .filter(|key| key.to_string_lossy().starts_with(TF_VAR_PREFIX))
        .collect()
}

async fn read_state(path: &Path) -> Result<TerraformState, TerraformError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        TerraformError::MalformedState(format!(
            "state file {} not readable: {}",
            path.display(),
            e
        ))
    })?;
    TerraformState::decode(&raw)
}

async fn remove_state_files(path: &Path) {
    let backup = PathBuf::from(format!("{}.backup", path.display()));
    for file in [path, backup.as_path()] {
        match tokio::fs::remove_file(file).await {
            Ok(()) => tracing::trace!(file = %file.display(), "removed state file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file = %file.display(), error = %e, "failed to remove state file"),
        }
    }
}

fn diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    }
}

fn classify_failure(output: &Output) -> TerraformError {
    classify_diagnostics(diagnostics(output))
}

fn classify_diagnostics(diagnostics: String) -> TerraformError {
    match MISSING_VARIABLE.captures(&diagnostics) {
        Some(caps) => TerraformError::MissingVariable {
            name: caps[1].to_string(),
        },
        None => TerraformError::ApplyFailed { diagnostics },
    }
}
