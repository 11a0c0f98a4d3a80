use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use tfharness::{RunnerConfig, Variables};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Terraform executable to run
    #[arg(
        long,
        global = true,
        env = "TFHARNESS_TERRAFORM_BIN",
        default_value = "terraform"
    )]
    pub terraform_bin: PathBuf,

    /// Share downloaded providers through the user cache directory
    #[arg(long, global = true, env = "TFHARNESS_PLUGIN_CACHE")]
    pub plugin_cache: bool,

    /// Run against a private temporary copy of the module directory
    #[arg(long, global = true)]
    pub isolate: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::with_binary(self.terraform_bin.clone());
        if self.plugin_cache {
            config.plugin_cache_dir = RunnerConfig::default_plugin_cache_dir();
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prepare a module directory (terraform init)
    Init(ModuleArgs),
    /// Apply a module and print the resulting state
    Apply(ApplyArgs),
    /// Check that every required variable is actually required
    CheckVars(CheckVarsArgs),
    /// Apply a module and extract named facts from a generated script
    Extract(ExtractArgs),
}

#[derive(clap::Args, Debug)]
pub struct ModuleArgs {
    pub module_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct VarArgs {
    /// Input variable, repeatable
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Skip terraform init before applying
    #[arg(long)]
    pub skip_init: bool,
}

impl VarArgs {
    pub fn variables(&self) -> Variables {
        self.vars.iter().cloned().collect()
    }
}

#[derive(clap::Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub module: ModuleArgs,

    #[command(flatten)]
    pub vars: VarArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub struct CheckVarsArgs {
    #[command(flatten)]
    pub module: ModuleArgs,

    #[command(flatten)]
    pub vars: VarArgs,
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub module: ModuleArgs,

    #[command(flatten)]
    pub vars: VarArgs,

    #[arg(long = "type")]
    pub resource_type: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    /// Attribute equality filter, repeatable
    #[arg(long = "where", value_name = "ATTR=VALUE", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// Attribute holding the script text
    #[arg(long, default_value = "script")]
    pub attribute: String,

    /// Regex with named groups; compiled multi-line and dot-all
    #[arg(long)]
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Tree,
    Table,
    Json,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid '{}' (expected NAME=VALUE)", raw)),
    }
}
