mod cli;
mod output;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ModuleArgs, VarArgs};
use tfharness::validator::check_required_variables;
use tfharness::{
    HarnessError, ModuleWorkspace, ResourceQuery, RunnerConfig, ScriptPattern, TerraformRunner,
    VariableSchema, extract_facts,
};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.runner_config();
    let isolate = cli.isolate;

    match cli.command {
        Command::Init(args) => {
            TerraformRunner::with_config(args.module_dir, config)
                .init()
                .await?;
            tracing::info!("init complete");
        }
        Command::Apply(args) => {
            let (runner, _workspace) = prepare(&args.module, &args.vars, config, isolate).await?;
            let state = runner.apply(&args.vars.variables()).await?;
            println!("{}", output::render_state(&state, args.format)?);
        }
        Command::CheckVars(args) => {
            let schema = VariableSchema::from_module_dir(&args.module.module_dir)?;
            let (runner, _workspace) = prepare(&args.module, &args.vars, config, isolate).await?;

            let (checks, full) =
                check_required_variables(&runner, &schema, &args.vars.variables()).await;
            println!("{}", output::checks_table(&checks));

            let failed = checks.iter().filter(|(_, error)| error.is_some()).count();
            full?;
            if failed > 0 {
                bail!("{failed} required variable check(s) failed");
            }
            tracing::info!(checked = checks.len(), "required variables verified");
        }
        Command::Extract(args) => {
            let pattern = ScriptPattern::new(&args.pattern)?;
            let (runner, _workspace) = prepare(&args.module, &args.vars, config, isolate).await?;
            let state = runner.apply(&args.vars.variables()).await?;

            let mut query = ResourceQuery::new();
            if let Some(resource_type) = args.resource_type {
                query = query.resource_type(resource_type);
            }
            if let Some(name) = args.name {
                query = query.name(name);
            }
            for (attribute, value) in args.filters {
                query = query.attribute_eq(attribute, value);
            }

            let located = query
                .find(&state)
                .ok_or_else(|| HarnessError::NotFound(query.to_string()))?;
            let script = located
                .instance
                .str_attribute(&args.attribute)
                .map_err(HarnessError::from)?;

            match extract_facts(script, &pattern) {
                Some(facts) => println!("{}", output::facts_table(&facts)),
                None => bail!(
                    "pattern did not match {}.{}",
                    located.resource.address(),
                    args.attribute
                ),
            }
        }
    }

    Ok(())
}

/// Resolves the directory to run in and runs init unless skipped. The workspace, when
/// present, must outlive the runner.
async fn prepare(
    module: &ModuleArgs,
    vars: &VarArgs,
    config: RunnerConfig,
    isolate: bool,
) -> Result<(TerraformRunner, Option<ModuleWorkspace>)> {
    if !module.module_dir.is_dir() {
        return Err(HarnessError::Config(format!(
            "module directory {} does not exist",
            module.module_dir.display()
        ))
        .into());
    }

    let workspace = if isolate {
        Some(ModuleWorkspace::copy_of(&module.module_dir)?)
    } else {
        None
    };
    let dir = workspace
        .as_ref()
        .map(|ws| ws.path().to_path_buf())
        .unwrap_or_else(|| module.module_dir.clone());

    let runner = TerraformRunner::with_config(dir, config);
    if !vars.skip_init {
        runner.init().await?;
    }

    Ok((runner, workspace))
}
