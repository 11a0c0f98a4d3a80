mod args;

pub use args::{Cli, Command, ModuleArgs, OutputFormat, VarArgs};
