//! Built-in configuration listing.

use cadence_config::{STAGE_KINDS, builtin_configs, get_builtin};
use clap::Args;

#[derive(Args)]
pub struct ConfigsArgs {
    /// Print one built-in config as TOML
    #[arg(value_name = "NAME")]
    name: Option<String>,
}

pub fn run(args: ConfigsArgs) -> anyhow::Result<()> {
    if let Some(name) = args.name {
        let Some(config) = get_builtin(&name) else {
            anyhow::bail!("no built-in config named '{name}'");
        };
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    println!("Built-in Configs");
    println!("================\n");
    for config in builtin_configs() {
        println!("  {:<20} {}", config.name, config.stage_kinds().join(" -> "));
        if let Some(description) = &config.description {
            println!("  {:<20} {description}", "");
        }
    }

    println!("\nStage Kinds");
    println!("===========\n");
    for kind in STAGE_KINDS {
        println!("  {kind}");
    }
    Ok(())
}
