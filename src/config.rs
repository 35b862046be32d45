mod commandline;
mod defaults;
mod file;
mod primitives;

use std::path::PathBuf;

use clap::Parser;

use commandline::{Args, Output};
use defaults::Defaults;

pub(crate) use commandline::{DatabaseOperation, Operation};
pub(crate) use file::{ConfigFile as Configuration, Database, Tracing};
pub(crate) use primitives::LogFormat;

/// A fully merged configuration, plus the operation to run with it
#[derive(Debug)]
pub struct KpiMigrateConfiguration {
    pub(crate) config: Configuration,
    pub(crate) operation: Operation,
}

pub(crate) fn configure() -> color_eyre::Result<KpiMigrateConfiguration> {
    configure_with(Args::parse())
}

#[cfg(test)]
pub(crate) fn configure_from(args: &[&str]) -> KpiMigrateConfiguration {
    let args = Args::try_parse_from(std::iter::once("kpi-migrate").chain(args.iter().copied()))
        .expect("Valid arguments");

    configure_with(args).expect("Valid configuration")
}

fn configure_with(args: Args) -> color_eyre::Result<KpiMigrateConfiguration> {
    let Output {
        config_format,
        operation,
        save_to,
        config_file,
    } = args.into_output();

    let config = build(config_file, &config_format)?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(KpiMigrateConfiguration { config, operation })
}

fn build(
    config_file: Option<PathBuf>,
    overrides: &impl serde::Serialize,
) -> color_eyre::Result<Configuration> {
    let base_config =
        config::Config::builder().add_source(config::Config::try_from(&Defaults::default())?);

    let base_config = if let Some(config_file) = config_file {
        base_config.add_source(config::File::from(config_file))
    } else {
        base_config
    };

    let built = base_config
        .add_source(config::Environment::with_prefix("KPI_MIGRATE").separator("__"))
        .add_source(config::Config::try_from(overrides)?)
        .build()?;

    Ok(built.try_deserialize()?)
}
