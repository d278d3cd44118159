use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::entities::EntityId;

/// Command-line arguments for the Corpsite binary.
#[derive(Debug, Parser)]
#[command(
    name = "corpsite",
    version,
    about = "Corpsite content cache invalidation tools"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CORPSITE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compute the cache tags for a stream of content changes (dry run).
    Plan(PlanArgs),
    /// Print the collection-wide tag catalogue, or check tag names.
    Tags(TagsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Enable or disable cache invalidation.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of changes consumed per batch.
    #[arg(long = "cache-consume-batch-limit", value_name = "COUNT")]
    pub consume_batch_limit: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub cache: CacheOverrides,

    /// JSON-lines file of change envelopes; reads stdin when omitted.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Known division as `ID=SLUG`; used when no database is configured.
    #[arg(long = "division", value_name = "ID=SLUG", value_parser = parse_division)]
    pub divisions: Vec<(EntityId, String)>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct TagsArgs {
    /// Tag names to parse and print in canonical form.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,
}

fn parse_division(value: &str) -> Result<(EntityId, String), String> {
    let (id, slug) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=SLUG, got `{value}`"))?;
    let id = id
        .trim()
        .parse::<EntityId>()
        .map_err(|err| format!("invalid division id `{id}`: {err}"))?;
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(format!("division {id} has an empty slug"));
    }
    Ok((id, slug.to_string()))
}
