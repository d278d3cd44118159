use std::{process, sync::Arc};

use corpsite::{
    application::{
        error::AppError,
        plan::{PlanService, check_tag, tag_catalogue},
        repos::DivisionDirectory,
    },
    cache::{CacheConfig, InvalidationRouter, TagCache},
    config,
    infra::{db::PostgresRepositories, memory::StaticDivisions, telemetry},
};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Tags(config::TagsArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Plan(args) => run_plan(settings, args).await,
        config::Command::Tags(args) => run_tags(args).await,
    }
}

async fn run_plan(settings: config::Settings, args: config::PlanArgs) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let divisions = init_divisions(&settings, &args).await?;
    let cache: Arc<TagCache<String>> = Arc::new(TagCache::new(&cache_config));
    let router = Arc::new(InvalidationRouter::new(divisions, cache));
    let service = PlanService::new(cache_config, router);

    let planned = match args.input.as_ref() {
        Some(path) => {
            info!(path = %path.display(), "Planning changes from file");
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|err| AppError::Infra(err.into()))?;
            service.plan_lines(BufReader::new(file)).await?
        }
        None => service.plan_lines(BufReader::new(tokio::io::stdin())).await?,
    };

    let mut stdout = tokio::io::stdout();
    for change in &planned {
        let mut line = serde_json::to_string(change)
            .map_err(|err| AppError::unexpected(format!("failed to encode plan: {err}")))?;
        line.push('\n');
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|err| AppError::Infra(err.into()))?;
    }
    stdout
        .flush()
        .await
        .map_err(|err| AppError::Infra(err.into()))?;

    info!(changes = planned.len(), "Plan completed");
    Ok(())
}

async fn run_tags(args: config::TagsArgs) -> Result<(), AppError> {
    let lines = if args.names.is_empty() {
        tag_catalogue()
    } else {
        args.names
            .iter()
            .map(|name| check_tag(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut stdout = tokio::io::stdout();
    for line in lines {
        stdout
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|err| AppError::Infra(err.into()))?;
    }
    stdout
        .flush()
        .await
        .map_err(|err| AppError::Infra(err.into()))
}

async fn init_divisions(
    settings: &config::Settings,
    args: &config::PlanArgs,
) -> Result<Arc<dyn DivisionDirectory>, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        let mut divisions = StaticDivisions::default();
        for (id, slug) in &args.divisions {
            divisions.insert(*id, slug.as_str());
        }
        info!(divisions = divisions.len(), "Using static division map");
        return Ok(Arc::new(divisions));
    };

    if !args.divisions.is_empty() {
        warn!("--division values are ignored when a database is configured");
    }

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::Infra(err.into()))?;
    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::Infra(err.into()))?;

    Ok(Arc::new(repositories.divisions()))
}
