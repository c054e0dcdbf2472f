use std::panic;
use std::path::Path;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_panic::panic_hook;

use odoo_importer::args::{Cli, LogLevel};
use odoo_importer::constants::{DEFAULT_BATCH_SIZE, DEFAULT_LOGIN_TIMEOUT, TOOL_NAME};
use odoo_importer::core::config::{get_configuration, ConfigFile, DEFAULT_DATA_REGEX};
use odoo_importer::core::dataset::Dataset;
use odoo_importer::core::errors::ImportError;
use odoo_importer::core::run::{import_dataset, run_import, RunOptions};
use odoo_importer::rpc::session::{wait_for_login, ConnectionInfo};
use odoo_importer::utils::ensure_env_var;
use odoo_importer::S;

fn main() {
    let cli = Cli::parse();
    let _log_guard = setup_logging(&cli);
    panic::set_hook(Box::new(panic_hook));
    info!("{} {}", TOOL_NAME, env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(&cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => get_configuration(path)?,
        None => ConfigFile::default(),
    };

    let connection = connection_info(cli, &config)?;
    let timeout = cli
        .wait_timeout
        .or(config.connection.wait_timeout)
        .unwrap_or(DEFAULT_LOGIN_TIMEOUT);
    let session = wait_for_login(&connection, timeout)?;

    let options = RunOptions {
        max_batch_size: cli
            .max_batch_size
            .or(config.import.max_batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE),
        skip_existing: cli.skip_existing || config.import.skip_existing,
        check_timestamps: cli.check_timestamps || config.import.check_timestamps,
    };
    if let Some(model) = &cli.model {
        let dataset = Dataset::new(cli.path.clone(), model.clone());
        import_dataset(&session, &dataset, options)?;
        info!("Import finished");
        return Ok(());
    }

    let data_regex = cli
        .data_regex
        .clone()
        .or_else(|| config.import.data_regex.clone())
        .unwrap_or_else(|| S!(DEFAULT_DATA_REGEX));
    let image_regex = cli
        .image_regex
        .clone()
        .or_else(|| config.import.image_regex.clone());

    run_import(
        &session,
        &cli.path,
        &data_regex,
        image_regex.as_deref(),
        options,
    )?;
    info!("Import finished");
    Ok(())
}

/// CLI flags shadow the job file, which shadows the environment.
fn connection_info(cli: &Cli, config: &ConfigFile) -> Result<ConnectionInfo, ImportError> {
    let field = |flag: &Option<String>, file: &Option<String>, var: &str| match flag
        .clone()
        .or_else(|| file.clone())
    {
        Some(value) => Ok(value),
        None => ensure_env_var(var),
    };
    Ok(ConnectionInfo {
        host: field(&cli.host, &config.connection.host, "ODOO_HOST")?,
        db: field(&cli.db, &config.connection.db, "ODOO_DB")?,
        user: field(&cli.user, &config.connection.user, "ODOO_USER")?,
        password: field(&cli.password, &config.connection.password, "ODOO_PASSWORD")?,
    })
}

fn setup_logging(cli: &Cli) -> Option<WorkerGuard> {
    let level = match cli.log_level {
        LogLevel::TRACE => LevelFilter::TRACE,
        LogLevel::DEBUG => LevelFilter::DEBUG,
        LogLevel::INFO => LevelFilter::INFO,
        LogLevel::WARN => LevelFilter::WARN,
        LogLevel::ERROR => LevelFilter::ERROR,
    };
    match &cli.log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if parent != Path::new("") => parent,
                _ => Path::new("."),
            };
            let file_name = path.file_name().map(|n| n.to_string_lossy().to_string());
            let appender = tracing_appender::rolling::never(
                dir,
                file_name.unwrap_or_else(|| format!("{}.log", TOOL_NAME)),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(writer)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .expect("Unable to set default tracing subscriber");
            Some(guard)
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .expect("Unable to set default tracing subscriber");
            None
        }
    }
}
