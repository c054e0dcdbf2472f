use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    //file or folder holding the datasets to import
    pub path: PathBuf,

    //TOML job file with connection and import settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    //import a single file into this model, bypassing the file-name pattern
    #[arg(long)]
    pub model: Option<String>,

    //regex matched against importable file names, needs a named group 'module'
    #[arg(long)]
    pub data_regex: Option<String>,

    //regex matched against product image file names, needs a named group 'default_code'
    #[arg(long)]
    pub image_regex: Option<String>,

    //max rows sent to the server in one import request
    #[arg(short, long)]
    pub max_batch_size: Option<usize>,

    //drop rows whose external id already exists on the server before uploading
    #[arg(long)]
    pub skip_existing: bool,

    //skip files whose modification time matches the remote timestamp cache
    #[arg(long)]
    pub check_timestamps: bool,

    //server base url. Falls back to the job file, then ODOO_HOST
    #[arg(long)]
    pub host: Option<String>,

    //database name. Falls back to the job file, then ODOO_DB
    #[arg(long)]
    pub db: Option<String>,

    //login user. Falls back to the job file, then ODOO_USER
    #[arg(long)]
    pub user: Option<String>,

    //login password. Falls back to the job file, then ODOO_PASSWORD
    #[arg(long)]
    pub password: Option<String>,

    //seconds to keep polling an unreachable server before giving up
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    //write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(value_enum, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}
