//! Command-line entry point for brickstore.
//!
//! # Responsibility
//! - Translate `init|invoke|query` command lines into dispatched calls.
//! - Print the returned payload on stdout and failures on stderr.
//!
//! # Invariants
//! - Exit code 0 on success, 1 on call failure, 2 on usage errors.
//! - Config precedence: defaults, `--config` file, `BRICKSTORE_*` env, `--db`.

use brickstore_core::db::open_db;
use brickstore_core::{
    init_logging, CallContext, CoreLogger, Dispatcher, LoggingHandle, StoreConfig,
};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage: brickstore [--config <file>] [--db <path>] <init|invoke|query> [function] [args...]\n       brickstore ping|version";

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Ping,
    Version,
    Call {
        config: Option<PathBuf>,
        db: Option<PathBuf>,
        call: CallContext,
    },
}

/// Converts raw process arguments, rejecting any that are not valid UTF-8.
fn utf8_args<I>(it: I) -> Result<Vec<String>, String>
where
    I: Iterator<Item = OsString>,
{
    it.map(|arg| {
        arg.into_string()
            .map_err(|raw| format!("argument is not valid UTF-8: {}", raw.to_string_lossy()))
    })
    .collect()
}

fn parse_args_from<I>(mut it: I) -> Result<CliCommand, String>
where
    I: Iterator<Item = String>,
{
    let mut config: Option<PathBuf> = None;
    let mut db: Option<PathBuf> = None;

    while let Some(a) = it.next() {
        match a.as_str() {
            "--config" => {
                if config.is_some() {
                    return Err("multiple values provided for --config".to_string());
                }
                config = Some(PathBuf::from(
                    it.next().ok_or("missing value for --config")?,
                ));
            }
            "--db" => {
                if db.is_some() {
                    return Err("multiple values provided for --db".to_string());
                }
                db = Some(PathBuf::from(it.next().ok_or("missing value for --db")?));
            }
            "ping" => return Ok(CliCommand::Ping),
            "version" => return Ok(CliCommand::Version),
            "init" => {
                let call = CallContext::init(it.collect());
                return Ok(CliCommand::Call { config, db, call });
            }
            "invoke" => {
                let function = it.next().ok_or("missing function name for invoke")?;
                let call = CallContext::invoke(function, it.collect());
                return Ok(CliCommand::Call { config, db, call });
            }
            "query" => {
                let function = it.next().ok_or("missing function name for query")?;
                let call = CallContext::query(function, it.collect());
                return Ok(CliCommand::Call { config, db, call });
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown flag: {other}"));
            }
            other => return Err(format!("unknown command: {other}")),
        }
    }

    Err("missing command".to_string())
}

fn load_config(path: Option<PathBuf>, db: Option<PathBuf>) -> Result<StoreConfig, String> {
    let mut config = match path {
        Some(path) => StoreConfig::from_json_file(path)
            .and_then(|file| file.apply_env_overrides(|name| std::env::var(name).ok())),
        None => StoreConfig::from_env(),
    }
    .map_err(|err| err.to_string())?;
    if let Some(db) = db {
        config.db_path = db;
    }
    Ok(config)
}

fn start_logging(config: &StoreConfig) -> Result<Option<LoggingHandle>, String> {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return Ok(None);
    };
    let log_dir = log_dir
        .to_str()
        .ok_or_else(|| format!("log_dir `{}` is not valid UTF-8", log_dir.display()))?;
    init_logging(&config.log_level, log_dir).map(Some)
}

fn run_call(config: &StoreConfig, logger: CoreLogger, call: &CallContext) -> Result<Vec<u8>, String> {
    let mut conn =
        open_db(&config.db_path, &config.db_options(), &logger).map_err(|err| err.to_string())?;
    Dispatcher::from_config(config, logger)
        .invoke(&mut conn, call)
        .map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    let command = match utf8_args(std::env::args_os().skip(1))
        .and_then(|args| parse_args_from(args.into_iter()))
    {
        Ok(command) => command,
        Err(err) => {
            eprintln!("error: {err}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let (config, db, call) = match command {
        CliCommand::Ping => {
            println!("brickstore_core ping={}", brickstore_core::ping());
            return ExitCode::SUCCESS;
        }
        CliCommand::Version => {
            println!("brickstore_core version={}", brickstore_core::core_version());
            return ExitCode::SUCCESS;
        }
        CliCommand::Call { config, db, call } => (config, db, call),
    };

    let config = match load_config(config, db) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    let logging = match start_logging(&config) {
        Ok(logging) => logging,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    let logger = logging
        .as_ref()
        .map(LoggingHandle::logger)
        .unwrap_or_default();

    let result = run_call(&config, logger, &call);
    if let Some(logging) = logging {
        logging.shutdown();
    }

    match result {
        Ok(payload) => {
            if !payload.is_empty() {
                println!("{}", String::from_utf8_lossy(&payload));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
