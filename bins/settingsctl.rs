use std::process::ExitCode;

use anyhow::anyhow;
use dotenvy::dotenv;
use serde_json::Value;
use settings::{CacheOptions, JsonCodec, JsonFilePreferenceStore, SettingsCache};
use tracing::{error, info};
use uuid::Uuid;

const USAGE: &str = "usage: settingsctl get <key> | set <key> <json> | rm <key>";

#[derive(Debug, PartialEq)]
enum Command {
    Get(String),
    Set(String, Value),
    Remove(String),
}

fn init_logging() {
    // Load .env first so RUST_LOG / CONFIG_PATH / SETTINGS_STORE_PATH apply
    dotenv().ok();
    common::utils::logging::init_logging_default();
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [cmd, key] if cmd == "get" => Ok(Command::Get(key.clone())),
        [cmd, key] if cmd == "rm" => Ok(Command::Remove(key.clone())),
        [cmd, key, raw] if cmd == "set" => {
            // Anything that is not valid JSON is stored as a plain string
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            Ok(Command::Set(key.clone(), value))
        }
        _ => Err(anyhow!(USAGE)),
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let cfg = configs::AppConfig::load_and_validate()?;
    common::env::ensure_parent_dir(&cfg.store.path).await?;

    let store = JsonFilePreferenceStore::open(&cfg.store.path).await?;
    let path = store.path().display().to_string();
    let cache = SettingsCache::with_codec(
        store,
        JsonCodec::new(cfg.store.pretty),
        CacheOptions { warm_on_read: cfg.cache.warm_on_read },
    );

    match command {
        Command::Get(key) => {
            let value = cache
                .load::<Value>(&key)
                .await?
                .ok_or_else(|| anyhow!("no setting stored under `{key}`"))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Set(key, value) => {
            cache.save(&key, &value).await?;
            info!(event = "set", %key, %path, "setting saved");
        }
        Command::Remove(key) => {
            cache.remove(&key).await;
            info!(event = "rm", %key, %path, "setting removed");
        }
    }

    cache.flush().await?;
    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let run_id = Uuid::new_v4();
    std::panic::set_hook(Box::new(move |info| {
        error!(service = "settingsctl", event = "panic", %run_id, message = %info, "unhandled panic occurred");
    }));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "settingsctl", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(service = "settingsctl", event = "run_failed", %run_id, error = %e, "settings command failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_commands() -> anyhow::Result<()> {
        assert_eq!(parse_args(&args(&["get", "theme"]))?, Command::Get("theme".into()));
        assert_eq!(parse_args(&args(&["rm", "theme"]))?, Command::Remove("theme".into()));
        assert_eq!(
            parse_args(&args(&["set", "user", r#"{"name":"Ann","age":30}"#]))?,
            Command::Set("user".into(), json!({"name": "Ann", "age": 30}))
        );
        Ok(())
    }

    #[test]
    fn set_falls_back_to_plain_string() -> anyhow::Result<()> {
        assert_eq!(
            parse_args(&args(&["set", "theme", "dark"]))?,
            Command::Set("theme".into(), json!("dark"))
        );
        Ok(())
    }

    #[test]
    fn bad_usage_is_rejected() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["get"])).is_err());
        assert!(parse_args(&args(&["set", "k"])).is_err());
        assert!(parse_args(&args(&["drop", "k"])).is_err());
    }
}
