use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Parser;
use netilion_client::config::cli::{CliConfig, Command};
use netilion_client::domain::model::{
    parse_timestamp, Asset, AssetValue, AssetValues, Unit, WebHook,
};
use netilion_client::utils::error::ErrorSeverity;
use netilion_client::utils::{logger, validation::Validate};
use netilion_client::{ApiObject, ConfigurationParameters, NetilionClient, NetilionError};
use serde_json::{json, Value};

fn list<T: ApiObject>(items: &[T]) -> Value {
    Value::Array(items.iter().map(ApiObject::to_api_json).collect())
}

fn optional<T: ApiObject>(item: Option<T>) -> Value {
    item.map(|item| item.to_api_json()).unwrap_or(Value::Null)
}

/// Accepts RFC 3339 or a zone-less `YYYY-MM-DDTHH:MM:SS`, read as UTC.
fn parse_cli_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = parse_timestamp(raw) {
        return Ok(ts);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("'{}' is not a timestamp", raw))?;
    Ok(naive.and_utc())
}

fn load_configuration(cli: &CliConfig) -> netilion_client::Result<ConfigurationParameters> {
    match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            ConfigurationParameters::from_file(path)
        }
        None => {
            tracing::info!("📁 Loading configuration from NETILION_* environment variables");
            ConfigurationParameters::from_env()
        }
    }
}

async fn run(client: &NetilionClient, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Applications => list(&client.get_applications().await?),
        Command::Me => client.get_my_application().await?.to_api_json(),
        Command::Assets => list(&client.get_assets().await?),
        Command::Asset { id } => client.get_asset(id).await?.to_api_json(),
        Command::FindAsset { serial_number } => optional(client.find_asset(&serial_number).await?),
        Command::Values { asset_id } => list(&client.get_asset_values(asset_id).await?),
        Command::PushValue {
            asset,
            key,
            unit,
            value,
            timestamp,
        } => {
            let unit = Unit::by_code(&unit).unwrap_or_else(|| {
                tracing::warn!("Unit code {} is not one of the known codes", unit);
                Unit::with_code(unit)
            });
            let timestamp = match timestamp {
                Some(raw) => parse_cli_timestamp(&raw)?,
                None => Utc::now(),
            };
            let values = AssetValues::new(
                Asset::new(asset),
                vec![AssetValue::new(key, unit, value).at(timestamp)],
            );
            client.push_asset_values(&values).await?;
            json!({"pushed": values.to_api_json()})
        }
        Command::History {
            asset_id,
            key,
            from,
            to,
        } => {
            let from = parse_cli_timestamp(&from)?;
            let to = parse_cli_timestamp(&to)?;
            let (values, pagination) = client
                .get_asset_values_history(asset_id, &key, from, to)
                .await?;
            json!({"data": list(&values), "pagination": pagination.to_api_json()})
        }
        Command::Units { code } => optional(client.find_unit(&code).await?),
        Command::Webhooks => list(&client.get_webhooks().await?),
        Command::CreateWebhook { url, event_types } => client
            .set_webhook(&WebHook::new(url, event_types))
            .await?
            .to_api_json(),
        Command::DeleteWebhook { id } => {
            let webhook = client.get_webhook(id).await?.with_id(id);
            client.delete_webhook(&webhook).await?;
            json!({"deleted": id})
        }
    };
    Ok(output)
}

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report(e: &NetilionError) -> i32 {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    exit_code(e.severity())
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();
    let logging = if cli.json_logs {
        logger::init_json_logger()
    } else {
        logger::init_cli_logger(cli.verbose)
    };
    if let Err(e) = logging {
        eprintln!("⚠️ Logging is unavailable: {}", e);
    }
    tracing::info!("Starting netilion CLI");

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => std::process::exit(report(&e)),
    };
    if cli.verbose {
        tracing::debug!("Configuration: {:?}", config);
    }
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed");
        std::process::exit(report(&e));
    }

    let client = match NetilionClient::new(config) {
        Ok(client) => client,
        Err(e) => std::process::exit(report(&e)),
    };

    match run(&client, cli.command).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => std::process::exit(report(&NetilionError::from(e))),
        },
        Err(e) => {
            let code = match e.downcast_ref::<NetilionError>() {
                Some(netilion_error) => report(netilion_error),
                None => {
                    tracing::error!("❌ {:#}", e);
                    eprintln!("❌ {:#}", e);
                    2
                }
            };
            if code > 0 {
                std::process::exit(code);
            }
        }
    }
}
