use std::env;

use buzzapi_client::{BuzzApiClient, BuzzApiConfig};
use serde_json::{Map, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Which call to make, e.g. `central.iam.gted.accounts search '{"gtid": "900000000"}'`.
const ENV_RESOURCE: &str = "BUZZAPI_RESOURCE";
const ENV_OPERATION: &str = "BUZZAPI_OPERATION";
const ENV_PAYLOAD: &str = "BUZZAPI_PAYLOAD";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let default_log_filter = "info,buzzapi_client=debug,admission_limiter=info";
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter)),
        )
        .init();

    if dotenvy::dotenv().is_ok() {
        info!(".env file loaded successfully.");
    } else {
        info!("No .env file found. Proceeding with environment variables or defaults.");
    }

    let config = BuzzApiConfig::from_env()?;
    let client = BuzzApiClient::new(config)?;

    let resource = env::var(ENV_RESOURCE)
        .map_err(|_| format!("Required environment variable '{}' not set", ENV_RESOURCE))?;
    let operation = env::var(ENV_OPERATION)
        .map_err(|_| format!("Required environment variable '{}' not set", ENV_OPERATION))?;
    let payload: Map<String, Value> = match env::var(ENV_PAYLOAD) {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(_) => Map::new(),
    };

    info!(%resource, %operation, mode = client.mode().as_str(), "Posting");
    match client.post(&resource, &operation, payload).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Err(e) => {
            error!(kind = e.kind().as_str(), error = %e, raw_body = ?e.raw_body(), "Request failed");
            return Err(e.into());
        }
    }

    info!(stats = ?client.stats(), "Done");
    Ok(())
}
