//! Health and readiness command implementations

use crate::client::{HealthResponse, ReadinessResponse, TollgateClient};
use crate::config::TgctlConfig;
use crate::output;
use colored::*;
use tollgate_core::errors::CoreError;
use tracing::{debug, info};

/// Handle health check command
pub async fn handle_health_command(config: &TgctlConfig) -> Result<(), CoreError> {
    let client = TollgateClient::new(config.clone())?;

    info!("Checking Tollgate health at {}", config.endpoint);

    match check_health(&client).await {
        Ok(health) => output::display_health(&health, &config.default_format),
        Err(e) => {
            println!("{}", "✗ Tollgate health check failed".red().bold());
            println!("Error: {}", e.to_string().red());
            Err(e)
        }
    }
}

/// Handle readiness command. Not-ready is reported and returned as an error.
pub async fn handle_ready_command(config: &TgctlConfig) -> Result<(), CoreError> {
    let client = TollgateClient::new(config.clone())?;

    info!("Checking Tollgate readiness at {}", config.endpoint);

    let readiness = check_readiness(&client).await?;
    output::display_readiness(&readiness, &config.default_format)?;

    if readiness.ready {
        Ok(())
    } else {
        Err(CoreError::Internal("server is not ready".to_string()))
    }
}

async fn check_health(client: &TollgateClient) -> Result<HealthResponse, CoreError> {
    let response = client.get("/health").await?;
    envelope_data(client.handle_envelope(response).await?)
}

async fn check_readiness(client: &TollgateClient) -> Result<ReadinessResponse, CoreError> {
    let response = client.get("/ready").await?;
    envelope_data(client.handle_envelope(response).await?)
}

fn envelope_data<T>(envelope: crate::client::Envelope<T>) -> Result<T, CoreError> {
    if !envelope.success {
        debug!("server reported failure: {}", envelope.error.as_deref().unwrap_or("-"));
    }
    envelope.data.ok_or_else(|| {
        CoreError::Internal(
            envelope
                .error
                .unwrap_or_else(|| "response carried no data".to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> TgctlConfig {
        TgctlConfig {
            endpoint: server.uri(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_health_command() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "status": "healthy",
                    "version": {"version": "0.1.0", "build": "development", "commit": null},
                    "timestamp": "2024-01-01T00:00:00Z"
                },
                "timestamp": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(handle_health_command(&config(&server)).await.is_ok());
    }

    #[tokio::test]
    async fn test_health_command_without_server() {
        let config = TgctlConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        assert!(handle_health_command(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_not_ready_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ready"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "success": false,
                "data": {
                    "ready": false,
                    "checks": [{"name": "upstream_config", "ok": false, "reason": "inference API key is not set"}],
                    "timestamp": "2024-01-01T00:00:00Z"
                },
                "error": "upstream_config: inference API key is not set",
                "timestamp": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        assert!(handle_ready_command(&config(&server)).await.is_err());
    }
}
