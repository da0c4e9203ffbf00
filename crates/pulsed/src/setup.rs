//! Setup checks: is the daemon configured well enough to run live?

use crate::aggregator::HealthAggregator;
use crate::config::{Config, DEFAULT_WEBHOOK_SECRET, PLACEHOLDER_HOST};
use crate::webhook::mask_secret;
use chrono::Utc;
use pulse_shared::rpc::{ProviderHealth, ProviderState, SetupSettings, SetupStatus, SetupValidation};
use tracing::{info, warn};

const SETUP_COMPLETE: &str =
    "Configuration complete! Set up Dynatrace webhooks to receive real-time events.";

/// Check settings and provider connectivity.
pub async fn validate_configuration(
    config: &Config,
    aggregator: &HealthAggregator,
) -> SetupValidation {
    let provider = aggregator.provider_health().await;
    let validation = assess(config, provider);
    if validation.valid {
        info!(
            "[SETUP] Configuration valid ({} warnings)",
            validation.warnings.len()
        );
    } else {
        warn!("[SETUP] {} configuration issues", validation.issues.len());
    }
    validation
}

/// Judge a config against an already-measured provider health.
pub fn assess(config: &Config, provider: ProviderHealth) -> SetupValidation {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let url = config.provider.url.trim();
    if url.is_empty() {
        issues.push("Missing required setting: provider.url (DYNATRACE_URL)".to_string());
    } else if url.contains(PLACEHOLDER_HOST) {
        issues.push(format!(
            "provider.url still points at the placeholder host '{}'",
            PLACEHOLDER_HOST
        ));
    }
    if config.provider.api_token.trim().is_empty() {
        issues.push(
            "Missing required setting: provider.api_token (DYNATRACE_API_TOKEN)".to_string(),
        );
    }

    match provider.status {
        ProviderState::Connected => {}
        ProviderState::Demo => {
            issues.push("Not connected to Dynatrace: serving demo data".to_string())
        }
        ProviderState::Disconnected => issues.push(format!(
            "Failed to connect to Dynatrace: {}",
            provider.error.as_deref().unwrap_or("no response")
        )),
    }

    if config.webhook.secret == DEFAULT_WEBHOOK_SECRET {
        warnings.push(
            "Webhook secret is the default value; set WEBHOOK_SECRET for better security"
                .to_string(),
        );
    }

    SetupValidation {
        valid: issues.is_empty(),
        issues,
        warnings,
        provider,
    }
}

/// Validation plus masked settings and what to do next.
pub async fn setup_status(config: &Config, aggregator: &HealthAggregator) -> SetupStatus {
    let configuration = validate_configuration(config, aggregator).await;
    SetupStatus {
        timestamp: Utc::now(),
        settings: settings(config),
        next_steps: next_steps(&configuration),
        configuration,
    }
}

fn settings(config: &Config) -> SetupSettings {
    let url = config.provider.url.trim();
    let token = config.provider.api_token.trim();
    SetupSettings {
        provider_url: (!url.is_empty()).then(|| url.to_string()),
        api_token: (!token.is_empty()).then(|| mask_secret(token)),
        webhook_secret: mask_secret(&config.webhook.secret),
        demo_mode: config.provider.is_demo(),
    }
}

fn next_steps(validation: &SetupValidation) -> Vec<String> {
    let mut steps = Vec::new();
    if validation.provider.status != ProviderState::Connected {
        steps.push("Configure Dynatrace connection".to_string());
    }
    if validation
        .issues
        .iter()
        .any(|i| i.starts_with("Missing required setting"))
    {
        steps.push("Set up environment variables".to_string());
    }
    if !validation.warnings.is_empty() {
        steps.push("Set up webhook security".to_string());
    }
    if steps.is_empty() {
        steps.push(SETUP_COMPLETE.to_string());
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DataSource;
    use crate::provider::fake::FakeGateway;
    use pulse_shared::ThresholdSet;
    use std::sync::Arc;

    fn live_config() -> Config {
        let mut config = Config::default();
        config.provider.url = "https://abc123.live.dynatrace.com".to_string();
        config.provider.api_token = "dt0c01.token".to_string();
        config.webhook.secret = "s3cret-value".to_string();
        config
    }

    fn aggregator(gateway: FakeGateway, config: &Config) -> HealthAggregator {
        HealthAggregator::new(
            DataSource::Live(Arc::new(gateway)),
            ThresholdSet::default(),
            &config.provider,
        )
    }

    #[tokio::test]
    async fn test_connected_and_configured_is_valid() {
        let config = live_config();
        let agg = aggregator(FakeGateway::new(), &config);
        let status = setup_status(&config, &agg).await;
        assert!(status.configuration.valid);
        assert!(status.configuration.issues.is_empty());
        assert!(status.configuration.warnings.is_empty());
        assert_eq!(status.next_steps, vec![SETUP_COMPLETE.to_string()]);
        assert_eq!(status.settings.api_token.as_deref(), Some("dt0c****"));
        assert_eq!(status.settings.webhook_secret, "s3cr****");
        assert!(!status.settings.demo_mode);
    }

    #[tokio::test]
    async fn test_failed_health_check_is_an_issue() {
        let config = live_config();
        let agg = aggregator(FakeGateway::new().failing("health"), &config);
        let validation = validate_configuration(&config, &agg).await;
        assert!(!validation.valid);
        assert_eq!(validation.provider.status, ProviderState::Disconnected);
        assert!(validation.issues[0].starts_with("Failed to connect to Dynatrace"));
    }

    #[test]
    fn test_defaults_report_missing_settings_and_secret() {
        let validation = assess(&Config::default(), ProviderHealth::new(ProviderState::Demo));
        assert!(!validation.valid);
        assert_eq!(validation.issues.len(), 3);
        assert!(validation.issues[0].contains("DYNATRACE_URL"));
        assert!(validation.issues[1].contains("DYNATRACE_API_TOKEN"));
        assert_eq!(validation.warnings.len(), 1);
        assert!(validation.warnings[0].contains("WEBHOOK_SECRET"));

        let steps = next_steps(&validation);
        assert_eq!(
            steps,
            vec![
                "Configure Dynatrace connection".to_string(),
                "Set up environment variables".to_string(),
                "Set up webhook security".to_string(),
            ]
        );
    }

    #[test]
    fn test_placeholder_url_is_flagged() {
        let mut config = live_config();
        config.provider.url = "https://your-environment.live.dynatrace.com".to_string();
        let validation = assess(&config, ProviderHealth::new(ProviderState::Connected));
        assert_eq!(validation.issues.len(), 1);
        assert!(validation.issues[0].contains("placeholder"));
    }
}
