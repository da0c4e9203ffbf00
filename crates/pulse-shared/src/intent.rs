//! Chat intents produced by the keyword classifier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    HealthStatus,
    CriticalServices,
    ServiceSpecific,
    Infrastructure,
    Database,
    Kubernetes,
    Network,
    Problems,
    Recommendations,
    General,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::HealthStatus => "health_status",
            IntentKind::CriticalServices => "critical_services",
            IntentKind::ServiceSpecific => "service_specific",
            IntentKind::Infrastructure => "infrastructure",
            IntentKind::Database => "database",
            IntentKind::Kubernetes => "kubernetes",
            IntentKind::Network => "network",
            IntentKind::Problems => "problems",
            IntentKind::Recommendations => "recommendations",
            IntentKind::General => "general",
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

impl Intent {
    pub fn new(kind: IntentKind, confidence: f32) -> Self {
        Self {
            kind,
            confidence,
            service_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_wire_shape() {
        let mut intent = Intent::new(IntentKind::ServiceSpecific, 0.8);
        intent.service_name = Some("checkout".to_string());
        let v = serde_json::to_value(&intent).unwrap();
        assert_eq!(v["type"], "service_specific");
        assert_eq!(v["serviceName"], "checkout");
    }
}
