//! Health snapshot: the single value every consumer reads.

use crate::status::{OverallHealth, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The seven analysis domains, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Services,
    Infrastructure,
    Databases,
    Kubernetes,
    Problems,
    Network,
    Synthetic,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::Services,
        Domain::Infrastructure,
        Domain::Databases,
        Domain::Kubernetes,
        Domain::Problems,
        Domain::Network,
        Domain::Synthetic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Services => "services",
            Domain::Infrastructure => "infrastructure",
            Domain::Databases => "databases",
            Domain::Kubernetes => "kubernetes",
            Domain::Problems => "problems",
            Domain::Network => "network",
            Domain::Synthetic => "synthetic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim().to_lowercase())
    }

    /// Label used in chat output.
    pub fn title(self) -> &'static str {
        match self {
            Domain::Services => "Services",
            Domain::Infrastructure => "Infrastructure",
            Domain::Databases => "Databases",
            Domain::Kubernetes => "Kubernetes",
            Domain::Problems => "Problems",
            Domain::Network => "Network",
            Domain::Synthetic => "Synthetic",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific part of an item record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetail {
    Service {
        #[serde(rename = "entityId")]
        entity_id: String,
    },
    Host {
        #[serde(rename = "entityId")]
        entity_id: String,
    },
    Database {
        vendor: String,
    },
    Cluster {},
    Problem {
        id: String,
        severity: String,
        #[serde(rename = "problemStatus")]
        problem_status: String,
        #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
        start_time: Option<DateTime<Utc>>,
        #[serde(rename = "affectedEntities")]
        affected_entities: u64,
    },
    /// The aggregate problem-feed record that leads the problems domain.
    ProblemFeed {},
    Network {},
    Monitor {
        #[serde(rename = "monitorType")]
        monitor_type: String,
        enabled: bool,
    },
}

/// One row of a component report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub status: Status,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(flatten)]
    pub detail: ItemDetail,
}

impl ItemRecord {
    pub fn new(name: impl Into<String>, status: Status, detail: ItemDetail) -> Self {
        Self {
            name: name.into(),
            status,
            metrics: BTreeMap::new(),
            issues: Vec::new(),
            detail,
        }
    }

    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// Per-domain result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: Status,
    pub summary: String,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentReport {
    /// Build a report whose status is the rollup of its items.
    pub fn from_items(summary: impl Into<String>, items: Vec<ItemRecord>) -> Self {
        let status = Status::rollup(items.iter().map(|i| i.status));
        Self {
            status,
            summary: summary.into(),
            items,
            error: None,
        }
    }

    /// Domain-level fetch failure.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Status::Unknown,
            summary: "Data unavailable".to_string(),
            items: Vec::new(),
            error: Some(error),
        }
    }

    pub fn count_with(&self, status: Status) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

/// Where a snapshot's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Live,
    Demo,
}

/// One aggregation cycle's output. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub overall_health: OverallHealth,
    pub summary: String,
    pub components: BTreeMap<Domain, ComponentReport>,
    pub recommendations: Vec<String>,
    pub source: SnapshotSource,
}

impl HealthSnapshot {
    /// Assemble a snapshot; overall verdict, summary and recommendations
    /// are derived from the component statuses.
    pub fn assemble(components: BTreeMap<Domain, ComponentReport>, source: SnapshotSource) -> Self {
        let overall_health = OverallHealth::from_statuses(components.values().map(|c| c.status));
        Self {
            timestamp: Utc::now(),
            overall_health,
            summary: summary_for(overall_health).to_string(),
            components,
            recommendations: recommendations_for(overall_health)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            source,
        }
    }

    pub fn component(&self, domain: Domain) -> Option<&ComponentReport> {
        self.components.get(&domain)
    }

    /// Items of a domain, empty when the domain is absent.
    pub fn items(&self, domain: Domain) -> &[ItemRecord] {
        self.components
            .get(&domain)
            .map(|c| c.items.as_slice())
            .unwrap_or(&[])
    }
}

/// Kind of finding surfaced by the detailed analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Performance,
    Capacity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
    /// Names of the services or hosts behind the finding.
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisNote {
    pub message: String,
}

/// Snapshot enriched with insights. Trend and prediction notes are fixed
/// because no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
    pub insights: Vec<Insight>,
    pub trends: AnalysisNote,
    pub predictions: AnalysisNote,
}

/// Summary line for an overall verdict.
pub fn summary_for(health: OverallHealth) -> &'static str {
    match health {
        OverallHealth::Healthy => "All systems are operating normally. No critical issues detected.",
        OverallHealth::Warning => {
            "Some components are experiencing minor issues that require attention."
        }
        OverallHealth::Degraded => {
            "System performance is degraded. Some components need investigation."
        }
        OverallHealth::Critical => "Critical issues detected that require immediate attention.",
    }
}

/// Recommendations for an overall verdict.
pub fn recommendations_for(health: OverallHealth) -> &'static [&'static str] {
    match health {
        OverallHealth::Healthy => &["Continue monitoring", "Review performance trends"],
        OverallHealth::Warning => &[
            "Investigate warning conditions",
            "Check resource utilization",
        ],
        OverallHealth::Degraded => &[
            "Prioritize component investigation",
            "Review system capacity",
        ],
        OverallHealth::Critical => &[
            "Immediate investigation required",
            "Consider emergency procedures",
        ],
    }
}
