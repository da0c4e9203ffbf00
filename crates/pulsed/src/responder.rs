//! Chat answers rendered from a health snapshot.
//!
//! One renderer per intent. Renderers only read the snapshot; the service
//! intent may narrow to one service by name.

use crate::analyzers::{ERROR_RATE, RESPONSE_TIME};
use crate::conversation::ConversationStore;
use pulse_shared::intent::{Intent, IntentKind};
use pulse_shared::rpc::ChatReply;
use pulse_shared::snapshot::{
    ComponentReport, Domain, HealthSnapshot, ItemDetail, ItemRecord, SnapshotSource,
};
use pulse_shared::thresholds::format_reading;
use pulse_shared::{PulseError, PulseResult, Status};
use serde::Serialize;
use serde_json::{json, Value};

/// How many services the "not found" answer lists
const SERVICE_PREVIEW: usize = 5;
const PROBLEM_PREVIEW: usize = 5;

/// Render an answer and record the exchange in the session history.
pub fn respond(
    query: &str,
    intent: &Intent,
    snapshot: &HealthSnapshot,
    conversations: &ConversationStore,
    session: &str,
) -> PulseResult<ChatReply> {
    let reply = render(query, intent, snapshot)?;
    conversations.record(session, query, &reply.message);
    Ok(reply)
}

pub fn render(query: &str, intent: &Intent, snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    match intent.kind {
        IntentKind::HealthStatus => health_status(snapshot),
        IntentKind::CriticalServices => critical_services(snapshot),
        IntentKind::ServiceSpecific => service_specific(snapshot, intent.service_name.as_deref()),
        IntentKind::Infrastructure => infrastructure(snapshot),
        IntentKind::Database => databases(snapshot),
        IntentKind::Kubernetes => kubernetes(snapshot),
        IntentKind::Network => network(snapshot),
        IntentKind::Problems => problems(snapshot),
        IntentKind::Recommendations => recommendations(snapshot),
        IntentKind::General => Ok(general(query, snapshot)),
    }
}

fn component(snapshot: &HealthSnapshot, domain: Domain) -> PulseResult<&ComponentReport> {
    snapshot
        .component(domain)
        .ok_or_else(|| PulseError::Internal(format!("snapshot has no {} component", domain)))
}

fn to_data<T: Serialize>(value: &T) -> PulseResult<Option<Value>> {
    Ok(Some(serde_json::to_value(value)?))
}

fn reply(message: String, data: Option<Value>, suggestions: &[&str]) -> ChatReply {
    let mut reply = ChatReply::text(message, suggestions);
    reply.data = data;
    reply
}

fn status_label(status: Status) -> String {
    format!("{} {}", status.emoji(), status.as_str().to_uppercase())
}

fn with_status(items: &[ItemRecord], status: Status) -> Vec<&ItemRecord> {
    items.iter().filter(|i| i.status == status).collect()
}

/// Non-zero metric, for display
fn shown(item: &ItemRecord, key: &str) -> Option<f64> {
    item.metric(key).filter(|v| *v != 0.0)
}

fn feed_count(problems: &ComponentReport, key: &str) -> u64 {
    problems
        .items
        .iter()
        .find(|i| matches!(i.detail, ItemDetail::ProblemFeed {}))
        .and_then(|feed| feed.metric(key))
        .unwrap_or(0.0) as u64
}

fn health_status(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let mut message = String::from("🔍 **System Health Overview**\n\n");
    message.push_str(&format!(
        "**Overall Status:** {} {}\n\n",
        snapshot.overall_health.emoji(),
        snapshot.overall_health.as_str().to_uppercase()
    ));
    message.push_str(&format!("{}\n\n", snapshot.summary));

    message.push_str("**Component Status:**\n");
    for domain in [
        Domain::Services,
        Domain::Infrastructure,
        Domain::Databases,
        Domain::Kubernetes,
    ] {
        let report = component(snapshot, domain)?;
        message.push_str(&format!(
            "• {}: {} {}\n",
            domain.title(),
            report.status.emoji(),
            report.summary
        ));
    }

    let problems = component(snapshot, Domain::Problems)?;
    let total = feed_count(problems, "total");
    if total > 0 {
        message.push_str(&format!(
            "\n⚠️ **Active Issues:** {} problems detected\n",
            total
        ));
        message.push_str(&format!("• Critical: {}\n", feed_count(problems, "critical")));
        message.push_str(&format!("• Warnings: {}\n", feed_count(problems, "warnings")));
    }

    Ok(reply(
        message,
        to_data(snapshot)?,
        &[
            "Show me service details",
            "What problems are active?",
            "Check infrastructure status",
            "Show recommendations",
        ],
    ))
}

fn critical_services(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let services = &component(snapshot, Domain::Services)?.items;
    let down = with_status(services, Status::Down);
    let critical = with_status(services, Status::Critical);
    let warning = with_status(services, Status::Warning);

    let mut message = String::from("🚨 **Critical & Down Applications Status**\n\n");

    if !down.is_empty() {
        message.push_str(&format!(
            "❌ **Applications Currently DOWN ({}):**\n",
            down.len()
        ));
        for service in &down {
            message.push_str(&format!("• **{}** - Status: DOWN\n", service.name));
            if !service.issues.is_empty() {
                message.push_str(&format!("  Issues: {}\n", service.issues.join(", ")));
            }
        }
        message.push('\n');
    }

    if !critical.is_empty() {
        message.push_str(&format!(
            "🔴 **Critical Applications ({}):**\n",
            critical.len()
        ));
        for service in &critical {
            message.push_str(&format!(
                "• **{}** - {}\n",
                service.name,
                service.issues.join(", ")
            ));
            if let Some(rt) = shown(service, RESPONSE_TIME) {
                message.push_str(&format!("  Response Time: {}ms\n", format_reading(rt)));
            }
            if let Some(er) = shown(service, ERROR_RATE) {
                message.push_str(&format!("  Error Rate: {}%\n", format_reading(er)));
            }
        }
        message.push('\n');
    }

    if !warning.is_empty() {
        message.push_str(&format!(
            "⚠️ **Applications with Issues ({}):**\n",
            warning.len()
        ));
        for service in &warning {
            message.push_str(&format!(
                "• **{}** - {}\n",
                service.name,
                service.issues.join(", ")
            ));
            if let Some(rt) = shown(service, RESPONSE_TIME).filter(|v| *v > 500.0) {
                message.push_str(&format!(
                    "  Response Time: {}ms (elevated)\n",
                    format_reading(rt)
                ));
            }
            if let Some(er) = shown(service, ERROR_RATE).filter(|v| *v > 1.0) {
                message.push_str(&format!(
                    "  Error Rate: {}% (above normal)\n",
                    format_reading(er)
                ));
            }
        }
        message.push('\n');
    }

    if down.is_empty() && critical.is_empty() && warning.is_empty() {
        message.push_str("✅ **Good News!** No applications are currently down or in critical state.\n\n");
        message.push_str(&format!(
            "All {} monitored applications are running normally:\n",
            services.len()
        ));
        for service in services {
            message.push_str(&format!(
                "• {} - {} {}\n",
                service.name,
                service.status.emoji(),
                service.status
            ));
        }
    } else {
        message.push_str("🔧 **Immediate Actions Recommended:**\n");
        let mut step = 1;
        if !down.is_empty() {
            message.push_str(&format!(
                "{}. **URGENT**: Investigate and restore down applications immediately\n",
                step
            ));
            step += 1;
        }
        if !critical.is_empty() {
            message.push_str(&format!(
                "{}. **HIGH PRIORITY**: Address critical service issues\n",
                step
            ));
            step += 1;
        }
        if !warning.is_empty() {
            message.push_str(&format!(
                "{}. **MONITOR**: Keep close watch on warning services\n",
                step
            ));
        }
    }

    let data = json!({
        "critical": serde_json::to_value(&critical)?,
        "warning": serde_json::to_value(&warning)?,
        "down": serde_json::to_value(&down)?,
        "total_issues": down.len() + critical.len() + warning.len(),
    });

    Ok(reply(
        message,
        Some(data),
        &[
            "Show detailed service metrics",
            "What caused these issues?",
            "How can I fix the problems?",
            "Show infrastructure status",
        ],
    ))
}

fn service_specific(snapshot: &HealthSnapshot, name: Option<&str>) -> PulseResult<ChatReply> {
    let services = &component(snapshot, Domain::Services)?.items;
    let mut message = String::from("🔧 **Service Analysis**\n\n");

    match name {
        Some(name) => {
            let needle = name.to_lowercase();
            match services
                .iter()
                .find(|s| s.name.to_lowercase().contains(&needle))
            {
                Some(service) => {
                    message.push_str(&format!("**{}**\n", service.name));
                    message.push_str(&format!("Status: {}\n", status_label(service.status)));
                    if let Some(rt) = shown(service, RESPONSE_TIME) {
                        message.push_str(&format!("Response Time: {}ms\n", format_reading(rt)));
                    }
                    if let Some(er) = shown(service, ERROR_RATE) {
                        message.push_str(&format!("Error Rate: {}%\n", format_reading(er)));
                    }
                    if !service.issues.is_empty() {
                        message.push_str("\n**Issues:**\n");
                        for issue in &service.issues {
                            message.push_str(&format!("• {}\n", issue));
                        }
                    }
                }
                None => {
                    message.push_str(&format!("Service \"{}\" not found.\n\n", name));
                    message.push_str("**Available Services:**\n");
                    for service in services.iter().take(SERVICE_PREVIEW) {
                        message.push_str(&format!(
                            "• {} - {} {}\n",
                            service.name,
                            service.status.emoji(),
                            service.status
                        ));
                    }
                }
            }
        }
        None => {
            message.push_str(&format!(
                "**Service Overview ({} services)**\n\n",
                services.len()
            ));
            let attention = [
                (Status::Down, "🔻 **Down Services"),
                (Status::Critical, "🚨 **Critical Services"),
                (Status::Warning, "⚠️ **Warning Services"),
            ];
            for (status, heading) in attention {
                let matching = with_status(services, status);
                if matching.is_empty() {
                    continue;
                }
                message.push_str(&format!("{} ({}):**\n", heading, matching.len()));
                for service in matching {
                    message.push_str(&format!(
                        "• {}: {}\n",
                        service.name,
                        service.issues.join(", ")
                    ));
                }
                message.push('\n');
            }
            message.push_str(&format!(
                "✅ **Healthy Services:** {}\n",
                with_status(services, Status::Healthy).len()
            ));
        }
    }

    Ok(reply(
        message,
        Some(json!({ "services": serde_json::to_value(services)? })),
        &[
            "Show infrastructure status",
            "What are the current problems?",
            "Show service recommendations",
        ],
    ))
}

fn infrastructure(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let report = component(snapshot, Domain::Infrastructure)?;
    let mut message = String::from("🖥️ **Infrastructure Status**\n\n");
    message.push_str(&format!("Overall Status: {}\n", status_label(report.status)));
    message.push_str(&format!("{}\n\n", report.summary));

    if !report.items.is_empty() {
        for (status, heading) in [
            (Status::Critical, "🚨 **Critical Hosts:**"),
            (Status::Warning, "⚠️ **Warning Hosts:**"),
        ] {
            let hosts = with_status(&report.items, status);
            if hosts.is_empty() {
                continue;
            }
            message.push_str(&format!("{}\n", heading));
            for host in hosts {
                message.push_str(&format!("• {}: {}\n", host.name, host.issues.join(", ")));
            }
            message.push('\n');
        }
        message.push_str(&format!(
            "✅ **Healthy Hosts:** {}\n",
            report.count_with(Status::Healthy)
        ));
    }

    Ok(reply(
        message,
        to_data(report)?,
        &[
            "Show CPU usage details",
            "Check memory utilization",
            "Show network performance",
        ],
    ))
}

fn databases(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let report = component(snapshot, Domain::Databases)?;
    let mut message = String::from("🗄️ **Database Status**\n\n");
    message.push_str(&format!("Status: {}\n", status_label(report.status)));
    message.push_str(&format!("{}\n\n", report.summary));

    if !report.items.is_empty() {
        message.push_str("**Database Services:**\n");
        for db in &report.items {
            let vendor = match &db.detail {
                ItemDetail::Database { vendor } => vendor.as_str(),
                _ => "unknown",
            };
            message.push_str(&format!(
                "• {} ({}) - {} {}\n",
                db.name,
                vendor,
                db.status.emoji(),
                db.status
            ));
        }
    }

    Ok(reply(
        message,
        to_data(report)?,
        &[
            "Show database performance metrics",
            "Check connection pools",
            "Show query performance",
        ],
    ))
}

fn kubernetes(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let report = component(snapshot, Domain::Kubernetes)?;
    let mut message = String::from("☸️ **Kubernetes Status**\n\n");
    message.push_str(&format!("Status: {}\n", status_label(report.status)));
    message.push_str(&format!("{}\n\n", report.summary));

    if !report.items.is_empty() {
        message.push_str("**Clusters:**\n");
        for cluster in &report.items {
            message.push_str(&format!(
                "• {} - {} {}\n",
                cluster.name,
                cluster.status.emoji(),
                cluster.status
            ));
        }
    }

    Ok(reply(
        message,
        to_data(report)?,
        &[
            "Show pod status",
            "Check resource utilization",
            "Show deployment health",
        ],
    ))
}

fn network(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let report = component(snapshot, Domain::Network)?;
    let mut message = String::from("🌐 **Network Status**\n\n");
    message.push_str(&format!("Status: {}\n", status_label(report.status)));
    message.push_str(&format!("{}\n\n", report.summary));

    Ok(reply(
        message,
        to_data(report)?,
        &[
            "Show bandwidth utilization",
            "Check latency metrics",
            "Show connection status",
        ],
    ))
}

fn problems(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let report = component(snapshot, Domain::Problems)?;
    let total = feed_count(report, "total");
    let mut message = String::from("🚨 **Active Problems**\n\n");

    if let Some(error) = &report.error {
        message.push_str(&format!("❓ Problem feed unavailable: {}\n", error));
    } else if total == 0 {
        message.push_str("✅ No active problems detected!\n");
    } else {
        message.push_str("**Summary:**\n");
        message.push_str(&format!("• Total Problems: {}\n", total));
        message.push_str(&format!("• Critical: {}\n", feed_count(report, "critical")));
        message.push_str(&format!("• Warnings: {}\n\n", feed_count(report, "warnings")));

        message.push_str("**Recent Problems:**\n");
        for item in report.items.iter().take(PROBLEM_PREVIEW + 1) {
            let ItemDetail::Problem {
                severity,
                problem_status,
                start_time,
                affected_entities,
                ..
            } = &item.detail
            else {
                continue;
            };
            let marker = if severity == "ERROR" { "🚨" } else { "⚠️" };
            message.push_str(&format!("{} **{}**\n", marker, item.name));
            message.push_str(&format!(
                "   Status: {} | Affected: {} entities\n",
                problem_status, affected_entities
            ));
            if let Some(start) = start_time {
                message.push_str(&format!(
                    "   Started: {}\n",
                    start.format("%Y-%m-%d %H:%M UTC")
                ));
            }
            message.push('\n');
        }
    }

    Ok(reply(
        message,
        to_data(report)?,
        &[
            "Show problem details",
            "Get resolution recommendations",
            "Check affected services",
        ],
    ))
}

fn recommendations(snapshot: &HealthSnapshot) -> PulseResult<ChatReply> {
    let mut message = String::from("💡 **Recommendations**\n\n");
    if snapshot.recommendations.is_empty() {
        message.push_str("No specific recommendations at this time. System appears to be running well!\n");
    } else {
        for (index, rec) in snapshot.recommendations.iter().enumerate() {
            message.push_str(&format!("{}. {}\n", index + 1, rec));
        }
    }

    Ok(reply(
        message,
        Some(json!({ "recommendations": snapshot.recommendations })),
        &[
            "Show performance optimization tips",
            "Get capacity planning advice",
            "Show best practices",
        ],
    ))
}

fn matches_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

fn general(query: &str, snapshot: &HealthSnapshot) -> ChatReply {
    let q = query.to_lowercase();

    if matches_any(&q, &["hello", "hi", "hey", "good morning", "good afternoon"]) {
        return ChatReply::text(
            "👋 Hello! I'm Pulse, your monitoring assistant.\n\n\
             I can help you understand your application's health and performance:\n\n\
             🔍 **Monitor & Analyze**: System health and performance metrics\n\
             🚨 **Alert & Diagnose**: Active problems and what they affect\n\
             💡 **Recommend & Guide**: Next steps for the current state\n\
             📊 **Report & Explain**: Component details in plain English\n\n\
             **Try asking me:**\n\
             • \"How is my system performing?\"\n\
             • \"What problems need attention?\"\n\
             • \"Which application is down?\"\n\
             • \"Show me the database status\"\n\n\
             What would you like to know?",
            &[
                "Show system health overview",
                "What problems are active?",
                "Check service performance",
                "Explain current alerts",
            ],
        );
    }

    if matches_any(&q, &["help", "what can you do", "commands", "capabilities"]) {
        return ChatReply::text(
            "🤖 **Pulse Capabilities**\n\n\
             **System Monitoring:**\n\
             • \"Show system health\" - Overall application status\n\
             • \"Check service performance\" - Individual service metrics\n\
             • \"Monitor infrastructure\" - Server and resource status\n\n\
             **Problem Management:**\n\
             • \"What problems are active?\" - Current issues and alerts\n\
             • \"Which application is down?\" - Down and critical applications\n\n\
             **Platform:**\n\
             • \"Check database performance\" - Database health status\n\
             • \"Show kubernetes clusters\" - Cluster status\n\
             • \"How is the network?\" - Network counters\n\n\
             **Recommendations:**\n\
             • \"What should I investigate?\" - Priority recommendations\n\n\
             Just ask in plain language.",
            &[
                "Show system health",
                "What problems are active?",
                "Which services are slow?",
                "What should I investigate?",
            ],
        );
    }

    if matches_any(&q, &["demo", "test", "example", "sample"]) {
        let count = |domain: Domain| snapshot.items(domain).len();
        let message = match snapshot.source {
            SnapshotSource::Demo => format!(
                "🎯 **Demo Mode Active**\n\n\
                 You're viewing simulated monitoring data.\n\n\
                 **Current Demo Data:**\n\
                 • {} services\n\
                 • {} infrastructure hosts\n\
                 • {} database instances\n\
                 • {} Kubernetes clusters\n\n\
                 **To connect real data:**\n\
                 1. Set the provider URL and API token (DYNATRACE_URL, DYNATRACE_API_TOKEN)\n\
                 2. Restart the daemon\n\
                 3. Point provider webhooks at /api/webhooks/dynatrace\n",
                count(Domain::Services),
                count(Domain::Infrastructure),
                count(Domain::Databases),
                count(Domain::Kubernetes),
            ),
            SnapshotSource::Live => String::from(
                "📡 **Live Data**\n\nPulse is connected to your monitoring provider; \
                 every answer reflects the latest health snapshot.\n",
            ),
        };
        return ChatReply::text(
            message,
            &[
                "What's causing the performance issues?",
                "Show me the warning alerts",
                "Which server needs attention?",
            ],
        );
    }

    ChatReply::text(
        "I'm Pulse, your application monitoring assistant! 🤖\n\n\
         **🔍 Real-time Monitoring**\n\
         Ask me about system health, service performance, or infrastructure status\n\n\
         **🚨 Problem Analysis**\n\
         I can list active problems and the applications they affect\n\n\
         **💡 Recommendations**\n\
         Get next steps based on the current health verdict\n\n\
         **Example questions:**\n\
         • \"How is my application performing today?\"\n\
         • \"Which services need immediate attention?\"\n\
         • \"Any database problems?\"\n\n\
         What would you like to explore?",
        &[
            "Show overall system health",
            "What problems need attention?",
            "Analyze service performance",
            "Give me recommendations",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::demo_snapshot;
    use crate::router::classify_query;
    use pulse_shared::ThresholdSet;
    use std::collections::BTreeMap;

    fn ask(query: &str) -> ChatReply {
        let snapshot = demo_snapshot(&ThresholdSet::default());
        render(query, &classify_query(query), &snapshot).unwrap()
    }

    #[test]
    fn test_which_application_is_down() {
        let reply = ask("which application is down");
        assert!(reply.message.contains("DOWN"));
        assert!(reply.message.contains("**Email Service** - Status: DOWN"));
        assert!(reply.message.contains("Payment Processing API"));
        let data = reply.data.unwrap();
        assert_eq!(data["total_issues"], 2);
        assert_eq!(data["down"][0]["name"], "Email Service");
    }

    #[test]
    fn test_health_overview() {
        let reply = ask("how is the system");
        assert!(reply.message.contains("CRITICAL"));
        assert!(reply.message.contains("3 problems detected"));
        assert_eq!(reply.suggestions.len(), 4);
        assert_eq!(reply.data.unwrap()["overallHealth"], "critical");
    }

    #[test]
    fn test_service_lookup() {
        let found = ask("show the service payment");
        assert!(found.message.contains("**Payment Processing API**"));
        assert!(found.message.contains("Response Time: 3200ms"));

        let missing = ask("show the service billing");
        assert!(missing.message.contains("Service \"billing\" not found."));
    }

    #[test]
    fn test_domain_renderers() {
        assert!(ask("cpu load").message.contains("api-server-02"));
        assert!(ask("database state").message.contains("(PostgreSQL)"));
        assert!(ask("k8s").message.contains("production-cluster"));
        assert!(ask("bandwidth").message.contains("Network Status"));
        let problems = ask("any alerts?");
        assert!(problems.message.contains("Total Problems: 3"));
        assert!(problems.message.contains("Payment Processing API Error Rate Critical"));
        assert!(ask("recommend something").message.contains("1. Immediate investigation required"));
    }

    #[test]
    fn test_general_texts() {
        assert!(ask("hello").message.contains("I'm Pulse"));
        assert!(ask("demo").message.contains("Demo Mode Active"));
        assert!(ask("xyz").message.contains("Example questions"));
    }

    #[test]
    fn test_missing_component_is_an_error() {
        let empty = HealthSnapshot::assemble(BTreeMap::new(), SnapshotSource::Live);
        let intent = classify_query("which application is down");
        assert!(matches!(
            render("which application is down", &intent, &empty),
            Err(PulseError::Internal(_))
        ));
    }

    #[test]
    fn test_respond_records_history() {
        let store = ConversationStore::default();
        let snapshot = demo_snapshot(&ThresholdSet::default());
        let intent = classify_query("hello");
        respond("hello", &intent, &snapshot, &store, "s1").unwrap();
        let history = store.history("s1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "hello");
    }
}
