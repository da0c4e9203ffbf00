//! Unit tests for router module.

#[cfg(test)]
mod tests {
    use crate::router::*;
    use pulse_shared::intent::IntentKind;

    fn kind(q: &str) -> IntentKind {
        classify_query(q).kind
    }

    #[test]
    fn test_classify_health() {
        assert_eq!(kind("How is everything?"), IntentKind::HealthStatus);
        assert_eq!(kind("overall health please"), IntentKind::HealthStatus);
        assert_eq!(classify_query("system status").confidence, 0.9);
    }

    #[test]
    fn test_classify_critical() {
        assert_eq!(kind("which application is down"), IntentKind::CriticalServices);
        assert_eq!(kind("anything crashed?"), IntentKind::CriticalServices);
        assert_eq!(classify_query("what is broken").confidence, 0.95);
    }

    #[test]
    fn test_shared_terms_go_to_earlier_rule() {
        // "down" and "failing" are in both critical_services and problems
        assert_eq!(kind("is anything down"), IntentKind::CriticalServices);
        assert_eq!(kind("failing checks"), IntentKind::CriticalServices);
        // health_status runs first and claims a health term
        assert_eq!(kind("status of down hosts"), IntentKind::HealthStatus);
    }

    #[test]
    fn test_classify_service_specific() {
        let intent = classify_query("tell me about the payment service latency");
        assert_eq!(intent.kind, IntentKind::ServiceSpecific);
        assert_eq!(intent.service_name.as_deref(), Some("latency"));

        let intent = classify_query("how fast is API Payment?");
        // "how is" does not appear verbatim, so the api rule applies
        assert_eq!(intent.kind, IntentKind::ServiceSpecific);
        assert_eq!(intent.service_name.as_deref(), Some("Payment"));

        assert_eq!(classify_query("list endpoints").service_name, None);
    }

    #[test]
    fn test_classify_domains() {
        assert_eq!(kind("cpu on web-01"), IntentKind::Infrastructure);
        assert_eq!(kind("postgres slow queries"), IntentKind::Database);
        assert_eq!(kind("k8s pods"), IntentKind::Kubernetes);
        assert_eq!(kind("bandwidth today"), IntentKind::Network);
        assert_eq!(kind("any open alerts"), IntentKind::Problems);
        assert_eq!(kind("what should I optimize"), IntentKind::Recommendations);
    }

    #[test]
    fn test_classify_general() {
        let intent = classify_query("hello there");
        assert_eq!(intent.kind, IntentKind::General);
        assert_eq!(intent.confidence, 0.5);
        assert_eq!(kind(""), IntentKind::General);
    }

    #[test]
    fn test_extract_service_name() {
        assert_eq!(extract_service_name("service checkout"), Some("checkout".to_string()));
        assert_eq!(extract_service_name("the microservice"), None);
        assert_eq!(extract_service_name("nothing here"), None);
    }
}
