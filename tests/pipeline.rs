// End-to-end: feed → rules → store → masked assistant round trip

use std::sync::{Arc, Mutex};

use compliance_sentinel::{
    alert_stats, get_flagged_transactions, ingest_transactions, parse_timestamp,
    render_flagged_csv, setup_database, Catalogs, ComplianceAssistant, AssistantConfig,
    FixedVelocitySignal, RuleEvaluationEngine, RuleSet, TextService, Transaction,
    TransactionFeed,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;

/// Echoes every placeholder it receives and records the prompt it was sent
struct EchoService {
    prompts: Mutex<Vec<String>>,
}

impl TextService for EchoService {
    fn invoke(&self, _model_id: &str, body: &str) -> anyhow::Result<String> {
        let request: serde_json::Value = serde_json::from_str(body)?;
        let prompt = request["messages"][0]["content"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.prompts.lock().unwrap().push(prompt);

        Ok(serde_json::json!({
            "output": {"message": {"role": "assistant", "content": [{
                "text": "Escalate [Entity-X] and [Entity-AA]; both moved funds through [Location-B]. Reason: [Reason: Monitored Entity]."
            }]}}
        })
        .to_string())
    }
}

fn transaction(id: &str, timestamp: &str, amount: f64, description: &str, location: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        timestamp: timestamp.to_string(),
        user_id: "user456".to_string(),
        amount,
        currency: "USD".to_string(),
        description: description.to_string(),
        user_location: "London".to_string(),
        transaction_location: location.to_string(),
    }
}

fn engine() -> RuleEvaluationEngine {
    let rules = RuleSet::standard(&Catalogs::default(), Arc::new(FixedVelocitySignal(false)));
    RuleEvaluationEngine::new(rules).unwrap()
}

#[test]
fn test_flagged_alerts_reach_assistant_masked() {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();

    let batch = vec![
        transaction("tx-1", "2024-05-01 12:00:00", 15_000.0, "Payment to Monitored Entity Alpha from user456", "Cayman Islands"),
        transaction("tx-2", "2024-05-01 12:01:00", 42.0, "Payment to GoodCorp from user456", "London"),
        transaction("tx-3", "2024-05-01 12:02:00", 900.0, "Payment to Global Oversight Ltd. from user456", "London"),
    ];

    let summary = ingest_transactions(&conn, &engine(), &batch).unwrap();
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.flagged, 2);

    let alerts = get_flagged_transactions(&conn, None).unwrap();
    assert_eq!(alerts.len(), 2);
    // Mismatch 40 + sanctioned 100 + high amount 30 + risky 60
    assert_eq!(alerts[1].anomaly_score, 230);
    assert_eq!(
        alerts[1].flag_reason.as_deref(),
        Some("Geolocation Mismatch, Sanctioned Entity, High Amount, Risky Geolocation")
    );

    let stats = alert_stats(&conn).unwrap();
    assert_eq!(stats.total_alerts, 2);
    assert_eq!(stats.high_risk_count, 2);

    let service = Arc::new(EchoService {
        prompts: Mutex::new(Vec::new()),
    });
    let assistant = ComplianceAssistant::new(
        Catalogs::default(),
        AssistantConfig::default(),
        service.clone(),
    );
    let context = serde_json::to_value(&alerts).unwrap();

    let reply = assistant.chat("Which alerts need escalation?", &context).unwrap();

    assert_eq!(
        reply,
        "Escalate Monitored Entity Alpha and Global Oversight Ltd.; both moved funds through Cayman Islands. Reason: Sanctioned Entity."
    );

    let prompts = service.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    for literal in ["Monitored Entity Alpha", "Global Oversight Ltd.", "Cayman Islands", "Sanctioned Entity", "Risky Geolocation"] {
        assert!(!prompt.contains(literal), "{} leaked into the prompt", literal);
    }
    assert!(prompt.contains("[Entity-AA]"));
    assert!(prompt.contains("[Reason: High-Risk Location]"));
    assert!(prompt.contains("USER INQUIRY: Which alerts need escalation?"));
}

#[test]
fn test_seeded_feed_round_trip_through_report() {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();

    let now = parse_timestamp("2024-05-01 12:00:00").unwrap();
    let mut feed = TransactionFeed::with_rng(Catalogs::default(), StdRng::seed_from_u64(42));
    let batch = feed.generate(40, now);

    let summary = ingest_transactions(&conn, &engine(), &batch).unwrap();
    assert_eq!(summary.inserted, 40);
    assert_eq!(summary.rejected, 0);

    let alerts = get_flagged_transactions(&conn, None).unwrap();
    assert_eq!(alerts.len(), summary.flagged);
    assert!(alerts.windows(2).all(|pair| pair[0].timestamp >= pair[1].timestamp));

    let csv = render_flagged_csv(&alerts).unwrap();
    assert_eq!(csv.lines().count(), alerts.len() + 1);
}
