//! End-to-end behavior of carrier evaluation through the public engine API.

use std::collections::BTreeMap;

use serde_json::json;
use uw_engine::underwriting::{
    evaluate_client_for_carrier, normalize_outcome, Carrier, Client, EvaluationEngine,
    EvaluationOptions, EvaluationResult, ObservedOutcomes, OutcomeOrder,
    ProbabilityDistribution, Rule,
};

const TOLERANCE: f64 = 1e-9;

fn shares(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(label, value)| (label.to_string(), *value))
        .collect()
}

fn young_preferred_carrier() -> Carrier {
    Carrier {
        id: "carrier-y".to_string(),
        name: "Youth Carrier".to_string(),
        base_outcome: Some("Standard".to_string()),
        base_weight: None,
        base_probabilities: shares(&[("Preferred", 0.3), ("Standard", 0.4), ("Substandard", 0.3)]),
        rules: vec![Rule {
            id: "young".to_string(),
            criteria: Some("client.age < 30".to_string()),
            outcome: Some("Preferred".to_string()),
            weight: Some(1.4),
            priority: Some(1.0),
            probability_shift: Some(shares(&[("Preferred", 0.1), ("Standard", -0.1)])),
            ..Rule::default()
        }],
    }
}

fn client(age: i64) -> Client {
    Client::new()
        .with("age", age)
        .with("creditScore", 700)
        .with("smoker", false)
        .with("bmi", 26)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn carriers_without_rules_are_not_applicable() {
    let mut carrier = young_preferred_carrier();
    carrier.rules.clear();
    carrier.base_weight = Some(0.2);

    for age in [0, 20, 45, 130] {
        let result =
            evaluate_client_for_carrier(&client(age), &carrier, &EvaluationOptions::default());
        assert_eq!(result.outcome, "N/A");
        assert_eq!(result.weight, 1.0);
        assert!(result.matches.is_empty());
    }
}

#[test]
fn unmatched_rule_leaves_base_distribution_normalized() {
    let result = EvaluationEngine::default().evaluate(&client(45), &young_preferred_carrier());

    assert_eq!(result.outcome, "N/A");
    assert_eq!(result.weight, 1.0);
    assert!(result.matches.is_empty());
    assert_close(result.probabilities.share("Preferred"), 0.3);
    assert_close(result.probabilities.share("Standard"), 0.4);
    assert_close(result.probabilities.share("Substandard"), 0.3);
}

#[test]
fn matched_rule_shifts_and_resolves_outcome() {
    let result = EvaluationEngine::default().evaluate(&client(20), &young_preferred_carrier());

    assert_eq!(result.outcome, "Preferred");
    assert_eq!(result.weight, 1.4);
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].id, "young");

    // 0.3 + 0.1, 0.4 - 0.1, 0.3 already sum to one.
    assert_close(result.probabilities.share("Preferred"), 0.4);
    assert_close(result.probabilities.share("Standard"), 0.3);
    assert_close(result.probabilities.share("Substandard"), 0.3);
    assert_close(result.probabilities.share("Decline"), 0.0);
    assert_close(result.probabilities.total(), 1.0);
}

#[test]
fn zero_sum_shift_splits_mass_across_observed_outcomes() {
    let carrier = Carrier {
        id: "empty-base".to_string(),
        rules: vec![Rule {
            id: "swing".to_string(),
            criteria: Some("client.age >= 18".to_string()),
            outcome: Some("Preferred".to_string()),
            probability_shift: Some(shares(&[("Preferred", 0.4), ("Standard", -0.4)])),
            ..Rule::default()
        }],
        ..Carrier::default()
    };

    let result = EvaluationEngine::default().evaluate(&client(40), &carrier);

    assert_close(result.probabilities.share("Preferred"), 0.5);
    assert_close(result.probabilities.share("Standard"), 0.5);
    for label in ["Substandard", "Decline", "N/A"] {
        assert_close(result.probabilities.share(label), 0.0);
    }
}

#[test]
fn broken_criteria_never_match() {
    let mut carrier = young_preferred_carrier();
    carrier.rules = ["client.missing.value > 1", "client.age <", "process.exit(1)", ""]
        .iter()
        .enumerate()
        .map(|(index, criteria)| Rule {
            id: format!("broken-{index}"),
            criteria: Some(criteria.to_string()),
            outcome: Some("Decline".to_string()),
            ..Rule::default()
        })
        .collect();

    let result = EvaluationEngine::default().evaluate(&client(20), &carrier);

    assert!(result.matches.is_empty());
    assert_eq!(result.outcome, "N/A");
}

#[test]
fn pathological_criteria_are_non_matches() {
    let mut carrier = young_preferred_carrier();
    let sources = [
        format!("{}client.age > 1{}", "(".repeat(10_000), ")".repeat(10_000)),
        format!("{}client.age > 1{}", "(".repeat(500), ")".repeat(500)),
        format!("{}client.smoker", "!".repeat(5_000)),
        format!("client.age{} > 1", " + 1".repeat(200_000)),
        format!("client.age{} > 1", " - 0".repeat(1_000)),
    ];
    carrier.rules = sources
        .iter()
        .enumerate()
        .map(|(index, criteria)| Rule {
            id: format!("deep-{index}"),
            criteria: Some(criteria.clone()),
            outcome: Some("Decline".to_string()),
            ..Rule::default()
        })
        .collect();

    let result = EvaluationEngine::default().evaluate(&client(20), &carrier);

    assert!(result.matches.is_empty());
    assert_eq!(result.outcome, "N/A");
}

#[test]
fn equal_priority_resolves_to_earlier_rule() {
    let rule = |id: &str, outcome: &str, weight: f64| Rule {
        id: id.to_string(),
        criteria: Some("client.age > 0".to_string()),
        outcome: Some(outcome.to_string()),
        weight: Some(weight),
        priority: Some(2.0),
        ..Rule::default()
    };
    let carrier = Carrier {
        id: "ties".to_string(),
        rules: vec![rule("first", "Substandard", 0.9), rule("second", "Decline", 0.4)],
        ..Carrier::default()
    };

    let result = EvaluationEngine::default().evaluate(&client(50), &carrier);
    assert_eq!(result.outcome, "Substandard");
    assert_eq!(result.weight, 0.9);

    let mut reversed = carrier.clone();
    reversed.rules.reverse();
    let result = EvaluationEngine::default().evaluate(&client(50), &reversed);
    assert_eq!(result.outcome, "Decline");
    assert_eq!(result.weight, 0.4);
}

#[test]
fn positive_mass_always_normalizes_to_one() {
    let order = OutcomeOrder::default();
    let bases = [
        shares(&[("Preferred", 2.0), ("Standard", 3.0)]),
        shares(&[("Preferred", 0.01)]),
        shares(&[("Preferred", 0.5), ("Decline", -0.2), ("Standard", 0.7)]),
        shares(&[("Elite Preferred", 1.0), ("Substandard", 3.0)]),
    ];

    for base in &bases {
        let mut distribution = ProbabilityDistribution::from_base(base, &order);
        distribution.normalize(&ObservedOutcomes::new(), &order);
        assert_close(distribution.total(), 1.0);
        assert!(distribution.iter().all(|(_, share)| share >= 0.0));
        assert_eq!(distribution.len(), order.len());
    }
}

#[test]
fn outcome_normalization_is_idempotent() {
    let orders = [
        OutcomeOrder::default(),
        OutcomeOrder::new(["Super Preferred", "Preferred", "Table 2", "Decline"]).expect("order"),
        OutcomeOrder::with_default(["A", "B"], "Fallback").expect("order"),
    ];
    let raw_labels = [
        "", "  ", "Elite Preferred", "preferred", "STANDARD", "Sub", "decline - tobacco",
        "n/a", "Table 2 rated", "unknown", "b", "Fallback",
    ];

    for order in &orders {
        for raw in raw_labels {
            let once = normalize_outcome(Some(raw), order);
            let twice = normalize_outcome(Some(once), order);
            assert_eq!(once, twice, "label {raw:?} in {:?}", order.labels());
            assert!(order.contains(once));
        }
        assert_eq!(normalize_outcome(None, order), order.default_outcome());
    }

    let order = OutcomeOrder::default();
    assert_eq!(order.normalize("Elite Preferred"), "Preferred");
    assert_eq!(order.normalize("something odd"), "Standard");
}

#[test]
fn results_round_trip_through_json() {
    let result = EvaluationEngine::default().evaluate(&client(20), &young_preferred_carrier());
    let encoded = serde_json::to_value(&result).expect("serializes");

    assert_eq!(encoded["outcome"], json!("Preferred"));
    assert_eq!(encoded["matches"][0]["probabilityShift"]["Preferred"], json!(0.1));
    let keys: Vec<&String> = encoded["probabilities"]
        .as_object()
        .expect("probability object")
        .keys()
        .collect();
    assert_eq!(keys.len(), 5);

    let decoded: EvaluationResult = serde_json::from_value(encoded).expect("deserializes");
    assert_eq!(decoded.outcome, result.outcome);
    assert_eq!(decoded.matches, result.matches);
    for (label, share) in result.probabilities.iter() {
        assert_close(decoded.probabilities.share(label), share);
    }
}

#[test]
fn carriers_parse_from_camel_case_json() {
    let carrier: Carrier = serde_json::from_value(json!({
        "id": "json-carrier",
        "name": "JSON Carrier",
        "baseWeight": 0.9,
        "baseProbabilities": { "Preferred": 1 },
        "rules": [{
            "id": "r1",
            "criteria": "client.smoker === true || client.bmi > 32",
            "outcome": "decline",
            "weight": 0.5,
            "priority": 4,
            "probabilityShift": { "Decline": 1 }
        }]
    }))
    .expect("carrier parses");
    let smoker = Client::new().with("smoker", true).with("bmi", 20);

    let result = EvaluationEngine::default().evaluate(&smoker, &carrier);

    assert_eq!(result.outcome, "Decline");
    assert_eq!(result.weight, 0.5);
    assert_close(result.probabilities.share("Preferred"), 0.5);
    assert_close(result.probabilities.share("Decline"), 0.5);
}
