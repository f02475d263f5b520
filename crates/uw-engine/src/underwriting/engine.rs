use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::criteria::{self, CriteriaContext};
use super::distribution::{ObservedOutcomes, ProbabilityDistribution};
use super::domain::{Carrier, Client, EvaluationResult, Rule};
use super::outcome::{OutcomeOrder, NEUTRAL_WEIGHT, NOT_APPLICABLE};

/// Per-call evaluation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_order: Option<OutcomeOrder>,
}

/// Evaluates a client against a single carrier.
///
/// Never fails: criteria errors count as non-matches and malformed numbers
/// fall back to their defaults.
pub fn evaluate_client_for_carrier(
    client: &Client,
    carrier: &Carrier,
    options: &EvaluationOptions,
) -> EvaluationResult {
    let fallback = OutcomeOrder::default();
    let order = options.outcome_order.as_ref().unwrap_or(&fallback);
    evaluate_with_order(client, carrier, order)
}

fn evaluate_with_order(client: &Client, carrier: &Carrier, order: &OutcomeOrder) -> EvaluationResult {
    let carrier_json = match serde_json::to_value(carrier) {
        Ok(value) => value,
        Err(error) => {
            warn!(carrier = %carrier.id, %error, "carrier could not be exposed to criteria");
            JsonValue::Null
        }
    };
    let context = CriteriaContext::new(client.attributes(), &carrier_json);

    let mut probabilities = ProbabilityDistribution::from_base(&carrier.base_probabilities, order);
    let mut observed = ObservedOutcomes::new();

    let matched: Vec<&Rule> = carrier
        .rules
        .iter()
        .filter(|rule| criteria::matches(rule.criteria.as_deref(), &context))
        .collect();

    let (outcome, weight) = if matched.is_empty() {
        (order.normalize(NOT_APPLICABLE).to_string(), NEUTRAL_WEIGHT)
    } else {
        for rule in &matched {
            if let Some(shift) = &rule.probability_shift {
                probabilities.apply_shift(shift, order, &mut observed);
            }
        }

        let prioritized = prioritized_rule(&matched);
        debug!(
            carrier = %carrier.id,
            matched = matched.len(),
            rule = %prioritized.id,
            "resolved prioritized rule"
        );

        let outcome = order.normalize(prioritized.outcome.as_deref().unwrap_or_default());
        let weight = match prioritized.weight {
            Some(weight) if weight.is_finite() => weight,
            _ => base_weight(carrier),
        };
        (outcome.to_string(), weight)
    };

    probabilities.normalize(&observed, order);

    EvaluationResult {
        outcome,
        weight,
        matches: matched.into_iter().cloned().collect(),
        probabilities,
    }
}

/// Highest priority wins; `sort_by` is stable, so the first-declared rule wins ties.
fn prioritized_rule<'a>(matched: &[&'a Rule]) -> &'a Rule {
    let mut ranked = matched.to_vec();
    ranked.sort_by(|a, b| b.effective_priority().total_cmp(&a.effective_priority()));
    ranked[0]
}

fn base_weight(carrier: &Carrier) -> f64 {
    match carrier.base_weight {
        Some(weight) if weight.is_finite() => weight,
        _ => NEUTRAL_WEIGHT,
    }
}

/// Evaluation tagged with the carrier it was produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierEvaluation {
    pub carrier_id: String,
    pub carrier_name: String,
    #[serde(flatten)]
    pub result: EvaluationResult,
}

impl CarrierEvaluation {
    /// One-line description suitable for the outcome log.
    pub fn summary(&self) -> String {
        let matched = match self.result.matches.len() {
            0 => "no matching rules".to_string(),
            1 => "1 matching rule".to_string(),
            count => format!("{count} matching rules"),
        };
        format!(
            "{}: {} (weight {:.2}, {})",
            self.carrier_name, self.result.outcome, self.result.weight, matched
        )
    }
}

/// Stateless evaluator bound to one outcome vocabulary.
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine {
    order: OutcomeOrder,
}

impl EvaluationEngine {
    pub fn new(order: OutcomeOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &OutcomeOrder {
        &self.order
    }

    pub fn evaluate(&self, client: &Client, carrier: &Carrier) -> EvaluationResult {
        evaluate_with_order(client, carrier, &self.order)
    }

    /// Evaluates every carrier independently, preserving the caller's order.
    pub fn evaluate_carriers<'a, I>(&self, client: &Client, carriers: I) -> Vec<CarrierEvaluation>
    where
        I: IntoIterator<Item = &'a Carrier>,
    {
        carriers
            .into_iter()
            .map(|carrier| CarrierEvaluation {
                carrier_id: carrier.id.clone(),
                carrier_name: carrier.display_name().to_string(),
                result: self.evaluate(client, carrier),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn shift(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(label, value)| (label.to_string(), *value))
            .collect()
    }

    fn rule(id: &str, criteria: &str, outcome: &str, weight: f64, priority: f64) -> Rule {
        Rule {
            id: id.to_string(),
            criteria: Some(criteria.to_string()),
            outcome: Some(outcome.to_string()),
            weight: Some(weight),
            priority: Some(priority),
            ..Rule::default()
        }
    }

    fn carrier(rules: Vec<Rule>) -> Carrier {
        Carrier {
            id: "test".to_string(),
            name: "Test Carrier".to_string(),
            base_outcome: Some("Standard".to_string()),
            base_weight: Some(1.0),
            base_probabilities: shift(&[("Preferred", 0.3), ("Standard", 0.4), ("Substandard", 0.3)]),
            rules,
        }
    }

    fn client() -> Client {
        Client::new()
            .with("age", 45)
            .with("creditScore", 680)
            .with("smoker", false)
            .with("bmi", 29)
    }

    #[test]
    fn equal_priorities_resolve_to_first_declared_rule() {
        let carrier = carrier(vec![
            rule("first", "client.age > 40", "Substandard", 0.8, 2.0),
            rule("second", "client.bmi > 20", "Decline", 0.5, 2.0),
            rule("low", "client.age > 0", "Preferred", 1.5, 1.0),
        ]);

        let result = EvaluationEngine::default().evaluate(&client(), &carrier);

        assert_eq!(result.matches.len(), 3);
        assert_eq!(result.outcome, "Substandard");
        assert_eq!(result.weight, 0.8);
    }

    #[test]
    fn higher_priority_overrides_declaration_order() {
        let carrier = carrier(vec![
            rule("first", "client.age > 40", "Substandard", 0.8, 0.0),
            rule("second", "client.bmi > 20", "Decline", 0.5, 3.0),
        ]);

        let result = EvaluationEngine::default().evaluate(&client(), &carrier);

        assert_eq!(result.outcome, "Decline");
        assert_eq!(result.weight, 0.5);
    }

    #[test]
    fn non_finite_rule_weight_falls_back_to_carrier_weight() {
        let mut carrier = carrier(vec![rule("r", "client.age > 40", "Preferred", f64::NAN, 1.0)]);
        carrier.base_weight = Some(1.1);

        let result = EvaluationEngine::default().evaluate(&client(), &carrier);
        assert_eq!(result.weight, 1.1);

        carrier.base_weight = Some(f64::INFINITY);
        let result = EvaluationEngine::default().evaluate(&client(), &carrier);
        assert_eq!(result.weight, NEUTRAL_WEIGHT);
    }

    #[test]
    fn missing_rule_outcome_uses_default_label() {
        let mut matching = rule("r", "client.age > 40", "", 1.0, 0.0);
        matching.outcome = None;

        let result = EvaluationEngine::default().evaluate(&client(), &carrier(vec![matching]));
        assert_eq!(result.outcome, "Standard");
    }

    #[test]
    fn shifts_accumulate_across_all_matches() {
        let mut winner = rule("winner", "client.age > 40", "Decline", 0.7, 5.0);
        winner.probability_shift = Some(shift(&[("Decline", 0.4), ("Standard", -0.3)]));
        let mut other = rule("other", "client.bmi > 20", "Substandard", 0.9, 1.0);
        other.probability_shift = Some(shift(&[("Substandard", 0.2)]));
        let mut unmatched = rule("unmatched", "client.smoker", "Decline", 0.1, 9.0);
        unmatched.probability_shift = Some(shift(&[("Decline", 5.0)]));

        let result = EvaluationEngine::default()
            .evaluate(&client(), &carrier(vec![winner, other, unmatched]));

        // 0.3 + 0.1 + 0.5 + 0.4 = 1.3 of total mass
        let total = 1.3;
        assert!((result.probabilities.share("Preferred") - 0.3 / total).abs() < 1e-9);
        assert!((result.probabilities.share("Standard") - 0.1 / total).abs() < 1e-9);
        assert!((result.probabilities.share("Substandard") - 0.5 / total).abs() < 1e-9);
        assert!((result.probabilities.share("Decline") - 0.4 / total).abs() < 1e-9);
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn criteria_can_reference_the_carrier() {
        let carrier = carrier(vec![rule(
            "self",
            "carrier.baseWeight === 1 && carrier.rules.length === 1",
            "Preferred",
            1.2,
            0.0,
        )]);

        let result = EvaluationEngine::default().evaluate(&client(), &carrier);
        assert_eq!(result.outcome, "Preferred");
    }

    #[test]
    fn options_override_the_vocabulary() {
        let order = OutcomeOrder::new(["Super Preferred", "Preferred", "Standard", "Decline"])
            .expect("valid order");
        let options = EvaluationOptions {
            outcome_order: Some(order),
        };

        let result = evaluate_client_for_carrier(&client(), &carrier(Vec::new()), &options);

        // "N/A" is not in this vocabulary and maps onto the default label.
        assert_eq!(result.outcome, "Standard");
        let labels: Vec<&str> = result.probabilities.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, ["Super Preferred", "Preferred", "Standard", "Decline"]);
    }

    #[test]
    fn batch_evaluation_keeps_caller_order() {
        let first = Carrier {
            id: "b".to_string(),
            ..carrier(vec![rule("r", "client.age > 40", "Decline", 0.6, 0.0)])
        };
        let second = Carrier {
            id: "a".to_string(),
            name: String::new(),
            ..carrier(Vec::new())
        };

        let evaluations = EvaluationEngine::default().evaluate_carriers(&client(), [&first, &second]);

        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[0].carrier_id, "b");
        assert_eq!(
            evaluations[0].summary(),
            "Test Carrier: Decline (weight 0.60, 1 matching rule)"
        );
        assert_eq!(evaluations[1].carrier_name, "a");
        assert_eq!(
            evaluations[1].summary(),
            "a: N/A (weight 1.00, no matching rules)"
        );
    }
}
