use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::warn;

use super::criteria::Criteria;
use super::domain::{Carrier, Rule};
use super::outcome::OutcomeOrder;

/// Display-ready annotation of a single rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    pub id: String,
    pub name: String,
    pub criteria: String,
    pub outcome: String,
    pub priority: f64,
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Annotated rule listing for one carrier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierRuleAudit {
    pub carrier_id: String,
    pub carrier_name: String,
    pub duplicate_criteria: Vec<String>,
    pub rules: Vec<RuleView>,
}

fn criteria_key(rule: &Rule) -> Option<&str> {
    rule.criteria
        .as_deref()
        .map(str::trim)
        .filter(|criteria| !criteria.is_empty())
}

/// Trimmed criteria strings shared by more than one rule.
pub fn find_duplicate_criteria(rules: &[Rule]) -> BTreeSet<String> {
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for key in rules.iter().filter_map(criteria_key) {
        if !seen.insert(key) {
            duplicates.insert(key.to_string());
        }
    }
    duplicates
}

pub fn annotate_rules(carrier: &Carrier, order: &OutcomeOrder) -> CarrierRuleAudit {
    let duplicates = find_duplicate_criteria(&carrier.rules);
    if !duplicates.is_empty() {
        warn!(
            carrier = %carrier.display_name(),
            criteria = ?duplicates,
            "duplicate underwriting criteria detected"
        );
    }

    let rules = carrier
        .rules
        .iter()
        .map(|rule| {
            let key = criteria_key(rule);
            let parse_error = key.and_then(|source| Criteria::parse(source).err().map(|err| err.to_string()));
            RuleView {
                id: rule.id.clone(),
                name: rule.display_name().to_string(),
                criteria: rule
                    .criteria
                    .clone()
                    .unwrap_or_else(|| "No criteria".to_string()),
                outcome: order.normalize(rule.outcome.as_deref().unwrap_or_default()).to_string(),
                priority: rule.effective_priority(),
                duplicate: key.map(|key| duplicates.contains(key)).unwrap_or(false),
                parse_error,
            }
        })
        .collect();

    CarrierRuleAudit {
        carrier_id: carrier.id.clone(),
        carrier_name: carrier.display_name().to_string(),
        duplicate_criteria: duplicates.into_iter().collect(),
        rules,
    }
}
