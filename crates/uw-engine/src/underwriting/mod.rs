//! Rule evaluation and probability normalization for carrier underwriting.

pub mod audit;
pub mod criteria;
pub mod distribution;
pub mod domain;
pub mod engine;
pub mod outcome;

pub use audit::{annotate_rules, find_duplicate_criteria, CarrierRuleAudit, RuleView};
pub use criteria::{Criteria, CriteriaContext, CriteriaError};
pub use distribution::{ObservedOutcomes, ProbabilityDistribution};
pub use domain::{Carrier, Client, EvaluationResult, Rule};
pub use engine::{
    evaluate_client_for_carrier, CarrierEvaluation, EvaluationEngine, EvaluationOptions,
};
pub use outcome::{
    normalize_outcome, OutcomeOrder, OutcomeOrderError, DEFAULT_OUTCOME, NEUTRAL_WEIGHT,
    NOT_APPLICABLE,
};
