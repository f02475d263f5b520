//! Underwriting rule evaluation: carriers, criteria matching, probability
//! normalization, and the ambient configuration, logging, and persistence
//! used by the service front ends.

pub mod catalog;
pub mod config;
pub mod error;
pub mod logs;
pub mod report;
pub mod telemetry;
pub mod underwriting;

pub use underwriting::{
    evaluate_client_for_carrier, normalize_outcome, Carrier, Client, EvaluationEngine,
    EvaluationOptions, EvaluationResult, OutcomeOrder, ProbabilityDistribution, Rule,
};
