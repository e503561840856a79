use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::CourseId;
use crate::error::ConfigError;

/// Model constants as supplied by the caller. Required values are optional
/// here so that their absence surfaces as a [`ConfigError`] rather than a
/// deserialization failure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub permanent_credit_target: Option<u32>,
    pub substitute_credit_target: Option<u32>,
    pub max_credits_substitute: Option<u32>,
    pub max_credits_permanent: Option<u32>,
    pub permanent_slack_weight: Option<f64>,
    pub substitute_slack_weight: Option<f64>,
    #[serde(default = "default_dummy_coefficient")]
    pub dummy_coefficient: f64,
    #[serde(default = "default_coefficient")]
    pub default_coefficient: f64,
    #[serde(default = "default_permanent_service_coefficient")]
    pub permanent_service_coefficient: f64,
    #[serde(default = "default_substitute_service_coefficient")]
    pub substitute_service_coefficient: f64,
    #[serde(default)]
    pub basic_service_courses: BTreeSet<CourseId>,
    #[serde(default)]
    pub solver: SolverSettings,
}

fn default_dummy_coefficient() -> f64 {
    1e-5
}

fn default_coefficient() -> f64 {
    100.0
}

fn default_permanent_service_coefficient() -> f64 {
    25.0
}

fn default_substitute_service_coefficient() -> f64 {
    75.0
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            permanent_credit_target: None,
            substitute_credit_target: None,
            max_credits_substitute: None,
            max_credits_permanent: None,
            permanent_slack_weight: None,
            substitute_slack_weight: None,
            dummy_coefficient: default_dummy_coefficient(),
            default_coefficient: default_coefficient(),
            permanent_service_coefficient: default_permanent_service_coefficient(),
            substitute_service_coefficient: default_substitute_service_coefficient(),
            basic_service_courses: BTreeSet::new(),
            solver: SolverSettings::default(),
        }
    }
}

/// Knobs forwarded to HiGHS.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverSettings {
    pub threads: i32,
    pub random_seed: i32,
    pub time_limit_seconds: Option<f64>,
    pub log_to_console: bool,
    /// Search for a minimal conflicting constraint set when the model is infeasible.
    pub explain_infeasibility: bool,
    /// Wall-clock budget for that search, shared by all of its re-solves.
    pub explanation_budget_seconds: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            threads: 1,
            random_seed: 1234,
            time_limit_seconds: None,
            log_to_console: false,
            explain_infeasibility: true,
            explanation_budget_seconds: 30.0,
        }
    }
}

/// Credit target for one category together with its slack penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditTarget {
    pub credits: u32,
    pub slack_weight: f64,
}

/// Validated constants the model builder works from.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    pub permanent_target: CreditTarget,
    pub substitute_target: Option<CreditTarget>,
    pub max_credits_substitute: u32,
    pub max_credits_permanent: Option<u32>,
    pub dummy_coefficient: f64,
    pub default_coefficient: f64,
    pub permanent_service_coefficient: f64,
    pub substitute_service_coefficient: f64,
    pub basic_service_courses: BTreeSet<CourseId>,
    pub solver: SolverSettings,
}

impl ModelConfig {
    pub fn resolve(&self) -> Result<ModelParameters, ConfigError> {
        let permanent_target = CreditTarget {
            credits: self
                .permanent_credit_target
                .ok_or(ConfigError::Missing("permanentCreditTarget"))?,
            slack_weight: self
                .permanent_slack_weight
                .ok_or(ConfigError::Missing("permanentSlackWeight"))?,
        };
        let substitute_target = match self.substitute_credit_target {
            Some(credits) => Some(CreditTarget {
                credits,
                slack_weight: self
                    .substitute_slack_weight
                    .ok_or(ConfigError::Missing("substituteSlackWeight"))?,
            }),
            None => None,
        };
        let max_credits_substitute = self
            .max_credits_substitute
            .ok_or(ConfigError::Missing("maxCreditsSubstitute"))?;

        if !(self.default_coefficient > 0.0) {
            return Err(invalid("defaultCoefficient", "must be positive"));
        }
        if !(self.dummy_coefficient > 0.0 && self.dummy_coefficient < self.default_coefficient) {
            return Err(invalid(
                "dummyCoefficient",
                "must be positive and below defaultCoefficient",
            ));
        }
        for (name, value) in [
            ("permanentServiceCoefficient", self.permanent_service_coefficient),
            ("substituteServiceCoefficient", self.substitute_service_coefficient),
        ] {
            if !(value >= 0.0 && value < self.default_coefficient) {
                return Err(invalid(name, "must lie in [0, defaultCoefficient)"));
            }
        }

        // Lower bound only; the class count is checked by `check_slack_dominance`.
        let dominated = |weight: f64| weight > self.default_coefficient;
        if !dominated(permanent_target.slack_weight) {
            return Err(invalid("permanentSlackWeight", "must exceed defaultCoefficient"));
        }
        if let Some(target) = substitute_target {
            if !dominated(target.slack_weight) {
                return Err(invalid("substituteSlackWeight", "must exceed defaultCoefficient"));
            }
        }
        if let Some(limit) = self.solver.time_limit_seconds {
            if !(limit > 0.0) {
                return Err(invalid("solver.timeLimitSeconds", "must be positive"));
            }
        }
        let budget = self.solver.explanation_budget_seconds;
        if !(budget.is_finite() && budget >= 0.0) {
            return Err(invalid("solver.explanationBudgetSeconds", "must be a finite, non-negative number"));
        }

        Ok(ModelParameters {
            permanent_target,
            substitute_target,
            max_credits_substitute,
            max_credits_permanent: self.max_credits_permanent,
            dummy_coefficient: self.dummy_coefficient,
            default_coefficient: self.default_coefficient,
            permanent_service_coefficient: self.permanent_service_coefficient,
            substitute_service_coefficient: self.substitute_service_coefficient,
            basic_service_courses: self.basic_service_courses.clone(),
            solver: self.solver.clone(),
        })
    }
}

impl ModelParameters {
    /// One credit of shortfall must cost more than everything the preference
    /// term can gain by reshuffling `class_count` classes.
    pub fn check_slack_dominance(&self, class_count: usize) -> Result<(), ConfigError> {
        let bound = self.default_coefficient * class_count as f64;
        let targets = [
            ("permanentSlackWeight", Some(self.permanent_target)),
            ("substituteSlackWeight", self.substitute_target),
        ];
        for (name, target) in targets {
            let Some(target) = target else { continue };
            if !(target.slack_weight > bound) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("must exceed defaultCoefficient x {class_count} classes = {bound}"),
                });
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
