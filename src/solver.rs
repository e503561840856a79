use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, default_solver,
    variable,
};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::catalog::Catalog;
use crate::config::SolverSettings;
use crate::data::{TimetablingInput, TimetablingOutput};
use crate::error::TimetablingError;
use crate::interpret;
use crate::model::{
    ConstraintFamily, LinearConstraint, ModelBuilder, Relation, TimetablingModel, VariableKind, VariableSpec,
};

/// Values at or below this are treated as zero when reading the solution.
const ACTIVE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedVariable {
    pub name: String,
    pub value: f64,
}

/// What the interpreter needs from a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedModel {
    pub objective_value: f64,
    /// Variables with a positive value, in declaration order.
    pub active: Vec<SolvedVariable>,
    /// Every shortfall variable name, so that met targets still get a row.
    pub slack_names: Vec<String>,
}

/// Runs the whole pipeline: validate constants, assemble the catalog, build the
/// model, solve it and interpret the result.
pub fn solve(input: &TimetablingInput) -> Result<TimetablingOutput, TimetablingError> {
    let start_time = Instant::now();

    let params = input.config.resolve()?;
    let catalog = Catalog::assemble(input)?;
    params.check_slack_dominance(catalog.classes().len())?;
    let model = ModelBuilder::new(&catalog, &params).build();
    let solved = solve_model(&model, &params.solver)?;
    let output = interpret::interpret(&solved, &catalog)?;

    info!("Timetable produced in {:.2?}", start_time.elapsed());
    Ok(output)
}

/// Solves the model with HiGHS. An infeasible model is reported together with
/// an irreducible subset of conflicting constraints when enabled.
pub fn solve_model(model: &TimetablingModel, settings: &SolverSettings) -> Result<SolvedModel, TimetablingError> {
    let start_time = Instant::now();
    info!("Starting ILP solver...");

    let all: Vec<&LinearConstraint> = model.constraints().iter().collect();
    let values = match run(model, &all, true, settings, settings.time_limit_seconds) {
        Ok(values) => values,
        Err(ResolutionError::Infeasible) => {
            warn!("Model is infeasible");
            let conflicts = if settings.explain_infeasibility {
                explain_infeasibility(model, settings)
            } else {
                Vec::new()
            };
            return Err(TimetablingError::Infeasible { conflicts });
        }
        Err(e) => return Err(TimetablingError::Solver(e.to_string())),
    };
    info!("Solution found in {:.2?}", start_time.elapsed());

    if let Some(violated) = model.constraints().iter().find(|c| !c.is_satisfied_by(&values)) {
        return Err(TimetablingError::Solver(format!(
            "solution violates {}",
            violated.label
        )));
    }

    let active = model
        .variables()
        .iter()
        .zip(&values)
        .filter(|(_, value)| **value > ACTIVE_THRESHOLD)
        .map(|(spec, value)| SolvedVariable {
            name: spec.name.clone(),
            value: value.round(),
        })
        .collect();
    let slack_names = model
        .slacks()
        .iter()
        .map(|slack| model.variable_name(slack.var).to_string())
        .collect();

    Ok(SolvedModel {
        objective_value: model.objective_value(&values),
        active,
        slack_names,
    })
}

/// Deletion filter: drop whole constraint families first, then single
/// constraints, keeping each out whenever the rest stays infeasible. Every
/// re-solve draws from one shared budget; once it runs out the subset found so
/// far is returned, conflicting but possibly not irreducible.
fn explain_infeasibility(model: &TimetablingModel, settings: &SolverSettings) -> Vec<String> {
    info!(
        "Searching for a minimal conflicting subset among {} constraints...",
        model.constraints().len()
    );
    let mut filter = DeletionFilter {
        model,
        settings,
        deadline: Instant::now() + Duration::from_secs_f64(settings.explanation_budget_seconds),
        kept: model.constraints().iter().collect(),
    };

    for family in ConstraintFamily::ALL {
        if !filter.try_drop(|c| c.family == family, &family.to_string()) {
            return filter.labels();
        }
    }
    let mut i = 0;
    while i < filter.kept.len() {
        let label = filter.kept[i].label.clone();
        let before = filter.kept.len();
        if !filter.try_drop(|c| c.label == label, &label) {
            break;
        }
        if filter.kept.len() == before {
            i += 1;
        }
    }
    filter.labels()
}

struct DeletionFilter<'a> {
    model: &'a TimetablingModel,
    settings: &'a SolverSettings,
    deadline: Instant,
    kept: Vec<&'a LinearConstraint>,
}

impl DeletionFilter<'_> {
    /// Drops the kept constraints matching `selected` if the remainder is
    /// still infeasible. Returns false once the budget is spent.
    fn try_drop(&mut self, selected: impl Fn(&LinearConstraint) -> bool, what: &str) -> bool {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!("Infeasibility explanation budget spent; the reported conflict may not be minimal");
            return false;
        }
        let candidate: Vec<&LinearConstraint> = self.kept.iter().copied().filter(|c| !selected(*c)).collect();
        if candidate.len() == self.kept.len() {
            return true;
        }

        let limit = match self.settings.time_limit_seconds {
            Some(limit) => limit.min(remaining.as_secs_f64()),
            None => remaining.as_secs_f64(),
        };
        match run(self.model, &candidate, false, self.settings, Some(limit)) {
            Err(ResolutionError::Infeasible) => {
                debug!("{what} is not needed for infeasibility");
                self.kept = candidate;
            }
            Ok(_) => debug!("{what} is part of the conflict"),
            Err(e) => debug!("{what} kept, re-solve inconclusive: {e}"),
        }
        true
    }

    fn labels(&self) -> Vec<String> {
        self.kept.iter().map(|c| c.label.clone()).collect()
    }
}

fn definition(spec: &VariableSpec) -> good_lp::VariableDefinition {
    match spec.kind {
        VariableKind::Binary => variable().binary().name(spec.name.clone()),
        VariableKind::NonNegativeInteger => variable().integer().min(0).name(spec.name.clone()),
    }
}

fn to_good_lp(constraint: &LinearConstraint, handles: &[Variable]) -> Constraint {
    let mut lhs = Expression::with_capacity(constraint.terms.len());
    for (var, coefficient) in &constraint.terms {
        lhs.add_mul(*coefficient, handles[var.index()]);
    }
    match constraint.relation {
        Relation::Eq => lhs.eq(constraint.bound),
        Relation::Leq => lhs.leq(constraint.bound),
        Relation::Geq => lhs.geq(constraint.bound),
    }
}

/// One call into the backend. Returns every variable's value in declaration
/// order. Without `with_objective` it is a pure feasibility check.
fn run(
    model: &TimetablingModel,
    constraints: &[&LinearConstraint],
    with_objective: bool,
    settings: &SolverSettings,
    time_limit: Option<f64>,
) -> Result<Vec<f64>, ResolutionError> {
    let mut problem = ProblemVariables::new();
    let handles: Vec<Variable> = model
        .variables()
        .iter()
        .map(|spec| problem.add(definition(spec)))
        .collect();

    let mut objective = Expression::with_capacity(model.objective().len());
    if with_objective {
        for (var, coefficient) in model.objective() {
            objective.add_mul(*coefficient, handles[var.index()]);
        }
    }

    let mut solver_model = problem
        .maximise(objective)
        .using(default_solver)
        .set_option("threads", settings.threads) // single thread keeps runs reproducible
        .set_option("random_seed", settings.random_seed)
        .set_option("log_to_console", if settings.log_to_console { "true" } else { "false" });
    if let Some(limit) = time_limit {
        solver_model = solver_model.set_option("time_limit", limit);
    }

    for constraint in constraints {
        solver_model.add_constraint(to_good_lp(constraint, &handles));
    }

    let solution = solver_model.solve()?;
    Ok(handles.iter().map(|var| solution.value(*var)).collect())
}
