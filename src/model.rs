//! The assignment model: one binary variable per (professor, class), one
//! integer shortfall variable per professor with a credit target, hard
//! constraints, the credit-target soft constraint and the objective.
//!
//! The formulation is kept independent of the solver backend so it can be
//! inspected, re-solved on subsets of its constraints, and compared between
//! builds.

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::catalog::Catalog;
use crate::config::{CreditTarget, ModelParameters};
use crate::conflict::ConflictPlan;
use crate::data::{ClassId, CourseClass, CourseType, Professor, ProfessorCategory, ProfessorId, ShortfallKind};
use crate::qualification::{QualificationResolver, available_for_general_allocation, with_manual_allocations};

pub const PERMANENT_SLACK_PREFIX: &str = "PCB_";
pub const SUBSTITUTE_SLACK_PREFIX: &str = "PSB_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Binary,
    /// Integer bounded below by zero.
    NonNegativeInteger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Leq,
    Geq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintFamily {
    Manual,
    Unique,
    Qualification,
    NoDoubleBooking,
    SubstituteCap,
    PermanentCap,
    CreditTarget,
}

impl ConstraintFamily {
    pub const ALL: [ConstraintFamily; 7] = [
        ConstraintFamily::Manual,
        ConstraintFamily::Unique,
        ConstraintFamily::Qualification,
        ConstraintFamily::NoDoubleBooking,
        ConstraintFamily::SubstituteCap,
        ConstraintFamily::PermanentCap,
        ConstraintFamily::CreditTarget,
    ];
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintFamily::Manual => "manual",
            ConstraintFamily::Unique => "unique",
            ConstraintFamily::Qualification => "qualification",
            ConstraintFamily::NoDoubleBooking => "no-double-booking",
            ConstraintFamily::SubstituteCap => "substitute-cap",
            ConstraintFamily::PermanentCap => "permanent-cap",
            ConstraintFamily::CreditTarget => "credit-target",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub family: ConstraintFamily,
    pub label: String,
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub bound: f64,
}

impl LinearConstraint {
    fn new(family: ConstraintFamily, label: String, terms: Vec<(VarId, f64)>, relation: Relation, bound: f64) -> Self {
        Self {
            family,
            label,
            terms,
            relation,
            bound,
        }
    }

    /// Evaluates the constraint against a full assignment of values.
    pub fn is_satisfied_by(&self, values: &[f64]) -> bool {
        const TOLERANCE: f64 = 1e-4;
        let lhs: f64 = self.terms.iter().map(|(var, coef)| coef * values[var.index()]).sum();
        match self.relation {
            Relation::Eq => (lhs - self.bound).abs() <= TOLERANCE,
            Relation::Leq => lhs <= self.bound + TOLERANCE,
            Relation::Geq => lhs >= self.bound - TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlackVariable {
    pub professor: ProfessorId,
    pub kind: ShortfallKind,
    pub target: u32,
    pub weight: f64,
    pub var: VarId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimetablingModel {
    variables: Vec<VariableSpec>,
    assignments: BTreeMap<(ProfessorId, ClassId), VarId>,
    coefficients: BTreeMap<(ProfessorId, ClassId), f64>,
    slacks: Vec<SlackVariable>,
    constraints: Vec<LinearConstraint>,
    objective: Vec<(VarId, f64)>,
}

impl TimetablingModel {
    fn new_variable(&mut self, kind: VariableKind, name: String) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(VariableSpec { name, kind });
        id
    }

    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    pub fn variable_name(&self, var: VarId) -> &str {
        &self.variables[var.index()].name
    }

    #[cfg(test)]
    pub fn assignment(&self, professor: &str, class: &str) -> Option<VarId> {
        self.assignments
            .get(&(professor.to_string(), class.to_string()))
            .copied()
    }

    #[cfg(test)]
    pub fn coefficient(&self, professor: &str, class: &str) -> Option<f64> {
        self.coefficients
            .get(&(professor.to_string(), class.to_string()))
            .copied()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn slacks(&self) -> &[SlackVariable] {
        &self.slacks
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn constraints_of(&self, family: ConstraintFamily) -> impl Iterator<Item = &LinearConstraint> {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    /// Linear objective terms, to be maximised.
    pub fn objective(&self) -> &[(VarId, f64)] {
        &self.objective
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .map(|(var, coef)| coef * values[var.index()])
            .sum()
    }
}

/// Name of the assignment variable: `<professor>_<class>_<day>_<time>`.
pub fn assignment_name(professor: &str, class: &CourseClass) -> String {
    format!(
        "{}_{}_{}_{}",
        professor,
        class.id,
        class.schedule.day_descriptor(),
        class.schedule.time_descriptor()
    )
}

pub fn slack_name(kind: ShortfallKind, professor: &str) -> String {
    let prefix = match kind {
        ShortfallKind::Permanent => PERMANENT_SLACK_PREFIX,
        ShortfallKind::Substitute => SUBSTITUTE_SLACK_PREFIX,
    };
    format!("{prefix}{professor}")
}

pub struct ModelBuilder<'a> {
    catalog: &'a Catalog,
    params: &'a ModelParameters,
    model: TimetablingModel,
    /// Qualification alone, per professor.
    qualified: BTreeMap<ProfessorId, BTreeSet<ClassId>>,
    /// Qualification plus manual allocations, per professor.
    eligible: BTreeMap<ProfessorId, BTreeSet<ClassId>>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(catalog: &'a Catalog, params: &'a ModelParameters) -> Self {
        Self {
            catalog,
            params,
            model: TimetablingModel::default(),
            qualified: BTreeMap::new(),
            eligible: BTreeMap::new(),
        }
    }

    pub fn build(mut self) -> TimetablingModel {
        info!(
            "Setting up assignment model with {} professors and {} classes...",
            self.catalog.professors().len(),
            self.catalog.classes().len()
        );

        self.resolve_qualifications();
        self.declare_assignments();
        self.declare_slacks();

        self.add_manual_allocations();
        self.add_unique_teacher();
        self.add_qualification();
        self.add_no_double_booking();
        self.add_workload_caps();
        self.add_credit_targets();
        self.set_objective();

        for family in ConstraintFamily::ALL {
            debug!("{family}: {} constraints", self.model.constraints_of(family).count());
        }
        info!(
            "Model has {} variables ({} assignments, {} slacks) and {} constraints.",
            self.model.variables.len(),
            self.model.assignment_count(),
            self.model.slacks.len(),
            self.model.constraints.len()
        );
        self.model
    }

    fn resolve_qualifications(&mut self) {
        let catalog = self.catalog;
        let resolver = QualificationResolver::new(catalog.professors(), catalog.classes());
        for professor in catalog.professors() {
            let qualified = resolver.qualified_or_empty(&professor.id);
            let eligible = with_manual_allocations(&professor.id, qualified.clone(), catalog.manual_allocations());
            self.qualified.insert(professor.id.clone(), qualified);
            self.eligible.insert(professor.id.clone(), eligible);
        }
    }

    fn is_basic_service(&self, class: &CourseClass) -> bool {
        class.course_type == CourseType::Service
            && class
                .course_ids()
                .any(|course_id| self.params.basic_service_courses.contains(course_id))
    }

    fn coefficient_for(&self, professor: &Professor, class: &CourseClass) -> f64 {
        if professor.is_dummy() {
            return self.params.dummy_coefficient;
        }
        if self.is_basic_service(class) {
            return match professor.category {
                ProfessorCategory::Substitute => self.params.substitute_service_coefficient,
                _ => self.params.permanent_service_coefficient,
            };
        }
        if self.eligible[&professor.id].contains(&class.id) {
            self.params.default_coefficient
        } else {
            0.0
        }
    }

    fn declare_assignments(&mut self) {
        let catalog = self.catalog;
        for professor in catalog.professors() {
            for class in catalog.classes().values() {
                let coefficient = self.coefficient_for(professor, class);
                let var = self
                    .model
                    .new_variable(VariableKind::Binary, assignment_name(&professor.id, class));
                let key = (professor.id.clone(), class.id.clone());
                self.model.assignments.insert(key.clone(), var);
                self.model.coefficients.insert(key, coefficient);
            }
        }
    }

    fn credit_target(&self, professor: &Professor) -> Option<(ShortfallKind, CreditTarget)> {
        let (kind, category_target) = match professor.category {
            ProfessorCategory::Permanent => (ShortfallKind::Permanent, Some(self.params.permanent_target)),
            ProfessorCategory::Substitute => (ShortfallKind::Substitute, self.params.substitute_target),
            ProfessorCategory::Dummy => return None,
        };
        let target = category_target?;
        let credits = professor.credit_target.unwrap_or(target.credits);
        Some((
            kind,
            CreditTarget {
                credits,
                slack_weight: target.slack_weight,
            },
        ))
    }

    fn declare_slacks(&mut self) {
        let catalog = self.catalog;
        for professor in catalog.professors() {
            if let Some((kind, target)) = self.credit_target(professor) {
                let var = self
                    .model
                    .new_variable(VariableKind::NonNegativeInteger, slack_name(kind, &professor.id));
                self.model.slacks.push(SlackVariable {
                    professor: professor.id.clone(),
                    kind,
                    target: target.credits,
                    weight: target.slack_weight,
                    var,
                });
            }
        }
    }

    fn var(&self, professor: &str, class: &str) -> VarId {
        self.model.assignments[&(professor.to_string(), class.to_string())]
    }

    fn push(&mut self, constraint: LinearConstraint) {
        self.model.constraints.push(constraint);
    }

    fn add_manual_allocations(&mut self) {
        let catalog = self.catalog;
        for (class_id, professor) in catalog.manual_allocations() {
            let var = self.var(professor, class_id);
            self.push(LinearConstraint::new(
                ConstraintFamily::Manual,
                format!("manual[{class_id}->{professor}]"),
                vec![(var, 1.0)],
                Relation::Eq,
                1.0,
            ));
        }
        debug!("Added {} manual allocation constraints", catalog.manual_allocations().len());
    }

    fn add_unique_teacher(&mut self) {
        let catalog = self.catalog;
        for class_id in catalog.classes().keys() {
            let terms = catalog
                .professors()
                .iter()
                .map(|p| (self.var(&p.id, class_id), 1.0))
                .collect();
            self.push(LinearConstraint::new(
                ConstraintFamily::Unique,
                format!("unique[{class_id}]"),
                terms,
                Relation::Eq,
                1.0,
            ));
        }
    }

    fn add_qualification(&mut self) {
        let catalog = self.catalog;
        let general = available_for_general_allocation(&catalog.class_ids(), catalog.manual_allocations());
        let pool: BTreeSet<ClassId> = general
            .into_iter()
            .filter(|id| !self.is_basic_service(&catalog.classes()[id]))
            .collect();

        for professor in catalog.professors() {
            let terms: Vec<(VarId, f64)> = pool
                .difference(&self.qualified[&professor.id])
                .map(|class_id| (self.var(&professor.id, class_id), 1.0))
                .collect();
            if terms.is_empty() {
                continue;
            }
            self.push(LinearConstraint::new(
                ConstraintFamily::Qualification,
                format!("qualification[{}]", professor.id),
                terms,
                Relation::Eq,
                0.0,
            ));
        }
    }

    /// Classes the professor could ever hold. Every other pair is already
    /// pinned to zero by the qualification or manual/unique constraints.
    fn reachable(&self, professor: &Professor) -> BTreeSet<ClassId> {
        self.catalog
            .classes()
            .values()
            .filter(|class| self.eligible[&professor.id].contains(&class.id) || self.is_basic_service(class))
            .map(|class| class.id.clone())
            .collect()
    }

    fn add_no_double_booking(&mut self) {
        let catalog = self.catalog;
        let plan = ConflictPlan::derive(catalog.classes());
        if plan.is_empty() {
            debug!("No two classes share a meeting; skipping no-double-booking");
            return;
        }
        debug!(
            "Conflict plan: {} exclusive groups, {} overlapping pairs",
            plan.exclusive_groups.len(),
            plan.overlapping_pairs.len()
        );

        let mut added = 0usize;
        for professor in catalog.professors().iter().filter(|p| !p.is_dummy()) {
            let reachable = self.reachable(professor);

            for (slot, group) in &plan.exclusive_groups {
                let terms: Vec<(VarId, f64)> = group
                    .intersection(&reachable)
                    .map(|class_id| (self.var(&professor.id, class_id), 1.0))
                    .collect();
                if terms.len() < 2 {
                    continue;
                }
                self.push(LinearConstraint::new(
                    ConstraintFamily::NoDoubleBooking,
                    format!("no-double-booking[{}@{}_{}]", professor.id, slot.day, slot.time),
                    terms,
                    Relation::Leq,
                    1.0,
                ));
                added += 1;
            }

            for (a, b) in &plan.overlapping_pairs {
                if !(reachable.contains(a) && reachable.contains(b)) {
                    continue;
                }
                self.push(LinearConstraint::new(
                    ConstraintFamily::NoDoubleBooking,
                    format!("no-overlap[{}@{a}|{b}]", professor.id),
                    vec![(self.var(&professor.id, a), 1.0), (self.var(&professor.id, b), 1.0)],
                    Relation::Leq,
                    1.0,
                ));
                added += 1;
            }
        }
        debug!("Added {added} no-double-booking constraints");
    }

    fn credit_terms(&self, professor: &str) -> Vec<(VarId, f64)> {
        self.catalog
            .classes()
            .values()
            .map(|class| (self.var(professor, &class.id), f64::from(class.credits)))
            .collect()
    }

    fn add_workload_caps(&mut self) {
        let catalog = self.catalog;
        for professor in catalog.professors() {
            let (family, cap) = match professor.category {
                ProfessorCategory::Substitute => (ConstraintFamily::SubstituteCap, Some(self.params.max_credits_substitute)),
                ProfessorCategory::Permanent => (ConstraintFamily::PermanentCap, self.params.max_credits_permanent),
                ProfessorCategory::Dummy => continue,
            };
            let Some(cap) = cap else { continue };
            let terms = self.credit_terms(&professor.id);
            self.push(LinearConstraint::new(
                family,
                format!("{family}[{}<={cap}]", professor.id),
                terms,
                Relation::Leq,
                f64::from(cap),
            ));
        }
    }

    fn add_credit_targets(&mut self) {
        // assigned credits + slack == target
        for slack in self.model.slacks.clone() {
            let mut terms = self.credit_terms(&slack.professor);
            terms.push((slack.var, 1.0));
            self.push(LinearConstraint::new(
                ConstraintFamily::CreditTarget,
                format!("credit-target[{}=={}]", slack.professor, slack.target),
                terms,
                Relation::Eq,
                f64::from(slack.target),
            ));
        }
    }

    fn set_objective(&mut self) {
        let mut objective: Vec<(VarId, f64)> = self
            .model
            .coefficients
            .iter()
            .filter(|(_, coefficient)| **coefficient != 0.0)
            .map(|(key, coefficient)| (self.model.assignments[key], *coefficient))
            .collect();
        objective.extend(self.model.slacks.iter().map(|s| (s.var, -s.weight)));
        objective.sort_by_key(|(var, _)| *var);
        self.model.objective = objective;
        info!("Objective defined with preference coefficients and credit shortfall penalties.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::data::{CourseType, ManualAllocation, TimetablingInput};
    use crate::schedule::ScheduleDescriptor;

    fn config() -> ModelConfig {
        ModelConfig {
            permanent_credit_target: Some(8),
            permanent_slack_weight: Some(1000.0),
            max_credits_substitute: Some(12),
            basic_service_courses: ["MAB120".to_string()].into(),
            ..ModelConfig::default()
        }
    }

    fn input() -> TimetablingInput {
        TimetablingInput {
            professors: vec![
                Professor::new("Adriana", ProfessorCategory::Permanent).with_qualified_courses(["ICP131"]),
                Professor::new("Raphael", ProfessorCategory::Substitute).with_qualified_courses(["ICP123"]),
            ],
            courses: vec![
                CourseClass::new("OBG-BCC1-1", "ICP131", 4, CourseType::Required, ScheduleDescriptor::from_compound("SEG,QUA", "13:00-15:00,08:00-10:00")),
                CourseClass::new("OBG-BCC1-2", "ICP123", 4, CourseType::Required, ScheduleDescriptor::from_compound("TER,QUI", "15:00-17:00")),
                CourseClass::new("SVC-MAB-1", "MAB120", 2, CourseType::Service, ScheduleDescriptor::from_compound("SEX", "10:00-12:00")),
            ],
            electives: Vec::new(),
            manual_allocations: Vec::new(),
            config: config(),
        }
    }

    fn build(input: &TimetablingInput) -> TimetablingModel {
        let catalog = Catalog::assemble(input).unwrap();
        let params = input.config.resolve().unwrap();
        ModelBuilder::new(&catalog, &params).build()
    }

    #[test]
    fn one_variable_per_professor_and_class() {
        let model = build(&input());

        assert_eq!(model.assignment_count(), 3 * 3);
        let var = model.assignment("Adriana", "OBG-BCC1-1").unwrap();
        assert_eq!(model.variable_name(var), "Adriana_OBG-BCC1-1_SEG,QUA_13:00-15:00,08:00-10:00");
        assert_eq!(model.variables()[var.index()].kind, VariableKind::Binary);
    }

    #[test]
    fn coefficients_follow_preference_rules() {
        let model = build(&input());

        assert_eq!(model.coefficient("DUMMY", "OBG-BCC1-1"), Some(1e-5));
        assert_eq!(model.coefficient("Adriana", "OBG-BCC1-1"), Some(100.0));
        assert_eq!(model.coefficient("Adriana", "OBG-BCC1-2"), Some(0.0));
        assert_eq!(model.coefficient("Adriana", "SVC-MAB-1"), Some(25.0));
        assert_eq!(model.coefficient("Raphael", "SVC-MAB-1"), Some(75.0));
        assert_eq!(model.coefficient("DUMMY", "SVC-MAB-1"), Some(1e-5));
    }

    #[test]
    fn slack_only_for_professors_with_a_target() {
        let model = build(&input());
        let names: Vec<_> = model.slacks().iter().map(|s| model.variable_name(s.var)).collect();
        assert_eq!(names, vec!["PCB_Adriana"]);

        let mut input = input();
        input.config.substitute_credit_target = Some(6);
        input.config.substitute_slack_weight = Some(500.0);
        input.professors[0].credit_target = Some(4);
        let model = build(&input);

        let slacks: Vec<_> = model
            .slacks()
            .iter()
            .map(|s| (model.variable_name(s.var).to_string(), s.target))
            .collect();
        assert_eq!(slacks, vec![("PCB_Adriana".to_string(), 4), ("PSB_Raphael".to_string(), 6)]);
        assert_eq!(model.variables()[model.slacks()[1].var.index()].kind, VariableKind::NonNegativeInteger);
    }

    #[test]
    fn unique_constraint_per_class() {
        let model = build(&input());
        let unique: Vec<_> = model.constraints_of(ConstraintFamily::Unique).collect();

        assert_eq!(unique.len(), 3);
        assert!(unique.iter().all(|c| c.terms.len() == 3 && c.relation == Relation::Eq && c.bound == 1.0));
    }

    #[test]
    fn qualification_skips_basic_service_and_manual_classes() {
        let mut input = input();
        input.manual_allocations = vec![ManualAllocation {
            professor: "Adriana".to_string(),
            class: input.courses[1].clone(),
        }];
        let model = build(&input);

        let adriana = model
            .constraints_of(ConstraintFamily::Qualification)
            .find(|c| c.label == "qualification[Adriana]");
        // OBG-BCC1-2 is fixed to her, SVC-MAB-1 is basic service, OBG-BCC1-1 is hers.
        assert!(adriana.is_none());

        let raphael = model
            .constraints_of(ConstraintFamily::Qualification)
            .find(|c| c.label == "qualification[Raphael]")
            .unwrap();
        assert_eq!(raphael.terms, vec![(model.assignment("Raphael", "OBG-BCC1-1").unwrap(), 1.0)]);
        assert_eq!(model.coefficient("Adriana", "OBG-BCC1-2"), Some(100.0));
        assert_eq!(model.constraints_of(ConstraintFamily::Manual).count(), 1);
    }

    #[test]
    fn exact_slot_conflict_only_for_reachable_classes() {
        let mut input = input();
        input.professors[0].qualified_courses.insert("ICP489".to_string());
        input.courses.push(CourseClass::new(
            "OBG-BCC2-1",
            "ICP489",
            4,
            CourseType::Required,
            ScheduleDescriptor::from_compound("SEG,QUA", "13:00-15:00,08:00-10:00"),
        ));
        let model = build(&input);

        let conflicts: Vec<_> = model.constraints_of(ConstraintFamily::NoDoubleBooking).collect();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].label.starts_with("no-double-booking[Adriana@"));
        assert_eq!(conflicts[0].terms.len(), 2);
        assert!(model.constraints().iter().all(|c| !c.label.contains("DUMMY@")));
    }

    #[test]
    fn caps_and_targets_weigh_credits() {
        let mut input = input();
        input.config.max_credits_permanent = Some(12);
        let model = build(&input);

        let cap = model.constraints_of(ConstraintFamily::SubstituteCap).next().unwrap();
        assert_eq!(cap.label, "substitute-cap[Raphael<=12]");
        assert_eq!(cap.relation, Relation::Leq);
        let credits: Vec<f64> = cap.terms.iter().map(|(_, c)| *c).collect();
        assert_eq!(credits, vec![4.0, 4.0, 2.0]);
        assert_eq!(model.constraints_of(ConstraintFamily::PermanentCap).count(), 1);

        let target = model.constraints_of(ConstraintFamily::CreditTarget).next().unwrap();
        assert_eq!(target.relation, Relation::Eq);
        assert_eq!(target.bound, 8.0);
        assert_eq!(target.terms.last(), Some(&(model.slacks()[0].var, 1.0)));
    }

    #[test]
    fn objective_rewards_preferences_and_penalises_slack() {
        let model = build(&input());

        let slack = model.slacks()[0].var;
        assert!(model.objective().contains(&(slack, -1000.0)));
        let zero = model.assignment("Adriana", "OBG-BCC1-2").unwrap();
        assert!(model.objective().iter().all(|(var, _)| *var != zero));
    }

    #[test]
    fn building_twice_is_identical() {
        let input = input();
        assert_eq!(build(&input), build(&input));
    }

    #[test]
    fn constraint_evaluation() {
        let constraint = LinearConstraint::new(
            ConstraintFamily::NoDoubleBooking,
            "pair".to_string(),
            vec![(VarId(0), 1.0), (VarId(1), 1.0)],
            Relation::Leq,
            1.0,
        );
        assert!(constraint.is_satisfied_by(&[1.0, 0.0]));
        assert!(!constraint.is_satisfied_by(&[1.0, 1.0]));
    }
}
