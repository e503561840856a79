//! Turns solved variables back into a timetable and a shortfall report.

use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::Catalog;
use crate::data::{
    ClassId, CourseClass, ProfessorId, ShortfallKind, ShortfallRow, TimetableRow, TimetablingOutput,
    UnmetSoftConstraint,
};
use crate::error::TimetablingError;
use crate::model::{PERMANENT_SLACK_PREFIX, SUBSTITUTE_SLACK_PREFIX};
use crate::solver::SolvedModel;

/// A parsed `<professor>_<class>_<day>_<time>` variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub professor: ProfessorId,
    pub class_id: ClassId,
    pub day: String,
    pub time: String,
}

/// Splits an assignment name. Professor and class ids may themselves contain
/// `_`, so every split point naming a known professor and a known class whose
/// descriptors match the trailing day and time is a candidate; exactly one
/// must remain.
pub fn parse_assignment(name: &str, catalog: &Catalog) -> Option<AssignmentRecord> {
    let mut tail = name.rsplitn(3, '_');
    let time = tail.next()?;
    let day = tail.next()?;
    let head = tail.next()?;

    let mut candidates = head.match_indices('_').filter_map(|(at, _)| {
        let (professor, class_id) = (&head[..at], &head[at + 1..]);
        let class = catalog.class(class_id)?;
        let matches = catalog.professor(professor).is_some()
            && class.schedule.day_descriptor() == day
            && class.schedule.time_descriptor() == time;
        matches.then(|| AssignmentRecord {
            professor: professor.to_string(),
            class_id: class_id.to_string(),
            day: day.to_string(),
            time: time.to_string(),
        })
    });

    let record = candidates.next()?;
    match candidates.next() {
        Some(other) => {
            warn!(
                "`{name}` reads as both {}/{} and {}/{}",
                record.professor, record.class_id, other.professor, other.class_id
            );
            None
        }
        None => Some(record),
    }
}

fn parse_slack(name: &str) -> Option<(ShortfallKind, &str)> {
    if let Some(professor) = name.strip_prefix(PERMANENT_SLACK_PREFIX) {
        Some((ShortfallKind::Permanent, professor))
    } else {
        name.strip_prefix(SUBSTITUTE_SLACK_PREFIX)
            .map(|professor| (ShortfallKind::Substitute, professor))
    }
}

fn timetable_row(record: &AssignmentRecord, class: &CourseClass) -> TimetableRow {
    TimetableRow {
        responsable_institute: class.responsable_institute.clone(),
        graduation_course: class.graduation_course.clone(),
        professor: record.professor.clone(),
        course_id: class.course_id.clone(),
        course_name: class.course_name.clone(),
        day: record.day.clone(),
        time: record.time.clone(),
        capacity: class.capacity,
        classroom_type: class.classroom_type.clone(),
        course_type: class.course_type,
        term: class.term.clone(),
        class_type: class.class_type.clone(),
    }
}

pub fn interpret(solved: &SolvedModel, catalog: &Catalog) -> Result<TimetablingOutput, TimetablingError> {
    let slack_names: BTreeSet<&str> = solved.slack_names.iter().map(String::as_str).collect();
    let mut slack_values: BTreeMap<&str, f64> = slack_names.iter().map(|name| (*name, 0.0)).collect();
    let mut assignments: BTreeMap<ClassId, AssignmentRecord> = BTreeMap::new();

    for variable in &solved.active {
        if slack_names.contains(variable.name.as_str()) {
            slack_values.insert(variable.name.as_str(), variable.value);
            continue;
        }
        let record = parse_assignment(&variable.name, catalog).ok_or_else(|| {
            TimetablingError::Interpretation(format!("unrecognised variable `{}`", variable.name))
        })?;
        if let Some(previous) = assignments.get(&record.class_id) {
            return Err(TimetablingError::Interpretation(format!(
                "class `{}` is assigned to both {} and {}",
                record.class_id, previous.professor, record.professor
            )));
        }
        assignments.insert(record.class_id.clone(), record);
    }

    let unassigned: Vec<&str> = catalog
        .classes()
        .keys()
        .filter(|id| !assignments.contains_key(*id))
        .map(String::as_str)
        .collect();
    if !unassigned.is_empty() {
        return Err(TimetablingError::Interpretation(format!(
            "classes without a professor: {}",
            unassigned.join(", ")
        )));
    }

    let mut unmet = Vec::new();
    let mut timetable = Vec::with_capacity(assignments.len());
    for (class_id, record) in &assignments {
        let Some(class) = catalog.class(class_id) else { continue };
        if catalog.professor(&record.professor).is_some_and(|p| p.is_dummy()) {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "UnstaffedClass".to_string(),
                description: format!("class {} ({}) was left to DUMMY", class.id, class.course_id),
            });
        }
        timetable.push(timetable_row(record, class));
    }
    timetable.sort();

    let mut shortfalls = Vec::with_capacity(slack_values.len());
    for (name, value) in slack_values {
        let (kind, professor) = parse_slack(name).ok_or_else(|| {
            TimetablingError::Interpretation(format!("`{name}` is not a shortfall variable"))
        })?;
        let credits_short = value.round().max(0.0) as u32;
        if credits_short > 0 {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "CreditTarget".to_string(),
                description: format!("professor {professor} is {credits_short} credits short of their target"),
            });
        }
        shortfalls.push(ShortfallRow {
            kind,
            professor: professor.to_string(),
            credits_short,
        });
    }
    shortfalls.sort();

    for constraint in &unmet {
        debug!("{constraint}");
    }
    info!(
        "Interpreted {} timetable rows and {} shortfall rows ({} soft constraints unmet)",
        timetable.len(),
        shortfalls.len(),
        unmet.len()
    );

    Ok(TimetablingOutput {
        timetable,
        shortfalls,
        objective_value: solved.objective_value,
        unmet_soft_constraints: unmet,
    })
}
