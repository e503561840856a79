//! Assembles the immutable tables the model is built from.

use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::data::{
    ClassId, CourseClass, DUMMY_PROFESSOR, Professor, ProfessorCategory, ProfessorId, ShortfallKind, TimetablingInput,
};
use crate::error::TimetablingError;
use crate::model::{assignment_name, slack_name};

#[derive(Debug, Clone)]
pub struct Catalog {
    /// DUMMY first, then input order.
    professors: Vec<Professor>,
    /// Position of each professor in `professors`.
    professor_index: BTreeMap<ProfessorId, usize>,
    classes: BTreeMap<ClassId, CourseClass>,
    manual_allocations: BTreeMap<ClassId, ProfessorId>,
}

impl Catalog {
    pub fn assemble(input: &TimetablingInput) -> Result<Self, TimetablingError> {
        let professors = collect_professors(&input.professors)?;

        let mut classes: BTreeMap<ClassId, CourseClass> = BTreeMap::new();
        for class in &input.courses {
            if classes.insert(class.id.clone(), class.clone()).is_some() {
                return Err(TimetablingError::InvalidInput(format!(
                    "class `{}` is listed twice",
                    class.id
                )));
            }
            if !class.schedule.is_scheduled() {
                warn!("class {} has no schedule; it will not take part in conflict checks", class.id);
            }
        }

        let known: HashSet<&str> = professors.iter().map(|p| p.id.as_str()).collect();
        let mut manual_allocations = BTreeMap::new();
        for manual in &input.manual_allocations {
            if !known.contains(manual.professor.as_str()) {
                return Err(TimetablingError::InvalidInput(format!(
                    "manual allocation of `{}` names unknown professor `{}`",
                    manual.class.id, manual.professor
                )));
            }
            if manual_allocations
                .insert(manual.class.id.clone(), manual.professor.clone())
                .is_some()
            {
                return Err(TimetablingError::InvalidInput(format!(
                    "class `{}` is manually allocated twice",
                    manual.class.id
                )));
            }
            classes
                .entry(manual.class.id.clone())
                .or_insert_with(|| manual.class.clone());
        }

        for elective in &input.electives {
            if classes.contains_key(&elective.id) {
                continue;
            }
            let staffed = professors
                .iter()
                .any(|p| !p.is_dummy() && p.is_qualified_for(elective));
            if staffed {
                classes.insert(elective.id.clone(), elective.clone());
            } else {
                debug!("dropping elective {}: no professor is qualified", elective.id);
            }
        }

        check_variable_names(&professors, &classes)?;

        info!(
            "Catalog assembled: {} professors (including DUMMY), {} classes, {} manual allocations",
            professors.len(),
            classes.len(),
            manual_allocations.len()
        );

        let professor_index = professors
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Ok(Self {
            professors,
            professor_index,
            classes,
            manual_allocations,
        })
    }

    pub fn professors(&self) -> &[Professor] {
        &self.professors
    }

    pub fn professor(&self, id: &str) -> Option<&Professor> {
        self.professor_index.get(id).map(|&i| &self.professors[i])
    }

    pub fn classes(&self) -> &BTreeMap<ClassId, CourseClass> {
        &self.classes
    }

    pub fn class(&self, id: &str) -> Option<&CourseClass> {
        self.classes.get(id)
    }

    pub fn class_ids(&self) -> BTreeSet<ClassId> {
        self.classes.keys().cloned().collect()
    }

    pub fn manual_allocations(&self) -> &BTreeMap<ClassId, ProfessorId> {
        &self.manual_allocations
    }
}

fn collect_professors(input: &[Professor]) -> Result<Vec<Professor>, TimetablingError> {
    let mut professors = vec![Professor::dummy()];
    let mut seen = HashSet::from([DUMMY_PROFESSOR]);

    for professor in input {
        if professor.is_dummy() || professor.id == DUMMY_PROFESSOR {
            return Err(TimetablingError::InvalidInput(
                "the DUMMY professor is synthesized and must not be supplied".to_string(),
            ));
        }
        if !seen.insert(professor.id.as_str()) {
            return Err(TimetablingError::InvalidInput(format!(
                "professor `{}` is listed twice",
                professor.id
            )));
        }
        professors.push(professor.clone());
    }
    Ok(professors)
}

/// Every model variable is identified by its name alone, so two
/// (professor, class) pairs must never render the same one.
fn check_variable_names(
    professors: &[Professor],
    classes: &BTreeMap<ClassId, CourseClass>,
) -> Result<(), TimetablingError> {
    let mut names: BTreeMap<String, String> = BTreeMap::new();
    let mut claim = |name: String, owner: String| match names.get(&name) {
        Some(previous) => Err(TimetablingError::InvalidInput(format!(
            "variable name `{name}` is shared by {previous} and {owner}"
        ))),
        None => {
            names.insert(name, owner);
            Ok(())
        }
    };

    for professor in professors {
        for class in classes.values() {
            claim(
                assignment_name(&professor.id, class),
                format!("{} teaching {}", professor.id, class.id),
            )?;
        }
        let kind = match professor.category {
            ProfessorCategory::Permanent => ShortfallKind::Permanent,
            ProfessorCategory::Substitute => ShortfallKind::Substitute,
            ProfessorCategory::Dummy => continue,
        };
        claim(slack_name(kind, &professor.id), format!("the shortfall of {}", professor.id))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::data::{CourseType, ManualAllocation, ProfessorCategory};
    use crate::schedule::ScheduleDescriptor;

    fn input() -> TimetablingInput {
        TimetablingInput {
            professors: vec![
                Professor::new("ProfA", ProfessorCategory::Permanent).with_qualified_courses(["ICP131"]),
                Professor::new("ProfB", ProfessorCategory::Substitute).with_qualified_courses(["ICP123"]),
            ],
            courses: vec![CourseClass::new(
                "OBG-BCC1-1",
                "ICP131",
                4,
                CourseType::Required,
                ScheduleDescriptor::from_compound("SEG,QUA", "13:00-15:00"),
            )],
            electives: Vec::new(),
            manual_allocations: Vec::new(),
            config: ModelConfig::default(),
        }
    }

    fn elective(id: &str, course_id: &str) -> CourseClass {
        CourseClass::new(id, course_id, 4, CourseType::Elective, ScheduleDescriptor::unscheduled())
    }

    #[test]
    fn dummy_is_synthesized_first() {
        let catalog = Catalog::assemble(&input()).unwrap();

        let ids: Vec<_> = catalog.professors().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["DUMMY", "ProfA", "ProfB"]);
        assert!(catalog.professor("DUMMY").unwrap().is_dummy());
    }

    #[test]
    fn professor_lookup_by_id() {
        let catalog = Catalog::assemble(&input()).unwrap();

        assert_eq!(catalog.professor("ProfB").unwrap().category, ProfessorCategory::Substitute);
        assert!(catalog.professor("ProfZ").is_none());
    }

    #[test]
    fn colliding_variable_names_are_rejected() {
        let slot = || ScheduleDescriptor::from_compound("SEG", "08:00-10:00");
        let mut input = input();
        input.professors = vec![
            Professor::new("A", ProfessorCategory::Permanent),
            Professor::new("A_B", ProfessorCategory::Permanent),
        ];
        input.courses = vec![
            CourseClass::new("B_C", "ICP131", 4, CourseType::Required, slot()),
            CourseClass::new("C", "ICP123", 4, CourseType::Required, slot()),
        ];

        let err = Catalog::assemble(&input).unwrap_err();
        assert!(matches!(&err, TimetablingError::InvalidInput(msg) if msg.contains("A_B_C_SEG_08:00-10:00")));

        input.courses[1].schedule = ScheduleDescriptor::from_compound("TER", "08:00-10:00");
        assert!(Catalog::assemble(&input).is_ok());
    }

    #[test]
    fn supplied_dummy_is_rejected() {
        let mut input = input();
        input.professors.push(Professor::dummy());

        assert!(matches!(Catalog::assemble(&input), Err(TimetablingError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut twice = input();
        twice.courses.push(twice.courses[0].clone());
        assert!(matches!(Catalog::assemble(&twice), Err(TimetablingError::InvalidInput(_))));

        let mut twice = input();
        twice.professors.push(twice.professors[0].clone());
        assert!(matches!(Catalog::assemble(&twice), Err(TimetablingError::InvalidInput(_))));
    }

    #[test]
    fn electives_are_kept_only_when_someone_can_teach_them() {
        let mut input = input();
        input.electives = vec![
            elective("OPT-BCC1-1", "ICP131"),
            elective("OPT-BCC1-2", "ICP123"),
            elective("OPT-BCC1-3", "ICPXXX"),
        ];

        let catalog = Catalog::assemble(&input).unwrap();

        let ids: Vec<_> = catalog.classes().keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["OBG-BCC1-1", "OPT-BCC1-1", "OPT-BCC1-2"]);
        assert_eq!(catalog.class("OPT-BCC1-1").unwrap().schedule.day_descriptor(), "UNSCHEDULED");
    }

    #[test]
    fn manual_allocation_adds_its_class() {
        let mut input = input();
        input.electives = vec![elective("OPT-BCC1-9", "ICPXXX")];
        input.manual_allocations = vec![ManualAllocation {
            professor: "ProfB".to_string(),
            class: CourseClass::new(
                "OPT-BCC1-9",
                "ICPXXX",
                2,
                CourseType::Elective,
                ScheduleDescriptor::from_compound("TER", "10:00-12:00"),
            ),
        }];

        let catalog = Catalog::assemble(&input).unwrap();

        let class = catalog.class("OPT-BCC1-9").unwrap();
        assert_eq!(class.credits, 2);
        assert_eq!(class.schedule.day_descriptor(), "TER");
        assert_eq!(catalog.manual_allocations()["OPT-BCC1-9"], "ProfB");
    }

    #[test]
    fn manual_allocation_to_unknown_professor_is_rejected() {
        let mut input = input();
        input.manual_allocations = vec![ManualAllocation {
            professor: "Ghost".to_string(),
            class: input.courses[0].clone(),
        }];

        assert!(matches!(Catalog::assemble(&input), Err(TimetablingError::InvalidInput(_))));
    }
}
