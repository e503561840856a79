use log::warn;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::{ClassId, CourseClass, Professor, ProfessorId};
use crate::error::UnknownProfessor;

/// Answers "which classes may this professor teach".
pub struct QualificationResolver<'a> {
    professors: BTreeMap<&'a str, &'a Professor>,
    classes: &'a BTreeMap<ClassId, CourseClass>,
}

impl<'a> QualificationResolver<'a> {
    pub fn new(professors: &'a [Professor], classes: &'a BTreeMap<ClassId, CourseClass>) -> Self {
        Self {
            professors: professors.iter().map(|p| (p.id.as_str(), p)).collect(),
            classes,
        }
    }

    pub fn qualified(&self, professor_id: &str) -> Result<BTreeSet<ClassId>, UnknownProfessor> {
        let professor = self
            .professors
            .get(professor_id)
            .ok_or_else(|| UnknownProfessor(professor_id.to_string()))?;

        if professor.is_dummy() {
            return Ok(self.classes.keys().cloned().collect());
        }
        Ok(self
            .classes
            .values()
            .filter(|class| professor.is_qualified_for(class))
            .map(|class| class.id.clone())
            .collect())
    }

    /// Like [`qualified`](Self::qualified), but an unknown professor is logged
    /// and treated as qualified for nothing.
    pub fn qualified_or_empty(&self, professor_id: &str) -> BTreeSet<ClassId> {
        self.qualified(professor_id).unwrap_or_else(|err| {
            warn!("{err}; treating as qualified for no class");
            BTreeSet::new()
        })
    }
}

/// Adds the classes manually fixed to `professor_id`.
pub fn with_manual_allocations(
    professor_id: &str,
    mut qualified: BTreeSet<ClassId>,
    manual_allocations: &BTreeMap<ClassId, ProfessorId>,
) -> BTreeSet<ClassId> {
    qualified.extend(
        manual_allocations
            .iter()
            .filter(|(_, professor)| professor.as_str() == professor_id)
            .map(|(class_id, _)| class_id.clone()),
    );
    qualified
}

/// Classes not already fixed by a manual allocation.
pub fn available_for_general_allocation(
    all_class_ids: &BTreeSet<ClassId>,
    manual_allocations: &BTreeMap<ClassId, ProfessorId>,
) -> BTreeSet<ClassId> {
    all_class_ids
        .iter()
        .filter(|class_id| !manual_allocations.contains_key(*class_id))
        .cloned()
        .collect()
}
