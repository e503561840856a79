use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::ModelConfig;
use crate::schedule::ScheduleDescriptor;

// Type aliases for clarity
pub type ProfessorId = String;
pub type ClassId = String;
pub type CourseId = String;

pub const DUMMY_PROFESSOR: &str = "DUMMY";
pub const ALL_COURSES: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ProfessorCategory {
    #[serde(rename = "PERMANENT", alias = "PP")]
    Permanent,
    #[serde(rename = "SUBSTITUTE", alias = "PS")]
    Substitute,
    #[serde(rename = "DUMMY")]
    Dummy,
}

/// A member of the teaching staff, or the synthesized DUMMY sentinel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    pub id: ProfessorId,
    pub category: ProfessorCategory,
    #[serde(default)]
    pub qualified_courses: BTreeSet<CourseId>,
    /// Knowledge-area tags. Carried through, never used for allocation.
    #[serde(default)]
    pub expertise: BTreeSet<String>,
    /// Overrides the category-wide credit target.
    #[serde(default)]
    pub credit_target: Option<u32>,
}

impl Professor {
    pub fn new(id: impl Into<String>, category: ProfessorCategory) -> Self {
        Self {
            id: id.into(),
            category,
            qualified_courses: BTreeSet::new(),
            expertise: BTreeSet::new(),
            credit_target: None,
        }
    }

    pub fn dummy() -> Self {
        let mut dummy = Self::new(DUMMY_PROFESSOR, ProfessorCategory::Dummy);
        dummy.qualified_courses.insert(ALL_COURSES.to_string());
        dummy.expertise.insert(ALL_COURSES.to_string());
        dummy
    }

    pub fn with_qualified_courses(mut self, courses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.qualified_courses.extend(courses.into_iter().map(Into::into));
        self
    }

    pub fn is_dummy(&self) -> bool {
        self.category == ProfessorCategory::Dummy
    }

    /// Whether one of the class's course identifiers is in this professor's
    /// competence list. DUMMY is qualified for everything.
    pub fn is_qualified_for(&self, class: &CourseClass) -> bool {
        if self.is_dummy() {
            return true;
        }
        class
            .course_ids()
            .any(|course_id| self.qualified_courses.contains(course_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum CourseType {
    #[serde(rename = "OBG")]
    Required,
    #[serde(rename = "SVC")]
    Service,
    #[serde(rename = "OPT")]
    Elective,
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CourseType::Required => "OBG",
            CourseType::Service => "SVC",
            CourseType::Elective => "OPT",
        };
        f.write_str(code)
    }
}

/// One scheduled offering of a course.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", from = "CourseClassRecord")]
pub struct CourseClass {
    pub id: ClassId,
    /// Catalog code. Service classes may bundle several, comma-separated.
    pub course_id: CourseId,
    pub credits: u32,
    pub course_type: CourseType,
    pub schedule: ScheduleDescriptor,
    pub course_name: String,
    pub capacity: u32,
    pub class_type: String,
    pub responsable_institute: String,
    pub classroom_type: String,
    pub term: String,
    pub graduation_course: String,
}

impl CourseClass {
    pub fn new(
        id: impl Into<String>,
        course_id: impl Into<String>,
        credits: u32,
        course_type: CourseType,
        schedule: ScheduleDescriptor,
    ) -> Self {
        Self {
            id: id.into(),
            course_id: course_id.into(),
            credits,
            course_type,
            schedule,
            course_name: String::new(),
            capacity: 0,
            class_type: String::new(),
            responsable_institute: String::new(),
            classroom_type: String::new(),
            term: String::new(),
            graduation_course: String::new(),
        }
    }

    pub fn course_ids(&self) -> impl Iterator<Item = &str> {
        self.course_id
            .split(',')
            .map(str::trim)
            .filter(|course_id| !course_id.is_empty())
    }
}

/// Wire form of a class: either an explicit meeting list or the compound
/// `day`/`time` strings produced by the spreadsheet export.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseClassRecord {
    id: ClassId,
    course_id: CourseId,
    credits: u32,
    course_type: CourseType,
    #[serde(default)]
    schedule: Option<ScheduleDescriptor>,
    #[serde(default)]
    day: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    course_name: String,
    #[serde(default)]
    capacity: u32,
    #[serde(default)]
    class_type: String,
    #[serde(default)]
    responsable_institute: String,
    #[serde(default)]
    classroom_type: String,
    #[serde(default)]
    term: String,
    #[serde(default)]
    graduation_course: String,
}

impl From<CourseClassRecord> for CourseClass {
    fn from(record: CourseClassRecord) -> Self {
        let schedule = match (record.schedule, record.day, record.time) {
            (Some(schedule), _, _) => schedule,
            (None, Some(day), Some(time)) => ScheduleDescriptor::from_compound(&day, &time),
            _ => ScheduleDescriptor::unscheduled(),
        };
        Self {
            id: record.id,
            course_id: record.course_id,
            credits: record.credits,
            course_type: record.course_type,
            schedule,
            course_name: record.course_name,
            capacity: record.capacity,
            class_type: record.class_type,
            responsable_institute: record.responsable_institute,
            classroom_type: record.classroom_type,
            term: record.term,
            graduation_course: record.graduation_course,
        }
    }
}

/// A professor fixed to a class before solving.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAllocation {
    pub professor: ProfessorId,
    #[serde(flatten)]
    pub class: CourseClass,
}

/// The complete input for one term.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetablingInput {
    pub professors: Vec<Professor>,
    /// Required and service classes.
    pub courses: Vec<CourseClass>,
    #[serde(default)]
    pub electives: Vec<CourseClass>,
    #[serde(default)]
    pub manual_allocations: Vec<ManualAllocation>,
    #[serde(default)]
    pub config: ModelConfig,
}

/// One assigned class, enriched with its catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRow {
    pub responsable_institute: String,
    pub graduation_course: String,
    pub professor: ProfessorId,
    pub course_id: CourseId,
    pub course_name: String,
    pub day: String,
    pub time: String,
    pub capacity: u32,
    pub classroom_type: String,
    pub course_type: CourseType,
    pub term: String,
    pub class_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ShortfallKind {
    #[serde(rename = "PERMANENT")]
    Permanent,
    #[serde(rename = "SUBSTITUTE")]
    Substitute,
}

/// Credits a professor is short of their target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ShortfallRow {
    pub kind: ShortfallKind,
    pub professor: ProfessorId,
    pub credits_short: u32,
}

/// Describes a soft constraint that was not met in the final timetable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetablingOutput {
    pub timetable: Vec<TimetableRow>,
    pub shortfalls: Vec<ShortfallRow>,
    pub objective_value: f64,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}
