//! Conflict-slot derivation.
//!
//! For every slot observed across the scheduled classes, the classes whose
//! descriptor is exactly that slot are mutually exclusive for one professor.
//! Classes that only partially overlap the slot are paired one-by-one with
//! the exact members they actually share a meeting instance with.

use log::trace;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::{ClassId, CourseClass};
use crate::schedule::{SlotKey, classes_at_time, classes_on_day, possible_schedules};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictPlan {
    /// Classes sharing one exact descriptor, at most one per professor.
    pub exclusive_groups: BTreeMap<SlotKey, BTreeSet<ClassId>>,
    /// Ordered pairs (smaller id first) that share a meeting instance without
    /// sharing a descriptor.
    pub overlapping_pairs: BTreeSet<(ClassId, ClassId)>,
}

impl ConflictPlan {
    pub fn derive(classes: &BTreeMap<ClassId, CourseClass>) -> Self {
        let mut plan = ConflictPlan::default();

        for slot in possible_schedules(classes.values()) {
            let exact: BTreeSet<ClassId> = classes
                .values()
                .filter(|class| class.schedule.is_scheduled() && class.schedule.slot_key() == slot)
                .map(|class| class.id.clone())
                .collect();

            for partial_id in partial_overlaps(classes, &slot, &exact) {
                let partial = &classes[&partial_id];
                for exact_id in &exact {
                    if classes[exact_id].schedule.overlaps(&partial.schedule) {
                        plan.overlapping_pairs.insert(ordered(exact_id, &partial_id));
                    }
                }
            }

            if exact.len() > 1 {
                trace!("slot {}/{} groups {:?}", slot.day, slot.time, exact);
                plan.exclusive_groups.insert(slot, exact);
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.exclusive_groups.is_empty() && self.overlapping_pairs.is_empty()
    }
}

/// Classes with a meeting inside `slot` whose own descriptor differs from it.
fn partial_overlaps(
    classes: &BTreeMap<ClassId, CourseClass>,
    slot: &SlotKey,
    exact: &BTreeSet<ClassId>,
) -> BTreeSet<ClassId> {
    let mut candidates = BTreeSet::new();
    for day in slot.day.split(',') {
        let on_day = classes_on_day(classes, day);
        for time in slot.time.split(',') {
            let at_time = classes_at_time(classes, time);
            candidates.extend(on_day.intersection(&at_time).cloned());
        }
    }

    candidates
        .into_iter()
        .filter(|id| !exact.contains(id))
        .filter(|id| classes[id].schedule.meetings().iter().any(|m| slot.covers(m)))
        .collect()
}

fn ordered(a: &ClassId, b: &ClassId) -> (ClassId, ClassId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CourseType;
    use crate::schedule::{Meeting, ScheduleDescriptor};

    fn table(classes: &[(&str, &[(&str, &str)])]) -> BTreeMap<ClassId, CourseClass> {
        classes
            .iter()
            .map(|(id, meetings)| {
                let schedule = ScheduleDescriptor::new(meetings.iter().map(|(d, t)| Meeting::new(*d, *t)));
                (id.to_string(), CourseClass::new(*id, "ICP000", 4, CourseType::Required, schedule))
            })
            .collect()
    }

    #[test]
    fn identical_descriptors_form_one_group() {
        let classes = table(&[
            ("A", &[("TER", "08:00-10:00"), ("QUI", "08:00-10:00")]),
            ("B", &[("TER", "08:00-10:00"), ("QUI", "08:00-10:00")]),
            ("C", &[("TER", "13:00-15:00"), ("QUI", "13:00-15:00")]),
        ]);

        let plan = ConflictPlan::derive(&classes);

        assert_eq!(plan.exclusive_groups.len(), 1);
        let group = plan.exclusive_groups.values().next().unwrap();
        assert_eq!(group, &BTreeSet::from(["A".to_string(), "B".to_string()]));
        assert!(plan.overlapping_pairs.is_empty());
    }

    #[test]
    fn shared_meeting_yields_one_pair() {
        let classes = table(&[
            ("ICP489", &[("SEG", "08:00-10:00"), ("QUA", "08:00-10:00")]),
            ("ICP102", &[("QUA", "08:00-10:00"), ("SEX", "08:00-10:00")]),
        ]);

        let plan = ConflictPlan::derive(&classes);

        assert!(plan.exclusive_groups.is_empty());
        assert_eq!(
            plan.overlapping_pairs,
            BTreeSet::from([("ICP102".to_string(), "ICP489".to_string())])
        );
    }

    #[test]
    fn crossed_day_and_time_is_not_a_conflict() {
        // B meets on A's day and at A's time, but never on A's day at A's time.
        let classes = table(&[
            ("A", &[("SEG", "13:00-15:00")]),
            ("B", &[("SEG", "08:00-10:00"), ("TER", "13:00-15:00")]),
        ]);

        assert!(ConflictPlan::derive(&classes).is_empty());
    }

    #[test]
    fn unscheduled_classes_never_conflict() {
        let classes = table(&[("OPT-1", &[]), ("OPT-2", &[]), ("A", &[("SEG", "08:00-10:00")])]);

        assert!(ConflictPlan::derive(&classes).is_empty());
    }
}
