//! `;`-delimited tables persisted after a solve, one file per record set.

use log::info;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::data::{ShortfallKind, ShortfallRow, TimetableRow, TimetablingOutput};

pub const TIMETABLE_FILE: &str = "timeschedule.csv";
pub const PERMANENT_SHORTFALL_FILE: &str = "pcb_professors.csv";
pub const SUBSTITUTE_SHORTFALL_FILE: &str = "psb_professors.csv";

const DELIMITER: char = ';';

/// Keeps a field from breaking the row layout.
fn field(value: &str) -> String {
    value.replace([DELIMITER, '\n', '\r'], " ")
}

pub fn write_timetable<W: Write>(out: &mut W, rows: &[TimetableRow]) -> io::Result<()> {
    for row in rows {
        let columns = [
            field(&row.responsable_institute),
            field(&row.graduation_course),
            field(&row.professor),
            field(&row.course_id),
            field(&row.course_name),
            field(&row.day),
            field(&row.time),
            row.capacity.to_string(),
            field(&row.classroom_type),
            row.course_type.to_string(),
            field(&row.term),
            field(&row.class_type),
        ];
        writeln!(out, "{}", columns.join(";"))?;
    }
    Ok(())
}

/// Writes the rows of one category only.
pub fn write_shortfalls<W: Write>(out: &mut W, rows: &[ShortfallRow], kind: ShortfallKind) -> io::Result<()> {
    for row in rows.iter().filter(|row| row.kind == kind) {
        writeln!(out, "{}{DELIMITER}{}", field(&row.professor), row.credits_short)?;
    }
    Ok(())
}

pub fn persist(dir: &Path, output: &TimetablingOutput) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    let mut timetable = BufWriter::new(File::create(dir.join(TIMETABLE_FILE))?);
    write_timetable(&mut timetable, &output.timetable)?;
    timetable.flush()?;

    for (file, kind) in [
        (PERMANENT_SHORTFALL_FILE, ShortfallKind::Permanent),
        (SUBSTITUTE_SHORTFALL_FILE, ShortfallKind::Substitute),
    ] {
        let mut out = BufWriter::new(File::create(dir.join(file))?);
        write_shortfalls(&mut out, &output.shortfalls, kind)?;
        out.flush()?;
    }

    info!("Results written to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CourseType;

    fn row() -> TimetableRow {
        TimetableRow {
            responsable_institute: "IC".to_string(),
            graduation_course: "BCC".to_string(),
            professor: "Adriana".to_string(),
            course_id: "ICP131".to_string(),
            course_name: "Computação I; teoria".to_string(),
            day: "SEG,QUA".to_string(),
            time: "13:00-15:00".to_string(),
            capacity: 60,
            classroom_type: "Lab".to_string(),
            course_type: CourseType::Required,
            term: "1".to_string(),
            class_type: "T".to_string(),
        }
    }

    #[test]
    fn timetable_rows_follow_column_order() {
        let mut out = Vec::new();
        write_timetable(&mut out, &[row()]).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "IC;BCC;Adriana;ICP131;Computação I  teoria;SEG,QUA;13:00-15:00;60;Lab;OBG;1;T\n"
        );
    }

    #[test]
    fn shortfalls_are_split_by_category() {
        let rows = vec![
            ShortfallRow {
                kind: ShortfallKind::Permanent,
                professor: "Adriana".to_string(),
                credits_short: 4,
            },
            ShortfallRow {
                kind: ShortfallKind::Substitute,
                professor: "Raphael".to_string(),
                credits_short: 0,
            },
        ];

        let mut permanent = Vec::new();
        write_shortfalls(&mut permanent, &rows, ShortfallKind::Permanent).unwrap();
        let mut substitute = Vec::new();
        write_shortfalls(&mut substitute, &rows, ShortfallKind::Substitute).unwrap();

        assert_eq!(String::from_utf8(permanent).unwrap(), "Adriana;4\n");
        assert_eq!(String::from_utf8(substitute).unwrap(), "Raphael;0\n");
    }

    #[test]
    fn persist_writes_all_three_files() {
        let dir = std::env::temp_dir().join(format!("timetabling-report-{}", std::process::id()));
        let output = TimetablingOutput {
            timetable: vec![row()],
            shortfalls: Vec::new(),
            objective_value: 0.0,
            unmet_soft_constraints: Vec::new(),
        };

        persist(&dir, &output).unwrap();

        for file in [TIMETABLE_FILE, PERMANENT_SHORTFALL_FILE, SUBSTITUTE_SHORTFALL_FILE] {
            assert!(dir.join(file).exists());
        }
        assert!(fs::read_to_string(dir.join(PERMANENT_SHORTFALL_FILE)).unwrap().is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}
