// used for persistence
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, TrackerError};
use crate::roster::{Enrollment, RemedialRecord, Student, StudentId};

/// Where the store of record lives. In-memory mode is used by tests and
/// benchmarks; file mode survives restarts and is restored on startup.
#[derive(Clone, Debug)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// The remote store of record, reachable only through read/write operations.
///
/// The two write operations of a discharge (enrollment update and ledger
/// append) are deliberately separate entries here: they are not wrapped in
/// a transaction, and the synchronizer reports their outcomes one by one.
pub trait Store: Send {
    /// Inserts a new student row.
    fn persist_student(&mut self, student: &Student) -> Result<()>;
    /// Updates the enrollment fields and reading level on a student row.
    fn persist_enrollment(&mut self, student: &Student) -> Result<()>;
    /// Appends one closed episode to the history table. Insert-only.
    fn persist_record(&mut self, id: StudentId, record: &RemedialRecord) -> Result<()>;
    /// Removes a student row; the history rows cascade with it.
    fn remove_student(&mut self, id: StudentId) -> Result<()>;
    /// All student rows, for restore and reconciliation.
    fn restore_students(&mut self) -> Result<Vec<Student>>;
    /// All history rows in discharge order, for restore and reconciliation.
    fn restore_records(&mut self) -> Result<Vec<(StudentId, RemedialRecord)>>;
    /// Head of the tamper-evident ledger chain; None until the first append.
    fn ledger_head(&self) -> Option<String>;
}

// ------------- Persistence -------------
pub struct Persistor {
    db: Connection,
    head: Option<blake3::Hash>,
}

impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Persistor> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        // surface a wedged store as an error instead of blocking forever
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            "
            pragma foreign_keys = on;
            create table if not exists Student (
                Student_Identity integer not null,
                Name text not null,
                Class text not null,
                ReadingLevel text not null,
                InRemedial integer not null,
                RemedialStartDate text null,
                RemedialEntryLevel text null,
                constraint referenceable_Student_Identity primary key (
                    Student_Identity
                ),
                constraint enrollment_fields_iff_enrolled check (
                    (InRemedial = 0 and RemedialStartDate is null and RemedialEntryLevel is null)
                    or
                    (InRemedial = 1 and RemedialStartDate is not null and RemedialEntryLevel is not null)
                )
            );
            create table if not exists RemedialRecord (
                Record_Identity integer primary key autoincrement,
                Student_Identity integer not null,
                EntryDate text not null,
                EntryLevel text not null,
                ExitDate text not null,
                ExitLevel text not null,
                DurationDays integer not null,
                RecordHash text not null,
                constraint Record_belongs_to_Student foreign key (
                    Student_Identity
                ) references Student(Student_Identity) on delete cascade
            );
            ",
        )?;
        let head: Option<String> = connection
            .query_row(
                "
                select RecordHash
                    from RemedialRecord
                    order by Record_Identity desc
                    limit 1
            ",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let head = match head {
            Some(hex) => Some(blake3::Hash::from_hex(&hex).map_err(|e| {
                TrackerError::Corruption {
                    message: format!("ledger head is not a valid hash: {}", e),
                }
            })?),
            None => None,
        };
        Ok(Persistor {
            db: connection,
            head,
        })
    }

    // Every appended record extends a hash chain anchored in the previous
    // head, so a lost or altered closed episode breaks the chain.
    fn chain(&self, id: StudentId, record: &RemedialRecord) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        if let Some(head) = &self.head {
            hasher.update(head.as_bytes());
        }
        hasher.update(&id.to_le_bytes());
        hasher.update(
            format!(
                "{}|{}|{}|{}|{}",
                record.entry_date(),
                record.entry_level(),
                record.exit_date(),
                record.exit_level(),
                record.duration_days()
            )
            .as_bytes(),
        );
        hasher.finalize()
    }
}

impl Store for Persistor {
    fn persist_student(&mut self, student: &Student) -> Result<()> {
        let (in_remedial, started_on, entry_level) = enrollment_columns(student.enrollment());
        self.db.execute(
            "
            insert into Student (
                Student_Identity,
                Name,
                Class,
                ReadingLevel,
                InRemedial,
                RemedialStartDate,
                RemedialEntryLevel
            ) values (?, ?, ?, ?, ?, ?, ?)
        ",
            params![
                student.id(),
                student.name(),
                student.class_id(),
                student.reading_level(),
                in_remedial,
                started_on,
                entry_level
            ],
        )?;
        Ok(())
    }

    fn persist_enrollment(&mut self, student: &Student) -> Result<()> {
        let (in_remedial, started_on, entry_level) = enrollment_columns(student.enrollment());
        let changed = self.db.execute(
            "
            update Student
                set ReadingLevel = ?,
                    InRemedial = ?,
                    RemedialStartDate = ?,
                    RemedialEntryLevel = ?
                where Student_Identity = ?
        ",
            params![
                student.reading_level(),
                in_remedial,
                started_on,
                entry_level,
                student.id()
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::UnknownStudent(student.id()));
        }
        Ok(())
    }

    fn persist_record(&mut self, id: StudentId, record: &RemedialRecord) -> Result<()> {
        let hash = self.chain(id, record);
        self.db.execute(
            "
            insert into RemedialRecord (
                Student_Identity,
                EntryDate,
                EntryLevel,
                ExitDate,
                ExitLevel,
                DurationDays,
                RecordHash
            ) values (?, ?, ?, ?, ?, ?, ?)
        ",
            params![
                id,
                record.entry_date(),
                record.entry_level(),
                record.exit_date(),
                record.exit_level(),
                record.duration_days(),
                hash.to_hex().as_str()
            ],
        )?;
        self.head = Some(hash);
        Ok(())
    }

    fn remove_student(&mut self, id: StudentId) -> Result<()> {
        self.db.execute(
            "
            delete from Student
                where Student_Identity = ?
        ",
            params![id],
        )?;
        Ok(())
    }

    fn restore_students(&mut self) -> Result<Vec<Student>> {
        let mut statement = self.db.prepare_cached(
            "
            select Student_Identity,
                    Name,
                    Class,
                    ReadingLevel,
                    InRemedial,
                    RemedialStartDate,
                    RemedialEntryLevel
                from Student
                order by Name
        ",
        )?;
        let mut rows = statement.query([])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            let in_remedial: bool = row.get(4)?;
            let started_on: Option<NaiveDate> = row.get(5)?;
            let entry_level: Option<String> = row.get(6)?;
            let enrollment = match (in_remedial, started_on, entry_level) {
                (true, Some(started_on), Some(entry_level)) => Enrollment::Enrolled {
                    started_on,
                    entry_level,
                },
                (false, None, None) => Enrollment::NotEnrolled,
                _ => {
                    // unreachable while the check constraint holds
                    return Err(TrackerError::Corruption {
                        message: format!(
                            "student {} has enrollment fields without an open episode",
                            row.get::<_, StudentId>(0)?
                        ),
                    });
                }
            };
            students.push(Student::new(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                enrollment,
            ));
        }
        Ok(students)
    }

    fn restore_records(&mut self) -> Result<Vec<(StudentId, RemedialRecord)>> {
        let mut statement = self.db.prepare_cached(
            "
            select Student_Identity,
                    EntryDate,
                    EntryLevel,
                    ExitDate,
                    ExitLevel
                from RemedialRecord
                order by Record_Identity
        ",
        )?;
        let mut rows = statement.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push((
                row.get(0)?,
                RemedialRecord::new(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
            ));
        }
        Ok(records)
    }

    fn ledger_head(&self) -> Option<String> {
        self.head.as_ref().map(|h| h.to_hex().to_string())
    }
}
fn enrollment_columns(enrollment: &Enrollment) -> (bool, Option<NaiveDate>, Option<String>) {
    match enrollment {
        Enrollment::Enrolled {
            started_on,
            entry_level,
        } => (true, Some(*started_on), Some(entry_level.clone())),
        Enrollment::NotEnrolled => (false, None, None),
    }
}
