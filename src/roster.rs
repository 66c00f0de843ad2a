// keepers for the local view of the roster and the per-student history ledger

use core::hash::BuildHasherDefault;
use std::collections::hash_set::Iter;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use seahash::SeaHasher;

// ------------- StudentId -------------
pub type StudentId = u64;

// ------------- Level -------------
// A reading level is a free-form label ("Iniciante" .. "Avançado" in the
// original product); nothing in the tracker depends on a closed set.
pub type Level = String;

pub type StudentHasher = BuildHasherDefault<SeaHasher>;

pub const GENESIS: StudentId = 0;

#[derive(Debug)]
pub struct StudentIdGenerator {
    lower_bound: StudentId,
    retained: HashSet<StudentId, StudentHasher>,
    released: Vec<StudentId>,
}

impl StudentIdGenerator {
    pub fn new() -> Self {
        Self {
            lower_bound: GENESIS,
            retained: HashSet::<StudentId, StudentHasher>::default(),
            released: Vec::new(),
        }
    }
    // Identities are generated for new students, but a restore from the
    // store of record hands back previously assigned ones. The retain
    // function keeps the lower bound above everything already taken.
    pub fn retain(&mut self, id: StudentId) {
        self.retained.insert(id);
        if id > self.lower_bound {
            self.lower_bound = id;
        }
    }
    pub fn check(&self, id: StudentId) -> Option<StudentId> {
        self.retained.get(&id).cloned()
    }
    pub fn release(&mut self, id: StudentId) {
        if self.retained.remove(&id) {
            self.released.push(id);
        }
    }
    pub fn generate(&mut self) -> StudentId {
        self.released.pop().unwrap_or_else(|| {
            self.lower_bound += 1;
            self.retained.insert(self.lower_bound);
            self.lower_bound
        })
    }
    pub fn iter(&self) -> Iter<StudentId> {
        self.retained.iter()
    }
}

// ------------- Enrollment -------------
// The enrollment state is a tagged variant rather than a bag of optional
// fields: a start date or entry level cannot exist outside an open episode.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum Enrollment {
    NotEnrolled,
    Enrolled {
        started_on: NaiveDate,
        entry_level: Level,
    },
}

impl Enrollment {
    pub fn is_enrolled(&self) -> bool {
        matches!(self, Enrollment::Enrolled { .. })
    }
    pub fn started_on(&self) -> Option<NaiveDate> {
        match self {
            Enrollment::Enrolled { started_on, .. } => Some(*started_on),
            Enrollment::NotEnrolled => None,
        }
    }
    pub fn entry_level(&self) -> Option<&Level> {
        match self {
            Enrollment::Enrolled { entry_level, .. } => Some(entry_level),
            Enrollment::NotEnrolled => None,
        }
    }
}

impl fmt::Display for Enrollment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Enrollment::NotEnrolled => write!(f, "not enrolled"),
            Enrollment::Enrolled {
                started_on,
                entry_level,
            } => write!(f, "enrolled since {} at {}", started_on, entry_level),
        }
    }
}

// ------------- Student -------------
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Student {
    id: StudentId,
    name: String,
    class_id: String,
    reading_level: Level,
    enrollment: Enrollment,
}

impl Student {
    pub fn new(
        id: StudentId,
        name: String,
        class_id: String,
        reading_level: Level,
        enrollment: Enrollment,
    ) -> Self {
        Self {
            id,
            name,
            class_id,
            reading_level,
            enrollment,
        }
    }
    // It's intentional to encapsulate the fields in the struct and only
    // expose them using "getters", because this yields true immutability
    // for objects after creation. A transition produces a new student.
    pub fn id(&self) -> StudentId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn class_id(&self) -> &str {
        &self.class_id
    }
    pub fn reading_level(&self) -> &Level {
        &self.reading_level
    }
    pub fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }
    /// The same student with a different enrollment state and reading level,
    /// as produced by the lifecycle engine.
    pub fn with(&self, enrollment: Enrollment, reading_level: Level) -> Student {
        Student {
            id: self.id,
            name: self.name.clone(),
            class_id: self.class_id.clone(),
            reading_level,
            enrollment,
        }
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}, {}, {}]",
            self.id, self.name, self.class_id, self.reading_level, self.enrollment
        )
    }
}

// ------------- RemedialRecord -------------
// One closed remedial episode. Once appended to a ledger it is a historical
// fact: no update or delete exists anywhere in the crate.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct RemedialRecord {
    entry_date: NaiveDate,
    entry_level: Level,
    exit_date: NaiveDate,
    exit_level: Level,
    duration_days: i64,
}

impl RemedialRecord {
    /// Builds a closed episode, deriving the duration from the two dates.
    /// The duration is the ceiling of the absolute day difference, so a
    /// same-day enroll/discharge counts as zero days.
    pub fn new(
        entry_date: NaiveDate,
        entry_level: Level,
        exit_date: NaiveDate,
        exit_level: Level,
    ) -> Self {
        let duration_days = (exit_date - entry_date).num_days().abs();
        Self {
            entry_date,
            entry_level,
            exit_date,
            exit_level,
            duration_days,
        }
    }
    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }
    pub fn entry_level(&self) -> &Level {
        &self.entry_level
    }
    pub fn exit_date(&self) -> NaiveDate {
        self.exit_date
    }
    pub fn exit_level(&self) -> &Level {
        &self.exit_level
    }
    pub fn duration_days(&self) -> i64 {
        self.duration_days
    }
}

impl fmt::Display for RemedialRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{} {} -> {} {}, {} days]",
            self.entry_date, self.entry_level, self.exit_date, self.exit_level, self.duration_days
        )
    }
}

// ------------- Roster -------------
// The local in-memory view consumed by the UI. Mutated only by the
// synchronizer; callers get shared snapshots.
#[derive(Debug)]
pub struct Roster {
    kept: HashMap<StudentId, Arc<Student>, StudentHasher>,
    ledger: HashMap<StudentId, Vec<Arc<RemedialRecord>>, StudentHasher>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            kept: HashMap::default(),
            ledger: HashMap::default(),
        }
    }
    pub fn keep(&mut self, student: Student) -> (Arc<Student>, bool) {
        let previously_kept = self.kept.contains_key(&student.id());
        let kept_student = Arc::new(student);
        self.kept.insert(kept_student.id(), Arc::clone(&kept_student));
        (kept_student, previously_kept)
    }
    pub fn get(&self, id: &StudentId) -> Option<Arc<Student>> {
        self.kept.get(id).map(Arc::clone)
    }
    // Cascading ownership: a student and its ledger leave together.
    pub fn remove(&mut self, id: &StudentId) -> Option<Arc<Student>> {
        self.ledger.remove(id);
        self.kept.remove(id)
    }
    /// Appends a closed episode to a student's ledger. This is the only
    /// mutation the ledger supports.
    pub fn append(&mut self, id: StudentId, record: RemedialRecord) -> Arc<RemedialRecord> {
        let kept_record = Arc::new(record);
        self.ledger
            .entry(id)
            .or_default()
            .push(Arc::clone(&kept_record));
        kept_record
    }
    /// The student's closed episodes in discharge order. Re-reading yields
    /// the same sequence until another append occurs.
    pub fn records_for(&self, id: &StudentId) -> Vec<Arc<RemedialRecord>> {
        self.ledger.get(id).cloned().unwrap_or_default()
    }
    pub fn students(&self) -> Vec<Arc<Student>> {
        let mut students: Vec<_> = self.kept.values().map(Arc::clone).collect();
        students.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        students
    }
    // "Who is currently enrolled" is derived by scanning enrollment state;
    // the ledger holds only closed episodes.
    pub fn enrolled(&self) -> Vec<Arc<Student>> {
        self.students()
            .into_iter()
            .filter(|s| s.enrollment().is_enrolled())
            .collect()
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
