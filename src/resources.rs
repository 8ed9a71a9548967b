//! Table descriptions for the CRUD endpoints.
//!
//! Each entity says which table it lives in, how to select it, how the list
//! is ordered and searched, and which columns a write touches. The generic
//! handlers in `routes` turn that into one parameterized statement per request.

use chrono::{NaiveDate, NaiveTime};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::QueryAs,
    Encode, FromRow, Postgres, Type,
};
use std::fmt::Display;

use crate::models::*;

/// A value bound into a write statement. `None` goes to the store as NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(Option<i32>),
    Float(Option<f64>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
}

impl SqlValue {
    pub fn bind_to<'q, O>(
        self,
        q: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        match self {
            SqlValue::Text(v) => q.bind(v),
            SqlValue::Int(v) => q.bind(v),
            SqlValue::Float(v) => q.bind(v),
            SqlValue::Date(v) => q.bind(v),
            SqlValue::Time(v) => q.bind(v),
        }
    }
}

pub type Columns = Vec<(&'static str, SqlValue)>;

/// A table that can be listed.
pub trait Listing: for<'r> FromRow<'r, PgRow> + Serialize + Send + Unpin + 'static {
    const TABLE: &'static str;
    /// Path segment and plural noun, e.g. `students`.
    const PLURAL: &'static str;
    /// Select list. NUMERIC columns are cast to float8.
    const COLUMNS: &'static str;
    const ORDER_BY: &'static str;
    /// Text columns matched by `q`. Empty means `q` is ignored.
    const SEARCH: &'static [&'static str] = &[];
}

/// A table with create, update and delete by primary key.
pub trait Resource: Listing {
    type Key: DeserializeOwned
        + Display
        + for<'q> Encode<'q, Postgres>
        + Type<Postgres>
        + Send
        + 'static;
    type Input: DeserializeOwned + Send + 'static;

    const KEY: &'static str;
    /// Singular noun used in messages, e.g. `student`.
    const NOUN: &'static str;

    fn insert_columns(input: Self::Input) -> Columns;

    /// Defaults to the insert columns minus the primary key.
    fn update_columns(input: Self::Input) -> Columns {
        Self::insert_columns(input)
            .into_iter()
            .filter(|(name, _)| *name != Self::KEY)
            .collect()
    }
}

pub fn list_sql<R: Listing>(searching: bool) -> String {
    let mut sql = format!("SELECT {} FROM {}", R::COLUMNS, R::TABLE);
    if searching && !R::SEARCH.is_empty() {
        let conditions: Vec<String> = R::SEARCH.iter().map(|c| format!("{c} ILIKE $1")).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" OR "));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(R::ORDER_BY);
    sql
}

pub fn insert_sql<R: Resource>(columns: &Columns) -> String {
    let names: Vec<&str> = columns.iter().map(|(n, _)| *n).collect();
    let params: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        R::TABLE,
        names.join(", "),
        params.join(", "),
        R::COLUMNS
    )
}

/// The key is bound last, after the SET values.
pub fn update_sql<R: Resource>(columns: &Columns) -> String {
    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (n, _))| format!("{n} = ${}", i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        R::TABLE,
        sets.join(", "),
        R::KEY,
        columns.len() + 1,
        R::COLUMNS
    )
}

pub fn delete_sql<R: Resource>() -> String {
    format!("DELETE FROM {} WHERE {} = $1", R::TABLE, R::KEY)
}

/// "student" -> "Student"
pub fn capitalized(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// --- entities ---

impl Listing for Faculty {
    const TABLE: &'static str = "faculties";
    const PLURAL: &'static str = "faculties";
    const COLUMNS: &'static str = "faculty_id, faculty_name";
    const ORDER_BY: &'static str = "faculty_name";
}

impl Resource for Faculty {
    type Key = i32;
    type Input = FacultyInput;
    const KEY: &'static str = "faculty_id";
    const NOUN: &'static str = "faculty";

    fn insert_columns(i: FacultyInput) -> Columns {
        vec![("faculty_name", SqlValue::Text(i.faculty_name))]
    }
}

impl Listing for Major {
    const TABLE: &'static str = "majors";
    const PLURAL: &'static str = "majors";
    const COLUMNS: &'static str = "major_id, major_name, faculty_id";
    const ORDER_BY: &'static str = "major_name";
}

impl Resource for Major {
    type Key = i32;
    type Input = MajorInput;
    const KEY: &'static str = "major_id";
    const NOUN: &'static str = "major";

    fn insert_columns(i: MajorInput) -> Columns {
        vec![
            ("major_name", SqlValue::Text(i.major_name)),
            ("faculty_id", SqlValue::Int(i.faculty_id)),
        ]
    }
}

impl Listing for Student {
    const TABLE: &'static str = "students";
    const PLURAL: &'static str = "students";
    const COLUMNS: &'static str =
        "student_id, first_name, last_name, dob, email, major_id, cohort_id, program_id";
    const ORDER_BY: &'static str = "student_id";
    const SEARCH: &'static [&'static str] = &["student_id", "first_name", "last_name", "email"];
}

impl Resource for Student {
    type Key = String;
    type Input = StudentInput;
    const KEY: &'static str = "student_id";
    const NOUN: &'static str = "student";

    fn insert_columns(i: StudentInput) -> Columns {
        vec![
            ("student_id", SqlValue::Text(i.student_id)),
            ("first_name", SqlValue::Text(i.first_name)),
            ("last_name", SqlValue::Text(i.last_name)),
            ("dob", SqlValue::Date(i.dob)),
            ("email", SqlValue::Text(i.email)),
            ("major_id", SqlValue::Int(i.major_id)),
            ("cohort_id", SqlValue::Int(i.cohort_id)),
            ("program_id", SqlValue::Int(i.program_id)),
        ]
    }
}

impl Listing for Lecturer {
    const TABLE: &'static str = "lecturers";
    const PLURAL: &'static str = "lecturers";
    const COLUMNS: &'static str =
        "lecturer_id, first_name, last_name, email, faculty_id, hourly_rate::float8 AS hourly_rate";
    const ORDER_BY: &'static str = "last_name, first_name";
    const SEARCH: &'static [&'static str] = &["first_name", "last_name", "email"];
}

impl Resource for Lecturer {
    type Key = i32;
    type Input = LecturerInput;
    const KEY: &'static str = "lecturer_id";
    const NOUN: &'static str = "lecturer";

    fn insert_columns(i: LecturerInput) -> Columns {
        vec![
            ("first_name", SqlValue::Text(i.first_name)),
            ("last_name", SqlValue::Text(i.last_name)),
            ("email", SqlValue::Text(i.email)),
            ("faculty_id", SqlValue::Int(i.faculty_id)),
            ("hourly_rate", SqlValue::Float(i.hourly_rate)),
        ]
    }
}

impl Listing for Classroom {
    const TABLE: &'static str = "classrooms";
    const PLURAL: &'static str = "classrooms";
    const COLUMNS: &'static str = "classroom_id, capacity";
    const ORDER_BY: &'static str = "classroom_id";
}

impl Resource for Classroom {
    type Key = String;
    type Input = ClassroomInput;
    const KEY: &'static str = "classroom_id";
    const NOUN: &'static str = "classroom";

    fn insert_columns(i: ClassroomInput) -> Columns {
        vec![
            ("classroom_id", SqlValue::Text(i.classroom_id)),
            ("capacity", SqlValue::Int(i.capacity)),
        ]
    }
}

impl Listing for Semester {
    const TABLE: &'static str = "semesters";
    const PLURAL: &'static str = "semesters";
    const COLUMNS: &'static str = "semester_id, semester_name, start_date, end_date";
    const ORDER_BY: &'static str = "semester_id DESC";
}

impl Resource for Semester {
    type Key = i32;
    type Input = SemesterInput;
    const KEY: &'static str = "semester_id";
    const NOUN: &'static str = "semester";

    fn insert_columns(i: SemesterInput) -> Columns {
        vec![
            ("semester_id", SqlValue::Int(i.semester_id)),
            ("semester_name", SqlValue::Text(i.semester_name)),
            ("start_date", SqlValue::Date(i.start_date)),
            ("end_date", SqlValue::Date(i.end_date)),
        ]
    }
}

impl Listing for Course {
    const TABLE: &'static str = "courses";
    const PLURAL: &'static str = "courses";
    const COLUMNS: &'static str = "course_id, course_name, credits, teaching_hours_per_week, \
         managing_faculty_id, major_id, course_type";
    const ORDER_BY: &'static str = "course_id";
    const SEARCH: &'static [&'static str] = &["course_id", "course_name"];
}

impl Resource for Course {
    type Key = String;
    type Input = CourseInput;
    const KEY: &'static str = "course_id";
    const NOUN: &'static str = "course";

    fn insert_columns(i: CourseInput) -> Columns {
        vec![
            ("course_id", SqlValue::Text(i.course_id)),
            ("course_name", SqlValue::Text(i.course_name)),
            ("credits", SqlValue::Int(i.credits)),
            ("teaching_hours_per_week", SqlValue::Int(i.teaching_hours_per_week)),
            ("managing_faculty_id", SqlValue::Int(i.managing_faculty_id)),
            ("major_id", SqlValue::Int(i.major_id)),
            ("course_type", SqlValue::Text(i.course_type)),
        ]
    }
}

impl Listing for Class {
    const TABLE: &'static str = "classes";
    const PLURAL: &'static str = "classes";
    const COLUMNS: &'static str = "class_id, course_id, semester_id, lecturer_id, classroom_id, \
         weekday, start_time, end_time";
    const ORDER_BY: &'static str = "class_id DESC";
}

impl Resource for Class {
    type Key = i32;
    type Input = ClassInput;
    const KEY: &'static str = "class_id";
    const NOUN: &'static str = "class";

    fn insert_columns(i: ClassInput) -> Columns {
        vec![
            ("course_id", SqlValue::Text(i.course_id)),
            ("semester_id", SqlValue::Int(i.semester_id)),
            ("lecturer_id", SqlValue::Int(i.lecturer_id)),
            ("classroom_id", SqlValue::Text(i.classroom_id)),
            ("weekday", SqlValue::Text(i.weekday)),
            ("start_time", SqlValue::Time(i.start_time)),
            ("end_time", SqlValue::Time(i.end_time)),
        ]
    }
}

// Enrollments are read-only here.
impl Listing for Enrollment {
    const TABLE: &'static str = "enrollments";
    const PLURAL: &'static str = "enrollments";
    const COLUMNS: &'static str = "enrollment_id, student_id, class_id, \
         grade_10_scale::float8 AS grade_10_scale, grade_4_scale::float8 AS grade_4_scale, \
         grade_letter, enrollment_status";
    const ORDER_BY: &'static str = "enrollment_id DESC";
}
