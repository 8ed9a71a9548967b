use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::util::clock_time;

// Rows as stored. Numeric store columns are selected as float8.

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Faculty {
    pub faculty_id: i32,
    pub faculty_name: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Major {
    pub major_id: i32,
    pub major_name: String,
    pub faculty_id: Option<i32>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Student {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub email: Option<String>,
    pub major_id: Option<i32>,
    pub cohort_id: Option<i32>,
    pub program_id: Option<i32>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lecturer {
    pub lecturer_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub faculty_id: Option<i32>,
    pub hourly_rate: Option<f64>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Classroom {
    pub classroom_id: String,
    pub capacity: i32,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Semester {
    pub semester_id: i32,
    pub semester_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub credits: i32,
    pub teaching_hours_per_week: i32,
    pub managing_faculty_id: Option<i32>,
    pub major_id: Option<i32>,
    /// fundamental | major-specific | elective
    pub course_type: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Class {
    pub class_id: i32,
    pub course_id: String,
    pub semester_id: i32,
    pub lecturer_id: i32,
    pub classroom_id: String,
    pub weekday: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub enrollment_id: i32,
    pub student_id: String,
    pub class_id: i32,
    pub grade_10_scale: Option<f64>,
    pub grade_4_scale: Option<f64>,
    pub grade_letter: Option<String>,
    /// enrolled | passed | failed | withdrawn
    pub enrollment_status: String,
}

// Write payloads. Every field is optional: a missing value goes to the store
// as NULL and the store's constraints decide whether that is acceptable.

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct FacultyInput {
    pub faculty_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MajorInput {
    pub major_name: Option<String>,
    pub faculty_id: Option<i32>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StudentInput {
    /// Only read on create; the path key wins on update.
    pub student_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub email: Option<String>,
    pub major_id: Option<i32>,
    pub cohort_id: Option<i32>,
    pub program_id: Option<i32>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LecturerInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub faculty_id: Option<i32>,
    pub hourly_rate: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ClassroomInput {
    pub classroom_id: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SemesterInput {
    pub semester_id: Option<i32>,
    pub semester_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CourseInput {
    pub course_id: Option<String>,
    pub course_name: Option<String>,
    pub credits: Option<i32>,
    pub teaching_hours_per_week: Option<i32>,
    pub managing_faculty_id: Option<i32>,
    pub major_id: Option<i32>,
    pub course_type: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ClassInput {
    pub course_id: Option<String>,
    pub semester_id: Option<i32>,
    pub lecturer_id: Option<i32>,
    pub classroom_id: Option<String>,
    pub weekday: Option<String>,
    #[serde(deserialize_with = "clock_time::deserialize")]
    pub start_time: Option<NaiveTime>,
    #[serde(deserialize_with = "clock_time::deserialize")]
    pub end_time: Option<NaiveTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_deserialize_as_none() {
        let input: StudentInput = serde_json::from_value(json!({ "first_name": "Ana" })).unwrap();
        assert_eq!(input.first_name.as_deref(), Some("Ana"));
        assert!(input.student_id.is_none());
        assert!(input.dob.is_none());
    }

    #[test]
    fn class_input_accepts_short_clock_times() {
        let input: ClassInput = serde_json::from_value(json!({
            "course_id": "CS101",
            "weekday": "Monday",
            "start_time": "07:30",
            "end_time": "09:15:00"
        }))
        .unwrap();
        assert_eq!(input.start_time, NaiveTime::from_hms_opt(7, 30, 0));
        assert_eq!(input.end_time, NaiveTime::from_hms_opt(9, 15, 0));
    }

    #[test]
    fn course_serializes_nullable_major_as_null() {
        let course = Course {
            course_id: "MATH1".into(),
            course_name: "Calculus".into(),
            credits: 3,
            teaching_hours_per_week: 4,
            managing_faculty_id: Some(1),
            major_id: None,
            course_type: "fundamental".into(),
        };
        let v = serde_json::to_value(course).unwrap();
        assert_eq!(v["major_id"], serde_json::Value::Null);
        assert_eq!(v["credits"], 3);
    }
}
