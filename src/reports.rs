//! Read-only reports over students, lecturers and classrooms.
//!
//! GPA and salary figures come from functions inside the database; this module
//! only reshapes the joined rows, coerces numbers, orders the output and
//! applies the caller's thresholds. Each report is a single read through a
//! [`ReportSource`], then a pure assembly step that is unit tested below.

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::models::{Classroom, Lecturer, Student};

/// Flat rows behind the four reports. Implemented over Postgres by
/// [`crate::db::PgStore`].
pub trait ReportSource: Clone + Send + Sync + 'static {
    fn student_gpa_rows(&self) -> impl Future<Output = Result<Vec<GpaRow>, sqlx::Error>> + Send;

    /// Students at risk under the thresholds. Implementations may pre-filter;
    /// [`academic_warnings`] applies the rule again regardless.
    fn student_standing_rows(
        &self,
        thresholds: WarningThresholds,
    ) -> impl Future<Output = Result<Vec<StandingRow>, sqlx::Error>> + Send;

    fn lecturer_workload_rows(
        &self,
        semester_id: i32,
    ) -> impl Future<Output = Result<Vec<WorkloadRow>, sqlx::Error>> + Send;

    fn classroom_usage_rows(
        &self,
        semester_id: i32,
    ) -> impl Future<Output = Result<Vec<UsageRow>, sqlx::Error>> + Send;
}

/// Single-value access to the store's GPA and salary computations.
pub trait GradeAggregator: Clone + Send + Sync + 'static {
    fn student_gpa(
        &self,
        student_id: &str,
    ) -> impl Future<Output = Result<Option<f64>, sqlx::Error>> + Send;

    fn lecturer_monthly_salary(
        &self,
        lecturer_id: i32,
        semester_id: i32,
    ) -> impl Future<Output = Result<Option<f64>, sqlx::Error>> + Send;
}

// --- rows ---

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct GpaRow {
    pub student_id: String,
    pub student_name: String,
    pub major_name: Option<String>,
    pub cohort_name: Option<String>,
    pub cumulative_gpa: Option<f64>,
    pub courses_taken: i64,
    pub failed_credits: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct StandingRow {
    #[sqlx(flatten)]
    pub student: Student,
    pub gpa: Option<f64>,
    pub failed_credits: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct WorkloadRow {
    #[sqlx(flatten)]
    pub lecturer: Lecturer,
    pub monthly_salary: Option<f64>,
    pub total_hours_per_week: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct UsageRow {
    #[sqlx(flatten)]
    pub classroom: Classroom,
    pub usage_count: i64,
}

// --- report shapes ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StudentGpaRecord {
    pub student_id: String,
    pub student_name: String,
    pub major_name: Option<String>,
    pub cohort_name: Option<String>,
    pub cumulative_gpa: f64,
    pub courses_taken: u64,
    pub failed_credits: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningReason {
    #[serde(rename = "Low GPA and High Failed Credits")]
    LowGpaAndHighFailedCredits,
    #[serde(rename = "Low GPA")]
    LowGpa,
    #[serde(rename = "High Failed Credits")]
    HighFailedCredits,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AcademicWarning {
    pub student: Student,
    pub gpa: f64,
    pub failed_credits: u64,
    pub warning_reason: WarningReason,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LecturerSalary {
    pub lecturer: Lecturer,
    pub monthly_salary: f64,
    pub total_hours_per_week: u64,
    pub is_below_threshold: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassroomUsage {
    pub classroom: Classroom,
    pub usage_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarningThresholds {
    /// A GPA strictly below this is low.
    pub gpa: f64,
    /// Failed credits strictly above this are high.
    pub failed_credits: f64,
}

// --- query parameters ---

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamError {
    #[error("missing query parameter `{0}`")]
    Missing(&'static str),
    #[error("query parameter `{name}` is not a number: {value:?}")]
    NotANumber { name: &'static str, value: String },
}

pub fn number_param(name: &'static str, raw: Option<&str>) -> Result<f64, ParamError> {
    let raw = raw.ok_or(ParamError::Missing(name))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParamError::NotANumber {
            name,
            value: raw.to_string(),
        })
}

pub fn id_param(name: &'static str, raw: Option<&str>) -> Result<i32, ParamError> {
    let raw = raw.ok_or(ParamError::Missing(name))?;
    raw.trim().parse::<i32>().map_err(|_| ParamError::NotANumber {
        name,
        value: raw.to_string(),
    })
}

// --- assembly ---

fn non_negative(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

/// Most courses first, then most failed credits. Stable for full ties.
pub fn student_gpa_report(rows: Vec<GpaRow>) -> Vec<StudentGpaRecord> {
    let mut records: Vec<StudentGpaRecord> = rows
        .into_iter()
        .map(|r| StudentGpaRecord {
            student_id: r.student_id,
            student_name: r.student_name,
            major_name: r.major_name,
            cohort_name: r.cohort_name,
            cumulative_gpa: r.cumulative_gpa.unwrap_or(0.0),
            courses_taken: non_negative(r.courses_taken),
            failed_credits: non_negative(r.failed_credits),
        })
        .collect();
    records.sort_by(|a, b| {
        b.courses_taken
            .cmp(&a.courses_taken)
            .then(b.failed_credits.cmp(&a.failed_credits))
    });
    records
}

/// `None` when the student is in good standing. A missing GPA never counts
/// as low.
pub fn classify(
    gpa: Option<f64>,
    failed_credits: i64,
    thresholds: WarningThresholds,
) -> Option<WarningReason> {
    let low_gpa = gpa.is_some_and(|g| g < thresholds.gpa);
    let high_failed = (failed_credits as f64) > thresholds.failed_credits;
    match (low_gpa, high_failed) {
        (true, true) => Some(WarningReason::LowGpaAndHighFailedCredits),
        (true, false) => Some(WarningReason::LowGpa),
        (false, true) => Some(WarningReason::HighFailedCredits),
        (false, false) => None,
    }
}

pub fn academic_warnings(
    rows: Vec<StandingRow>,
    thresholds: WarningThresholds,
) -> Vec<AcademicWarning> {
    rows.into_iter()
        .filter_map(|r| {
            let reason = classify(r.gpa, r.failed_credits, thresholds)?;
            Some(AcademicWarning {
                student: r.student,
                gpa: r.gpa.unwrap_or(0.0),
                failed_credits: non_negative(r.failed_credits),
                warning_reason: reason,
            })
        })
        .collect()
}

pub fn lecturer_salaries(rows: Vec<WorkloadRow>, hours_threshold: f64) -> Vec<LecturerSalary> {
    rows.into_iter()
        .map(|r| {
            let hours = non_negative(r.total_hours_per_week);
            LecturerSalary {
                lecturer: r.lecturer,
                monthly_salary: r.monthly_salary.unwrap_or(0.0),
                total_hours_per_week: hours,
                is_below_threshold: (hours as f64) < hours_threshold,
            }
        })
        .collect()
}

pub fn classroom_usage(rows: Vec<UsageRow>) -> Vec<ClassroomUsage> {
    let mut usage: Vec<ClassroomUsage> = rows
        .into_iter()
        .map(|r| ClassroomUsage {
            classroom: r.classroom,
            usage_count: non_negative(r.usage_count),
        })
        .collect();
    usage.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    usage
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const THRESHOLDS: WarningThresholds = WarningThresholds {
        gpa: 2.0,
        failed_credits: 9.0,
    };

    #[test]
    fn warning_reasons_follow_precedence() {
        assert_eq!(
            classify(Some(1.8), 12, THRESHOLDS),
            Some(WarningReason::LowGpaAndHighFailedCredits)
        );
        assert_eq!(classify(Some(1.8), 9, THRESHOLDS), Some(WarningReason::LowGpa));
        assert_eq!(
            classify(Some(2.5), 10, THRESHOLDS),
            Some(WarningReason::HighFailedCredits)
        );
        assert_eq!(classify(Some(3.0), 0, THRESHOLDS), None);
    }

    #[test]
    fn thresholds_are_strict() {
        assert_eq!(classify(Some(2.0), 9, THRESHOLDS), None);
        assert_eq!(classify(Some(1.99), 9, THRESHOLDS), Some(WarningReason::LowGpa));
    }

    #[test]
    fn missing_gpa_is_never_low() {
        assert_eq!(classify(None, 0, THRESHOLDS), None);
        assert_eq!(classify(None, 10, THRESHOLDS), Some(WarningReason::HighFailedCredits));
    }

    #[test]
    fn warnings_drop_students_in_good_standing() {
        let rows = vec![
            standing("S1", Some(1.8), 12),
            standing("S2", Some(2.5), 10),
            standing("S3", Some(3.0), 0),
        ];
        let out = academic_warnings(rows, THRESHOLDS);
        let ids: Vec<_> = out.iter().map(|w| w.student.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        assert_eq!(out[0].warning_reason, WarningReason::LowGpaAndHighFailedCredits);
        assert_eq!(out[1].warning_reason, WarningReason::HighFailedCredits);
        assert_eq!(out[1].failed_credits, 10);
    }

    #[test]
    fn warning_serializes_nested_student_and_text_reason() {
        let out = academic_warnings(vec![standing("S1", Some(1.5), 0)], THRESHOLDS);
        let v = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(v["warning_reason"], "Low GPA");
        assert_eq!(v["student"]["student_id"], "S1");
        assert_eq!(v["gpa"], 1.5);
    }

    #[test]
    fn gpa_report_orders_by_courses_then_failed_credits() {
        let rows = vec![
            gpa_row("A", Some(3.1), 4, 0),
            gpa_row("B", Some(2.2), 6, 3),
            gpa_row("C", Some(1.9), 6, 9),
            gpa_row("D", None, 0, 0),
        ];
        let out = student_gpa_report(rows);
        let ids: Vec<_> = out.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "A", "D"]);
        assert_eq!(out[3].cumulative_gpa, 0.0);
        for pair in out.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.courses_taken > b.courses_taken
                    || (a.courses_taken == b.courses_taken && a.failed_credits >= b.failed_credits)
            );
        }
    }

    #[test]
    fn negative_aggregates_are_clamped() {
        let out = student_gpa_report(vec![gpa_row("A", Some(2.0), -1, -4)]);
        assert_eq!(out[0].courses_taken, 0);
        assert_eq!(out[0].failed_credits, 0);
    }

    #[test]
    fn salary_flag_is_strictly_below() {
        let rows = vec![
            workload(1, Some(12_000.0), 8),
            workload(2, Some(6_000.5), 4),
            workload(3, None, 0),
        ];
        let out = lecturer_salaries(rows, 8.0);
        assert!(!out[0].is_below_threshold);
        assert!(out[1].is_below_threshold);
        assert!(out[2].is_below_threshold);
        assert_eq!(out[2].monthly_salary, 0.0);
        assert_eq!(out[2].total_hours_per_week, 0);
    }

    #[test]
    fn idle_classrooms_stay_with_zero_usage() {
        let out = classroom_usage(vec![usage("A101", 0), usage("B202", 3), usage("C303", 1)]);
        let counts: Vec<_> = out
            .iter()
            .map(|u| (u.classroom.classroom_id.as_str(), u.usage_count))
            .collect();
        assert_eq!(counts, vec![("B202", 3), ("C303", 1), ("A101", 0)]);
    }

    #[test]
    fn params_parse_or_explain() {
        assert_eq!(number_param("gpaThreshold", Some("2.5")), Ok(2.5));
        assert_eq!(
            number_param("gpaThreshold", None),
            Err(ParamError::Missing("gpaThreshold"))
        );
        assert!(matches!(
            number_param("creditThreshold", Some("lots")),
            Err(ParamError::NotANumber { .. })
        ));
        assert!(number_param("creditThreshold", Some("NaN")).is_err());
        assert_eq!(id_param("semesterId", Some("20241")), Ok(20241));
        assert!(id_param("semesterId", Some("1.5")).is_err());
    }

    #[tokio::test]
    async fn fake_source_feeds_assemblers() {
        let store = FakeStore {
            usage: [(7, vec![usage("A101", 2)])].into_iter().collect(),
            ..Default::default()
        };
        let rows = store.classroom_usage_rows(7).await.unwrap();
        assert_eq!(classroom_usage(rows)[0].usage_count, 2);
        assert!(store.classroom_usage_rows(8).await.unwrap().is_empty());
    }
}
