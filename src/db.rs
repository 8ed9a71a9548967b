use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    reports::{
        GpaRow, GradeAggregator, ReportSource, StandingRow, UsageRow, WarningThresholds,
        WorkloadRow,
    },
};

pub type Db = Pool<Postgres>;

/// Builds the shared pool without opening a connection, so an unreachable
/// database does not stop the server from starting.
pub fn connect(cfg: &Config) -> Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .connect_lazy(&cfg.database_url)?;
    Ok(pool)
}

/// Upper bound on the startup connectivity check, independent of the pool's
/// acquire timeout.
pub const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Startup connectivity check. Failure is logged, not returned.
pub async fn check_connection(db: &Db, limit: Duration) -> bool {
    match tokio::time::timeout(limit, sqlx::query("SELECT 1").execute(db)).await {
        Ok(Ok(_)) => {
            tracing::info!("connected to PostgreSQL");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(
                error = %e,
                "failed to connect to PostgreSQL; check DATABASE_URL and that the server is up"
            );
            false
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = limit.as_secs_f64(),
                "no answer from PostgreSQL yet; check DATABASE_URL and that the server is up"
            );
            false
        }
    }
}

/// Runs [`check_connection`] off the startup path so binding the listener
/// never waits on the database.
pub fn spawn_connection_check(db: Db) -> JoinHandle<bool> {
    tokio::spawn(async move { check_connection(&db, CONNECTION_CHECK_TIMEOUT).await })
}

pub async fn now(db: &Db) -> Result<DateTime<Utc>, sqlx::Error> {
    sqlx::query_scalar("SELECT now()").fetch_one(db).await
}

/// Postgres-backed report source. The GPA and salary figures come from the
/// `get_student_gpa` and `get_lecturer_monthly_salary` functions; aggregates
/// are cast so they decode as plain integers and floats.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

const FAILED_CREDITS: &str = r#"
    (SELECT COALESCE(SUM(c.credits), 0)
       FROM enrollments e
       JOIN classes cl ON e.class_id = cl.class_id
       JOIN courses c ON cl.course_id = c.course_id
      WHERE e.student_id = s.student_id AND e.enrollment_status = 'failed')::int8
"#;

impl ReportSource for PgStore {
    async fn student_gpa_rows(&self) -> Result<Vec<GpaRow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT
                s.student_id,
                concat_ws(' ', s.first_name, s.last_name) AS student_name,
                m.major_name,
                ac.cohort_name,
                get_student_gpa(s.student_id)::float8 AS cumulative_gpa,
                (SELECT COUNT(DISTINCT cl.course_id)
                   FROM enrollments e
                   JOIN classes cl ON e.class_id = cl.class_id
                  WHERE e.student_id = s.student_id)::int8 AS courses_taken,
                {FAILED_CREDITS} AS failed_credits
            FROM students s
            LEFT JOIN majors m ON s.major_id = m.major_id
            LEFT JOIN academic_cohorts ac ON s.cohort_id = ac.cohort_id
            ORDER BY courses_taken DESC, failed_credits DESC
            "#
        );
        sqlx::query_as(&sql).fetch_all(&self.db).await
    }

    async fn student_standing_rows(
        &self,
        thresholds: WarningThresholds,
    ) -> Result<Vec<StandingRow>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH student_stats AS (
                SELECT
                    s.student_id,
                    get_student_gpa(s.student_id)::float8 AS gpa,
                    {FAILED_CREDITS} AS failed_credits
                FROM students s
            )
            SELECT
                s.student_id, s.first_name, s.last_name, s.dob, s.email,
                s.major_id, s.cohort_id, s.program_id,
                ss.gpa, ss.failed_credits
            FROM students s
            JOIN student_stats ss ON s.student_id = ss.student_id
            WHERE ss.gpa < $1 OR ss.failed_credits > $2
            ORDER BY s.student_id
            "#
        );
        sqlx::query_as(&sql)
            .bind(thresholds.gpa)
            .bind(thresholds.failed_credits)
            .fetch_all(&self.db)
            .await
    }

    async fn lecturer_workload_rows(
        &self,
        semester_id: i32,
    ) -> Result<Vec<WorkloadRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT
                l.lecturer_id, l.first_name, l.last_name, l.email, l.faculty_id,
                l.hourly_rate::float8 AS hourly_rate,
                get_lecturer_monthly_salary(l.lecturer_id, $1)::float8 AS monthly_salary,
                (SELECT COALESCE(SUM(c.teaching_hours_per_week), 0)
                   FROM classes cl
                   JOIN courses c ON cl.course_id = c.course_id
                  WHERE cl.lecturer_id = l.lecturer_id AND cl.semester_id = $1)::int8
                    AS total_hours_per_week
            FROM lecturers l
            ORDER BY l.lecturer_id
            "#,
        )
        .bind(semester_id)
        .fetch_all(&self.db)
        .await
    }

    async fn classroom_usage_rows(&self, semester_id: i32) -> Result<Vec<UsageRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT cr.classroom_id, cr.capacity, COUNT(cl.class_id)::int8 AS usage_count
            FROM classrooms cr
            LEFT JOIN classes cl
                   ON cr.classroom_id = cl.classroom_id AND cl.semester_id = $1
            GROUP BY cr.classroom_id, cr.capacity
            ORDER BY usage_count DESC
            "#,
        )
        .bind(semester_id)
        .fetch_all(&self.db)
        .await
    }
}

impl GradeAggregator for PgStore {
    async fn student_gpa(&self, student_id: &str) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar("SELECT get_student_gpa($1)::float8")
            .bind(student_id)
            .fetch_one(&self.db)
            .await
    }

    async fn lecturer_monthly_salary(
        &self,
        lecturer_id: i32,
        semester_id: i32,
    ) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar("SELECT get_lecturer_monthly_salary($1, $2)::float8")
            .bind(lecturer_id)
            .bind(semester_id)
            .fetch_one(&self.db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    // Nothing listens on port 1; a long acquire timeout stands in for a
    // database host that never answers.
    fn unreachable(acquire_timeout: Duration) -> Db {
        PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap()
    }

    #[tokio::test]
    async fn spawning_the_check_does_not_wait_for_the_database() {
        let started = Instant::now();
        let handle = spawn_connection_check(unreachable(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_millis(100));
        handle.abort();
    }

    #[tokio::test]
    async fn check_gives_up_after_its_own_limit() {
        let db = unreachable(Duration::from_secs(30));
        let started = Instant::now();
        let ok = check_connection(&db, Duration::from_millis(300)).await;
        assert!(!ok);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_database_reports_failure() {
        let db = unreachable(Duration::from_millis(200));
        assert!(!check_connection(&db, Duration::from_secs(5)).await);
    }
}
