use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;
use sqlx::Postgres;

use crate::{
    db::{self, Db},
    error::{read_error, write_error, AppError},
    models::*,
    reports::{self, GradeAggregator, ReportSource, WarningThresholds},
    resources::{self, Listing, Resource},
    util,
};

#[derive(Clone)]
pub struct AppState<S> {
    pub db: Db,
    pub store: S,
}

pub fn router<S>(state: AppState<S>) -> Router
where
    S: ReportSource + GradeAggregator,
{
    let api = Router::new()
        .route("/health", get(health::<S>))
        // reports
        .route("/reports/student-gpa", get(student_gpa_report::<S>))
        .route("/reports/academic-warnings", get(academic_warnings::<S>))
        .route("/reports/lecturer-salaries", get(lecturer_salaries::<S>))
        .route("/reports/classroom-usage", get(classroom_usage::<S>))
        // single-value lookups
        .route("/students/:id/gpa", get(student_gpa::<S>))
        .route("/lecturers/:id/salary", get(lecturer_salary::<S>));

    let api = mount::<Student, S>(api);
    let api = mount::<Lecturer, S>(api);
    let api = mount::<Course, S>(api);
    let api = mount::<Class, S>(api);
    let api = mount::<Faculty, S>(api);
    let api = mount::<Major, S>(api);
    let api = mount::<Semester, S>(api);
    let api = mount::<Classroom, S>(api);
    let api = api
        .route("/enrollments", get(list::<Enrollment, S>))
        .fallback(api_not_found);

    Router::new().nest("/api", api).with_state(state)
}

fn mount<R, S>(router: Router<AppState<S>>) -> Router<AppState<S>>
where
    R: Resource,
    S: ReportSource + GradeAggregator,
{
    let collection = format!("/{}", R::PLURAL);
    let member = format!("/{}/:id", R::PLURAL);
    router
        .route(&collection, get(list::<R, S>).post(create::<R, S>))
        .route(&member, put(update::<R, S>).delete(remove::<R, S>))
}

async fn api_not_found() -> AppError {
    AppError::NotFound("Not found".into())
}

async fn health<S: Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    match db::now(&state.db).await {
        Ok(now) => (StatusCode::OK, Json(json!({ "status": "ok", "now": now }))),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
        }
    }
}

// --- CRUD ---

#[derive(Deserialize, Debug, Default)]
struct SearchParams {
    q: Option<String>,
}

async fn list<R: Listing, S: Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<R>>, AppError> {
    let term = util::search_term(params.q.as_deref()).filter(|_| !R::SEARCH.is_empty());
    let sql = resources::list_sql::<R>(term.is_some());
    let mut query = sqlx::query_as::<Postgres, R>(&sql);
    if let Some(term) = term {
        query = query.bind(util::like_pattern(term));
    }
    let rows = query
        .fetch_all(&state.db)
        .await
        .map_err(read_error(format!("Failed to retrieve {}", R::PLURAL)))?;
    Ok(Json(rows))
}

async fn create<R: Resource, S: Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    WithRejection(Json(input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<(StatusCode, Json<R>), AppError> {
    let columns = R::insert_columns(input);
    let sql = resources::insert_sql::<R>(&columns);
    let query = columns
        .into_iter()
        .fold(sqlx::query_as::<Postgres, R>(&sql), |q, (_, v)| v.bind_to(q));
    let row = query
        .fetch_one(&state.db)
        .await
        .map_err(|e| write_error(&format!("Failed to create {}", R::NOUN), e))?;
    tracing::info!(entity = R::NOUN, "created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update<R: Resource, S: Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    WithRejection(Path(id), _): WithRejection<Path<R::Key>, AppError>,
    WithRejection(Json(input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<Json<R>, AppError> {
    let columns = R::update_columns(input);
    let sql = resources::update_sql::<R>(&columns);
    let query = columns
        .into_iter()
        .fold(sqlx::query_as::<Postgres, R>(&sql), |q, (_, v)| v.bind_to(q))
        .bind(id);
    let row = query
        .fetch_optional(&state.db)
        .await
        .map_err(|e| write_error(&format!("Failed to update {}", R::NOUN), e))?;
    match row {
        Some(row) => Ok(Json(row)),
        None => Err(AppError::NotFound(format!(
            "{} not found",
            resources::capitalized(R::NOUN)
        ))),
    }
}

/// Deleting a key that does not exist still answers 204.
async fn remove<R: Resource, S: Clone + Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    WithRejection(Path(id), _): WithRejection<Path<R::Key>, AppError>,
) -> Result<StatusCode, AppError> {
    let sql = resources::delete_sql::<R>();
    let key = id.to_string();
    let result = sqlx::query::<Postgres>(&sql)
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| write_error(&format!("Failed to delete {}", R::NOUN), e))?;
    if result.rows_affected() == 0 {
        tracing::debug!(entity = R::NOUN, key = %key, "delete matched no rows");
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- reports ---

const GPA_REPORT_FAILED: &str = "Failed to generate GPA report";
const WARNINGS_REPORT_FAILED: &str = "Failed to generate academic warnings report";
const SALARY_REPORT_FAILED: &str = "Failed to generate lecturer salaries report";
const USAGE_REPORT_FAILED: &str = "Failed to generate classroom usage report";

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ReportParams {
    gpa_threshold: Option<String>,
    credit_threshold: Option<String>,
    semester_id: Option<String>,
    hours_threshold: Option<String>,
}

async fn student_gpa_report<S: ReportSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<reports::StudentGpaRecord>>, AppError> {
    let rows = state
        .store
        .student_gpa_rows()
        .await
        .map_err(read_error(GPA_REPORT_FAILED))?;
    Ok(Json(reports::student_gpa_report(rows)))
}

async fn academic_warnings<S: ReportSource>(
    State(state): State<AppState<S>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<reports::AcademicWarning>>, AppError> {
    let thresholds = WarningThresholds {
        gpa: reports::number_param("gpaThreshold", params.gpa_threshold.as_deref())
            .map_err(|e| AppError::internal(WARNINGS_REPORT_FAILED, e))?,
        failed_credits: reports::number_param(
            "creditThreshold",
            params.credit_threshold.as_deref(),
        )
        .map_err(|e| AppError::internal(WARNINGS_REPORT_FAILED, e))?,
    };
    let rows = state
        .store
        .student_standing_rows(thresholds)
        .await
        .map_err(read_error(WARNINGS_REPORT_FAILED))?;
    Ok(Json(reports::academic_warnings(rows, thresholds)))
}

async fn lecturer_salaries<S: ReportSource>(
    State(state): State<AppState<S>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<reports::LecturerSalary>>, AppError> {
    let semester_id = reports::id_param("semesterId", params.semester_id.as_deref())
        .map_err(|e| AppError::internal(SALARY_REPORT_FAILED, e))?;
    let hours_threshold =
        reports::number_param("hoursThreshold", params.hours_threshold.as_deref())
            .map_err(|e| AppError::internal(SALARY_REPORT_FAILED, e))?;
    let rows = state
        .store
        .lecturer_workload_rows(semester_id)
        .await
        .map_err(read_error(SALARY_REPORT_FAILED))?;
    Ok(Json(reports::lecturer_salaries(rows, hours_threshold)))
}

async fn classroom_usage<S: ReportSource>(
    State(state): State<AppState<S>>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<reports::ClassroomUsage>>, AppError> {
    let semester_id = reports::id_param("semesterId", params.semester_id.as_deref())
        .map_err(|e| AppError::internal(USAGE_REPORT_FAILED, e))?;
    let rows = state
        .store
        .classroom_usage_rows(semester_id)
        .await
        .map_err(read_error(USAGE_REPORT_FAILED))?;
    Ok(Json(reports::classroom_usage(rows)))
}

// --- lookups ---

async fn student_gpa<S: GradeAggregator>(
    State(state): State<AppState<S>>,
    Path(student_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let gpa = state
        .store
        .student_gpa(&student_id)
        .await
        .map_err(read_error("Failed to compute GPA"))?;
    Ok(Json(json!({
        "student_id": student_id,
        "cumulative_gpa": gpa.unwrap_or(0.0),
    })))
}

async fn lecturer_salary<S: GradeAggregator>(
    State(state): State<AppState<S>>,
    WithRejection(Path(lecturer_id), _): WithRejection<Path<i32>, AppError>,
    Query(params): Query<ReportParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    const FAILED: &str = "Failed to compute salary";
    let semester_id = reports::id_param("semesterId", params.semester_id.as_deref())
        .map_err(|e| AppError::internal(FAILED, e))?;
    let salary = state
        .store
        .lecturer_monthly_salary(lecturer_id, semester_id)
        .await
        .map_err(read_error(FAILED))?;
    Ok(Json(json!({
        "lecturer_id": lecturer_id,
        "semester_id": semester_id,
        "monthly_salary": salary.unwrap_or(0.0),
    })))
}
