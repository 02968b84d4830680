use crate::{
    config::AppConfig,
    log_util,
    model::{Course, CourseSummary, EnrollmentCourse, EnrollmentCourseId, Lesson},
    session::AuthSession,
};
use color_eyre::eyre::{Context, Result, eyre};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

/// The only data-access layer in the application. Every remote read and write
/// goes through one of these operations, so the accepted inconsistency windows
/// (optimistic enroll, unguarded progress insert, degraded certificate counts)
/// all live behind this one seam.
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: String,
}

impl StoreClient {
    /// Create a new [`StoreClient`] with the supplied base URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Construct a [`StoreClient`] from the application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if !config.has_store_credentials() {
            return Err(eyre!(
                "store connection is not configured; set store_url and store_api_key"
            ));
        }
        Ok(Self::new(
            config.store_url.clone(),
            config.store_api_key.clone(),
        ))
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
    }

    async fn ensure_success(context: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|err| format!("<failed to read body: {}>", err));
        log_util::log_debug(&format!("StoreClient: {} error body: {}", context, body));
        Err(eyre!(format!(
            "store returned {} for {}: {}",
            status, context, body
        )))
    }

    /// Exchange email/password credentials for a session token.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let endpoint = format!("{}/auth/v1/token", self.base_url);
        log_util::log_debug(&format!("StoreClient: signing in via {}", endpoint));
        let response = self
            .client
            .post(&endpoint)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .wrap_err("failed to reach the store's token endpoint")?;

        let response = Self::ensure_success("sign-in", response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .wrap_err("failed to parse sign-in response body")?;
        log_util::log_debug(&format!(
            "StoreClient: session resolved for user {}",
            token.user.id
        ));
        Ok(AuthSession {
            user_id: token.user.id,
            email: token.user.email,
            access_token: token.access_token,
        })
    }

    /// All courses joined with their enrollment count aggregate.
    pub async fn fetch_course_summaries(
        &self,
        session: &AuthSession,
    ) -> Result<Vec<CourseSummary>> {
        let response = self
            .authed(self.client.get(self.rest_url("courses")), session)
            .query(&[("select", "*,enrollments(count)")])
            .send()
            .await
            .wrap_err("failed to fetch the course catalog")?;
        let response = Self::ensure_success("course catalog", response).await?;
        response
            .json()
            .await
            .wrap_err("failed to parse the course catalog response")
    }

    /// Ids of the courses the viewer is enrolled in.
    pub async fn fetch_enrolled_course_ids(&self, session: &AuthSession) -> Result<Vec<String>> {
        let response = self
            .authed(self.client.get(self.rest_url("enrollments")), session)
            .query(&[
                ("select", "course_id".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
            ])
            .send()
            .await
            .wrap_err("failed to fetch enrollments")?;
        let response = Self::ensure_success("enrollments", response).await?;
        let rows: Vec<EnrollmentCourseId> = response
            .json()
            .await
            .wrap_err("failed to parse the enrollments response")?;
        Ok(rows.into_iter().map(|row| row.course_id).collect())
    }

    /// Insert one enrollment row linking the viewer to a course.
    pub async fn enroll(&self, session: &AuthSession, course_id: &str) -> Result<()> {
        log_util::log_debug(&format!("StoreClient: enrolling in course {}", course_id));
        let response = self
            .authed(self.client.post(self.rest_url("enrollments")), session)
            .json(&json!([{ "course_id": course_id, "user_id": session.user_id }]))
            .send()
            .await
            .wrap_err("failed to submit the enrollment")?;
        Self::ensure_success("enroll", response).await?;
        Ok(())
    }

    /// Fetch a single course record.
    pub async fn fetch_course(&self, session: &AuthSession, course_id: &str) -> Result<Course> {
        let response = self
            .authed(self.client.get(self.rest_url("courses")), session)
            .query(&[
                ("id", format!("eq.{}", course_id)),
                ("select", "*".to_string()),
            ])
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .wrap_err("failed to fetch the course record")?;
        let response = Self::ensure_success("course", response).await?;
        response
            .json()
            .await
            .wrap_err("failed to parse the course response")
    }

    /// A course's lessons joined with the viewer's progress rows, ordered by
    /// the store on `order_index` (the client does not re-sort).
    pub async fn fetch_course_lessons(
        &self,
        session: &AuthSession,
        course_id: &str,
    ) -> Result<Vec<Lesson>> {
        let response = self
            .authed(self.client.get(self.rest_url("lessons")), session)
            .query(&[
                ("course_id", format!("eq.{}", course_id)),
                ("select", "*,progress_tracks(id,completed)".to_string()),
                ("order", "order_index.asc".to_string()),
            ])
            .send()
            .await
            .wrap_err("failed to fetch the course's lessons")?;
        let response = Self::ensure_success("lessons", response).await?;
        response
            .json()
            .await
            .wrap_err("failed to parse the lessons response")
    }

    /// Fetch a single lesson with its joined progress row.
    pub async fn fetch_lesson(&self, session: &AuthSession, lesson_id: &str) -> Result<Lesson> {
        let response = self
            .authed(self.client.get(self.rest_url("lessons")), session)
            .query(&[
                ("id", format!("eq.{}", lesson_id)),
                ("select", "*,progress_tracks(id,completed)".to_string()),
            ])
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .wrap_err("failed to fetch the lesson record")?;
        let response = Self::ensure_success("lesson", response).await?;
        response
            .json()
            .await
            .wrap_err("failed to parse the lesson response")
    }

    /// Flip an existing progress row to completed.
    pub async fn mark_progress_completed(
        &self,
        session: &AuthSession,
        progress_id: &str,
    ) -> Result<()> {
        log_util::log_debug(&format!(
            "StoreClient: completing progress row {}",
            progress_id
        ));
        let response = self
            .authed(self.client.patch(self.rest_url("progress_tracks")), session)
            .query(&[("id", format!("eq.{}", progress_id))])
            .json(&json!({ "completed": true }))
            .send()
            .await
            .wrap_err("failed to update the progress row")?;
        Self::ensure_success("progress update", response).await?;
        Ok(())
    }

    /// Insert a completed progress row for a lesson with no prior progress.
    /// Nothing guards against a concurrent duplicate insert for the same
    /// (user, lesson) pair; the backend's unique constraint is assumed.
    pub async fn insert_completed_progress(
        &self,
        session: &AuthSession,
        lesson_id: &str,
    ) -> Result<()> {
        log_util::log_debug(&format!(
            "StoreClient: inserting completed progress for lesson {}",
            lesson_id
        ));
        let response = self
            .authed(self.client.post(self.rest_url("progress_tracks")), session)
            .json(&json!([{
                "lesson_id": lesson_id,
                "user_id": session.user_id,
                "completed": true,
            }]))
            .send()
            .await
            .wrap_err("failed to insert the progress row")?;
        Self::ensure_success("progress insert", response).await?;
        Ok(())
    }

    /// The viewer's enrollments joined with each course's lesson id list.
    pub async fn fetch_enrollment_courses(
        &self,
        session: &AuthSession,
    ) -> Result<Vec<EnrollmentCourse>> {
        let response = self
            .authed(self.client.get(self.rest_url("enrollments")), session)
            .query(&[
                ("select", "course:courses(id,title,lessons(id))".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
            ])
            .send()
            .await
            .wrap_err("failed to fetch enrollments with courses")?;
        let response = Self::ensure_success("enrollment courses", response).await?;
        response
            .json()
            .await
            .wrap_err("failed to parse the enrollment courses response")
    }

    /// Count the viewer's completed progress rows among `lesson_ids`, using
    /// the store's exact count reported in the Content-Range header.
    pub async fn count_completed(
        &self,
        session: &AuthSession,
        lesson_ids: &[String],
    ) -> Result<u64> {
        if lesson_ids.is_empty() {
            return Ok(0);
        }
        let response = self
            .authed(self.client.get(self.rest_url("progress_tracks")), session)
            .query(&[
                ("select", "id".to_string()),
                ("completed", "eq.true".to_string()),
                ("lesson_id", in_filter(lesson_ids)),
            ])
            .header("Prefer", "count=exact")
            .send()
            .await
            .wrap_err("failed to count completed progress rows")?;
        let response = Self::ensure_success("progress count", response).await?;

        let header_total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        if let Some(total) = header_total {
            return Ok(total);
        }

        // Stores that omit the count header still return the matching rows.
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .wrap_err("failed to parse the progress count response")?;
        Ok(rows.len() as u64)
    }
}

/// Build a PostgREST `in.(a,b,c)` filter value.
fn in_filter(ids: &[String]) -> String {
    format!("in.({})", ids.join(","))
}

/// Extract the total from a `Content-Range` value such as `0-2/3` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseSummary, EnrollmentCourse, Lesson};
    use std::{fs, path::Path};

    fn load_fixture(filename: &str) -> String {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("test_fixtures")
            .join(filename);
        fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("failed to read {}: {}", path.display(), err))
    }

    #[test]
    fn base_url_trailing_slashes_are_trimmed() {
        let client = StoreClient::new("https://example.test//", "key");
        assert_eq!(
            client.rest_url("courses"),
            "https://example.test/rest/v1/courses"
        );
    }

    #[test]
    fn in_filter_joins_ids() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(in_filter(&ids), "in.(a,b,c)");
    }

    #[test]
    fn content_range_total_parses_counted_and_empty_ranges() {
        assert_eq!(parse_content_range_total("0-2/3"), Some(3));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("nonsense"), None);
    }

    #[test]
    fn course_summaries_fixture_parses_with_counts() {
        let body = load_fixture("course_summaries.json");
        let summaries: Vec<CourseSummary> = serde_json::from_str(&body).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].course.title, "Rust Fundamentals");
        assert_eq!(summaries[0].enrolled_count(), 12);
        assert_eq!(summaries[1].enrolled_count(), 0, "missing join counts as 0");
    }

    #[test]
    fn lessons_fixture_parses_with_joined_progress() {
        let body = load_fixture("lessons_with_progress.json");
        let lessons: Vec<Lesson> = serde_json::from_str(&body).unwrap();
        assert_eq!(lessons.len(), 3);
        assert!(lessons[0].is_completed());
        assert!(lessons[1].is_completed());
        assert!(!lessons[2].is_completed(), "no progress row is in progress");
    }

    #[test]
    fn enrollment_courses_fixture_parses_lesson_id_lists() {
        let body = load_fixture("enrollment_courses.json");
        let rows: Vec<EnrollmentCourse> = serde_json::from_str(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].course.lessons.len(), 3);
        assert_eq!(rows[1].course.lessons.len(), 0);
    }

    #[test]
    fn sign_in_response_parses_token_and_user() {
        let body = r#"{
            "access_token": "jwt-token",
            "token_type": "bearer",
            "user": { "id": "user-1", "email": "learner@example.test" }
        }"#;
        let token: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(token.access_token, "jwt-token");
        assert_eq!(token.user.id, "user-1");
        assert_eq!(token.user.email, "learner@example.test");
    }
}
