#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;

use std::time::Duration;

use reqwest::header;
use reqwest::StatusCode;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Assignment;
use crate::domain::models::CanvasError;
use crate::domain::models::Course;
use crate::domain::models::Enrollment;
use crate::domain::models::Submission;

const API_PREFIX: &str = "/api/v1";

fn convert_err(err: reqwest::Error) -> CanvasError {
    return CanvasError::Network(err.to_string());
}

/// Picks the `rel="next"` target out of a `Link` header.
fn next_link(headers: &header::HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    return link
        .split(',')
        .find(|part| return part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            return part.get(start..end).map(|e| return e.to_string());
        });
}

struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

/// Read-only client for the Canvas REST API.
pub struct Canvas {
    url: String,
    token: String,
    cookie: String,
    max_retries: u32,
    backoff: Duration,
    client: reqwest::Client,
}

impl Default for Canvas {
    fn default() -> Canvas {
        return Canvas::new(
            Config::get(ConfigKey::ApiURL),
            Config::get(ConfigKey::ApiToken),
            Config::get(ConfigKey::ApiCookie),
            Config::get(ConfigKey::MaxRetries).parse::<u32>().unwrap_or(3),
        );
    }
}

impl Canvas {
    pub fn new(url: String, token: String, cookie: String, max_retries: u32) -> Canvas {
        return Canvas {
            url,
            token,
            cookie,
            max_retries,
            backoff: Duration::from_millis(200),
            client: reqwest::Client::new(),
        };
    }

    /// Resolves the configured site into its `/api/v1` root.
    fn api_url(&self) -> Result<String, CanvasError> {
        if self.url.trim().is_empty() {
            return Err(CanvasError::Auth(
                "no Canvas URL configured, set api-url to your school's Canvas site".to_string(),
            ));
        }

        let parsed = Url::parse(self.url.trim())
            .map_err(|err| return CanvasError::Auth(format!("{} is not a valid URL: {err}", self.url)))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(CanvasError::Auth(format!(
                "{} is not a Canvas site",
                self.url
            )));
        }

        let base = parsed.as_str().trim_end_matches('/');
        if base.ends_with(API_PREFIX) {
            return Ok(base.to_string());
        }

        return Ok(format!("{base}{API_PREFIX}"));
    }

    /// Fetches one page. `None` means the API answered 403, which Canvas uses
    /// for records the caller may not see; callers read that as empty.
    async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<Option<Page<T>>, CanvasError> {
        let mut req = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        if !self.cookie.is_empty() {
            req = req.header(header::COOKIE, &self.cookie);
        }

        let res = req.send().await.map_err(convert_err)?;
        let status = res.status();
        if status == StatusCode::FORBIDDEN {
            tracing::debug!(url, "Canvas returned 403, treating as empty");
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(CanvasError::Auth(format!(
                "{url} returned 401, check api-token or api-cookie"
            )));
        }
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), url, "Canvas request failed");
            return Err(CanvasError::Network(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }

        let next = next_link(res.headers());
        let body = res.text().await.map_err(convert_err)?;
        let items = serde_json::from_str::<Option<Vec<T>>>(&body)
            .map_err(|err| return CanvasError::Decode(format!("{url}: {err}")))?
            .unwrap_or_default();

        return Ok(Some(Page { items, next }));
    }

    /// Retries network failures with exponential backoff. Auth and decode
    /// failures are returned straight away.
    async fn get_page_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<Page<T>>, CanvasError> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_page(url).await {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = ?err,
                        attempt,
                        max_retries = self.max_retries,
                        "Canvas request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                res => return res,
            }
        }
    }

    /// Fetches every page of `endpoint`.
    async fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, CanvasError> {
        let mut items: Vec<T> = vec![];
        let mut url = format!("{}{endpoint}", self.api_url()?);

        loop {
            let page = match self.get_page_with_retry::<T>(&url).await? {
                Some(page) => page,
                None => return Ok(vec![]),
            };

            items.extend(page.items);
            match page.next {
                Some(next) => url = next,
                None => return Ok(items),
            }
        }
    }

    pub async fn courses(&self) -> Result<Vec<Course>, CanvasError> {
        return self.fetch_all("/courses").await;
    }

    pub async fn self_enrollments(&self, course_id: u64) -> Result<Vec<Enrollment>, CanvasError> {
        return self
            .fetch_all(&format!("/courses/{course_id}/enrollments?user_id=self"))
            .await;
    }

    pub async fn student_enrollments(&self, course_id: u64) -> Result<Vec<Enrollment>, CanvasError> {
        return self
            .fetch_all(&format!(
                "/courses/{course_id}/enrollments?type[]=StudentEnrollment"
            ))
            .await;
    }

    pub async fn student_courses(&self, student_id: u64) -> Result<Vec<Course>, CanvasError> {
        return self
            .fetch_all(&format!(
                "/users/{student_id}/courses?include[]=total_students&enrollment_state=active"
            ))
            .await;
    }

    pub async fn assignments(
        &self,
        course_id: u64,
        student_id: u64,
    ) -> Result<Vec<Assignment>, CanvasError> {
        return self
            .fetch_all(&format!(
                "/users/{student_id}/courses/{course_id}/assignments?per_page=100&include[]=submission&order_by=due_at"
            ))
            .await;
    }

    pub async fn submissions(
        &self,
        course_id: u64,
        student_id: u64,
    ) -> Result<Vec<Submission>, CanvasError> {
        return self
            .fetch_all(&format!(
                "/courses/{course_id}/students/submissions?student_ids[]={student_id}&include[]=assignment&per_page=100"
            ))
            .await;
    }

    pub async fn course_assignments(&self, course_id: u64) -> Result<Vec<Assignment>, CanvasError> {
        return self
            .fetch_all(&format!(
                "/courses/{course_id}/assignments?per_page=100&include[]=submission"
            ))
            .await;
    }
}
