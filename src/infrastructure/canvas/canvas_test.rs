use std::time::Duration;

use anyhow::Result;
use mockito::Matcher;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::LINK;

use super::next_link;
use super::Canvas;
use crate::domain::models::CanvasError;

impl Canvas {
    fn with_url(url: String) -> Canvas {
        let mut canvas = Canvas::new(url, "abc".to_string(), "".to_string(), 2);
        canvas.backoff = Duration::from_millis(1);
        return canvas;
    }
}

#[tokio::test]
async fn it_lists_courses() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer abc")
        .with_status(200)
        .with_body(test_utils::COURSES)
        .create_async()
        .await;

    let courses = Canvas::with_url(server.url()).courses().await?;

    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0].id, 1);
    assert_eq!(courses[0].name, "Math");
    assert_eq!(courses[0].enrollment_term_id, Some(7));
    assert_eq!(courses[1].enrollment_term_id, None);
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_sends_cookie_when_configured() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .match_header("cookie", "canvas_session=xyz")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let canvas = Canvas::new(server.url(), "".to_string(), "canvas_session=xyz".to_string(), 0);
    let courses = canvas.courses().await?;

    assert!(courses.is_empty());
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_reads_forbidden_as_empty() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses/1/enrollments")
        .match_query(Matcher::UrlEncoded("user_id".to_string(), "self".to_string()))
        .with_status(403)
        .with_body(r#"{"status":"unauthorized"}"#)
        .expect(1)
        .create_async()
        .await;

    let enrollments = Canvas::with_url(server.url()).self_enrollments(1).await?;

    assert!(enrollments.is_empty());
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_reads_null_body_as_empty() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses/1/students/submissions")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("student_ids[]".to_string(), "42".to_string()),
            Matcher::UrlEncoded("per_page".to_string(), "100".to_string()),
        ]))
        .with_status(200)
        .with_body("null")
        .create_async()
        .await;

    let submissions = Canvas::with_url(server.url()).submissions(1, 42).await?;

    assert!(submissions.is_empty());
    mock.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_follows_pagination_links() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let next = format!("<{}/api/v1/courses?page=2>; rel=\"next\"", server.url());
    let first = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_header("link", &next)
        .with_body(r#"[{"id":1,"name":"Math"}]"#)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::UrlEncoded("page".to_string(), "2".to_string()))
        .with_status(200)
        .with_body(r#"[{"id":2,"name":"Science"}]"#)
        .create_async()
        .await;

    let courses = Canvas::with_url(server.url()).courses().await?;

    assert_eq!(
        courses.iter().map(|e| return e.id).collect::<Vec<u64>>(),
        vec![1, 2]
    );
    first.assert_async().await;
    second.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_retries_server_errors() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(502)
        .expect(2)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(test_utils::COURSES)
        .expect(1)
        .create_async()
        .await;

    let courses = Canvas::with_url(server.url()).courses().await?;

    assert_eq!(courses.len(), 2);
    failing.assert_async().await;
    ok.assert_async().await;

    return Ok(());
}

#[tokio::test]
async fn it_gives_up_after_max_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let res = Canvas::with_url(server.url()).courses().await;

    assert_eq!(
        res,
        Err(CanvasError::Network("HTTP error! status: 500".to_string()))
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn it_does_not_retry_unauthorized() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let res = Canvas::with_url(server.url()).courses().await;

    assert!(matches!(res, Err(CanvasError::Auth(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_does_not_retry_bad_payloads() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>Log in</html>")
        .expect(1)
        .create_async()
        .await;

    let res = Canvas::with_url(server.url()).courses().await;

    assert!(matches!(res, Err(CanvasError::Decode(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_requires_a_site() {
    let res = Canvas::with_url("".to_string()).courses().await;
    assert!(matches!(res, Err(CanvasError::Auth(_))));

    let res = Canvas::with_url("ftp://school.example.com".to_string())
        .courses()
        .await;
    assert!(matches!(res, Err(CanvasError::Auth(_))));
}

#[test]
fn it_resolves_api_root() -> Result<()> {
    let canvas = Canvas::with_url("https://school.instructure.com/".to_string());
    assert_eq!(canvas.api_url()?, "https://school.instructure.com/api/v1");

    let canvas = Canvas::with_url("https://school.instructure.com/api/v1".to_string());
    assert_eq!(canvas.api_url()?, "https://school.instructure.com/api/v1");

    return Ok(());
}

#[test]
fn it_parses_next_link() {
    let mut headers = HeaderMap::new();
    headers.insert(
        LINK,
        HeaderValue::from_static(
            "<https://x.test/api/v1/courses?page=1>; rel=\"current\",<https://x.test/api/v1/courses?page=2>; rel=\"next\"",
        ),
    );

    assert_eq!(
        next_link(&headers),
        Some("https://x.test/api/v1/courses?page=2".to_string())
    );
    assert_eq!(next_link(&HeaderMap::new()), None);
}
