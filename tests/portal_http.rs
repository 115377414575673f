use std::time::Duration;

use chrono::NaiveDate;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eios_schedule::cache::{self, Cache};
use eios_schedule::portal::{
    discover_plan_id, Credentials, Directive, HttpPortal, PlanDirectory, Portal, PortalConfig,
};
use eios_schedule::{Error, ViewKind};

const SCHEDULE_PATH: &str = "/_layouts/sinc/ia/v1.0/pages/MySchedule.aspx";
const PROFILE_PATH: &str = "/_layouts/sinc/ia/v1.0/pages/MyStudentProfile.aspx";

// base64("u1:secret")
const AUTHORIZATION: &str = "Basic dTE6c2VjcmV0";

const HOST_PAGE: &str = r#"<html><body><form>
    <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="abc" />
    <input type="hidden" name="__EVENTVALIDATION" value="xyz" />
    <input type="text" name="search" value="ignored" />
</form></body></html>"#;

fn config(server: &MockServer) -> PortalConfig {
    PortalConfig {
        origin: server.uri(),
        timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

fn credentials() -> Credentials {
    Credentials::new("u1", "secret", "4242")
}

async fn mount_host_page(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path(SCHEDULE_PATH))
        .and(query_param("base_plan_ids", "4242"))
        .and(header("authorization", AUTHORIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn threads_hidden_state_through_postbacks() {
    let server = MockServer::start().await;
    mount_host_page(&server, HOST_PAGE).await;

    Mock::given(method("POST"))
        .and(path(SCHEDULE_PATH))
        .and(header("authorization", AUTHORIZATION))
        .and(body_string_contains("__CALLBACKPARAM=c0%3ASAVT%7CDay"))
        .and(body_string_contains("__VIEWSTATE=abc"))
        .and(body_string_contains("__EVENTVALIDATION=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{'__VIEWSTATE':'fresh','visibleDays':'3/6/2024'};CreateAppointmentsViewInfos([]);",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(SCHEDULE_PATH))
        .and(body_string_contains("__CALLBACKPARAM=c0%3AFORWARD%7C"))
        .and(body_string_contains("__VIEWSTATE=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "CreateAppointmentsViewInfos([['1_0',2,['Фонетика','9:00','10:20'],[new Date(2024,5,4)]]]);",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let portal = HttpPortal::new(config(&server));
    let conversation = portal.open(&credentials()).await.unwrap();
    assert_eq!(conversation.initial_state().get("__VIEWSTATE"), Some("abc"));
    assert_eq!(conversation.initial_state().get("search"), None);

    let switched = conversation
        .send(conversation.initial_state(), &Directive::SetView(ViewKind::Day))
        .await
        .unwrap();
    assert_eq!(switched.state.get("__VIEWSTATE"), Some("fresh"));
    assert_eq!(switched.state.get("__EVENTVALIDATION"), Some("xyz"));
    assert_eq!(conversation.initial_state().get("__VIEWSTATE"), Some("abc"));

    let stepped = conversation
        .send(&switched.state, &Directive::StepForward)
        .await
        .unwrap();
    assert!(stepped.body.contains("Фонетика"));
}

#[tokio::test]
async fn day_navigation_over_http() {
    let server = MockServer::start().await;
    mount_host_page(&server, HOST_PAGE).await;

    Mock::given(method("POST"))
        .and(body_string_contains("__CALLBACKPARAM=c0%3ASAVT%7CDay"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{'visibleDays':'1/6/2024'};CreateAppointmentsViewInfos([]);",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("c0%3AMOREBTN%7C1717534800000%2C1717448400000%2C86400000%2Cnull"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{'visibleDays':'4/6/2024'};CreateAppointmentsViewInfos([['1_0',2,['Фонетика','9:00','10:20'],[new Date(2024,5,4)]]]);",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let portal = HttpPortal::new(config(&server));
    let conversation = portal.open(&credentials()).await.unwrap();

    let target = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
    let events = eios_schedule::navigation::fetch_day(&*conversation, target)
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].course_name, "Фонетика");
}

#[tokio::test]
async fn missing_view_state_is_fatal() {
    let server = MockServer::start().await;
    mount_host_page(&server, "<html><input type='hidden' name='__EVENTVALIDATION' value='x'></html>").await;

    let result = HttpPortal::new(config(&server)).open(&credentials()).await;
    assert!(matches!(result, Err(Error::StateExtraction("__VIEWSTATE"))));
}

#[tokio::test]
async fn error_status_becomes_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = HttpPortal::new(config(&server)).open(&credentials()).await;
    match result {
        Err(Error::Upstream { status }) => assert_eq!(status.as_u16(), 500),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an upstream error"),
    }
}

#[tokio::test]
async fn slow_portal_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(HOST_PAGE)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let result = HttpPortal::new(config(&server)).open(&credentials()).await;
    assert!(matches!(result, Err(Error::UpstreamTimeout)));
}

#[tokio::test]
async fn discovers_plan_from_profile_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(header("authorization", AUTHORIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/x">Профиль</a><a href="MySchedule.aspx?base_plan_ids=4242&amp;v=1">Расписание занятий</a>"#,
        ))
        .mount(&server)
        .await;

    let plan = discover_plan_id(&config(&server), "u1", "secret").await.unwrap();
    assert_eq!(plan, "4242");
}

#[tokio::test]
async fn profile_without_schedule_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>nothing</p>"))
        .mount(&server)
        .await;

    let result = discover_plan_id(&config(&server), "u1", "secret").await;
    assert!(matches!(result, Err(Error::PlanNotFound)));
}

#[tokio::test]
async fn plan_lookup_is_remembered_per_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .and(header("authorization", AUTHORIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="MySchedule.aspx?base_plan_ids=4242">Расписание занятий</a>"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let plans = PlanDirectory::new(config(&server), Cache::new(cache::Config::default()));

    assert_eq!(plans.plan_id("u1", "secret").await.unwrap(), "4242");
    assert_eq!(plans.plan_id("u1", "secret").await.unwrap(), "4242");

    assert_eq!(plans.forget("u1").await, 1);
    assert_eq!(plans.plan_id("u1", "secret").await.unwrap(), "4242");
}
