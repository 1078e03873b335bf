//! API route handlers for the gateway.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use quizcast_channels::webhook::SIGNATURE_HEADER;
use quizcast_core::config::RecipientConfig;
use quizcast_core::error::QuizError;
use quizcast_core::types::{Answer, EventSource, Problem, WebhookEvent};
use quizcast_quiz::jobs::{SELECT_AND_BROADCAST, TABULATE_EDITORIAL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::commands::{Command, ERROR_REPLY, no_map_reply, privacy_reply};
use super::server::AppState;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "quizcast-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "phase": state.controller.phase().await,
        "answers": state.controller.answer_count().await,
    }))
}

// ---- LINE webhook ----

/// Inbound LINE events for one bot. The path segment selects the recipient
/// whose channel secret verifies the body.
pub async fn line_webhook(
    State(state): State<Arc<AppState>>,
    Path(bot_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(recipient) = state.controller.recipient(&bot_name).cloned() else {
        tracing::warn!("[webhook] Unknown bot '{bot_name}'");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": format!("Unknown bot '{bot_name}'") })),
        );
    };

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let events = match state
        .controller
        .deliverer()
        .parse_webhook(&recipient, &body, signature)
    {
        Ok(events) => events,
        Err(e @ QuizError::AuthFailed(_)) => {
            tracing::warn!("[webhook] Rejected request for '{bot_name}': {e}");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
            );
        }
        Err(e) => {
            tracing::warn!("[webhook] Undecodable body for '{bot_name}': {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
            );
        }
    };

    for event in &events {
        if event.source == EventSource::Group {
            if let Some(group_id) = &event.group_id {
                tracing::info!("👥 [{}] event from group {group_id}", recipient.name);
            }
        }
        if let Some(command) = event.text().and_then(Command::parse) {
            handle_command(&state, &recipient, event, command).await;
        }
    }

    (StatusCode::OK, Json(serde_json::json!({ "ok": true, "events": events.len() })))
}

async fn handle_command(state: &AppState, recipient: &RecipientConfig, event: &WebhookEvent, command: Command) {
    if command.is_manual_trigger() && !state.commands.allow_manual_trigger {
        tracing::info!("[webhook] Manual trigger {command:?} ignored: disabled by config");
        return;
    }

    let reply = match command {
        Command::PushProblem => return trigger_job(state, SELECT_AND_BROADCAST),
        Command::PushEditorial => return trigger_job(state, TABULATE_EDITORIAL),
        Command::Map(tag) => match state.controller.catalog_lookup(&tag).await {
            Some(entry) => entry.to_reply_text(),
            None => no_map_reply(&tag),
        },
        Command::TogglePrivacy => {
            let Some(user_id) = event.user_id.as_deref() else {
                tracing::debug!("[webhook] 匿名 without a user id, ignoring");
                return;
            };
            match state.controller.toggle_privacy(user_id).await {
                Ok(hidden) => privacy_reply(hidden).to_string(),
                Err(e) => {
                    tracing::error!("❌ Privacy toggle for {user_id} failed: {e}");
                    ERROR_REPLY.to_string()
                }
            }
        }
    };

    let Some(token) = event.reply_token.as_deref() else {
        tracing::debug!("[webhook] No reply token, dropping reply");
        return;
    };
    if let Err(e) = state.controller.deliverer().reply_text(recipient, token, &reply).await {
        tracing::warn!("❌ Reply via '{}' failed: {e}", recipient.name);
    }
}

fn trigger_job(state: &AppState, name: &str) {
    match state.registry.trigger(name) {
        Ok(()) => tracing::info!("▶️ Manual run of '{name}' queued"),
        Err(e) => tracing::error!("❌ Manual run of '{name}' failed: {e}"),
    }
}

// ---- Answer page ----

/// Problem data the answer page renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiffProblem {
    pub id: String,
    pub text: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub options: Vec<String>,
}

impl From<&Problem> for LiffProblem {
    fn from(problem: &Problem) -> Self {
        Self {
            id: problem.id.clone(),
            text: problem.text.clone(),
            image_url: problem.display_image_url().to_string(),
            options: problem.options.clone(),
        }
    }
}

/// Active problem, or 204 when nothing is being collected.
pub async fn liff_active_problem(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.active_problem().await {
        Some(problem) => Json(LiffProblem::from(&problem)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn liff_problem_by_id(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.controller.problem_by_id(&id).await {
        Some(problem) => Json(LiffProblem::from(&problem)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": format!("Problem '{id}' not found") })),
        )
            .into_response(),
    }
}

/// Body posted by the answer page. `problemID` defaults to the active problem.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, rename = "problemID")]
    pub problem_id: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, rename = "userGroupID")]
    pub user_group_id: String,
    pub option: usize,
    #[serde(default)]
    pub comment: String,
}

pub async fn liff_submit(State(state): State<Arc<AppState>>, body: String) -> (StatusCode, Json<serde_json::Value>) {
    let submission: Submission = match serde_json::from_str(&body) {
        Ok(s) => s,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "ok": false, "error": format!("Invalid parameter: {e}") })),
            );
        }
    };
    if submission.user_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "ok": false, "error": "userID is required" })),
        );
    }

    let problem_id = match submission.problem_id {
        Some(id) => id,
        None => match state.controller.active_problem().await {
            Some(problem) => problem.id,
            None => return (StatusCode::OK, Json(serde_json::json!({ "ok": true, "accepted": false }))),
        },
    };

    let answer = Answer {
        id: String::new(),
        problem_id,
        user_id: submission.user_id,
        user_name: submission.user_name,
        user_group_id: submission.user_group_id,
        option: submission.option,
        comment: submission.comment,
    };
    match state.controller.submit_answer(answer).await {
        Ok(accepted) => (StatusCode::OK, Json(serde_json::json!({ "ok": true, "accepted": accepted }))),
        Err(e) => {
            tracing::error!("❌ Answer submission failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use quizcast_channels::webhook::{parse_events, sign};
    use quizcast_core::config::{QuizConfig, ScheduleConfig};
    use quizcast_core::error::Result;
    use quizcast_core::traits::{Deliverer, ImageProbe, ProblemSource, Template};
    use quizcast_core::types::CatalogEntry;
    use quizcast_db::QuizDb;
    use quizcast_quiz::jobs::register_jobs;
    use quizcast_quiz::{Collaborators, Phase, QuizController};
    use quizcast_scheduler::{CronDriver, JobRegistry};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "chimp-secret";

    struct SheetStub {
        problems: Vec<Problem>,
    }

    #[async_trait]
    impl ProblemSource for SheetStub {
        async fn read_eligible_problems(&self) -> Result<Vec<Problem>> {
            Ok(self.problems.clone())
        }

        async fn mark_broadcast(&self, _: i64) -> Result<()> {
            Ok(())
        }

        async fn read_catalog(&self) -> Result<Vec<CatalogEntry>> {
            Ok(vec![CatalogEntry {
                name: "Forest".into(),
                year: 2019,
                event: "全日本リレー".into(),
                url: "https://maps/1".into(),
            }])
        }
    }

    /// Real signature checking, recorded pushes and replies.
    #[derive(Default)]
    struct RecordingLine {
        pushed: Mutex<Vec<(String, Template)>>,
        replies: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Deliverer for RecordingLine {
        async fn deliver(&self, recipient: &RecipientConfig, template: Template, _: &serde_json::Value) -> Result<()> {
            self.pushed.lock().unwrap().push((recipient.name.clone(), template));
            Ok(())
        }

        async fn reply_text(&self, _: &RecipientConfig, reply_token: &str, text: &str) -> Result<()> {
            self.replies.lock().unwrap().push((reply_token.into(), text.into()));
            Ok(())
        }

        fn parse_webhook(&self, recipient: &RecipientConfig, body: &[u8], signature: Option<&str>) -> Result<Vec<WebhookEvent>> {
            parse_events(&recipient.channel_secret, body, signature)
        }
    }

    struct SquareProbe;

    #[async_trait]
    impl ImageProbe for SquareProbe {
        async fn fetch_dimensions(&self, _: &str) -> Result<(u32, u32)> {
            Ok((1, 1))
        }
    }

    struct TestApp {
        router: Router,
        controller: Arc<QuizController>,
        store: Arc<QuizDb>,
        line: Arc<RecordingLine>,
    }

    fn sample_problem() -> Problem {
        Problem {
            index: 7,
            text: "Which route?".into(),
            original_image_url: "https://img/original".into(),
            options: vec!["Left".into(), "Right".into()],
            ..Default::default()
        }
    }

    fn app_with(allow_manual_trigger: bool) -> TestApp {
        let store = Arc::new(QuizDb::in_memory().unwrap());
        let line = Arc::new(RecordingLine::default());

        let mut config = QuizConfig::default();
        let mut chimp = RecipientConfig::new("chimpanzee", "token", "G1");
        chimp.channel_secret = SECRET.into();
        config.recipients = vec![chimp];
        config.commands.allow_manual_trigger = allow_manual_trigger;

        let deps = Collaborators {
            source: Arc::new(SheetStub { problems: vec![sample_problem()] }),
            store: store.clone(),
            deliverer: line.clone(),
            probe: Arc::new(SquareProbe),
        };
        let controller = Arc::new(QuizController::new(deps, &config).with_rng(StdRng::seed_from_u64(3)));
        let registry = Arc::new(JobRegistry::new(CronDriver::with_offset_hours(1, 9).unwrap()));
        register_jobs(&registry, controller.clone(), &ScheduleConfig::default()).unwrap();

        let state = AppState::new(controller.clone(), registry, config.commands.clone());
        TestApp {
            router: build_router(state),
            controller,
            store,
            line,
        }
    }

    fn app() -> TestApp {
        app_with(true)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn text_event(text: &str, user: &str) -> serde_json::Value {
        serde_json::json!({
            "events": [{
                "type": "message",
                "replyToken": "reply-1",
                "source": { "type": "group", "groupId": "G1", "userId": user },
                "message": { "type": "text", "id": "1", "text": text }
            }]
        })
    }

    fn signed_webhook(bot: &str, payload: &serde_json::Value) -> Request<Body> {
        let body = payload.to_string();
        let signature = sign(SECRET, body.as_bytes()).unwrap();
        Request::builder()
            .method("POST")
            .uri(format!("/webhook/{bot}"))
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    async fn settle<F: Fn() -> bool>(done: F) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    // ---- Health ----

    #[tokio::test]
    async fn test_health_check() {
        let app = app();
        let (status, json) = send(&app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["answers"], 0);
    }

    // ---- Answer page ----

    #[tokio::test]
    async fn test_no_active_problem_is_no_content() {
        let app = app();
        let (status, json) = send(&app.router, get("/liff/problem")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(json.is_null());
    }

    #[tokio::test]
    async fn test_active_problem_and_lookup() {
        let app = app();
        let report = app.controller.select_and_broadcast().await.unwrap().unwrap();

        let (status, json) = send(&app.router, get("/liff/problem")).await;
        assert_eq!(status, StatusCode::OK);
        let problem: LiffProblem = serde_json::from_value(json).unwrap();
        assert_eq!(problem.id, report.problem_id);
        assert_eq!(problem.image_url, "https://img/original");
        assert_eq!(problem.options, vec!["Left", "Right"]);

        let (status, _) = send(&app.router, get(&format!("/liff/problems/{}", report.problem_id))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app.router, get("/liff/problems/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_answer() {
        let app = app();
        app.controller.select_and_broadcast().await.unwrap();

        let (status, json) = send(
            &app.router,
            post_json("/liff", serde_json::json!({
                "userID": "U1", "userName": "Aki", "userGroupID": "G1", "option": 1, "comment": "easy"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], true);
        assert_eq!(app.controller.answer_count().await, 1);

        let user = app.store.get_user_sync("U1").unwrap().unwrap();
        assert_eq!(user.name, "Aki");
    }

    #[tokio::test]
    async fn test_submit_for_stale_problem_rejected() {
        let app = app();
        app.controller.select_and_broadcast().await.unwrap();

        let (status, json) = send(
            &app.router,
            post_json("/liff", serde_json::json!({ "problemID": "old", "userID": "U1", "option": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], false);
        assert_eq!(app.controller.answer_count().await, 0);
    }

    #[tokio::test]
    async fn test_submit_without_active_problem() {
        let app = app();
        let (status, json) = send(
            &app.router,
            post_json("/liff", serde_json::json!({ "userID": "U1", "option": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], false);
    }

    #[tokio::test]
    async fn test_submit_bad_body() {
        let app = app();
        let (status, _) = send(&app.router, post_json("/liff", serde_json::json!({ "option": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app.router, post_json("/liff", serde_json::json!({ "userID": " ", "option": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ---- Webhook ----

    #[tokio::test]
    async fn test_webhook_unknown_bot() {
        let app = app();
        let (status, _) = send(&app.router, signed_webhook("hamster", &text_event("地図", "U1"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let app = app();
        let unsigned = Request::builder()
            .method("POST")
            .uri("/webhook/chimpanzee")
            .body(Body::from(text_event("地図", "U1").to_string()))
            .unwrap();
        let (status, _) = send(&app.router, unsigned).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = Request::builder()
            .method("POST")
            .uri("/webhook/chimpanzee")
            .header(SIGNATURE_HEADER, "AAAA")
            .body(Body::from(text_event("地図", "U1").to_string()))
            .unwrap();
        let (status, _) = send(&app.router, forged).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(app.line.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_map_command_replies_from_catalog() {
        let app = app();
        app.controller.refresh_catalog().await.unwrap();

        let (status, json) = send(&app.router, signed_webhook("Chimpanzee", &text_event("地図 リレー", "U1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["events"], 1);

        let replies = app.line.replies.lock().unwrap().clone();
        assert_eq!(
            replies,
            vec![("reply-1".to_string(), "Forest\n2019年度 全日本リレー\nhttps://maps/1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_map_command_without_catalog_replies_error() {
        let app = app();
        send(&app.router, signed_webhook("chimpanzee", &text_event("地図", "U1"))).await;
        let replies = app.line.replies.lock().unwrap().clone();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_privacy_toggle() {
        let app = app();
        send(&app.router, signed_webhook("chimpanzee", &text_event("匿名", "U9"))).await;
        assert!(app.store.get_user_sync("U9").unwrap().unwrap().is_hidden);

        send(&app.router, signed_webhook("chimpanzee", &text_event("匿名", "U9"))).await;
        assert!(!app.store.get_user_sync("U9").unwrap().unwrap().is_hidden);

        let replies = app.line.replies.lock().unwrap().clone();
        assert_eq!(replies[0].1, privacy_reply(true));
        assert_eq!(replies[1].1, privacy_reply(false));
    }

    #[tokio::test]
    async fn test_problem_command_triggers_broadcast() {
        let app = app();
        send(&app.router, signed_webhook("chimpanzee", &text_event("問題", "U1"))).await;

        let line = app.line.clone();
        settle(|| !line.pushed.lock().unwrap().is_empty()).await;
        assert_eq!(
            app.line.pushed.lock().unwrap().clone(),
            vec![("chimpanzee".to_string(), Template::Problem)]
        );
        // The push lands before the selection returns.
        for _ in 0..200 {
            if app.controller.phase().await != Phase::Broadcasting {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(app.controller.phase().await, Phase::CollectingAnswers);
    }

    #[tokio::test]
    async fn test_manual_trigger_disabled() {
        let app = app_with(false);
        let (status, _) = send(&app.router, signed_webhook("chimpanzee", &text_event("問題", "U1"))).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(app.line.pushed.lock().unwrap().is_empty());
        assert_eq!(app.controller.phase().await, Phase::Idle);
    }

    #[tokio::test]
    async fn test_ordinary_chat_ignored() {
        let app = app();
        let (status, _) = send(&app.router, signed_webhook("chimpanzee", &text_event("おはよう", "U1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.line.replies.lock().unwrap().is_empty());
    }
}
