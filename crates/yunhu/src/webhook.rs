//! Webhook receiver: accepts Yunhu event pushes and hands them to the host.

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::StatusCode,
        routing::post,
    },
    serde_json::{Value, json},
    tracing::{debug, error, info, warn},
};

use crate::{
    handlers,
    state::AccountStateMap,
    wire::WebhookEnvelope,
};

/// State shared by the webhook route of one account.
#[derive(Clone)]
pub struct WebhookState {
    pub account_id: String,
    pub accounts: AccountStateMap,
}

/// Router serving `POST {path}` for one account.
pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(receive))
        .with_state(state)
}

async fn receive(State(state): State<WebhookState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(account_id = %state.account_id, error = %e, "rejecting malformed yunhu webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": -1, "message": "invalid payload" })),
            );
        },
    };

    let log_payloads = {
        let accounts = state.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(&state.account_id)
            .is_some_and(|s| s.config.log_payloads)
    };
    let raw = String::from_utf8_lossy(&body);
    if log_payloads {
        info!(account_id = %state.account_id, payload = %raw, "yunhu webhook payload");
    } else {
        debug!(account_id = %state.account_id, payload = %raw, "yunhu webhook payload");
    }

    tokio::spawn(handle_event(state, envelope));
    (
        StatusCode::OK,
        Json(json!({ "code": 0, "message": "success" })),
    )
}

/// Adapt one event and emit the resulting session to the account's sink.
pub async fn handle_event(state: WebhookState, envelope: WebhookEnvelope) {
    let account = {
        let accounts = state.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts.get(&state.account_id).map(|s| {
            (
                s.decoder.clone(),
                s.event_sink.clone(),
                s.config.bot_id.clone(),
            )
        })
    };
    let Some((decoder, event_sink, self_id)) = account else {
        warn!(account_id = %state.account_id, "yunhu event for stopped account dropped");
        return;
    };

    let event_type = envelope.header.event_type.clone();
    match handlers::adapt_event(&envelope, &decoder, &self_id).await {
        Ok(Some(session)) => {
            debug!(
                account_id = %state.account_id,
                event_type = %event_type,
                kind = ?session.kind,
                channel_id = ?session.channel_id,
                "yunhu event adapted"
            );
            if let Some(sink) = event_sink {
                sink.emit(session).await;
            }
        },
        Ok(None) => {},
        Err(e) => {
            error!(
                account_id = %state.account_id,
                event_type = %event_type,
                error = %e,
                "error handling yunhu event"
            );
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{config::YunhuAccountConfig, state::AccountState},
        async_trait::async_trait,
        axum::{body::Body, http::Request},
        secrecy::Secret,
        std::{
            collections::HashMap,
            sync::{Arc, RwLock},
            time::Duration,
        },
        tokio::sync::mpsc,
        tower::ServiceExt,
        yunhu_channels::ChannelEventSink,
        yunhu_common::{Session, SessionKind},
    };

    struct ChannelSink(mpsc::UnboundedSender<Session>);

    #[async_trait]
    impl ChannelEventSink for ChannelSink {
        async fn emit(&self, session: Session) {
            let _ = self.0.send(session);
        }
    }

    fn setup() -> (Router, mpsc::UnboundedReceiver<Session>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = YunhuAccountConfig {
            token: Secret::new("t".into()),
            bot_id: "bot1".into(),
            ..Default::default()
        };
        let account =
            AccountState::new("main", config, Some(Arc::new(ChannelSink(tx)) as _)).unwrap();
        let accounts: AccountStateMap = Arc::new(RwLock::new(HashMap::new()));
        accounts.write().unwrap().insert("main".into(), account);
        let router = router("/yunhu", WebhookState {
            account_id: "main".into(),
            accounts,
        });
        (router, rx)
    }

    fn post(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn acknowledges_and_emits_session() {
        let (router, mut rx) = setup();
        let response = router
            .oneshot(post(
                "/yunhu",
                json!({
                    "version": "1.0",
                    "header": { "eventId": "e1", "eventTime": 42, "eventType": "bot.followed" },
                    "event": { "userId": "u9", "nickname": "owl" }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "code": 0, "message": "success" })
        );

        let session = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.kind, SessionKind::FriendAdded);
        assert_eq!(session.self_id, "bot1");
        assert_eq!(session.user_id(), Some("u9"));
        assert_eq!(session.timestamp, 42);
    }

    #[tokio::test]
    async fn null_fields_are_accepted() {
        let (router, mut rx) = setup();
        let response = router
            .oneshot(post(
                "/yunhu",
                json!({
                    "version": null,
                    "header": { "eventId": "e3", "eventTime": 7, "eventType": "group.member.joined" },
                    "event": {
                        "joinedMember": { "memberId": "u2", "memberNickname": null },
                        "chat": { "chatId": "g1", "chatType": null }
                    }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.kind, SessionKind::GuildMemberAdded);
        assert_eq!(session.user_id(), Some("u2"));
        assert_eq!(session.guild_id.as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn unknown_event_is_acknowledged_without_session() {
        let (router, mut rx) = setup();
        let response = router
            .oneshot(post(
                "/yunhu",
                json!({ "header": { "eventType": "button.report.inline" }, "event": {} }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let next = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(!matches!(next, Ok(Some(_))));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (router, _rx) = setup();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/yunhu")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn other_paths_are_not_served() {
        let (router, _rx) = setup();
        let response = router
            .oneshot(post("/other", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
