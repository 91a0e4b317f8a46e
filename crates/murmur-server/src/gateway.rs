//! HTTP push-stream gateway: readers attach here and receive relayed
//! frames as server-sent events.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use std::convert::Infallible;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use murmur_broadcast::Broadcaster;
use murmur_core::ids::SubscriberId;

/// Shared state behind the gateway routes.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// Fan-out source the `/events` endpoint subscribes against.
    pub broadcaster: Broadcaster<String>,
}

/// Build the gateway router.
///
/// CORS is wide open on purpose: the stream is public read-only data and
/// browser pages on any origin may attach.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/events", get(events))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Detaches the subscriber when the response body is dropped.
///
/// Body streams are dropped, not awaited, on client disconnect, so the
/// unsubscribe has to run from `Drop`. `Drop` cannot await; the call is
/// spawned instead, which is safe because the body is always dropped on
/// the runtime that served it.
struct UnsubscribeGuard {
    broadcaster: Broadcaster<String>,
    id: Option<SubscriberId>,
}

impl Drop for UnsubscribeGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            debug!(subscriber = %id, "stream reader detached");
            let broadcaster = self.broadcaster.clone();
            let _ = tokio::spawn(async move {
                broadcaster.unsubscribe(id).await;
            });
        }
    }
}

async fn events(State(state): State<GatewayState>) -> impl IntoResponse {
    let id = SubscriberId::random();
    info!(subscriber = %id, "stream reader attached");
    let mut entry = state.broadcaster.subscribe(id.clone()).await;
    let guard = UnsubscribeGuard {
        broadcaster: state.broadcaster.clone(),
        id: Some(id),
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = entry.recv().await {
            yield Ok::<Bytes, Infallible>(Bytes::from(frame));
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::net::TcpListener;

    async fn spawn_gateway(broadcaster: Broadcaster<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(GatewayState { broadcaster });
        let _ = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn wait_for_count(broadcaster: &Broadcaster<String>, expected: usize) {
        for _ in 0..100 {
            if broadcaster.subscriber_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscriber count never reached {expected}");
    }

    #[tokio::test]
    async fn streams_published_frames_with_event_stream_headers() {
        let broadcaster = Broadcaster::<String>::new();
        broadcaster.start();
        let base = spawn_gateway(broadcaster.clone()).await;

        let response = reqwest::get(format!("{base}/events")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        assert_eq!(
            response.headers()["cache-control"].to_str().unwrap(),
            "no-cache"
        );

        wait_for_count(&broadcaster, 1).await;
        broadcaster.publish("event: notify\n".to_owned()).await;
        broadcaster.publish("data: alice:hi\n\n".to_owned()).await;

        let mut body = response.bytes_stream();
        let mut collected = String::new();
        while !collected.contains("data: alice:hi\n\n") {
            let chunk = body.next().await.expect("stream ended early").unwrap();
            collected.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        assert!(collected.starts_with("event: notify\n"));
    }

    #[tokio::test]
    async fn reader_disconnect_unsubscribes() {
        let broadcaster = Broadcaster::<String>::new();
        broadcaster.start();
        let base = spawn_gateway(broadcaster.clone()).await;

        let response = reqwest::get(format!("{base}/events")).await.unwrap();
        wait_for_count(&broadcaster, 1).await;

        drop(response);
        wait_for_count(&broadcaster, 0).await;
    }

    #[tokio::test]
    async fn each_reader_gets_every_frame() {
        let broadcaster = Broadcaster::<String>::new();
        broadcaster.start();
        let base = spawn_gateway(broadcaster.clone()).await;

        let first = reqwest::get(format!("{base}/events")).await.unwrap();
        let second = reqwest::get(format!("{base}/events")).await.unwrap();
        wait_for_count(&broadcaster, 2).await;

        broadcaster.publish("data: alice:hi\n\n".to_owned()).await;

        for response in [first, second] {
            let mut body = response.bytes_stream();
            let chunk = body.next().await.expect("stream ended early").unwrap();
            assert_eq!(std::str::from_utf8(&chunk).unwrap(), "data: alice:hi\n\n");
        }
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let broadcaster = Broadcaster::<String>::new();
        broadcaster.start();
        let base = spawn_gateway(broadcaster).await;

        let response = reqwest::get(format!("{base}/healthz")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");
    }
}
