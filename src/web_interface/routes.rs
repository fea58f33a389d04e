use std::net::SocketAddr;
use std::sync::Arc;

use futures::{future, StreamExt};
use log::warn;
use warp::{reply, Filter, Rejection, Reply};

use crate::network::types::ServerContext;
use crate::session_management::{ActivityLog, Session};

/// Client address recorded when the transport does not expose the peer.
pub const UNKNOWN_PEER: &str = "unknown";

/// GET /ws
///
/// Upgrades to a WebSocket and runs one [`Session`] on it, tracked by the
/// context's session set. `port` is the configured listening port recorded
/// with every request.
pub fn websocket_route(
    ctx: Arc<ServerContext>,
    port: u16,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .map(move |ws: warp::ws::Ws, remote: Option<SocketAddr>| {
            let ctx = ctx.clone();
            let address = match remote {
                Some(addr) => addr.ip().to_string(),
                None => {
                    warn!("peer address unavailable, recording as '{}'", UNKNOWN_PEER);
                    UNKNOWN_PEER.to_string()
                }
            };
            ws.on_upgrade(move |socket| {
                let (outgoing, incoming) = socket.split();
                let session = Session::new(ctx.clone(), address, port);
                ctx.sessions.spawn(session.run(incoming, outgoing));
                future::ready(())
            })
        })
}

/// GET /logs
///
/// Plain-text snapshot of the activity log.
pub fn activity_log_route(
    log: ActivityLog,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("logs")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || {
            reply::with_header(log.render(), "Content-Type", "text/plain; charset=utf-8")
        })
}

pub fn routes(
    ctx: Arc<ServerContext>,
    port: u16,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let log = ctx.activity_log.clone();
    websocket_route(ctx, port).or(activity_log_route(log))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::GestureGenerator;
    use crate::network::protocol::Instruction;
    use crate::storage::Ledger;
    use std::time::Duration;
    use warp::http::StatusCode;

    async fn context() -> Arc<ServerContext> {
        ServerContext::new(
            Ledger::in_memory().await.unwrap(),
            ActivityLog::new(),
            GestureGenerator::default(),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_logs_route_renders_placeholder_then_entries() {
        let ctx = context().await;
        let filter = routes(ctx.clone(), 8080);

        let res = warp::test::request().path("/logs").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), "No logs");

        ctx.activity_log.append("Request ID: 1:");
        ctx.activity_log.append("Request ID: 2:");
        let res = warp::test::request().path("/logs").reply(&filter).await;
        assert_eq!(res.body(), "Request ID: 1:\n\nRequest ID: 2:");
        assert_eq!(
            res.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let ctx = context().await;
        let res = warp::test::request()
            .path("/sessions")
            .reply(&routes(ctx, 8080))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_websocket_route_sends_first_instruction() {
        let ctx = context().await;
        let mut client = warp::test::ws()
            .path("/ws")
            .handshake(websocket_route(ctx.clone(), 8080))
            .await
            .expect("handshake");

        let message = client.recv().await.unwrap();
        let instruction: Instruction = serde_json::from_str(message.to_str().unwrap()).unwrap();
        assert_eq!(instruction.request_id, 1);
        assert_eq!(ctx.sessions.active(), 1);

        client.send_text(r#"{"requestId":1,"status":1}"#).await;
        let message = client.recv().await.unwrap();
        let instruction: Instruction = serde_json::from_str(message.to_str().unwrap()).unwrap();
        assert_eq!(instruction.request_id, 2);
        assert_eq!(ctx.activity_log.len(), 1);
    }
}
