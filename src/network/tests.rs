use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error_handling::types::NetworkError;
use crate::gesture::GestureGenerator;
use crate::network::protocol::Instruction;
use crate::network::{ServerContext, ServerSupervisor};
use crate::session_management::ActivityLog;
use crate::storage::{Ledger, RequestStatus};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> ServerSupervisor {
    let ctx = ServerContext::new(
        Ledger::in_memory().await.unwrap(),
        ActivityLog::new(),
        GestureGenerator::default(),
        Duration::from_millis(10),
    );
    let mut supervisor = ServerSupervisor::new(ctx);
    supervisor.start("127.0.0.1", "0").unwrap();
    supervisor
}

async fn connect(supervisor: &ServerSupervisor) -> Client {
    let url = format!("ws://{}/ws", supervisor.local_addr().unwrap());
    let (client, _) = connect_async(url.as_str()).await.unwrap();
    client
}

async fn next_instruction(client: &mut Client) -> Instruction {
    loop {
        match client.next().await.unwrap().unwrap() {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(WsMessage::Text(text.to_string())).await.unwrap();
}

async fn wait_for_entries(log: &ActivityLog, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while log.len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("activity log did not grow in time");
}

fn ctx(supervisor: &ServerSupervisor) -> Arc<ServerContext> {
    supervisor.context().clone()
}

#[tokio::test]
async fn test_acknowledged_instruction_end_to_end() {
    let mut supervisor = start_server().await;
    let ctx = ctx(&supervisor);
    let mut client = connect(&supervisor).await;

    let first = next_instruction(&mut client).await;
    assert_eq!(first.request_id, 1);
    assert!(first.direction == 0 || first.direction == 1);
    assert!((300..=350).contains(&first.distance));

    send_text(&mut client, r#"{"requestId":1,"status":1}"#).await;
    let second = next_instruction(&mut client).await;
    assert_eq!(second.request_id, 2);

    let record = ctx.ledger.request(1).await.unwrap().unwrap();
    assert_eq!(record.status, Some(RequestStatus::Ok));
    assert_eq!(record.client_address, "127.0.0.1");

    let log = ctx.activity_log.snapshot();
    assert_eq!(log.len(), 1);
    assert!(log[0].text.contains("Request ID: 1"));
    assert!(log[0].text.contains("Ok"));

    client.close(None).await.unwrap();
    wait_for_entries(&ctx.activity_log, 2).await;
    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_without_ack_end_to_end() {
    let mut supervisor = start_server().await;
    let ctx = ctx(&supervisor);
    let mut client = connect(&supervisor).await;

    let first = next_instruction(&mut client).await;
    assert_eq!(first.request_id, 1);
    drop(client);

    wait_for_entries(&ctx.activity_log, 1).await;
    let record = ctx.ledger.request(1).await.unwrap().unwrap();
    assert!(record.is_pending());
    let log = ctx.activity_log.snapshot();
    assert_eq!(log.len(), 1);
    assert!(log[0].text.starts_with("Request ID: 1:"));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_frame_end_to_end() {
    let mut supervisor = start_server().await;
    let ctx = ctx(&supervisor);
    let mut client = connect(&supervisor).await;

    next_instruction(&mut client).await;
    send_text(&mut client, "not json").await;
    send_text(&mut client, r#"{"requestId":1,"status":2}"#).await;

    let second = next_instruction(&mut client).await;
    assert_eq!(second.request_id, 2);
    assert_eq!(ctx.activity_log.len(), 1);
    assert_eq!(
        ctx.ledger.request(1).await.unwrap().unwrap().status,
        Some(RequestStatus::Error)
    );
    assert!(ctx.ledger.request(3).await.unwrap().is_none());

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_logs_endpoint_over_http() {
    let mut supervisor = start_server().await;
    let ctx = ctx(&supervisor);
    ctx.activity_log.append("Request ID: 1:");

    let mut stream = TcpStream::connect(supervisor.local_addr().unwrap())
        .await
        .unwrap();
    stream
        .write_all(b"GET /logs HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("Request ID: 1:"));

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_refuses_new_connections_but_lets_sessions_finish() {
    let mut supervisor = start_server().await;
    let ctx = ctx(&supervisor);
    let addr = supervisor.local_addr().unwrap();
    let mut client = connect(&supervisor).await;
    next_instruction(&mut client).await;

    supervisor.stop().await.unwrap();
    assert!(!supervisor.is_running());
    assert!(connect_async(format!("ws://{}/ws", addr).as_str())
        .await
        .is_err());

    // The in-flight session still runs to its sweep
    send_text(&mut client, r#"{"requestId":1,"status":1}"#).await;
    let second = next_instruction(&mut client).await;
    assert_eq!(second.request_id, 2);
    drop(client);
    wait_for_entries(&ctx.activity_log, 2).await;
}

#[tokio::test]
async fn test_start_reports_bind_failures() {
    let mut first = start_server().await;
    let port = first.local_addr().unwrap().port().to_string();

    let mut second = ServerSupervisor::new(first.context().clone());
    let err = second.start("127.0.0.1", &port).unwrap_err();
    assert!(matches!(err, NetworkError::BindFail(_)));
    assert!(!second.is_running());

    let err = second.start("300.0.0.1", "8080").unwrap_err();
    assert!(matches!(err, NetworkError::InvalidAddress(_)));
    let err = second.start("127.0.0.1", "-5").unwrap_err();
    assert!(matches!(err, NetworkError::InvalidAddress(_)));

    assert!(matches!(
        first.start("127.0.0.1", "0").unwrap_err(),
        NetworkError::AlreadyRunning
    ));
    first.stop().await.unwrap();
    assert!(matches!(
        first.stop().await.unwrap_err(),
        NetworkError::NotRunning
    ));

    // A stopped supervisor can be started again
    first.start("127.0.0.1", "0").unwrap();
    first.stop().await.unwrap();
}
