use futures::StreamExt;
use std::time::Duration;
use stomp_engine::{ClientOptions, StompClient, WebSocketTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a broker exposing STOMP over WebSocket on localhost:15674.
    let (transport, events) = WebSocketTransport::new("ws://127.0.0.1:15674/ws");
    let client = StompClient::new(transport, ClientOptions::new().login("guest").passcode("guest"));
    client.attach(events);
    client.connect(Vec::new()).await?;

    let mut sub = client
        .subscribe_channel(
            "/queue/tx-demo",
            vec![("ack".to_string(), "client-individual".to_string())],
        )
        .await?;

    let tx_headers = |tx: &str| vec![("transaction".to_string(), tx.to_string())];

    // Both sends are delivered when the transaction commits
    client.begin("tx-1").await?;
    client.send_text("/queue/tx-demo", "message 1 in transaction", tx_headers("tx-1")).await?;
    client.send_text("/queue/tx-demo", "message 2 in transaction", tx_headers("tx-1")).await?;
    client.commit("tx-1").await?;
    println!("Transaction tx-1 committed");

    // Never delivered
    client.begin("tx-2").await?;
    client.send_text("/queue/tx-demo", "this message will be aborted", tx_headers("tx-2")).await?;
    client.abort("tx-2").await?;
    println!("Transaction tx-2 aborted");

    // Acknowledge what arrived inside a third transaction
    client.begin("tx-3").await?;
    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_secs(2), sub.next()).await {
        println!("received: {}", frame.body.as_text().unwrap_or("(binary)"));
        sub.ack(&frame, Some("tx-3")).await?;
    }
    client.commit("tx-3").await?;

    client.disconnect().await?;
    Ok(())
}
