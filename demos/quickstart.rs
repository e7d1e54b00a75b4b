use serde::{Deserialize, Serialize};
use std::time::Duration;
use stomp_engine::{ClientOptions, Heartbeat, StompClient, WebSocketTransport};
use tokio::sync::mpsc;

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    from: String,
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a broker exposing STOMP over WebSocket, e.g. RabbitMQ with the
    // web-stomp plugin listening on localhost:15674.
    let (transport, events) = WebSocketTransport::new("ws://127.0.0.1:15674/ws");
    let options = ClientOptions::new()
        .login("guest")
        .passcode("guest")
        .heartbeat(Heartbeat::new(0, 10_000));
    let client = StompClient::new(transport, options);
    client.attach(events);

    client.connect(Vec::new()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe_typed("/queue/test", Vec::new(), move |greeting: Greeting, _frame| {
            let _ = tx.send(greeting);
        })
        .await?;

    let greeting = Greeting {
        from: "quickstart".into(),
        text: "hello over websocket".into(),
    };
    client.send("/queue/test", &greeting, Vec::new()).await?;

    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(greeting)) => println!("received: {:?}", greeting),
        Ok(None) => println!("subscription closed"),
        Err(_) => println!("timed out waiting for a message"),
    }

    client.disconnect().await?;
    Ok(())
}
