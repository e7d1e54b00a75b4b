use std::io::{self, Write};
use stomp_engine::{Frame, StompClient};

use super::state::SharedState;

pub enum CommandResult {
    Ok,
    Quit,
    /// Informational output for the user
    Info(String),
    Error(String),
}

/// Parse and execute one line of user input.
pub async fn execute_command(
    line: &str,
    client: &StompClient,
    state: SharedState,
    binary: bool,
) -> CommandResult {
    let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
    if parts.is_empty() || parts[0].is_empty() {
        return CommandResult::Ok;
    }

    match parts[0] {
        "quit" | "exit" | "q" => CommandResult::Quit,

        "send" => {
            if parts.len() < 3 {
                return CommandResult::Error("Usage: send <destination> <message>".to_string());
            }
            let result = if binary {
                client
                    .send_bytes(parts[1], parts[2].as_bytes().to_vec(), Vec::new())
                    .await
            } else {
                client.send_text(parts[1], parts[2], Vec::new()).await
            };
            match result {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Error(format!("Send error: {}", e)),
            }
        }

        "sub" | "subscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: sub <destination>".to_string());
            }
            match subscribe_destination(client, parts[1], state).await {
                Ok(id) => CommandResult::Info(format!("Subscribed to {} ({})", parts[1], id)),
                Err(msg) => CommandResult::Error(msg),
            }
        }

        "unsub" | "unsubscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: unsub <destination>".to_string());
            }
            match client.unsubscribe(parts[1]).await {
                Ok(()) => {
                    state.lock().await.unregister_subscription(parts[1]);
                    CommandResult::Info(format!("Unsubscribed from {}", parts[1]))
                }
                Err(e) => CommandResult::Error(format!("Unsubscribe error: {}", e)),
            }
        }

        "ack" | "nack" => {
            if parts.len() < 2 {
                return CommandResult::Error(format!("Usage: {} <id> [transaction]", parts[0]));
            }
            let transaction = parts.get(2).map(|t| t.trim());
            let result = if parts[0] == "ack" {
                client.ack(parts[1], transaction).await
            } else {
                client.nack(parts[1], transaction).await
            };
            match result {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Error(format!("{} error: {}", parts[0], e)),
            }
        }

        "begin" | "commit" | "abort" => {
            if parts.len() < 2 {
                return CommandResult::Error(format!("Usage: {} <transaction>", parts[0]));
            }
            let tx = parts[1];
            let result = match parts[0] {
                "begin" => client.begin(tx).await,
                "commit" => client.commit(tx).await,
                _ => client.abort(tx).await,
            };
            match result {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Error(format!("{} error: {}", parts[0], e)),
            }
        }

        "state" => {
            let (outgoing, incoming) = client.negotiated_heartbeat().await;
            let version = client.negotiated_version().await;
            CommandResult::Info(format!(
                "state: {:?}, version: {}, heart-beat out/in: {:?}/{:?}, subscriptions: {}",
                client.state().await,
                version.as_deref().unwrap_or("-"),
                outgoing,
                incoming,
                client.subscription_count().await
            ))
        }

        "summary" | "report" => {
            let include_messages = parts[0] == "report";
            let text = state
                .lock()
                .await
                .generate_summary_with_options(include_messages, 80);
            match parts.get(1) {
                Some(filename) => match std::fs::write(filename, format!("{}\n", text)) {
                    Ok(()) => CommandResult::Info(format!("Written to {}", filename)),
                    Err(e) => CommandResult::Error(format!("Failed to write {}: {}", filename, e)),
                },
                None => CommandResult::Info(text),
            }
        }

        "help" | "?" => {
            print_help();
            CommandResult::Ok
        }

        _ => CommandResult::Error(format!(
            "Unknown command: {}. Type 'help' for commands.",
            parts[0]
        )),
    }
}

/// Subscribe and spawn a task printing every frame routed to `dest`.
pub async fn subscribe_destination(
    client: &StompClient,
    dest: &str,
    state: SharedState,
) -> Result<String, String> {
    let sub = client
        .subscribe_channel(dest, Vec::new())
        .await
        .map_err(|e| format!("Failed to subscribe to '{}': {}", dest, e))?;
    let id = sub.id().to_string();
    state.lock().await.register_subscription(dest, id.clone());

    let dest = dest.to_string();
    let mut rx = sub.into_receiver();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            print_message(&dest, &frame, &state).await;
        }
    });
    Ok(id)
}

async fn print_message(dest: &str, frame: &Frame, state: &SharedState) {
    let body = match frame.body.as_text() {
        Some(text) => text.to_string(),
        None => format!("({} bytes, binary)", frame.body.len()),
    };
    state.lock().await.record_message(dest, body.clone());

    println!("\n[{}] {} received:", dest, frame.command);
    for (k, v) in &frame.headers {
        println!("  {}: {}", k, v);
    }
    if !frame.body.is_empty() {
        println!("  Body: {}", body);
    }
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>   Send a message");
    println!("  sub <destination>              Subscribe to a destination");
    println!("  unsub <destination>            Unsubscribe from a destination");
    println!("  ack <id> [transaction]         Acknowledge a message");
    println!("  nack <id> [transaction]        Reject a message");
    println!("  begin|commit|abort <tx>        Transaction control");
    println!("  state                          Show connection state");
    println!("  summary [file]                 Session summary");
    println!("  report [file]                  Summary with message history");
    println!("  help                           Show this help");
    println!("  quit                           Disconnect and exit");
}
