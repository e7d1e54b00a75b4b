use std::io::{self, Write};
use std::time::Duration;
use stomp_engine::{
    ClientEvent, ClientOptions, ConnError, Heartbeat, StompClient, TransportError,
    WebSocketTransport, frame::headers,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help, subscribe_destination};
use super::exit_codes;
use super::state::{SharedState, new_shared_state};

const CONNECTED_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    println!("Connecting to {}...", cli.url);

    let mut options = ClientOptions::new()
        .accept_version(cli.accept_version.as_str())
        .heartbeat(cli.heartbeat.parse::<Heartbeat>().unwrap_or_default());
    if let Some(host) = &cli.host {
        options = options.host(host.as_str());
    }
    if let Some(login) = &cli.login {
        options = options.login(login.as_str());
    }
    if let Some(passcode) = &cli.passcode {
        options = options.passcode(passcode.as_str());
    }

    let (transport, transport_events) = WebSocketTransport::new(cli.url.as_str());
    let client = StompClient::new(transport, options);
    let mut events = client.events();
    client.attach(transport_events);

    client
        .connect(Vec::new())
        .await
        .map_err(|e| format_connection_error(&e, &cli.url))?;
    let version = wait_for_connected(&mut events).await?;
    println!(
        "Connected (STOMP {}).",
        version.as_deref().unwrap_or("version not reported")
    );

    let state = new_shared_state(
        cli.url.clone(),
        cli.login.clone().unwrap_or_else(|| "(anonymous)".to_string()),
    );
    state.lock().await.version = version;

    for dest in &cli.subscribe {
        let id = subscribe_destination(&client, dest, state.clone())
            .await
            .map_err(|msg| (msg, exit_codes::PROTOCOL_ERROR))?;
        println!("Subscribed to: {} ({})", dest, id);
    }

    tokio::spawn(watch_events(events, state.clone()));

    println!();
    print_help();
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        match execute_command(&line, &client, state.clone(), cli.binary).await {
            CommandResult::Ok => {}
            CommandResult::Quit => break,
            CommandResult::Info(msg) => println!("{}", msg),
            CommandResult::Error(msg) => eprintln!("{}", msg),
        }
    }

    println!("Disconnecting...");
    if cli.summary {
        println!("{}", state.lock().await.generate_summary());
    }
    if let Err(e) = client.disconnect().await {
        eprintln!("Disconnect error: {}", e);
    }
    Ok(())
}

/// Wait for the broker to answer CONNECT with CONNECTED or ERROR.
async fn wait_for_connected(
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<Option<String>, (String, u8)> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Connected { version }) => return Ok(version),
                Ok(ClientEvent::Error(frame)) => {
                    let mut message = format!(
                        "Authentication failed: {}",
                        frame.get_header(headers::MESSAGE).unwrap_or("broker sent ERROR")
                    );
                    if let Some(body) = frame.body.as_text().filter(|b| !b.is_empty()) {
                        message.push_str(&format!(" ({})", body.trim_end()));
                    }
                    return Err((message, exit_codes::AUTH_ERROR));
                }
                Ok(ClientEvent::Closed(info)) => {
                    return Err((
                        format!("Connection closed before CONNECTED: {}", info),
                        exit_codes::NETWORK_ERROR,
                    ));
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err((
                        "Client event stream closed".to_string(),
                        exit_codes::PROTOCOL_ERROR,
                    ));
                }
            }
        }
    };
    tokio::time::timeout(CONNECTED_TIMEOUT, wait)
        .await
        .map_err(|_| {
            (
                "Timed out waiting for CONNECTED".to_string(),
                exit_codes::PROTOCOL_ERROR,
            )
        })?
}

/// Print broker errors and session changes while the command loop runs.
async fn watch_events(mut events: broadcast::Receiver<ClientEvent>, state: SharedState) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                eprintln!("\n[missed {} client events]", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            ClientEvent::Error(frame) => {
                state.lock().await.broker_errors += 1;
                eprintln!(
                    "\n[BROKER ERROR] {}",
                    frame.get_header(headers::MESSAGE).unwrap_or("(no message)")
                );
                for (k, v) in &frame.headers {
                    eprintln!("  {}: {}", k, v);
                }
                if let Some(body) = frame.body.as_text().filter(|b| !b.is_empty()) {
                    eprintln!("  {}", body.trim_end());
                }
            }
            ClientEvent::Connected { version } => {
                state.lock().await.version = version;
                continue;
            }
            ClientEvent::Receipt(id) => {
                state.lock().await.receipts += 1;
                println!("\n[receipt {}]", id);
            }
            ClientEvent::Reconnecting(kind) => {
                state.lock().await.reconnects += 1;
                println!("\n[reconnecting: {:?}]", kind);
            }
            ClientEvent::Closed(info) => {
                state.lock().await.clear_subscription_ids();
                println!("\n[connection closed: {}]", info);
            }
            ClientEvent::Unrouted(frame) => {
                println!(
                    "\n[unrouted {} for {}]",
                    frame.command,
                    frame.destination().unwrap_or("?")
                );
            }
            ClientEvent::FrameError(reason) => eprintln!("\n[frame error] {}", reason),
            ClientEvent::MessageObserved(_) => continue,
        }
        print!("> ");
        let _ = io::stdout().flush();
    }
}

fn format_connection_error(err: &ConnError, url: &str) -> (String, u8) {
    match err {
        ConnError::Transport(TransportError::Start(reason)) => (
            format!("Connection failed: {} ({})", url, reason),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::Transport(e) => (format!("Transport error: {}", e), exit_codes::NETWORK_ERROR),
        ConnError::NotRunning => (
            format!("Transport did not start: {}", url),
            exit_codes::NETWORK_ERROR,
        ),
        other => (
            format!("Protocol error: {}", other),
            exit_codes::PROTOCOL_ERROR,
        ),
    }
}
