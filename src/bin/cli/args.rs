use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp-ws")]
#[command(version)]
#[command(about = "Interactive STOMP client over WebSocket")]
pub struct Cli {
    /// WebSocket URL of the broker's STOMP endpoint
    #[arg(short, long, default_value = "ws://127.0.0.1:15674/ws")]
    pub url: String,

    /// Login username
    #[arg(short, long)]
    pub login: Option<String>,

    /// Passcode
    #[arg(short, long)]
    pub passcode: Option<String>,

    /// Virtual host sent in the `host` header
    #[arg(long)]
    pub host: Option<String>,

    /// Heartbeat settings (client-send,client-receive in ms)
    #[arg(long, default_value = "0,1000")]
    pub heartbeat: String,

    /// Protocol versions offered in CONNECT
    #[arg(long, default_value = "1.0,1.1,1.2")]
    pub accept_version: String,

    /// Destinations to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Send message bodies using the binary frame encoding
    #[arg(long)]
    pub binary: bool,

    /// Show session summary on exit
    #[arg(long)]
    pub summary: bool,
}
