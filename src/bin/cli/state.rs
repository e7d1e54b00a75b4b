use chrono::{DateTime, Local};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Number of received messages kept for the `history` command.
pub const MAX_MESSAGES: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct SubStats {
    pub message_count: u64,
    /// Id of the live subscription, `None` once unsubscribed
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub timestamp: DateTime<Local>,
    pub destination: String,
    /// Body text, or a short description for binary bodies
    pub body: String,
}

/// Session bookkeeping shared between the command loop and event tasks.
pub struct SessionState {
    pub start_time: DateTime<Local>,
    pub url: String,
    pub user: String,
    pub version: Option<String>,

    pub subscriptions: HashMap<String, SubStats>,
    pub messages: VecDeque<ReceivedMessage>,

    pub broker_errors: u64,
    pub receipts: u64,
    pub reconnects: u64,
}

impl SessionState {
    pub fn new(url: String, user: String) -> Self {
        Self {
            start_time: Local::now(),
            url,
            user,
            version: None,
            subscriptions: HashMap::new(),
            messages: VecDeque::with_capacity(MAX_MESSAGES),
            broker_errors: 0,
            receipts: 0,
            reconnects: 0,
        }
    }

    pub fn record_message(&mut self, destination: &str, body: String) {
        let stats = self.subscriptions.entry(destination.to_string()).or_default();
        stats.message_count += 1;

        self.messages.push_back(ReceivedMessage {
            timestamp: Local::now(),
            destination: destination.to_string(),
            body,
        });
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
    }

    pub fn register_subscription(&mut self, destination: &str, id: String) {
        self.subscriptions.entry(destination.to_string()).or_default().id = Some(id);
    }

    pub fn unregister_subscription(&mut self, destination: &str) {
        if let Some(stats) = self.subscriptions.get_mut(destination) {
            stats.id = None;
        }
    }

    /// The engine drops every subscription when the session closes.
    pub fn clear_subscription_ids(&mut self) {
        for stats in self.subscriptions.values_mut() {
            stats.id = None;
        }
    }

    pub fn total_message_count(&self) -> u64 {
        self.subscriptions.values().map(|s| s.message_count).sum()
    }

    pub fn session_duration(&self) -> String {
        let total_secs = Local::now()
            .signed_duration_since(self.start_time)
            .num_seconds();
        format!(
            "{:02}:{:02}:{:02}",
            total_secs / 3600,
            (total_secs % 3600) / 60,
            total_secs % 60
        )
    }

    pub fn generate_summary(&self) -> String {
        self.generate_summary_with_options(false, 80)
    }

    /// Session report, optionally followed by the retained message history.
    pub fn generate_summary_with_options(&self, include_messages: bool, max_width: usize) -> String {
        let rule = "═".repeat(max_width);
        let end_time = Local::now();

        let mut lines = vec![
            rule.clone(),
            "  stomp-ws Session Report".to_string(),
            rule.clone(),
            format!("  URL:        {}", self.url),
            format!("  User:       {}", self.user),
            format!(
                "  Version:    {}",
                self.version.as_deref().unwrap_or("(not negotiated)")
            ),
            format!("  Started:    {}", self.start_time.format("%Y-%m-%d %H:%M:%S")),
            format!("  Ended:      {}", end_time.format("%Y-%m-%d %H:%M:%S")),
            format!("  Duration:   {}", self.session_duration()),
            String::new(),
            "  Subscriptions:".to_string(),
        ];

        let mut subs: Vec<_> = self.subscriptions.iter().collect();
        subs.sort_by(|a, b| b.1.message_count.cmp(&a.1.message_count));

        let width = subs
            .iter()
            .map(|(d, _)| d.chars().count())
            .max()
            .unwrap_or(20)
            .min(40);
        for (dest, stats) in &subs {
            let marker = if stats.id.is_some() { ' ' } else { '-' };
            lines.push(format!(
                "   {}{:width$} {:>6}",
                marker,
                truncate_str(dest, width),
                stats.message_count,
                width = width
            ));
        }
        lines.push(format!("    {:─>w$}", "", w = width + 7));
        lines.push(format!(
            "    {:width$} {:>6}",
            "Total",
            self.total_message_count(),
            width = width
        ));
        lines.push(String::new());
        lines.push(format!("  Broker errors: {}", self.broker_errors));
        lines.push(format!("  Receipts:      {}", self.receipts));
        lines.push(format!("  Reconnects:    {}", self.reconnects));

        if include_messages && !self.messages.is_empty() {
            lines.push(String::new());
            lines.push("  Message History".to_string());
            lines.push("─".repeat(max_width));
            for msg in &self.messages {
                let prefix = format!(
                    "  {} [{}] ",
                    msg.timestamp.format("%H:%M:%S"),
                    msg.destination
                );
                let body_width = max_width.saturating_sub(prefix.chars().count());
                lines.push(format!("{}{}", prefix, truncate_str(&msg.body, body_width)));
            }
        }

        lines.push(rule);
        lines.join("\n")
    }
}

/// Truncate to `max_len` characters, ending in "..." when cut.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

pub type SharedState = Arc<Mutex<SessionState>>;

pub fn new_shared_state(url: String, user: String) -> SharedState {
    Arc::new(Mutex::new(SessionState::new(url, user)))
}
