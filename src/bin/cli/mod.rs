pub mod args;
pub mod commands;
pub mod plain;
pub mod state;

/// Exit codes for different error conditions
pub mod exit_codes {
    pub const SUCCESS: u8 = 0;
    /// Transport could not be started or failed mid-session
    pub const NETWORK_ERROR: u8 = 1;
    /// Broker rejected the session
    pub const AUTH_ERROR: u8 = 2;
    /// Framing or other protocol error
    pub const PROTOCOL_ERROR: u8 = 3;
}
