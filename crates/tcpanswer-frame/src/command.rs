//! Command codes.
//!
//! Servers echo the request code back for commands they understand and
//! answer everything else with [`UNKNOWN`] instead of dropping the connection.

/// Echo the frame back unchanged.
pub const ECHO: u16 = 1;

/// Close the connection; no reply frame follows.
pub const EXIT: u16 = 2;

/// Reply code for any command the server does not recognize.
pub const UNKNOWN: u16 = 666;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u16) -> &'static str {
    match code {
        ECHO => "ECHO",
        EXIT => "EXIT",
        UNKNOWN => "UNKNOWN",
        _ => "OTHER",
    }
}
