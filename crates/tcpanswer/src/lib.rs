//! Framed TCP request/response protocol with a concurrent test harness.
//!
//! Every message is a 6-byte little-endian header (magic 1102, total length,
//! command) followed by an optional payload. A server echoes command 1,
//! closes on command 2 and answers anything else with 666.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener, connector and address parsing
//! - [`frame`]: wire codec, command codes and buffered frame reader/writer
//! - [`harness`]: scripted sessions, the concurrent coordinator and a
//!   reference answer server

/// Re-export transport types.
pub mod transport {
    pub use tcpanswer_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tcpanswer_frame::*;
}

/// Re-export harness types.
pub mod harness {
    pub use tcpanswer_harness::*;
}
