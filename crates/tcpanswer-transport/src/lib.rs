//! TCP transport for tcpanswer.
//!
//! This is the lowest layer of tcpanswer: address resolution, a blocking
//! listener, and the [`AnswerStream`] type every other layer reads from and
//! writes to. One stream carries one session; nothing here knows about frames.

pub mod addr;
pub mod error;
pub mod stream;
pub mod tcp;

pub use addr::{resolve_addr, DEFAULT_ADDR};
pub use error::{Result, TransportError};
pub use stream::AnswerStream;
pub use tcp::TcpTransport;
