//! # wslink - minimal asynchronous WebSocket client
//!
//! `wslink` speaks the client side of a small RFC 6455 subset over Tokio:
//! text messages, ping/pong and close, with frames up to 65535 bytes.
//!
//! ## Features
//!
//! - **Masked client frames** with a fresh random key per frame
//! - **Single writer task** so concurrent sends never interleave on the wire
//! - **Event channel** delivering `Connected`, `Message`, `Error` and exactly
//!   one `Disconnected` per connection
//! - **Automatic pong** replies to server pings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wslink::{Client, ClientConfig, ClientEvent};
//!
//! # async fn run() {
//! let config = ClientConfig::default().with_initial_message(r#"{"type":"hello"}"#);
//! let (client, mut events) = Client::new(config);
//! client.connect("ws://127.0.0.1:8080/");
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Message(text) = event {
//!         println!("{text}");
//!         client.disconnect();
//!     }
//! }
//! # }
//! ```
//!
//! Not supported: TLS, extensions, subprotocols, fragmented messages, binary
//! delivery and 64-bit frame lengths.

pub mod close;
pub mod codec;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod protocol;

pub use close::{CloseCode, CloseFrame};
pub use config::{ClientConfig, Limits};
pub use connection::{Client, ClientEvent, ConnectionState, EventReceiver};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use protocol::{Frame, OpCode, compute_accept_key};
