//! Client lifecycle: connect, send, disconnect.
//!
//! A [`Client`] owns at most one connection at a time. Each connection runs
//! as two tasks:
//!
//! 1. **Session** - opens the stream, performs the upgrade handshake, then
//!    decodes frames and dispatches them until the connection ends
//! 2. **Writer** - owns the write half; every outgoing frame (messages, pongs,
//!    the final close frame) is queued to it
//!
//! ## Example
//!
//! ```rust,no_run
//! use wslink::{Client, ClientConfig, ClientEvent};
//!
//! # async fn run() {
//! let (client, mut events) = Client::new(ClientConfig::default());
//! client.connect("ws://localhost:8080/chat");
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Connected => client.send("hello"),
//!         ClientEvent::Message(text) => println!("{text}"),
//!         ClientEvent::Disconnected => break,
//!         ClientEvent::Error(e) => eprintln!("{e}"),
//!     }
//! }
//! # }
//! ```

mod client;
mod event;
mod session;
mod shared;
mod state;
mod writer;

pub use client::Client;
pub use event::{ClientEvent, EventReceiver};
pub use state::ConnectionState;
