//! Test harness utilities for driving a client against a scripted server.

mod server;

use std::time::Duration;

use wslink::{ClientEvent, EventReceiver};

pub use server::{MockServer, ServerConn, header, server_frame};

/// How long a test waits for an event before failing.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Next event, failing the test if none arrives in time.
pub async fn next_event(events: &mut EventReceiver) -> ClientEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert that no event arrives within `wait`.
pub async fn assert_quiet(events: &mut EventReceiver, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, events.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}
