//! One-time WebSocket upgrade tickets.
//!
//! A ticket lets a client upgrade to a WebSocket without placing the
//! long-lived session bearer token in a URL (which browsers log and
//! proxies may cache). Tickets are signed only by server-side randomness,
//! consumed on first use, and expire quickly.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::RngCore;

use crate::session::SessionData;

const TICKET_TTL: Duration = Duration::from_secs(30);

struct PendingTicket {
    session: SessionData,
    issued_at: Instant,
}

/// Issues and consumes one-time WS upgrade tickets.
#[derive(Default)]
pub struct TicketStore {
    pending: DashMap<String, PendingTicket>,
}

impl TicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a ticket bound to `session`.
    #[must_use]
    pub fn issue(&self, session: SessionData) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let ticket = hex::encode(bytes);
        self.pending.insert(
            ticket.clone(),
            PendingTicket {
                session,
                issued_at: Instant::now(),
            },
        );
        ticket
    }

    /// Consume `ticket`, returning its bound session if it exists and has
    /// not expired. Always removes the entry (one-time use, even on
    /// expiry).
    pub fn consume(&self, ticket: &str) -> Option<SessionData> {
        let (_, entry) = self.pending.remove(ticket)?;
        if entry.issued_at.elapsed() > TICKET_TTL {
            None
        } else {
            Some(entry.session)
        }
    }

    /// Drop expired pending tickets; call periodically to bound memory.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.pending
            .retain(|_, entry| now.duration_since(entry.issued_at) <= TICKET_TTL);
    }

    /// Number of tickets currently pending consumption.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
