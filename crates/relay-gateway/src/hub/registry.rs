//! Connection registry
//!
//! Maps each online user to the outbound queues of their live sessions. Owned by the
//! coordinator task and never shared, so it needs no locking. A user key exists only
//! while its session set is non-empty, and the registry holds the only sending half
//! of every queue: dropping an entry is what closes that session's queue.

use std::collections::{HashMap, HashSet};

use relay_core::UserId;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::connection::SessionId;
use crate::protocol::Frame;

/// Outcome of removing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The session was not registered
    Absent,
    /// The session was removed; `last` is set when the user has no sessions left
    Removed { last: bool },
}

/// What happened during one fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames placed on a queue
    pub queued: usize,
    /// Sessions dropped because their queue was full
    pub overflowed: Vec<(UserId, SessionId)>,
    /// Users whose last session was dropped during this fan-out
    pub went_offline: Vec<UserId>,
}

/// Point-in-time registry counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub online_users: usize,
    pub sessions: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    users: HashMap<UserId, HashMap<SessionId, mpsc::Sender<Frame>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Returns true if it is the user's first.
    pub fn insert(&mut self, user_id: UserId, session_id: SessionId, sender: mpsc::Sender<Frame>) -> bool {
        let sessions = self.users.entry(user_id).or_default();
        sessions.insert(session_id, sender);
        sessions.len() == 1
    }

    pub fn remove(&mut self, user_id: UserId, session_id: SessionId) -> Removal {
        let Some(sessions) = self.users.get_mut(&user_id) else {
            return Removal::Absent;
        };

        if sessions.remove(&session_id).is_none() {
            return Removal::Absent;
        }

        let last = sessions.is_empty();
        if last {
            self.users.remove(&user_id);
        }
        Removal::Removed { last }
    }

    /// Push a frame to every session of every recipient without waiting
    ///
    /// A full queue gets its session dropped. A closed queue belongs to a session
    /// that is already shutting down and is dropped silently.
    pub fn deliver(&mut self, recipients: &[UserId], frame: &Frame) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut seen = HashSet::with_capacity(recipients.len());

        for &user_id in recipients {
            if !seen.insert(user_id) {
                continue;
            }
            let Some(sessions) = self.users.get_mut(&user_id) else {
                continue;
            };

            sessions.retain(|&session_id, sender| match sender.try_send(Frame::clone(frame)) {
                Ok(()) => {
                    report.queued += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    report.overflowed.push((user_id, session_id));
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });

            if sessions.is_empty() {
                self.users.remove(&user_id);
                report.went_offline.push(user_id);
            }
        }

        report
    }

    #[must_use]
    pub fn session_count(&self, user_id: UserId) -> usize {
        self.users.get(&user_id).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            online_users: self.users.len(),
            sessions: self.users.values().map(HashMap::len).sum(),
        }
    }

    /// Drop every session, closing all queues. Returns how many were closed.
    pub fn clear(&mut self) -> usize {
        let closed = self.stats().sessions;
        self.users.clear();
        closed
    }
}
