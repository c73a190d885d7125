//! Hub coordinator
//!
//! The single task that owns the registry. Every registry read or write arrives as a
//! `HubCommand`, so register, unregister and fan-out are applied strictly in the order
//! they were sent. Handling a command never waits on I/O: store writes and presence
//! announcements are spawned onto their own tasks.
//!
//! Presence tasks can finish in any order, so a presence frame is checked against the
//! registry when it arrives. A status that no longer holds is dropped, which leaves the
//! last frame peers receive matching whether the user has a live session.

use std::ops::ControlFlow;
use std::sync::Arc;

use relay_core::{HubStore, UserId};
use tokio::sync::{mpsc, oneshot};

use super::registry::{HubStats, Registry, Removal};
use super::Hub;
use crate::connection::SessionId;
use crate::protocol::{Frame, PresenceStatus};

/// Commands processed by the coordinator
#[derive(Debug)]
pub(crate) enum HubCommand {
    Register {
        user_id: UserId,
        session_id: SessionId,
        sender: mpsc::Sender<Frame>,
    },
    Unregister {
        user_id: UserId,
        session_id: SessionId,
    },
    Deliver {
        recipients: Vec<UserId>,
        frame: Frame,
    },
    /// Deliver a presence frame only if `status` still matches the registry
    DeliverPresence {
        user_id: UserId,
        status: PresenceStatus,
        recipients: Vec<UserId>,
        frame: Frame,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
    SessionCount {
        user_id: UserId,
        reply: oneshot::Sender<usize>,
    },
    /// Close every session queue and stop
    Shutdown {
        done: oneshot::Sender<usize>,
    },
}

pub(crate) struct Coordinator {
    registry: Registry,
    commands: mpsc::Receiver<HubCommand>,
    /// Lets spawned presence tasks reach the hub without keeping the loop alive
    handle: mpsc::WeakSender<HubCommand>,
    store: Arc<dyn HubStore>,
    echo_to_sender: bool,
}

impl Coordinator {
    pub(crate) fn new(
        commands: mpsc::Receiver<HubCommand>,
        handle: mpsc::WeakSender<HubCommand>,
        store: Arc<dyn HubStore>,
        echo_to_sender: bool,
    ) -> Self {
        Self {
            registry: Registry::new(),
            commands,
            handle,
            store,
            echo_to_sender,
        }
    }

    /// Run until shutdown or until every hub handle is dropped
    pub(crate) async fn run(mut self) {
        tracing::info!("Hub coordinator started");

        while let Some(command) = self.commands.recv().await {
            if self.handle_command(command).is_break() {
                break;
            }
        }

        tracing::info!("Hub coordinator stopped");
    }

    fn handle_command(&mut self, command: HubCommand) -> ControlFlow<()> {
        match command {
            HubCommand::Register {
                user_id,
                session_id,
                sender,
            } => {
                let first = self.registry.insert(user_id, session_id, sender);
                tracing::debug!(
                    user_id = %user_id,
                    session_id = %session_id,
                    first_session = first,
                    sessions = self.registry.session_count(user_id),
                    "Session registered"
                );
                self.spawn_presence_change(user_id, PresenceStatus::Online);
            }
            HubCommand::Unregister {
                user_id,
                session_id,
            } => match self.registry.remove(user_id, session_id) {
                Removal::Removed { last } => {
                    tracing::debug!(
                        user_id = %user_id,
                        session_id = %session_id,
                        "Session unregistered"
                    );
                    if last {
                        self.spawn_presence_change(user_id, PresenceStatus::Offline);
                    }
                }
                Removal::Absent => {
                    tracing::trace!(
                        user_id = %user_id,
                        session_id = %session_id,
                        "Unregister for unknown session ignored"
                    );
                }
            },
            HubCommand::Deliver { recipients, frame } => self.deliver(&recipients, &frame),
            HubCommand::DeliverPresence {
                user_id,
                status,
                recipients,
                frame,
            } => {
                let online = self.registry.session_count(user_id) > 0;
                if online == (status == PresenceStatus::Online) {
                    self.deliver(&recipients, &frame);
                } else {
                    tracing::debug!(user_id = %user_id, status = %status, "Stale presence dropped");
                }
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.registry.stats());
            }
            HubCommand::SessionCount { user_id, reply } => {
                let _ = reply.send(self.registry.session_count(user_id));
            }
            HubCommand::Shutdown { done } => {
                let closed = self.registry.clear();
                tracing::info!(sessions = closed, "Hub shutting down, closed all session queues");
                let _ = done.send(closed);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn deliver(&mut self, recipients: &[UserId], frame: &Frame) {
        let report = self.registry.deliver(recipients, frame);
        for (user_id, session_id) in &report.overflowed {
            tracing::warn!(
                user_id = %user_id,
                session_id = %session_id,
                "Outbound queue full, dropping session"
            );
        }
        for user_id in report.went_offline {
            self.spawn_presence_change(user_id, PresenceStatus::Offline);
        }
        tracing::trace!(queued = report.queued, "Frame delivered");
    }

    /// Touch last-active, then tell peers about the new status
    fn spawn_presence_change(&self, user_id: UserId, status: PresenceStatus) {
        let Some(commands) = self.handle.upgrade() else {
            return;
        };
        let hub = Hub {
            commands,
            store: Arc::clone(&self.store),
            echo_to_sender: self.echo_to_sender,
        };

        tokio::spawn(async move {
            if let Err(e) = hub.store.touch_last_active(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to update last active time");
            }
            tracing::info!(user_id = %user_id, status = %status, "Presence changed");
            hub.broadcast_presence(user_id, status).await;
        });
    }
}
