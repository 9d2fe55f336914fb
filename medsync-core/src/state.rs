//! Session channel connection state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! session channel lifecycle. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (opening the socket, arming timers) is performed by
//! medsync-client, not by this module.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, and not trying to be.
    Disconnected,
    /// Handshake in progress.
    Connecting {
        /// Reconnect attempt this handshake belongs to (0 for the initial connect).
        attempt: u32,
    },
    /// Handshake succeeded; messages may be sent.
    Connected,
    /// Channel lost or handshake failed; waiting for the backoff timer.
    Reconnecting {
        /// The reconnect attempt that will run when the timer fires.
        attempt: u32,
    },
    /// Reconnect attempts exhausted. Terminal until `connect` is called again.
    Failed {
        /// Number of reconnect attempts that were made.
        attempts: u32,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function apart from backoff jitter. The caller
    /// (medsync-client) is responsible for executing the returned actions.
    pub fn on_event(self, event: Event, policy: &ReconnectPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // Explicit connect (also re-arms a Failed channel)
            (Self::Disconnected | Self::Failed { .. }, Event::ConnectRequested) => (
                Self::Connecting { attempt: 0 },
                vec![
                    Action::OpenChannel,
                    Action::EmitEvent(ChannelEvent::Connecting { attempt: 0 }),
                ],
            ),

            // From Connecting
            (Self::Connecting { .. }, Event::HandshakeSucceeded) => (
                Self::Connected,
                vec![Action::EmitEvent(ChannelEvent::Connected)],
            ),
            (Self::Connecting { attempt }, Event::HandshakeFailed { error }) => {
                let actions = vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ChannelEvent::ConnectionFailed { attempt, error }),
                ];
                reconnect_or_fail(attempt, policy, actions)
            }
            (Self::Connecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ChannelEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // From Connected
            (Self::Connected, Event::ChannelLost { reason }) => {
                let actions = vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ChannelEvent::Disconnected { reason }),
                ];
                reconnect_or_fail(0, policy, actions)
            }
            (Self::Connected, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ChannelEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),
            (Self::Connected, Event::SessionEnded { reason }) => (
                Self::Disconnected,
                vec![
                    Action::CloseChannel,
                    Action::EmitEvent(ChannelEvent::SessionEnded { reason }),
                ],
            ),

            // From Reconnecting
            (Self::Reconnecting { attempt }, Event::BackoffElapsed) => (
                Self::Connecting { attempt },
                vec![
                    Action::OpenChannel,
                    Action::EmitEvent(ChannelEvent::Connecting { attempt }),
                ],
            ),
            (Self::Reconnecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CancelBackoff,
                    Action::EmitEvent(ChannelEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // From Failed
            (Self::Failed { .. }, Event::DisconnectRequested) => (Self::Disconnected, vec![]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if currently trying to connect.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. } | Self::Reconnecting { .. })
    }

    /// Check if reconnect attempts have been exhausted.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedule reconnect attempt `current + 1`, or give up if the cap is reached.
fn reconnect_or_fail(
    current: u32,
    policy: &ReconnectPolicy,
    mut actions: Vec<Action>,
) -> (ConnectionState, Vec<Action>) {
    let next = current.saturating_add(1);
    if policy.exhausted(next) {
        actions.push(Action::EmitEvent(ChannelEvent::ConnectionLost { attempts: current }));
        return (ConnectionState::Failed { attempts: current }, actions);
    }

    let delay = policy.delay_with_jitter(next);
    actions.push(Action::StartBackoffTimer {
        attempt: next,
        delay,
    });
    actions.push(Action::EmitEvent(ChannelEvent::Reconnecting {
        attempt: next,
        delay,
    }));
    (ConnectionState::Reconnecting { attempt: next }, actions)
}

/// Events that can occur in the channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller requested a connection.
    ConnectRequested,
    /// Handshake completed within the timeout.
    HandshakeSucceeded,
    /// Handshake failed or timed out.
    HandshakeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The channel dropped without the caller asking.
    ChannelLost {
        /// Reason for the loss.
        reason: String,
    },
    /// Backoff timer fired.
    BackoffElapsed,
    /// Caller requested disconnect.
    DisconnectRequested,
    /// The server ended the session.
    SessionEnded {
        /// Optional reason given by the server.
        reason: Option<String>,
    },
}

/// Actions to be executed by medsync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the transport and perform the handshake.
    OpenChannel,
    /// Close the transport.
    CloseChannel,
    /// Arm the reconnect timer.
    StartBackoffTimer {
        /// The attempt that runs when the timer fires.
        attempt: u32,
        /// Delay before that attempt.
        delay: Duration,
    },
    /// Cancel a pending reconnect timer.
    CancelBackoff,
    /// Notify subscribers.
    EmitEvent(ChannelEvent),
}

/// State-transition notifications delivered to channel subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A handshake started.
    Connecting {
        /// Reconnect attempt number (0 for the initial connect).
        attempt: u32,
    },
    /// Handshake succeeded.
    Connected,
    /// A handshake failed.
    ConnectionFailed {
        /// Attempt that failed.
        attempt: u32,
        /// Error message describing the failure.
        error: String,
    },
    /// The channel closed.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// A reconnect was scheduled.
    Reconnecting {
        /// Attempt that will run.
        attempt: u32,
        /// Delay before it runs.
        delay: Duration,
    },
    /// Reconnect attempts exhausted; user action required.
    ConnectionLost {
        /// Number of reconnect attempts that were made.
        attempts: u32,
    },
    /// The server ended the session.
    SessionEnded {
        /// Optional reason given by the server.
        reason: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::default()
    }

    fn has_timer(actions: &[Action]) -> Option<(u32, Duration)> {
        actions.iter().find_map(|a| match a {
            Action::StartBackoffTimer { attempt, delay } => Some((*attempt, *delay)),
            _ => None,
        })
    }

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::new();
        assert!(matches!(state, ConnectionState::Disconnected));
    }

    #[test]
    fn connect_request_transitions_to_connecting() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::ConnectRequested, &policy());

        assert_eq!(state, ConnectionState::Connecting { attempt: 0 });
        assert!(actions.contains(&Action::OpenChannel));
    }

    #[test]
    fn handshake_success_transitions_to_connected() {
        let (state, actions) =
            ConnectionState::Connecting { attempt: 0 }.on_event(Event::HandshakeSucceeded, &policy());

        assert!(state.is_connected());
        assert!(actions.contains(&Action::EmitEvent(ChannelEvent::Connected)));
    }

    #[test]
    fn initial_handshake_failure_schedules_first_reconnect() {
        let (state, actions) = ConnectionState::Connecting { attempt: 0 }.on_event(
            Event::HandshakeFailed {
                error: "timeout".into(),
            },
            &policy(),
        );

        assert_eq!(state, ConnectionState::Reconnecting { attempt: 1 });
        assert_eq!(has_timer(&actions), Some((1, Duration::from_secs(1))));
    }

    #[test]
    fn channel_loss_triggers_reconnect() {
        let (state, actions) = ConnectionState::Connected.on_event(
            Event::ChannelLost {
                reason: "socket reset".into(),
            },
            &policy(),
        );

        assert_eq!(state, ConnectionState::Reconnecting { attempt: 1 });
        assert!(actions.contains(&Action::CloseChannel));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitEvent(ChannelEvent::Disconnected { reason }) if reason == "socket reset"
        )));
        assert!(has_timer(&actions).is_some());
    }

    #[test]
    fn backoff_elapsed_transitions_to_connecting() {
        let (state, actions) =
            ConnectionState::Reconnecting { attempt: 3 }.on_event(Event::BackoffElapsed, &policy());

        assert_eq!(state, ConnectionState::Connecting { attempt: 3 });
        assert!(actions.contains(&Action::OpenChannel));
    }

    #[test]
    fn reconnect_failure_increments_attempt() {
        let (state, actions) = ConnectionState::Connecting { attempt: 2 }.on_event(
            Event::HandshakeFailed {
                error: "refused".into(),
            },
            &policy(),
        );

        assert_eq!(state, ConnectionState::Reconnecting { attempt: 3 });
        assert_eq!(has_timer(&actions), Some((3, Duration::from_secs(4))));
    }

    #[test]
    fn enters_failed_only_after_max_attempts() {
        let policy = policy();
        let mut state = ConnectionState::Connected;
        let (next, _) = state.on_event(
            Event::ChannelLost {
                reason: "lost".into(),
            },
            &policy,
        );
        state = next;

        let mut delays = Vec::new();
        for expected_attempt in 1..=policy.max_attempts {
            assert_eq!(state, ConnectionState::Reconnecting { attempt: expected_attempt });
            let (next, _) = state.on_event(Event::BackoffElapsed, &policy);
            let (next, actions) = next.on_event(
                Event::HandshakeFailed {
                    error: "down".into(),
                },
                &policy,
            );
            if let Some((_, delay)) = has_timer(&actions) {
                delays.push(delay);
            }
            state = next;
        }

        assert_eq!(state, ConnectionState::Failed { attempts: 5 });
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn failure_emits_terminal_connection_lost() {
        let (state, actions) = ConnectionState::Connecting { attempt: 5 }.on_event(
            Event::HandshakeFailed {
                error: "down".into(),
            },
            &policy(),
        );

        assert!(state.is_failed());
        assert!(actions.contains(&Action::EmitEvent(ChannelEvent::ConnectionLost { attempts: 5 })));
        assert!(has_timer(&actions).is_none());
    }

    #[test]
    fn failed_is_terminal_until_connect() {
        let failed = ConnectionState::Failed { attempts: 5 };
        let (state, actions) = failed.clone().on_event(Event::BackoffElapsed, &policy());
        assert_eq!(state, failed);
        assert!(actions.is_empty());

        let (state, _) = failed.on_event(Event::ConnectRequested, &policy());
        assert_eq!(state, ConnectionState::Connecting { attempt: 0 });
    }

    #[test]
    fn zero_attempt_policy_fails_immediately() {
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        };
        let (state, _) = ConnectionState::Connected.on_event(
            Event::ChannelLost {
                reason: "lost".into(),
            },
            &policy,
        );
        assert_eq!(state, ConnectionState::Failed { attempts: 0 });
    }

    #[test]
    fn disconnect_request_from_connected() {
        let (state, actions) =
            ConnectionState::Connected.on_event(Event::DisconnectRequested, &policy());

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.contains(&Action::CloseChannel));
    }

    #[test]
    fn disconnect_request_from_reconnecting_cancels() {
        let (state, actions) = ConnectionState::Reconnecting { attempt: 2 }
            .on_event(Event::DisconnectRequested, &policy());

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.contains(&Action::CancelBackoff));
    }

    #[test]
    fn session_ended_does_not_reconnect() {
        let (state, actions) = ConnectionState::Connected.on_event(
            Event::SessionEnded {
                reason: Some("provider left".into()),
            },
            &policy(),
        );

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(has_timer(&actions).is_none());
    }

    #[test]
    fn connect_while_connected_is_ignored() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::ConnectRequested, &policy());
        assert!(state.is_connected());
        assert!(actions.is_empty());
    }

    #[test]
    fn is_connecting_helper() {
        assert!(!ConnectionState::Disconnected.is_connecting());
        assert!(ConnectionState::Connecting { attempt: 0 }.is_connecting());
        assert!(ConnectionState::Reconnecting { attempt: 1 }.is_connecting());
        assert!(!ConnectionState::Connected.is_connecting());
        assert!(!ConnectionState::Failed { attempts: 5 }.is_connecting());
    }
}
