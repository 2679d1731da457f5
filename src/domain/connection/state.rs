//! Connection states and closure classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle state of a topic's connection.
///
/// ```text
/// Idle -> Connecting -> Open -> Closed
///            |           |
///            v           v
///        Reconnecting <--+
///            |
///            +--> Connecting | Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    /// Returns true while a physical connection exists or is being established.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Idle, Connecting)
                | (Idle, Closed)
                | (Connecting, Open)
                | (Connecting, Reconnecting)
                | (Connecting, Closed)
                | (Open, Reconnecting)
                | (Open, Closed)
                | (Reconnecting, Connecting)
                | (Reconnecting, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Idle => vec![Connecting, Closed],
            Connecting => vec![Open, Reconnecting, Closed],
            Open => vec![Reconnecting, Closed],
            Reconnecting => vec![Connecting, Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// A WebSocket-style closure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    pub const NORMAL: CloseCode = CloseCode(1000);
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    /// Reserved code for a connection lost without a close frame.
    pub const ABNORMAL: CloseCode = CloseCode(1006);

    /// Normal closure and going-away are expected; anything else is a failure.
    pub fn is_intentional(&self) -> bool {
        *self == Self::NORMAL || *self == Self::GOING_AWAY
    }

    /// Decides whether a closure should enter the reconnection path.
    ///
    /// Only an unexpected code observed while the topic still has
    /// subscribers does.
    pub fn requires_reconnect(&self, has_subscribers: bool) -> bool {
        has_subscribers && !self.is_intentional()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_lifecycle_is_valid() {
        let s = ConnectionState::Idle;
        let s = s.transition_to(ConnectionState::Connecting).unwrap();
        let s = s.transition_to(ConnectionState::Open).unwrap();
        let s = s.transition_to(ConnectionState::Closed).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn reconnect_path_returns_to_connecting() {
        let s = ConnectionState::Open
            .transition_to(ConnectionState::Reconnecting)
            .unwrap();
        assert_eq!(
            s.transition_to(ConnectionState::Connecting),
            Ok(ConnectionState::Connecting)
        );
    }

    #[test]
    fn closed_cannot_reopen() {
        assert!(ConnectionState::Closed
            .transition_to(ConnectionState::Connecting)
            .is_err());
    }

    #[test]
    fn idle_cannot_jump_to_open() {
        assert!(!ConnectionState::Idle.can_transition_to(&ConnectionState::Open));
    }

    #[test]
    fn only_1000_and_1001_are_intentional() {
        assert!(CloseCode::NORMAL.is_intentional());
        assert!(CloseCode::GOING_AWAY.is_intentional());
        assert!(!CloseCode::ABNORMAL.is_intentional());
        assert!(!CloseCode(4001).is_intentional());
    }

    #[test]
    fn normal_closure_never_reconnects() {
        assert!(!CloseCode::NORMAL.requires_reconnect(true));
        assert!(!CloseCode::NORMAL.requires_reconnect(false));
    }

    #[test]
    fn abnormal_closure_reconnects_only_with_subscribers() {
        assert!(CloseCode::ABNORMAL.requires_reconnect(true));
        assert!(!CloseCode::ABNORMAL.requires_reconnect(false));
    }

    #[test]
    fn is_live_covers_connecting_and_open() {
        assert!(ConnectionState::Connecting.is_live());
        assert!(ConnectionState::Open.is_live());
        assert!(!ConnectionState::Reconnecting.is_live());
        assert!(!ConnectionState::Closed.is_live());
    }
}
