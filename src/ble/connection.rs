//! Connection state machine.
//!
//! ```text
//!  DISCONNECTED --connect--> CONNECTING --connected--> DISCOVERING
//!       ^                                                  |
//!       |                                          services resolved
//!       |                                                  v
//!  DISCONNECTING <----------------disconnect----------- CONNECTED
//!       |
//!       +--disconnected--> DISCONNECTED
//! ```
//!
//! `LinkLost` (failed connect, failed disconnect, peripheral dropped) takes
//! every non-idle state straight back to DISCONNECTED. Anything else that
//! does not appear above is ignored.

use core::fmt;

/// Connection state of the single managed peripheral.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Discovering,
    Connected,
    Disconnecting,
}

/// Commands and transport reports that drive the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    /// Operator asked to connect.
    ConnectRequested,
    /// Transport reports the link is up.
    Connected,
    /// Transport reports service discovery completed.
    ServicesResolved,
    /// Operator asked to disconnect.
    DisconnectRequested,
    /// Transport reports the link is down after a requested disconnect.
    Disconnected,
    /// Transport reports the link failed or dropped on its own.
    LinkLost,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 5] = [
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::Discovering,
        ConnectionState::Connected,
        ConnectionState::Disconnecting,
    ];

    /// Next state for `event`, or `None` when the event is not valid here.
    pub fn on_event(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self, event) {
            (S::Disconnected, E::ConnectRequested) => Some(S::Connecting),
            (S::Connecting, E::Connected) => Some(S::Discovering),
            (S::Discovering, E::ServicesResolved) => Some(S::Connected),
            (S::Connected, E::DisconnectRequested) => Some(S::Disconnecting),
            (S::Disconnecting, E::Disconnected) => Some(S::Disconnected),
            (S::Disconnected, E::LinkLost) => None,
            (_, E::LinkLost) => Some(S::Disconnected),
            _ => None,
        }
    }

    /// Interrogation routines may only run here.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// States in which the held peripheral may be forgotten.
    pub fn can_forget(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Disconnecting
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Discovering => "DISCOVERING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnecting => "DISCONNECTING",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionEvent as E;
    use super::ConnectionState as S;
    use super::*;

    const EVENTS: [ConnectionEvent; 6] = [
        E::ConnectRequested,
        E::Connected,
        E::ServicesResolved,
        E::DisconnectRequested,
        E::Disconnected,
        E::LinkLost,
    ];

    #[test]
    fn happy_path_follows_table() {
        let mut state = S::default();
        assert_eq!(state, S::Disconnected);
        for (event, expected) in [
            (E::ConnectRequested, S::Connecting),
            (E::Connected, S::Discovering),
            (E::ServicesResolved, S::Connected),
            (E::DisconnectRequested, S::Disconnecting),
            (E::Disconnected, S::Disconnected),
        ] {
            state = state.on_event(event).expect("transition in table");
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        assert_eq!(S::Disconnected.on_event(E::Connected), None);
        assert_eq!(S::Disconnected.on_event(E::ServicesResolved), None);
        assert_eq!(S::Connecting.on_event(E::ServicesResolved), None);
        assert_eq!(S::Connecting.on_event(E::ConnectRequested), None);
        assert_eq!(S::Connected.on_event(E::Disconnected), None);
        assert_eq!(S::Connected.on_event(E::ConnectRequested), None);
        assert_eq!(S::Discovering.on_event(E::DisconnectRequested), None);
    }

    #[test]
    fn link_lost_returns_to_disconnected() {
        for state in [S::Connecting, S::Discovering, S::Connected, S::Disconnecting] {
            assert_eq!(state.on_event(E::LinkLost), Some(S::Disconnected));
        }
        assert_eq!(S::Disconnected.on_event(E::LinkLost), None);
    }

    /// Walks every event sequence up to length 6 and checks that CONNECTED
    /// is only ever entered from DISCOVERING, which is only entered from
    /// CONNECTING.
    #[test]
    fn connected_requires_connecting_then_discovering() {
        fn walk(state: S, depth: usize) {
            if depth == 0 {
                return;
            }
            for event in EVENTS {
                if let Some(next) = state.on_event(event) {
                    if next == S::Connected {
                        assert_eq!(state, S::Discovering);
                    }
                    if next == S::Discovering {
                        assert_eq!(state, S::Connecting);
                    }
                    if next == S::Connecting {
                        assert_eq!(state, S::Disconnected);
                    }
                    walk(next, depth - 1);
                }
            }
        }
        walk(S::Disconnected, 6);
    }

    #[test]
    fn only_connected_accepts_tests() {
        for state in S::ALL {
            assert_eq!(state.is_connected(), state == S::Connected);
        }
    }

    #[test]
    fn forget_allowed_only_when_idle_or_closing() {
        assert!(S::Disconnected.can_forget());
        assert!(S::Disconnecting.can_forget());
        assert!(!S::Connecting.can_forget());
        assert!(!S::Discovering.can_forget());
        assert!(!S::Connected.can_forget());
    }

    #[test]
    fn display_uses_upper_case_names() {
        assert_eq!(S::Discovering.to_string(), "DISCOVERING");
    }
}
