//! The connection state machine.
//!
//! A pure translation layer between raw device state transitions and the
//! externally visible [`WifiState`]. It owns no I/O: the daemon worker
//! feeds it device states and it answers with the state to publish and
//! any follow-up action the worker must take (such as cancelling an
//! activating connection when the daemon asks for credentials we cannot
//! supply interactively).
//!
//! Keeping this pure makes every transition unit-testable without a bus.

use log::{debug, info, warn};

use crate::models::{AccessPoint, DeviceState, StateReason, WifiError, WifiState};

/// Side effect the daemon worker must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SmAction {
    None,
    /// Cancel the in-flight activation: the daemon stopped at an
    /// authentication prompt no one is present to answer. The worker
    /// deletes the activating profile so the daemon does not retry it.
    CancelActivating,
}

/// What one device state transition produced.
#[derive(Debug, PartialEq)]
pub(crate) struct SmOutput {
    /// `Some(change)` when listeners must be told the connection changed:
    /// `Some(ap)` for a new connection, `None` for a lost one. `None` at
    /// the outer level means no connection event at all.
    pub connection_changed: Option<Option<AccessPoint>>,
    pub action: SmAction,
}

impl SmOutput {
    fn silent() -> Self {
        Self {
            connection_changed: None,
            action: SmAction::None,
        }
    }

    fn changed(ap: Option<AccessPoint>) -> Self {
        Self {
            connection_changed: Some(ap),
            action: SmAction::None,
        }
    }
}

/// Tracks the connection lifecycle for the single wireless device.
#[derive(Debug)]
pub(crate) struct StateMachine {
    state: WifiState,
    /// The connection that was established when the current attempt
    /// started, kept so a rejected attempt can fall back to it instead
    /// of reporting a failure the device never experienced.
    resume: Option<AccessPoint>,
}

impl StateMachine {
    pub fn new(initial: WifiState) -> Self {
        Self {
            state: initial,
            resume: None,
        }
    }

    pub fn state(&self) -> &WifiState {
        &self.state
    }

    /// Records the start of a connection attempt.
    pub fn begin_attempt(&mut self, target: AccessPoint) {
        info!("connection attempt started: {}", target.ssid_text);
        self.resume = match &self.state {
            WifiState::Connected(current) => Some(current.clone()),
            _ => None,
        };
        self.state = WifiState::Connecting(target);
    }

    /// Records an attempt the daemon rejected before any state signals
    /// arrived. The device never left its previous state, so an attempt
    /// rejected while a connection is established leaves that connection
    /// in place.
    pub fn attempt_rejected(&mut self, err: WifiError) {
        warn!("connection attempt rejected: {err}");
        if let Some(previous) = self.resume.take() {
            self.state = WifiState::Connected(previous);
        } else if !matches!(self.state, WifiState::Connected(_)) {
            self.state = WifiState::Failed(err);
        }
    }

    /// Records a user-initiated disconnect request.
    pub fn begin_disconnect(&mut self) {
        self.resume = None;
        self.state = WifiState::Disconnecting;
    }

    /// Applies one device state transition.
    ///
    /// `resolved` is the access point the worker resolved for the device's
    /// current active connection, if any; it is only consulted when the
    /// device reports `Activated`.
    ///
    /// Duplicate terminal signals are absorbed: a run of activating states
    /// ending in `Activated` produces exactly one connection change, and
    /// repeated failure signals after the first produce none.
    pub fn on_device_state(
        &mut self,
        new_state: DeviceState,
        reason: StateReason,
        resolved: Option<AccessPoint>,
    ) -> SmOutput {
        debug!("device state {new_state} (reason: {reason}), wifi state {}", self.state);
        // A device signal means the daemon accepted whatever was asked of
        // it; the pre-attempt connection is gone for good.
        self.resume = None;
        match new_state {
            DeviceState::Activated => self.on_activated(resolved),
            DeviceState::NeedAuth => self.on_need_auth(),
            DeviceState::Disconnected | DeviceState::Deactivating | DeviceState::Failed => {
                self.on_down(new_state, reason)
            }
            DeviceState::Unknown | DeviceState::Unmanaged | DeviceState::Unavailable => {
                self.on_gone()
            }
            // Intermediate activating states and unrecognized codes carry
            // no connection-level meaning on their own.
            _ => SmOutput::silent(),
        }
    }

    fn on_activated(&mut self, resolved: Option<AccessPoint>) -> SmOutput {
        if let WifiState::Connected(current) = &self.state {
            // Re-announced activation for the same network; nothing new.
            if resolved.as_ref().map(|ap| ap.id) == Some(current.id) {
                return SmOutput::silent();
            }
        }
        match resolved {
            Some(ap) => {
                info!("connected to {}", ap.ssid_text);
                self.state = WifiState::Connected(ap.clone());
                SmOutput::changed(Some(ap))
            }
            None => {
                // The daemon says activated but no access point maps to
                // the active connection. The UI cannot show that, so it
                // counts as a failure.
                warn!("device activated but no access point resolved");
                self.state = WifiState::Failed(WifiError::ResolutionFailure);
                SmOutput::changed(None)
            }
        }
    }

    fn on_need_auth(&mut self) -> SmOutput {
        if let WifiState::Connecting(ap) = &self.state {
            // There is no interactive secret agent; a credential prompt
            // means the stored key was wrong. Cancel rather than let the
            // daemon wait forever.
            warn!("authentication required for {}, cancelling attempt", ap.ssid_text);
            self.state = WifiState::Failed(WifiError::DaemonRejected(
                "authentication required".to_string(),
            ));
            return SmOutput {
                connection_changed: Some(None),
                action: SmAction::CancelActivating,
            };
        }
        SmOutput::silent()
    }

    fn on_down(&mut self, new_state: DeviceState, reason: StateReason) -> SmOutput {
        match &self.state {
            WifiState::Connecting(ap) => {
                warn!("attempt on {} failed: {reason}", ap.ssid_text);
                self.state = WifiState::Failed(WifiError::DaemonRejected(reason.to_string()));
                SmOutput::changed(None)
            }
            WifiState::Connected(ap) => {
                info!("connection to {} lost: {reason}", ap.ssid_text);
                self.state = WifiState::Disconnected;
                SmOutput::changed(None)
            }
            WifiState::Disconnecting => {
                info!("disconnect complete");
                self.state = WifiState::Disconnected;
                SmOutput::changed(None)
            }
            WifiState::Failed(_) if new_state == DeviceState::Disconnected => {
                // The device settling to Disconnected after a failure is
                // the tail of the same episode, not a new one.
                self.state = WifiState::Disconnected;
                SmOutput::silent()
            }
            _ => SmOutput::silent(),
        }
    }

    fn on_gone(&mut self) -> SmOutput {
        match &self.state {
            WifiState::Connected(_) | WifiState::Connecting(_) => {
                warn!("device became unavailable");
                self.state = WifiState::Disconnected;
                SmOutput::changed(None)
            }
            WifiState::Disconnecting | WifiState::Failed(_) => {
                self.state = WifiState::Disconnected;
                SmOutput::silent()
            }
            WifiState::Disconnected => SmOutput::silent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApId, SecurityType};

    fn ap(name: &str) -> AccessPoint {
        let mut id = [0u8; 32];
        let bytes = name.as_bytes();
        id[..bytes.len().min(32)].copy_from_slice(&bytes[..bytes.len().min(32)]);
        AccessPoint {
            id: ApId(id),
            ssid: name.as_bytes().to_vec(),
            ssid_text: name.to_string(),
            bssid: "aa:bb:cc:dd:ee:ff".to_string(),
            strength: 60,
            security: SecurityType::Wpa,
            paths: vec![format!("/ap/{name}")],
        }
    }

    #[test]
    fn full_activation_run_produces_exactly_one_connected_event() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));

        let mut events = 0;
        for state in [DeviceState::Prepare, DeviceState::Config, DeviceState::IpConfig] {
            let out = sm.on_device_state(state, StateReason::None, None);
            assert_eq!(out, SmOutput::silent());
            events += out.connection_changed.is_some() as u32;
        }

        let out = sm.on_device_state(DeviceState::Activated, StateReason::None, Some(ap("Home")));
        assert_eq!(out.connection_changed, Some(Some(ap("Home"))));
        assert_eq!(out.action, SmAction::None);
        events += 1;

        assert_eq!(events, 1);
        assert_eq!(*sm.state(), WifiState::Connected(ap("Home")));
    }

    #[test]
    fn repeated_activated_for_same_network_is_silent() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));
        sm.on_device_state(DeviceState::Activated, StateReason::None, Some(ap("Home")));

        let out = sm.on_device_state(DeviceState::Activated, StateReason::None, Some(ap("Home")));
        assert_eq!(out, SmOutput::silent());
        assert_eq!(*sm.state(), WifiState::Connected(ap("Home")));
    }

    #[test]
    fn activated_with_no_resolved_ap_is_a_failure() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));

        let out = sm.on_device_state(DeviceState::Activated, StateReason::None, None);
        assert_eq!(out.connection_changed, Some(None));
        assert_eq!(
            *sm.state(),
            WifiState::Failed(WifiError::ResolutionFailure)
        );
    }

    #[test]
    fn need_auth_while_connecting_cancels_and_fails() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));

        let out = sm.on_device_state(DeviceState::NeedAuth, StateReason::None, None);
        assert_eq!(out.action, SmAction::CancelActivating);
        assert_eq!(out.connection_changed, Some(None));
        assert!(matches!(sm.state(), WifiState::Failed(_)));
    }

    #[test]
    fn need_auth_while_idle_is_silent() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        let out = sm.on_device_state(DeviceState::NeedAuth, StateReason::None, None);
        assert_eq!(out, SmOutput::silent());
        assert_eq!(*sm.state(), WifiState::Disconnected);
    }

    #[test]
    fn failure_while_connecting_produces_one_event_then_settles_silently() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));

        let out = sm.on_device_state(
            DeviceState::Failed,
            StateReason::SupplicantFailed,
            None,
        );
        assert_eq!(out.connection_changed, Some(None));
        assert!(matches!(sm.state(), WifiState::Failed(_)));

        // The device then settling to Disconnected is the tail of the same
        // failure, not a second announcement.
        let out = sm.on_device_state(DeviceState::Disconnected, StateReason::None, None);
        assert_eq!(out, SmOutput::silent());
        assert_eq!(*sm.state(), WifiState::Disconnected);
    }

    #[test]
    fn deactivating_while_connecting_fails_the_attempt() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));
        let out = sm.on_device_state(
            DeviceState::Deactivating,
            StateReason::UserRequested,
            None,
        );
        assert_eq!(out.connection_changed, Some(None));
        assert!(matches!(sm.state(), WifiState::Failed(_)));
    }

    #[test]
    fn disconnect_while_connected_announces_loss_once() {
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));

        let out = sm.on_device_state(
            DeviceState::Disconnected,
            StateReason::UserDisconnected,
            None,
        );
        assert_eq!(out.connection_changed, Some(None));
        assert_eq!(*sm.state(), WifiState::Disconnected);

        let out = sm.on_device_state(DeviceState::Disconnected, StateReason::None, None);
        assert_eq!(out, SmOutput::silent());
    }

    #[test]
    fn requested_disconnect_completes_with_event() {
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));
        sm.begin_disconnect();

        let out = sm.on_device_state(
            DeviceState::Disconnected,
            StateReason::UserRequested,
            None,
        );
        assert_eq!(out.connection_changed, Some(None));
        assert_eq!(*sm.state(), WifiState::Disconnected);
    }

    #[test]
    fn device_vanishing_while_connected_disconnects() {
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));
        let out = sm.on_device_state(DeviceState::Unavailable, StateReason::DeviceRemoved, None);
        assert_eq!(out.connection_changed, Some(None));
        assert_eq!(*sm.state(), WifiState::Disconnected);
    }

    #[test]
    fn intermediate_states_while_idle_are_silent() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        for state in [
            DeviceState::Prepare,
            DeviceState::Config,
            DeviceState::IpConfig,
            DeviceState::IpCheck,
            DeviceState::Secondaries,
            DeviceState::Other(85),
        ] {
            let out = sm.on_device_state(state, StateReason::None, None);
            assert_eq!(out, SmOutput::silent());
        }
        assert_eq!(*sm.state(), WifiState::Disconnected);
    }

    #[test]
    fn attempt_rejected_records_failure() {
        let mut sm = StateMachine::new(WifiState::Disconnected);
        sm.begin_attempt(ap("Home"));
        sm.attempt_rejected(WifiError::InvalidCredentialFormat);
        assert_eq!(
            *sm.state(),
            WifiState::Failed(WifiError::InvalidCredentialFormat)
        );
    }

    #[test]
    fn rejection_before_any_daemon_call_keeps_current_connection() {
        // A bad key format is caught before the daemon hears about the
        // attempt; the established connection is untouched.
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));
        sm.attempt_rejected(WifiError::InvalidCredentialFormat);
        assert_eq!(*sm.state(), WifiState::Connected(ap("Home")));
    }

    #[test]
    fn rejected_attempt_falls_back_to_previous_connection() {
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));
        sm.begin_attempt(ap("Other"));
        sm.attempt_rejected(WifiError::DaemonRejected("busy".to_string()));
        assert_eq!(*sm.state(), WifiState::Connected(ap("Home")));
    }

    #[test]
    fn fallback_connection_is_forgotten_once_the_daemon_reacts() {
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));
        sm.begin_attempt(ap("Other"));
        // The daemon started tearing down the old connection, so there is
        // nothing to fall back to anymore.
        sm.on_device_state(DeviceState::Prepare, StateReason::None, None);
        sm.attempt_rejected(WifiError::DaemonRejected("busy".to_string()));
        assert!(matches!(sm.state(), WifiState::Failed(_)));
    }

    #[test]
    fn roaming_to_a_different_network_announces_change() {
        let mut sm = StateMachine::new(WifiState::Connected(ap("Home")));
        let out = sm.on_device_state(DeviceState::Activated, StateReason::None, Some(ap("Other")));
        assert_eq!(out.connection_changed, Some(Some(ap("Other"))));
        assert_eq!(*sm.state(), WifiState::Connected(ap("Other")));
    }
}
