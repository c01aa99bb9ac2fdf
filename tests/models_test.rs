use wifikit::{
    AccessPoint, ApId, DeviceState, EventInterest, SecurityType, StateReason, WifiError,
    WifiListener, WifiState,
};

fn sample_ap() -> AccessPoint {
    AccessPoint {
        id: ApId::from_bytes([7; 32]),
        ssid: b"HomeNet".to_vec(),
        ssid_text: "HomeNet".to_string(),
        bssid: "aa:bb:cc:dd:ee:ff".to_string(),
        strength: 72,
        security: SecurityType::Wpa,
        paths: vec!["/org/freedesktop/NetworkManager/AccessPoint/7".to_string()],
    }
}

#[test]
fn device_state_from_u32_matches_expected() {
    assert_eq!(DeviceState::from(30), DeviceState::Disconnected);
    assert_eq!(DeviceState::from(60), DeviceState::NeedAuth);
    assert_eq!(DeviceState::from(100), DeviceState::Activated);
    assert_eq!(DeviceState::from(120), DeviceState::Failed);
    assert_eq!(DeviceState::from(999), DeviceState::Other(999));
}

#[test]
fn activating_states_are_flagged() {
    for code in [40, 50, 60, 70, 80, 90] {
        assert!(DeviceState::from(code).is_activating(), "code {code}");
    }
    for code in [0, 10, 20, 30, 100, 110, 120] {
        assert!(!DeviceState::from(code).is_activating(), "code {code}");
    }
}

#[test]
fn state_reason_from_u32_matches_expected() {
    assert_eq!(StateReason::from(9), StateReason::SupplicantFailed);
    assert_eq!(StateReason::from(56), StateReason::UserRequested);
    assert_eq!(StateReason::from(4242), StateReason::Other(4242));
}

#[test]
fn hidden_network_is_detected_from_empty_ssid() {
    let mut ap = sample_ap();
    assert!(!ap.is_hidden());
    ap.ssid.clear();
    assert!(ap.is_hidden());
}

#[test]
fn wifi_state_display_names_the_network() {
    let state = WifiState::Connected(sample_ap());
    assert_eq!(state.to_string(), "connected to HomeNet");
    assert_eq!(WifiState::Disconnected.to_string(), "disconnected");
}

#[test]
fn errors_are_cloneable_and_comparable() {
    let err = WifiError::DaemonRejected("busy".to_string());
    assert_eq!(err.clone(), err);
    assert_ne!(err, WifiError::DeviceUnavailable);
}

#[test]
fn event_interest_all_covers_every_category() {
    let all = EventInterest::all();
    for interest in [
        EventInterest::ENABLED,
        EventInterest::DEVICE_STATE,
        EventInterest::AP_ADDED,
        EventInterest::AP_REMOVED,
        EventInterest::CONNECTION,
    ] {
        assert!(all.contains(interest));
    }
}

#[test]
fn listener_defaults_are_callable_no_ops() {
    struct Quiet;
    impl WifiListener for Quiet {}

    let mut listener = Quiet;
    assert_eq!(listener.interests(), EventInterest::all());
    listener.wireless_enabled_changed(true);
    listener.device_state_changed(
        DeviceState::Activated,
        DeviceState::IpCheck,
        StateReason::None,
    );
    listener.access_point_added(&sample_ap());
    listener.access_point_removed(&sample_ap());
    listener.connection_changed(Some(&sample_ap()));
    listener.connection_changed(None);
}
