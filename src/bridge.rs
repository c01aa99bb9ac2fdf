//! The daemon bridge: a dedicated thread owning every D-Bus interaction.
//!
//! [`WifiManager::start`] spawns one thread running a single-threaded
//! async loop. UI-facing methods post commands onto that loop; signals
//! and property changes from NetworkManager are merged into the same
//! loop, so all daemon work is serialized in submission order. Results
//! travel back either as blocking replies (value-returning getters) or
//! as queued deliveries pumped on the application's event thread.
//!
//! Absence of the daemon or of wireless hardware puts the bridge into
//! degraded mode: commands are still consumed and answered with neutral
//! values, and connection attempts fail with
//! [`WifiError::DeviceUnavailable`].

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use futures::StreamExt;
use futures_timer::Delay;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::ap_id::security_type;
use crate::builders::validate_credentials;
use crate::connection::{
    ActivationPlan, active_ap_path, delete_activating_profile, load_available_profiles,
    plan_activation,
};
use crate::constants::timeouts;
use crate::device::{find_wireless_device, read_single_record, request_scan, snapshot_access_points};
use crate::dispatch::{Delivery, EventPump, ListenerId, ListenerRegistry, WifiListener, event_interest};
use crate::models::{AccessPoint, DeviceState, StateReason, WifiError, WifiEvent, WifiState};
use crate::proxies::{NMDeviceProxy, NMProxy, NMWirelessProxy};
use crate::registry::{ApRecord, ApRegistry};
use crate::state::{SmAction, StateMachine};
use crate::utils::{clamp_strength, ssid_display};
use crate::Result;

type SuccessCallback = Box<dyn FnOnce(AccessPoint) + Send>;
type FailureCallback = Box<dyn FnOnce(WifiError) + Send>;

/// Commands posted from UI-facing methods to the daemon loop.
enum Command {
    IsAvailable(std_mpsc::Sender<bool>),
    WirelessEnabled(std_mpsc::Sender<bool>),
    VisibleAccessPoints(std_mpsc::Sender<Vec<AccessPoint>>),
    ConnectedAccessPoint(std_mpsc::Sender<Option<AccessPoint>>),
    ConnectingAccessPoint(std_mpsc::Sender<Option<AccessPoint>>),
    CurrentState(std_mpsc::Sender<WifiState>),
    SetWirelessEnabled(bool),
    RequestScan,
    Connect {
        target: AccessPoint,
        psk: Option<String>,
        on_success: SuccessCallback,
        on_failure: FailureCallback,
    },
    CloseActive,
    CloseActivating,
    Shutdown,
}

/// Handle to the Wi-Fi daemon bridge.
///
/// Cheap to use from any thread. Value-returning methods block until the
/// daemon loop services them; mutating methods post and return
/// immediately. Dropping the manager shuts the daemon thread down.
pub struct WifiManager {
    cmd_tx: UnboundedSender<Command>,
    registry: ListenerRegistry,
    handle: Option<JoinHandle<()>>,
}

impl WifiManager {
    /// Spawns the daemon thread and returns the manager plus the event
    /// pump the application must drain on its own thread.
    ///
    /// Succeeds even when NetworkManager is unreachable or no wireless
    /// hardware exists; the bridge then runs degraded. Only failure to
    /// spawn the thread itself is an error.
    pub fn start() -> Result<(WifiManager, EventPump)> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = std_mpsc::channel();
        let registry = ListenerRegistry::default();
        let pump = EventPump::new(evt_rx, registry.clone());

        let worker_registry = registry.clone();
        let handle = thread::Builder::new()
            .name("wifikit-daemon".to_string())
            .spawn(move || daemon_main(cmd_rx, evt_tx, worker_registry))
            .map_err(|e| WifiError::Init(e.to_string()))?;

        Ok((
            WifiManager {
                cmd_tx,
                registry,
                handle: Some(handle),
            },
            pump,
        ))
    }

    /// Registers a listener for Wi-Fi events. Equivalent to registering
    /// through the pump.
    pub fn register_listener(&self, listener: Box<dyn WifiListener>) -> ListenerId {
        self.registry.register(listener)
    }

    /// Removes a previously registered listener. Safe to call twice.
    pub fn unregister_listener(&self, id: ListenerId) {
        self.registry.unregister(id);
    }

    /// Whether a wireless device and a reachable daemon exist.
    pub fn is_wifi_available(&self) -> bool {
        self.request(Command::IsAvailable, false)
    }

    /// Whether the wireless radio is enabled. `false` when unavailable.
    pub fn is_wifi_enabled(&self) -> bool {
        self.request(Command::WirelessEnabled, false)
    }

    /// The current deduplicated set of visible networks.
    pub fn visible_access_points(&self) -> Vec<AccessPoint> {
        self.request(Command::VisibleAccessPoints, Vec::new())
    }

    /// The network the device is connected to, if any.
    pub fn connected_access_point(&self) -> Option<AccessPoint> {
        self.request(Command::ConnectedAccessPoint, None)
    }

    /// The network an in-flight attempt is targeting, if any.
    pub fn connecting_access_point(&self) -> Option<AccessPoint> {
        self.request(Command::ConnectingAccessPoint, None)
    }

    /// The connection state machine's current state.
    pub fn current_state(&self) -> WifiState {
        self.request(Command::CurrentState, WifiState::Disconnected)
    }

    /// Switches the wireless radio on or off. Completion surfaces through
    /// `wireless_enabled_changed`.
    pub fn set_wifi_enabled(&self, enabled: bool) {
        self.post(Command::SetWirelessEnabled(enabled));
    }

    /// Asks the daemon to rescan. Results arrive as access point
    /// added/removed events.
    pub fn request_scan(&self) {
        self.post(Command::RequestScan);
    }

    /// Starts a connection attempt against `target`.
    ///
    /// Exactly one of the callbacks runs, on the event-pump thread, once
    /// the daemon accepts or rejects the activation request. If the
    /// manager has already shut down, `on_failure` runs inline on the
    /// calling thread instead.
    pub fn connect<S, F>(&self, target: &AccessPoint, psk: Option<&str>, on_success: S, on_failure: F)
    where
        S: FnOnce(AccessPoint) + Send + 'static,
        F: FnOnce(WifiError) + Send + 'static,
    {
        let cmd = Command::Connect {
            target: target.clone(),
            psk: psk.map(str::to_string),
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        };
        if let Err(mpsc::error::SendError(Command::Connect { on_failure, .. })) =
            self.cmd_tx.send(cmd)
        {
            on_failure(WifiError::DeviceUnavailable);
        }
    }

    /// Disconnects the device from its current network.
    pub fn disconnect(&self) {
        self.post(Command::CloseActive);
    }

    /// Cancels the in-flight connection attempt, deleting the daemon
    /// profile it created so the wrong key is not retried.
    pub fn cancel_connecting(&self) {
        self.post(Command::CloseActivating);
    }

    fn post(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("daemon thread is gone; command dropped");
        }
    }

    fn request<T>(&self, make: impl FnOnce(std_mpsc::Sender<T>) -> Command, default: T) -> T {
        let (tx, rx) = std_mpsc::channel();
        if self.cmd_tx.send(make(tx)).is_err() {
            return default;
        }
        rx.recv().unwrap_or(default)
    }
}

impl Drop for WifiManager {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn daemon_main(
    cmd_rx: UnboundedReceiver<Command>,
    evt_tx: std_mpsc::Sender<Delivery>,
    listeners: ListenerRegistry,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to build daemon runtime: {e}");
            let _ = evt_tx.send(Delivery::Shutdown);
            return;
        }
    };
    runtime.block_on(daemon_loop(cmd_rx, evt_tx.clone(), listeners));
    let _ = evt_tx.send(Delivery::Shutdown);
}

async fn daemon_loop(
    mut cmd_rx: UnboundedReceiver<Command>,
    evt_tx: std_mpsc::Sender<Delivery>,
    listeners: ListenerRegistry,
) {
    match DaemonLink::establish().await {
        Ok(Some(link)) => {
            let mut worker = Worker::new(link, evt_tx, listeners);
            worker.run(&mut cmd_rx).await;
        }
        Ok(None) => {
            info!("no wireless device found; running degraded");
            degraded_loop(&mut cmd_rx, &evt_tx).await;
        }
        Err(e) => {
            warn!("NetworkManager unreachable ({e}); running degraded");
            degraded_loop(&mut cmd_rx, &evt_tx).await;
        }
    }
}

/// Services commands with neutral answers when no daemon link exists.
async fn degraded_loop(cmd_rx: &mut UnboundedReceiver<Command>, evt_tx: &std_mpsc::Sender<Delivery>) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::IsAvailable(tx) => drop(tx.send(false)),
            Command::WirelessEnabled(tx) => drop(tx.send(false)),
            Command::VisibleAccessPoints(tx) => drop(tx.send(Vec::new())),
            Command::ConnectedAccessPoint(tx) | Command::ConnectingAccessPoint(tx) => {
                drop(tx.send(None));
            }
            Command::CurrentState(tx) => drop(tx.send(WifiState::Disconnected)),
            Command::Connect { on_failure, .. } => {
                let _ = evt_tx.send(Delivery::Callback(Box::new(move || {
                    on_failure(WifiError::DeviceUnavailable);
                })));
            }
            Command::SetWirelessEnabled(_)
            | Command::RequestScan
            | Command::CloseActive
            | Command::CloseActivating => {}
            Command::Shutdown => break,
        }
    }
}

/// Live proxies to the daemon and the one wireless device.
struct DaemonLink {
    conn: Connection,
    nm: NMProxy<'static>,
    device_path: OwnedObjectPath,
    device: NMDeviceProxy<'static>,
    wireless: NMWirelessProxy<'static>,
}

impl DaemonLink {
    /// Connects to the system bus and finds the wireless device.
    /// `Ok(None)` when the bus is up but no Wi-Fi hardware exists.
    async fn establish() -> Result<Option<Self>> {
        let conn = Connection::system().await?;
        let nm = NMProxy::new(&conn).await?;

        let Some(device_path) = find_wireless_device(&conn, &nm).await? else {
            return Ok(None);
        };

        let device = NMDeviceProxy::builder(&conn)
            .path(device_path.clone())?
            .build()
            .await?;
        let wireless = NMWirelessProxy::builder(&conn)
            .path(device_path.clone())?
            .build()
            .await?;

        Ok(Some(Self {
            conn,
            nm,
            device_path,
            device,
            wireless,
        }))
    }
}

struct Worker {
    link: DaemonLink,
    registry: ApRegistry,
    machine: StateMachine,
    evt_tx: std_mpsc::Sender<Delivery>,
    listeners: ListenerRegistry,
}

impl Worker {
    fn new(link: DaemonLink, evt_tx: std_mpsc::Sender<Delivery>, listeners: ListenerRegistry) -> Self {
        Self {
            link,
            registry: ApRegistry::default(),
            machine: StateMachine::new(WifiState::Disconnected),
            evt_tx,
            listeners,
        }
    }

    async fn run(&mut self, cmd_rx: &mut UnboundedReceiver<Command>) {
        self.initialize().await;

        let mut state_stream = match self.link.device.receive_device_state_changed().await {
            Ok(s) => s,
            Err(e) => {
                error!("cannot subscribe to device state changes: {e}");
                degraded_loop(cmd_rx, &self.evt_tx).await;
                return;
            }
        };
        let mut ap_added = match self.link.wireless.receive_access_point_added().await {
            Ok(s) => s,
            Err(e) => {
                error!("cannot subscribe to access point signals: {e}");
                degraded_loop(cmd_rx, &self.evt_tx).await;
                return;
            }
        };
        let mut ap_removed = match self.link.wireless.receive_access_point_removed().await {
            Ok(s) => s,
            Err(e) => {
                error!("cannot subscribe to access point signals: {e}");
                degraded_loop(cmd_rx, &self.evt_tx).await;
                return;
            }
        };
        let mut enabled_stream = self.link.nm.receive_wireless_enabled_changed().await;
        let mut active_ap_stream = self.link.wireless.receive_active_access_point_changed().await;

        loop {
            tokio::select! {
                maybe_cmd = cmd_rx.recv() => {
                    match maybe_cmd {
                        None | Some(Command::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                Some(signal) = state_stream.next() => {
                    match signal.args() {
                        Ok(args) => {
                            self.handle_device_state(args.new_state, args.old_state, args.reason)
                                .await;
                        }
                        Err(e) => warn!("malformed state signal: {e}"),
                    }
                }
                Some(_) = ap_added.next() => self.refresh_access_points().await,
                Some(_) = ap_removed.next() => self.refresh_access_points().await,
                Some(change) = enabled_stream.next() => {
                    match change.get().await {
                        Ok(enabled) => {
                            info!("wireless radio {}", if enabled { "enabled" } else { "disabled" });
                            self.post_event(WifiEvent::EnabledChanged(enabled));
                            self.refresh_access_points().await;
                        }
                        Err(e) => warn!("unreadable WirelessEnabled change: {e}"),
                    }
                }
                Some(change) = active_ap_stream.next() => {
                    if let Ok(path) = change.get().await {
                        self.handle_active_ap_change(path).await;
                    }
                }
            }
        }
    }

    /// Seeds the registry and the state machine from the daemon's current
    /// view, so a manager started while already connected reports it.
    async fn initialize(&mut self) {
        self.refresh_access_points().await;

        let state = match self.link.device.state().await {
            Ok(code) => DeviceState::from(code),
            Err(e) => {
                warn!("cannot read initial device state: {e}");
                return;
            }
        };
        if state == DeviceState::Activated {
            if let Some(ap) = self.resolve_connected_ap().await {
                info!("already connected to {}", ap.ssid_text);
                self.machine = StateMachine::new(WifiState::Connected(ap));
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::IsAvailable(tx) => drop(tx.send(true)),
            Command::WirelessEnabled(tx) => {
                let enabled = self.link.nm.wireless_enabled().await.unwrap_or(false);
                drop(tx.send(enabled));
            }
            Command::VisibleAccessPoints(tx) => drop(tx.send(self.registry.visible())),
            Command::ConnectedAccessPoint(tx) => {
                let ap = match self.machine.state() {
                    WifiState::Connected(ap) => Some(ap.clone()),
                    _ => None,
                };
                drop(tx.send(ap));
            }
            Command::ConnectingAccessPoint(tx) => {
                let ap = match self.machine.state() {
                    WifiState::Connecting(ap) => Some(ap.clone()),
                    _ => None,
                };
                drop(tx.send(ap));
            }
            Command::CurrentState(tx) => drop(tx.send(self.machine.state().clone())),
            Command::SetWirelessEnabled(enabled) => {
                if let Err(e) = self.link.nm.set_wireless_enabled(enabled).await {
                    warn!("cannot set wireless enabled={enabled}: {e}");
                }
            }
            Command::RequestScan => {
                if let Err(e) = request_scan(&self.link.wireless).await {
                    // The daemon rate-limits scans; a rejection here is
                    // routine, not an error.
                    debug!("scan request rejected: {e}");
                }
            }
            Command::Connect {
                target,
                psk,
                on_success,
                on_failure,
            } => {
                match self.start_attempt(&target, psk.as_deref()).await {
                    Ok(ap) => {
                        let _ = self.evt_tx.send(Delivery::Callback(Box::new(move || {
                            on_success(ap);
                        })));
                    }
                    Err(err) => {
                        self.machine.attempt_rejected(err.clone());
                        let _ = self.evt_tx.send(Delivery::Callback(Box::new(move || {
                            on_failure(err);
                        })));
                    }
                }
            }
            Command::CloseActive => self.close_active().await,
            Command::CloseActivating => self.cancel_activating().await,
            Command::Shutdown => {}
        }
    }

    /// Validates, matches against saved profiles, and asks the daemon to
    /// activate. Returns the (re-resolved) target on acceptance.
    async fn start_attempt(&mut self, target: &AccessPoint, psk: Option<&str>) -> Result<AccessPoint> {
        validate_credentials(target.security, psk)?;

        // Re-resolve against the live registry; the caller's copy may be
        // stale scan data.
        let ap = self
            .registry
            .by_id(&target.id)
            .ok_or(WifiError::NoMatchingAccessPoint)?;
        let specific = self
            .registry
            .strongest_path(&ap.id)
            .ok_or(WifiError::NoMatchingAccessPoint)?;
        let specific = OwnedObjectPath::try_from(specific).map_err(zbus::Error::from)?;

        self.machine.begin_attempt(ap.clone());

        let profiles = load_available_profiles(&self.link.conn, &self.link.device)
            .await
            .unwrap_or_else(|e| {
                warn!("cannot enumerate saved profiles: {e}");
                Vec::new()
            });

        let outcome = match plan_activation(&profiles, &ap, psk) {
            ActivationPlan::Reuse(path) => {
                info!("activating saved profile for {}", ap.ssid_text);
                let path = OwnedObjectPath::try_from(path).map_err(zbus::Error::from)?;
                self.link
                    .nm
                    .activate_connection(path, self.link.device_path.clone(), specific)
                    .await
                    .map(|_| ())
            }
            ActivationPlan::Create(settings) => {
                info!("creating new profile for {}", ap.ssid_text);
                self.link
                    .nm
                    .add_and_activate_connection(settings, self.link.device_path.clone(), specific)
                    .await
                    .map(|_| ())
            }
        };

        outcome.map_err(|e| WifiError::DaemonRejected(e.to_string()))?;
        Ok(ap)
    }

    async fn close_active(&mut self) {
        if !matches!(
            self.machine.state(),
            WifiState::Connected(_) | WifiState::Connecting(_)
        ) {
            return;
        }
        self.machine.begin_disconnect();
        if let Err(e) = self.link.device.disconnect().await {
            warn!("disconnect request failed: {e}");
            return;
        }
        // Give the daemon a moment; the terminal state arrives as a
        // device state signal either way.
        Delay::new(timeouts::disconnect_settle()).await;
    }

    /// Tears down an in-flight attempt: deletes the profile the daemon
    /// created for it, then disconnects so the supplicant stops retrying.
    async fn cancel_activating(&mut self) {
        if !matches!(self.machine.state(), WifiState::Connecting(_)) {
            return;
        }
        if let Err(e) = delete_activating_profile(
            &self.link.conn,
            &self.link.nm,
            &self.link.device_path,
            &self.link.device,
        )
        .await
        {
            warn!("cannot delete activating profile: {e}");
        }
        if let Err(e) = self.link.device.disconnect().await {
            warn!("disconnect after cancel failed: {e}");
        }
    }

    async fn handle_device_state(&mut self, new_code: u32, old_code: u32, reason_code: u32) {
        let new_state = DeviceState::from(new_code);
        let old_state = DeviceState::from(old_code);
        let reason = StateReason::from(reason_code);

        self.post_event(WifiEvent::DeviceStateChanged {
            new_state,
            old_state,
            reason,
        });

        let resolved = if new_state == DeviceState::Activated {
            self.resolve_connected_ap().await
        } else {
            None
        };

        let out = self.machine.on_device_state(new_state, reason, resolved);
        if out.action == SmAction::CancelActivating {
            if let Err(e) = delete_activating_profile(
                &self.link.conn,
                &self.link.nm,
                &self.link.device_path,
                &self.link.device,
            )
            .await
            {
                warn!("cannot delete activating profile: {e}");
            }
            if let Err(e) = self.link.device.disconnect().await {
                warn!("disconnect after auth failure failed: {e}");
            }
        }
        if let Some(change) = out.connection_changed {
            self.post_event(WifiEvent::ConnectionChanged(change));
        }
    }

    /// Active access point property changes only matter for roaming: the
    /// device stays `Activated` while the daemon moves it to a different
    /// network, so no state signal announces the switch.
    async fn handle_active_ap_change(&mut self, path: OwnedObjectPath) {
        let WifiState::Connected(current) = self.machine.state().clone() else {
            return;
        };
        if path.as_str() == "/" {
            return;
        }
        let Some(ap) = self.resolve_ap_at(&path).await else {
            return;
        };
        if ap.id == current.id {
            return;
        }
        let out = self
            .machine
            .on_device_state(DeviceState::Activated, StateReason::None, Some(ap));
        if let Some(change) = out.connection_changed {
            self.post_event(WifiEvent::ConnectionChanged(change));
        }
    }

    async fn refresh_access_points(&mut self) {
        let records = match snapshot_access_points(&self.link.conn, &self.link.wireless).await {
            Ok(records) => records,
            Err(e) => {
                warn!("access point snapshot failed: {e}");
                return;
            }
        };
        let diff = self.registry.rebuild(&records);
        if diff.is_empty() {
            return;
        }
        debug!(
            "visible networks changed: +{} -{}",
            diff.added.len(),
            diff.removed.len()
        );
        for ap in diff.added {
            self.post_event(WifiEvent::AccessPointAdded(ap));
        }
        for ap in diff.removed {
            self.post_event(WifiEvent::AccessPointRemoved(ap));
        }
    }

    /// Resolves the device's currently active access point to a logical
    /// network, preferring the registry and falling back to a direct read
    /// for records the registry has not seen yet.
    async fn resolve_connected_ap(&mut self) -> Option<AccessPoint> {
        let path = match self.link.wireless.active_access_point().await {
            Ok(path) if path.as_str() != "/" => path,
            Ok(_) => {
                // Property not updated yet; try the active connection's
                // specific object instead.
                let active = self.link.nm.primary_connection().await.ok()?;
                active_ap_path(&self.link.conn, &active).await.ok()??
            }
            Err(e) => {
                warn!("cannot read active access point: {e}");
                return None;
            }
        };
        self.resolve_ap_at(&path).await
    }

    async fn resolve_ap_at(&mut self, path: &OwnedObjectPath) -> Option<AccessPoint> {
        if let Some(ap) = self.registry.by_path(path.as_str()) {
            return Some(ap);
        }
        match read_single_record(&self.link.conn, path).await {
            Ok(record) => Some(record_to_access_point(&record)),
            Err(e) => {
                warn!("cannot read access point {path}: {e}");
                None
            }
        }
    }

    fn post_event(&self, event: WifiEvent) {
        if !self.listeners.wants(event_interest(&event)) {
            return;
        }
        let _ = self.evt_tx.send(Delivery::Event(event));
    }
}

/// Builds a standalone logical network from one raw record, for access
/// points not (yet) in the registry.
fn record_to_access_point(record: &ApRecord) -> AccessPoint {
    AccessPoint {
        id: record.id(),
        ssid: record.ssid.clone(),
        ssid_text: ssid_display(&record.ssid),
        bssid: record.bssid.clone(),
        strength: clamp_strength(record.strength),
        security: security_type(record.flags, record.wpa_flags, record.rsn_flags),
        paths: vec![record.path.clone()],
    }
}
