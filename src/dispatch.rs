//! Event dispatch: the listener contract and the UI-thread pump.
//!
//! The daemon context never calls listeners directly. It posts
//! [`Delivery`] items onto a channel; the application drains that channel
//! from its own thread through an [`EventPump`], which is where listener
//! methods actually run. This keeps every listener callback on one thread
//! regardless of where the underlying signal originated.
//!
//! Events a listener has not subscribed to are filtered on the daemon
//! side, before crossing the channel.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitflags::bitflags;
use log::{debug, trace};

use crate::models::{AccessPoint, DeviceState, StateReason, WifiEvent};

bitflags! {
    /// Which event categories a listener wants delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventInterest: u32 {
        const ENABLED      = 1 << 0;
        const DEVICE_STATE = 1 << 1;
        const AP_ADDED     = 1 << 2;
        const AP_REMOVED   = 1 << 3;
        const CONNECTION   = 1 << 4;
    }
}

/// Receives Wi-Fi notifications on the application's event thread.
///
/// Every method has an empty default so implementors override only what
/// they care about. Methods are always invoked from the thread driving
/// the [`EventPump`], never from the daemon context. `Sync` is required
/// because the daemon context reads [`interests`](Self::interests)
/// through a shared reference while deciding what to schedule.
pub trait WifiListener: Send + Sync {
    /// The categories this listener wants. Defaults to everything;
    /// narrowing it skips the channel round trip for unwanted events.
    fn interests(&self) -> EventInterest {
        EventInterest::all()
    }

    /// The wireless radio was switched on or off.
    fn wireless_enabled_changed(&mut self, _enabled: bool) {}

    /// The device moved between operational states.
    fn device_state_changed(
        &mut self,
        _new_state: DeviceState,
        _old_state: DeviceState,
        _reason: StateReason,
    ) {
    }

    /// A logical network became visible.
    fn access_point_added(&mut self, _ap: &AccessPoint) {}

    /// A logical network is no longer visible.
    fn access_point_removed(&mut self, _ap: &AccessPoint) {}

    /// The device connected to `Some(ap)` or lost its connection (`None`).
    fn connection_changed(&mut self, _ap: Option<&AccessPoint>) {}
}

/// Handle returned by listener registration; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// One item crossing from the daemon context to the event thread.
pub(crate) enum Delivery {
    Event(WifiEvent),
    /// A connection-attempt callback, boxed so it can carry its captured
    /// result across the channel.
    Callback(Box<dyn FnOnce() + Send>),
    Shutdown,
}

#[derive(Default)]
struct Table {
    next_id: u64,
    listeners: HashMap<ListenerId, Box<dyn WifiListener>>,
    /// The listener currently running a callback, taken out of the map so
    /// the lock is free while it runs. Delivery is serialized on the event
    /// thread, so at most one listener is ever out.
    in_flight: Option<ListenerId>,
    in_flight_removed: bool,
}

/// The shared listener table.
///
/// Registration happens on the application thread; the daemon context
/// only ever takes the read side, to compute the union of interests.
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<RwLock<Table>>,
}

impl ListenerRegistry {
    fn read(&self) -> RwLockReadGuard<'_, Table> {
        // A panic in a listener must not wedge the whole dispatch path.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, listener: Box<dyn WifiListener>) -> ListenerId {
        let mut table = self.write();
        table.next_id += 1;
        let id = ListenerId(table.next_id);
        table.listeners.insert(id, listener);
        debug!("listener {id:?} registered");
        id
    }

    /// Removes a listener. Unregistering an id twice is a no-op.
    pub fn unregister(&self, id: ListenerId) {
        let mut table = self.write();
        if table.listeners.remove(&id).is_some() {
            debug!("listener {id:?} unregistered");
        } else if table.in_flight == Some(id) {
            // Mid-callback, possibly removing itself; mark it so the
            // delivery loop drops it instead of putting it back.
            table.in_flight_removed = true;
            debug!("listener {id:?} unregistered during dispatch");
        }
    }

    /// True when at least one listener wants this event category.
    /// Called from the daemon context before posting an event.
    pub fn wants(&self, interest: EventInterest) -> bool {
        self.read()
            .listeners
            .values()
            .any(|l| l.interests().contains(interest))
    }

    /// Fans one event out to every interested listener. Runs on the
    /// event thread only.
    ///
    /// Each listener is taken out of the table while its callback runs,
    /// so a callback may register or unregister listeners (itself
    /// included) without deadlocking on the table lock. Listeners
    /// registered during the fan-out see the next event, not this one.
    fn deliver(&self, event: &WifiEvent) {
        let interest = event_interest(event);
        let ids: Vec<ListenerId> = self.read().listeners.keys().copied().collect();
        for id in ids {
            let mut listener = {
                let mut table = self.write();
                let Some(listener) = table.listeners.remove(&id) else {
                    // Unregistered by an earlier callback in this fan-out.
                    continue;
                };
                table.in_flight = Some(id);
                table.in_flight_removed = false;
                listener
            };
            if listener.interests().contains(interest) {
                dispatch_one(listener.as_mut(), event);
            }
            let mut table = self.write();
            table.in_flight = None;
            if !table.in_flight_removed {
                table.listeners.insert(id, listener);
            }
        }
    }
}

fn dispatch_one(listener: &mut dyn WifiListener, event: &WifiEvent) {
    match event {
        WifiEvent::EnabledChanged(enabled) => {
            listener.wireless_enabled_changed(*enabled);
        }
        WifiEvent::DeviceStateChanged {
            new_state,
            old_state,
            reason,
        } => listener.device_state_changed(*new_state, *old_state, *reason),
        WifiEvent::AccessPointAdded(ap) => listener.access_point_added(ap),
        WifiEvent::AccessPointRemoved(ap) => listener.access_point_removed(ap),
        WifiEvent::ConnectionChanged(ap) => listener.connection_changed(ap.as_ref()),
    }
}

/// Maps an event to its interest category.
pub(crate) fn event_interest(event: &WifiEvent) -> EventInterest {
    match event {
        WifiEvent::EnabledChanged(_) => EventInterest::ENABLED,
        WifiEvent::DeviceStateChanged { .. } => EventInterest::DEVICE_STATE,
        WifiEvent::AccessPointAdded(_) => EventInterest::AP_ADDED,
        WifiEvent::AccessPointRemoved(_) => EventInterest::AP_REMOVED,
        WifiEvent::ConnectionChanged(_) => EventInterest::CONNECTION,
    }
}

/// Drains deliveries on the application's event thread.
///
/// Call [`poll`](EventPump::poll) from an existing event loop, or hand a
/// dedicated thread to [`run`](EventPump::run).
pub struct EventPump {
    rx: Receiver<Delivery>,
    registry: ListenerRegistry,
}

impl EventPump {
    pub(crate) fn new(rx: Receiver<Delivery>, registry: ListenerRegistry) -> Self {
        Self { rx, registry }
    }

    /// Registers a listener for subsequent events.
    pub fn register(&self, listener: Box<dyn WifiListener>) -> ListenerId {
        self.registry.register(listener)
    }

    /// Removes a previously registered listener. Safe to call twice.
    pub fn unregister(&self, id: ListenerId) {
        self.registry.unregister(id);
    }

    /// Drains everything currently queued without blocking.
    ///
    /// Returns `false` once the manager has shut down (or its thread
    /// died); the caller should stop polling then.
    pub fn poll(&self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(Delivery::Event(event)) => {
                    trace!("dispatching {event:?}");
                    self.registry.deliver(&event);
                }
                Ok(Delivery::Callback(cb)) => cb(),
                Ok(Delivery::Shutdown) => return false,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Blocks delivering events until the manager shuts down.
    pub fn run(&self) {
        while let Ok(delivery) = self.rx.recv() {
            match delivery {
                Delivery::Event(event) => self.registry.deliver(&event),
                Delivery::Callback(cb) => cb(),
                Delivery::Shutdown => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    #[derive(Clone, Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        interests: Option<EventInterest>,
    }

    impl Recorder {
        fn push(&self, entry: impl Into<String>) {
            if let Ok(mut log) = self.log.lock() {
                log.push(entry.into());
            }
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().map(|l| l.clone()).unwrap_or_default()
        }
    }

    impl WifiListener for Recorder {
        fn interests(&self) -> EventInterest {
            self.interests.unwrap_or_else(EventInterest::all)
        }

        fn wireless_enabled_changed(&mut self, enabled: bool) {
            self.push(format!("enabled:{enabled}"));
        }

        fn access_point_added(&mut self, ap: &AccessPoint) {
            self.push(format!("added:{}", ap.ssid_text));
        }

        fn access_point_removed(&mut self, ap: &AccessPoint) {
            self.push(format!("removed:{}", ap.ssid_text));
        }

        fn connection_changed(&mut self, ap: Option<&AccessPoint>) {
            match ap {
                Some(ap) => self.push(format!("connected:{}", ap.ssid_text)),
                None => self.push("disconnected"),
            }
        }
    }

    fn ap(name: &str) -> AccessPoint {
        use crate::models::{ApId, SecurityType};
        AccessPoint {
            id: ApId([0; 32]),
            ssid: name.as_bytes().to_vec(),
            ssid_text: name.to_string(),
            bssid: "aa:bb:cc:dd:ee:ff".to_string(),
            strength: 50,
            security: SecurityType::Open,
            paths: vec![],
        }
    }

    fn pump() -> (mpsc::Sender<Delivery>, EventPump) {
        let (tx, rx) = mpsc::channel();
        (tx, EventPump::new(rx, ListenerRegistry::default()))
    }

    #[test]
    fn events_are_delivered_in_posting_order() {
        let (tx, pump) = pump();
        let recorder = Recorder::default();
        pump.register(Box::new(recorder.clone()));

        tx.send(Delivery::Event(WifiEvent::AccessPointAdded(ap("A"))))
            .ok();
        tx.send(Delivery::Event(WifiEvent::ConnectionChanged(Some(ap("A")))))
            .ok();
        tx.send(Delivery::Event(WifiEvent::AccessPointRemoved(ap("B"))))
            .ok();

        assert!(pump.poll());
        assert_eq!(recorder.entries(), vec!["added:A", "connected:A", "removed:B"]);
    }

    #[test]
    fn interest_mask_filters_delivery() {
        let (tx, pump) = pump();
        let recorder = Recorder {
            interests: Some(EventInterest::CONNECTION),
            ..Recorder::default()
        };
        pump.register(Box::new(recorder.clone()));

        tx.send(Delivery::Event(WifiEvent::AccessPointAdded(ap("A"))))
            .ok();
        tx.send(Delivery::Event(WifiEvent::ConnectionChanged(None)))
            .ok();

        pump.poll();
        assert_eq!(recorder.entries(), vec!["disconnected"]);
    }

    #[test]
    fn unregister_stops_delivery_and_is_idempotent() {
        let (tx, pump) = pump();
        let recorder = Recorder::default();
        let id = pump.register(Box::new(recorder.clone()));

        tx.send(Delivery::Event(WifiEvent::EnabledChanged(true))).ok();
        pump.poll();

        pump.unregister(id);
        pump.unregister(id);

        tx.send(Delivery::Event(WifiEvent::EnabledChanged(false))).ok();
        pump.poll();

        assert_eq!(recorder.entries(), vec!["enabled:true"]);
    }

    #[test]
    fn callbacks_interleave_with_events_in_order() {
        let (tx, pump) = pump();
        let recorder = Recorder::default();
        pump.register(Box::new(recorder.clone()));

        tx.send(Delivery::Event(WifiEvent::AccessPointAdded(ap("A"))))
            .ok();
        let r = recorder.clone();
        tx.send(Delivery::Callback(Box::new(move || r.push("callback"))))
            .ok();
        tx.send(Delivery::Event(WifiEvent::ConnectionChanged(None)))
            .ok();

        pump.poll();
        assert_eq!(
            recorder.entries(),
            vec!["added:A", "callback", "disconnected"]
        );
    }

    #[test]
    fn poll_returns_false_after_shutdown() {
        let (tx, pump) = pump();
        tx.send(Delivery::Shutdown).ok();
        assert!(!pump.poll());
    }

    #[test]
    fn poll_returns_false_when_sender_is_gone() {
        let (tx, pump) = pump();
        drop(tx);
        assert!(!pump.poll());
    }

    #[test]
    fn registry_and_pump_cross_thread_boundaries() {
        fn require_send<T: Send>() {}
        fn require_send_sync<T: Send + Sync>() {}
        require_send::<ListenerRegistry>();
        require_send_sync::<ListenerRegistry>();
        require_send::<EventPump>();
    }

    #[test]
    fn listener_may_unregister_itself_during_dispatch() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct OneShot {
            registry: ListenerRegistry,
            id: Arc<Mutex<Option<ListenerId>>>,
            hits: Arc<AtomicUsize>,
        }

        impl WifiListener for OneShot {
            fn wireless_enabled_changed(&mut self, _enabled: bool) {
                self.hits.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *self.id.lock().unwrap() {
                    self.registry.unregister(id);
                }
            }
        }

        let registry = ListenerRegistry::default();
        let id_slot = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let id = registry.register(Box::new(OneShot {
            registry: registry.clone(),
            id: id_slot.clone(),
            hits: hits.clone(),
        }));
        *id_slot.lock().unwrap() = Some(id);

        registry.deliver(&WifiEvent::EnabledChanged(true));
        registry.deliver(&WifiEvent::EnabledChanged(false));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!registry.wants(EventInterest::ENABLED));
    }

    #[test]
    fn listener_may_register_a_peer_during_dispatch() {
        struct Inviter {
            registry: ListenerRegistry,
            peer: Arc<Mutex<Option<Recorder>>>,
        }

        impl WifiListener for Inviter {
            fn wireless_enabled_changed(&mut self, _enabled: bool) {
                if let Some(peer) = self.peer.lock().unwrap().take() {
                    self.registry.register(Box::new(peer));
                }
            }
        }

        let registry = ListenerRegistry::default();
        let peer = Recorder::default();
        registry.register(Box::new(Inviter {
            registry: registry.clone(),
            peer: Arc::new(Mutex::new(Some(peer.clone()))),
        }));

        // The peer joins during the first fan-out and sees only the second
        // event.
        registry.deliver(&WifiEvent::EnabledChanged(true));
        registry.deliver(&WifiEvent::EnabledChanged(false));

        assert_eq!(peer.entries(), vec!["enabled:false"]);
    }

    #[test]
    fn wants_reflects_union_of_interests() {
        let registry = ListenerRegistry::default();
        assert!(!registry.wants(EventInterest::CONNECTION));

        let id = registry.register(Box::new(Recorder {
            interests: Some(EventInterest::CONNECTION | EventInterest::ENABLED),
            ..Recorder::default()
        }));
        assert!(registry.wants(EventInterest::CONNECTION));
        assert!(registry.wants(EventInterest::ENABLED));
        assert!(!registry.wants(EventInterest::AP_ADDED));

        registry.unregister(id);
        assert!(!registry.wants(EventInterest::CONNECTION));
    }
}
