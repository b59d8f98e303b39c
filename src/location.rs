use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use crate::error::WalkError;
use crate::geo::Coordinate;

/// How often a source should deliver fixes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub time_interval: Duration,
    pub distance_interval_meters: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            time_interval: Duration::from_secs(1),
            distance_interval_meters: 1.0,
        }
    }
}

/// Anything that can hand out GPS fixes
pub trait LocationSource {
    /// One-shot fix, used to anchor a session before it starts.
    fn current_position(&mut self) -> Result<Coordinate, WalkError>;

    /// Starts delivering fixes over a channel until the subscription is dropped.
    fn subscribe(&mut self, options: WatchOptions) -> Result<Subscription, WalkError>;
}

impl<L: LocationSource + ?Sized> LocationSource for Box<L> {
    fn current_position(&mut self) -> Result<Coordinate, WalkError> {
        (**self).current_position()
    }

    fn subscribe(&mut self, options: WatchOptions) -> Result<Subscription, WalkError> {
        (**self).subscribe(options)
    }
}

/// Blocking access to a stream of fixes
pub trait SampleSource {
    /// Block for up to `timeout` waiting for a fix.
    fn recv_timeout(&self, timeout: Duration) -> Result<Coordinate, RecvTimeoutError>;
}

/// Producer half of a subscription
#[derive(Debug, Clone)]
pub struct SampleSender {
    tx: Sender<Coordinate>,
    active: Arc<AtomicBool>,
}

impl SampleSender {
    /// Returns false once the consumer has unsubscribed.
    pub fn send(&self, coordinate: Coordinate) -> bool {
        self.is_active() && self.tx.send(coordinate).is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Consumer half of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<Coordinate>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn channel() -> (SampleSender, Subscription) {
        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        (
            SampleSender {
                tx,
                active: Arc::clone(&active),
            },
            Subscription { rx, active },
        )
    }

    pub fn try_recv(&self) -> Result<Coordinate, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl SampleSource for Subscription {
    fn recv_timeout(&self, timeout: Duration) -> Result<Coordinate, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Source whose fixes are pushed in by hand through [`ChannelLocationSource::feed`].
///
/// Used by tests and by hosts that receive fixes from elsewhere.
#[derive(Debug)]
pub struct ChannelLocationSource {
    position: Option<Coordinate>,
    permission_granted: bool,
    feed: SampleSender,
    pending: Option<Subscription>,
    subscribe_calls: usize,
}

impl ChannelLocationSource {
    pub fn new() -> Self {
        let (feed, pending) = Subscription::channel();
        Self {
            position: None,
            permission_granted: true,
            feed,
            pending: Some(pending),
            subscribe_calls: 0,
        }
    }

    pub fn with_position(mut self, position: Coordinate) -> Self {
        self.position = Some(position);
        self
    }

    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    pub fn feed(&self) -> SampleSender {
        self.feed.clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls
    }
}

impl Default for ChannelLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSource for ChannelLocationSource {
    fn current_position(&mut self) -> Result<Coordinate, WalkError> {
        if !self.permission_granted {
            return Err(WalkError::PermissionDenied);
        }
        self.position
            .ok_or_else(|| WalkError::LocationUnavailable("no fix yet".to_string()))
    }

    fn subscribe(&mut self, _options: WatchOptions) -> Result<Subscription, WalkError> {
        self.subscribe_calls += 1;
        if !self.permission_granted {
            return Err(WalkError::PermissionDenied);
        }
        self.pending
            .take()
            .ok_or_else(|| WalkError::LocationUnavailable("already subscribed".to_string()))
    }
}
