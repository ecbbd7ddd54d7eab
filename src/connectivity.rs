//! Connectivity tracking.
//!
//! The monitor is a cheap shared flag plus a watch channel. Anything may
//! report a transition (a failed push, a platform network event, a manual
//! toggle in tests); subscribers only wake on actual changes, so a flap of
//! identical reports costs nothing.

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use tokio::sync::watch;

pub struct ConnectivityMonitor {
    online: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self {
            online: AtomicBool::new(initially_online),
            tx,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records a connectivity report. Returns true when the state actually
    /// changed; only then are subscribers notified.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        info!(
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        self.tx.send_replace(online);
        true
    }

    /// Subscribes to connectivity transitions. The receiver observes the
    /// current value immediately and every change after.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
