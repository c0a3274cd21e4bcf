//! Sensor snapshot holder
//!
//! The refresh activity re-reads the external feed on its own short
//! interval and swaps the result in here; the transmit activity takes a
//! copy on its longer interval. The snapshot lock is held only for the
//! swap or the copy, never across feed enumeration or a serial write, so
//! the two activities cannot block each other.

use parking_lot::Mutex;
use tracing::trace;

use sl_core::feed::{SensorFeed, SensorReading};

pub struct SensorMonitor {
    feed: Mutex<Box<dyn SensorFeed>>,
    snapshot: Mutex<Vec<SensorReading>>,
}

impl SensorMonitor {
    pub fn new(feed: Box<dyn SensorFeed>) -> Self {
        Self {
            feed: Mutex::new(feed),
            snapshot: Mutex::new(Vec::new()),
        }
    }

    /// Re-enumerate the feed and publish the new snapshot.
    pub fn refresh(&self) {
        let readings = self.feed.lock().readings();
        trace!("Feed refresh: {} readings", readings.len());
        *self.snapshot.lock() = readings;
    }

    /// Copy of the latest snapshot.
    pub fn snapshot(&self) -> Vec<SensorReading> {
        self.snapshot.lock().clone()
    }

    pub fn has_data(&self) -> bool {
        !self.snapshot.lock().is_empty()
    }
}
