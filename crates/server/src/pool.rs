//! Reader pool allocator
//!
//! Hands out one exclusive reader per request from a bounded set, indexed by
//! group reference. The check-and-mark is a single atomic step under the pool
//! lock so two concurrent allocations can never pick the same reader.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use cardlink_core::event::{PluginEvent, PluginEventSender};
use cardlink_core::{CardReader, Error};

/// Pool of local readers grouped by reference
#[derive(Debug, Default)]
pub struct ReaderPool {
    slots: Mutex<Vec<PoolSlot>>,
    events: Option<PluginEventSender>,
}

#[derive(Debug)]
struct PoolSlot {
    group_reference: String,
    reader: Arc<dyn CardReader>,
    allocated: bool,
}

impl ReaderPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish allocation lifecycle events onto `events`
    pub fn with_events(mut self, events: PluginEventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Add a reader to a group, builder style
    pub fn with_reader(self, group_reference: &str, reader: Arc<dyn CardReader>) -> Self {
        self.plug_reader(group_reference, reader);
        self
    }

    /// Plug a reader into a group
    pub fn plug_reader(&self, group_reference: &str, reader: Arc<dyn CardReader>) {
        trace!(group = group_reference, reader = reader.name(), "reader plugged");
        self.slots.lock().push(PoolSlot {
            group_reference: group_reference.to_owned(),
            reader,
            allocated: false,
        });
    }

    /// Allocate one exclusive reader from `group_reference`
    ///
    /// Picks the free reader with the lowest name in the group so available
    /// readers cannot be starved. Fails with [`Error::NoAvailableReader`]
    /// when every matching reader is allocated.
    pub fn allocate(&self, group_reference: &str) -> Result<Arc<dyn CardReader>, Error> {
        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.group_reference == group_reference && !slot.allocated)
            .min_by(|(_, a), (_, b)| a.reader.name().cmp(b.reader.name()))
            .map(|(index, _)| index);
        let Some(index) = index else {
            debug!(group = group_reference, "no available reader");
            return Err(Error::NoAvailableReader(group_reference.to_owned()));
        };
        slots[index].allocated = true;
        let reader = Arc::clone(&slots[index].reader);
        drop(slots);
        trace!(group = group_reference, reader = reader.name(), "reader allocated");
        self.emit(PluginEvent::ReaderAllocated {
            reader: reader.name().to_owned(),
            group_reference: group_reference.to_owned(),
        });
        Ok(reader)
    }

    /// Return a reader to the pool
    ///
    /// Releasing an unallocated or unknown reader is a no-op.
    pub fn release(&self, reader_name: &str) {
        let released = {
            let mut slots = self.slots.lock();
            slots
                .iter_mut()
                .find(|slot| slot.reader.name() == reader_name && slot.allocated)
                .map(|slot| {
                    slot.allocated = false;
                })
                .is_some()
        };
        if released {
            trace!(reader = reader_name, "reader released");
            self.emit(PluginEvent::ReaderReleased {
                reader: reader_name.to_owned(),
            });
        }
    }

    /// Group references currently known to the pool, ordered
    pub fn group_references(&self) -> BTreeSet<String> {
        self.slots
            .lock()
            .iter()
            .map(|slot| slot.group_reference.clone())
            .collect()
    }

    /// Look up a plugged reader by name, allocated or not
    pub fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.reader.name() == name)
            .map(|slot| Arc::clone(&slot.reader))
    }

    fn emit(&self, event: PluginEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
