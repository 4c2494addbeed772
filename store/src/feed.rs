use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use log::{debug, warn};
use structures::Pixel;

use crate::PixelStore;

type Listener = Box<dyn FnMut(&Pixel)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

/// Fans change events from one store channel out to any number of listeners.
///
/// The channel is open exactly while at least one listener is registered.
/// Events are handed over in the order the store emitted them when
/// [`pump`](ChangeFeed::pump) is called from the owner's event loop.
pub struct ChangeFeed {
    store: Arc<dyn PixelStore>,
    channel: Option<Receiver<Pixel>>,
    listeners: BTreeMap<SubscriptionHandle, Listener>,
    next_id: u64,
}

impl ChangeFeed {
    pub fn new(store: Arc<dyn PixelStore>) -> Self {
        Self {
            store,
            channel: None,
            listeners: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionHandle
    where
        F: FnMut(&Pixel) + 'static,
    {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;
        self.listeners.insert(handle, Box::new(listener));

        if self.channel.is_none() {
            self.connect();
        }

        handle
    }

    /// Removes a listener. Returns `false` for an unknown handle.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        if self.listeners.remove(&handle).is_none() {
            return false;
        }

        if self.listeners.is_empty() && self.channel.take().is_some() {
            debug!("last listener left, closed change feed");
        }

        true
    }

    /// Delivers every event received so far to every listener and returns
    /// how many events were delivered.
    pub fn pump(&mut self) -> usize {
        if self.listeners.is_empty() {
            return 0;
        }

        if self.channel.is_none() {
            self.connect();
        }

        let Some(channel) = &self.channel else {
            return 0;
        };

        let mut delivered = 0;
        let mut disconnected = false;

        loop {
            match channel.try_recv() {
                Ok(pixel) => {
                    for listener in self.listeners.values_mut() {
                        listener(&pixel);
                    }
                    delivered += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected {
            warn!("change feed closed by the store, reconnecting on next pump");
            self.channel = None;
        }

        delivered
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn connect(&mut self) {
        match self.store.open_feed() {
            Ok(channel) => {
                debug!("opened change feed");
                self.channel = Some(channel);
            }
            Err(err) => warn!("could not open change feed: {}", err),
        }
    }
}
