use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::Mutex;
use structures::Pixel;

/// In-process fan-out of written rows to every open feed channel.
#[derive(Default)]
pub(crate) struct FeedBroadcaster {
    senders: Mutex<Vec<Sender<Pixel>>>,
}

impl FeedBroadcaster {
    pub fn open(&self) -> Receiver<Pixel> {
        let (sender, receiver) = channel();
        self.senders.lock().push(sender);
        receiver
    }

    /// Sends to every channel, dropping the ones whose receiver is gone.
    pub fn publish(&self, pixel: &Pixel) {
        self.senders
            .lock()
            .retain(|sender| sender.send(pixel.clone()).is_ok());
    }

    pub fn channel_count(&self) -> usize {
        self.senders.lock().len()
    }
}
