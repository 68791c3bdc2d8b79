use log::debug;
use tokio::sync::watch;

use crate::layout::ScreenSize;

/// Turns raw viewport widths into a [`ScreenSize`] signal.
///
/// Every resize is re-classified, but subscribers are only woken when the
/// class actually changes.
#[derive(Debug)]
pub struct ViewportWatcher {
    tx: watch::Sender<ScreenSize>,
}

impl ViewportWatcher {
    pub fn new(initial_width: Option<u32>) -> Self {
        let initial = initial_width.map(ScreenSize::from_width).unwrap_or_default();
        let (tx, _rx) = watch::channel(initial);
        ViewportWatcher { tx }
    }

    pub fn resize(&self, width: u32) -> ScreenSize {
        let next = ScreenSize::from_width(width);
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("Viewport {}px: screen size {} -> {}", width, current, next);
            *current = next;
            true
        });
        next
    }

    pub fn current(&self) -> ScreenSize {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenSize> {
        self.tx.subscribe()
    }
}

impl Default for ViewportWatcher {
    fn default() -> Self {
        Self::new(None)
    }
}
