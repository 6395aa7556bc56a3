//! Waiting for the chat UI to finish generating a response.

use crate::dom::{find_first, get_attr_value, is_element};
use log::{debug, info};
use markup5ever_rcdom::Handle;
use std::time::{Duration, Instant};

pub const DEFAULT_STOP_LABEL: &str = "Stop";

/// Answers "is a response still being generated?".
pub trait GenerationProbe {
    fn is_generating(&self) -> bool;
}

impl<F> GenerationProbe for F
where
    F: Fn() -> bool,
{
    fn is_generating(&self) -> bool {
        self()
    }
}

/// Detects the stop-generation button the UI shows while it streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopControlProbe {
    label_fragment: String,
}

impl StopControlProbe {
    pub fn new(label_fragment: impl Into<String>) -> Self {
        StopControlProbe {
            label_fragment: label_fragment.into(),
        }
    }

    /// A `button` whose `aria-label` contains the label fragment.
    pub fn is_present(&self, root: &Handle) -> bool {
        find_first(root, |node| {
            is_element(node, "button")
                && get_attr_value(node, "aria-label")
                    .is_some_and(|label| label.contains(&self.label_fragment))
        })
        .is_some()
    }
}

impl Default for StopControlProbe {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_LABEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Watching,
    Fired,
}

/// One-shot idle subscription.
///
/// Each [`notify`](IdleWatcher::notify) stands for one change to the page.
/// The first notification that finds no generation in progress runs the
/// registered callback, after which the watcher is spent and ignores further
/// notifications.
pub struct IdleWatcher<P> {
    probe: P,
    callback: Option<Box<dyn FnOnce()>>,
    state: WatchState,
}

impl<P: GenerationProbe> IdleWatcher<P> {
    pub fn new(probe: P) -> Self {
        IdleWatcher {
            probe,
            callback: None,
            state: WatchState::Watching,
        }
    }

    /// Registers the callback. Only the first registration counts; returns
    /// false if one was already registered or the watcher has fired.
    pub fn on_idle(&mut self, callback: impl FnOnce() + 'static) -> bool {
        if self.callback.is_some() || self.state == WatchState::Fired {
            return false;
        }
        self.callback = Some(Box::new(callback));
        true
    }

    /// Handles one change notification. Returns true when this call fired
    /// the callback.
    pub fn notify(&mut self) -> bool {
        if self.state == WatchState::Fired || self.callback.is_none() {
            return false;
        }
        if self.probe.is_generating() {
            debug!("Generation still in progress");
            return false;
        }

        self.state = WatchState::Fired;
        if let Some(callback) = self.callback.take() {
            callback();
        }
        true
    }

    pub fn is_idle(&self) -> bool {
        !self.probe.is_generating()
    }

    pub fn has_fired(&self) -> bool {
        self.state == WatchState::Fired
    }

    /// Notifies every `interval` until the watcher fires or `timeout`
    /// elapses. Returns whether it fired.
    pub fn poll(&mut self, interval: Duration, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            if self.notify() {
                info!("Generation idle after {:?}", started.elapsed());
                return true;
            }
            if self.has_fired() || started.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(interval);
        }
    }
}
