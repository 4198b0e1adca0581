use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::foundation::core::ChannelId;
use crate::foundation::error::{ScopeError, ScopeResult};
use crate::waveform::model::Waveform;

/// The current waveform attached to each channel.
///
/// Writers replace whole `Arc<Waveform>` handles; readers take a [`ChannelSnapshot`] of handles.
/// A [`ChannelStore::transaction`] holds one re-entrant lock for its whole body, so a filter can
/// read its input channels (through [`StoreTx::current`] or the store itself) and publish derived
/// outputs without a renderer on another thread ever observing a partial update.
#[derive(Debug, Default)]
pub struct ChannelStore {
    inner: ReentrantMutex<RefCell<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    current: BTreeMap<ChannelId, Arc<Waveform>>,
    generation: u64,
}

/// Immutable view of all channels at one point in time.
#[derive(Clone, Debug, Default)]
pub struct ChannelSnapshot {
    current: BTreeMap<ChannelId, Arc<Waveform>>,
    generation: u64,
}

impl ChannelSnapshot {
    /// Waveform attached to `channel`, if any.
    pub fn get(&self, channel: ChannelId) -> Option<&Arc<Waveform>> {
        self.current.get(&channel)
    }

    /// Store generation this snapshot was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of channels with data.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Return `true` when no channel has data.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

/// Pending replacements collected inside [`ChannelStore::transaction`].
#[derive(Debug)]
pub struct StoreTx<'a> {
    store: &'a ChannelStore,
    set: Vec<(ChannelId, Arc<Waveform>)>,
    cleared: Vec<ChannelId>,
}

impl StoreTx<'_> {
    /// Attach `wfm` to `channel`.
    pub fn publish(&mut self, channel: ChannelId, wfm: Arc<Waveform>) {
        self.cleared.retain(|c| *c != channel);
        self.set.push((channel, wfm));
    }

    /// Detach the current waveform from `channel`.
    pub fn clear(&mut self, channel: ChannelId) {
        self.set.retain(|(c, _)| *c != channel);
        self.cleared.push(channel);
    }

    /// Waveform `channel` will hold once this transaction commits.
    ///
    /// Pending `publish`/`clear` calls win over the committed state.
    pub fn current(&self, channel: ChannelId) -> Option<Arc<Waveform>> {
        if let Some((_, wfm)) = self.set.iter().rev().find(|(c, _)| *c == channel) {
            return Some(Arc::clone(wfm));
        }
        if self.cleared.contains(&channel) {
            return None;
        }
        self.store.current(channel)
    }
}

impl ChannelStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the waveform of a single channel.
    pub fn publish(&self, channel: ChannelId, wfm: Arc<Waveform>) -> ScopeResult<()> {
        self.transaction(|tx| {
            tx.publish(channel, wfm);
            Ok(())
        })
    }

    /// Collect replacements from `f` and apply them atomically.
    ///
    /// The lock is held while `f` runs, so a channel and the filter outputs derived from it are
    /// published together. The lock is re-entrant: `f` may call [`ChannelStore::current`],
    /// [`ChannelStore::snapshot`] or open a nested transaction on the same store. If `f` fails
    /// nothing is applied.
    pub fn transaction<F>(&self, f: F) -> ScopeResult<()>
    where
        F: FnOnce(&mut StoreTx<'_>) -> ScopeResult<()>,
    {
        let guard = self.inner.lock();
        let mut tx = StoreTx {
            store: self,
            set: Vec::new(),
            cleared: Vec::new(),
        };
        f(&mut tx)?;

        if tx.set.is_empty() && tx.cleared.is_empty() {
            return Ok(());
        }
        let mut state = guard
            .try_borrow_mut()
            .map_err(|_| ScopeError::validation("channel store is borrowed during commit"))?;
        for ch in tx.cleared {
            state.current.remove(&ch);
        }
        for (ch, wfm) in tx.set {
            state.current.insert(ch, wfm);
        }
        state.generation = state.generation.wrapping_add(1);
        tracing::trace!(generation = state.generation, "channel store updated");
        Ok(())
    }

    /// Current waveform of one channel.
    pub fn current(&self, channel: ChannelId) -> Option<Arc<Waveform>> {
        let guard = self.inner.lock();
        let state = guard.borrow();
        state.current.get(&channel).cloned()
    }

    /// Take a consistent snapshot of every channel.
    pub fn snapshot(&self) -> ChannelSnapshot {
        let guard = self.inner.lock();
        let state = guard.borrow();
        ChannelSnapshot {
            current: state.current.clone(),
            generation: state.generation,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/waveform/store.rs"]
mod tests;
