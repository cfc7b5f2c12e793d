//! Index lifecycle events.
//!
//! A [`HookRegistry`] is an ordinary value the caller owns and lends to an
//! [`Indexer`](crate::indexer::Indexer). There is no global registry: code
//! that wants events must be handed the registry explicitly.
//!
//! ```rust
//! use folio::hooks::{HookRegistry, IndexEvent};
//!
//! let mut hooks = HookRegistry::new();
//! hooks.on(|event| {
//!     if let IndexEvent::GenerationCommitted { generation, .. } = event {
//!         println!("now serving {generation}");
//!     }
//! });
//! ```

use crate::types::IndexIssue;
use std::fmt;

/// Something that happened during a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    RebuildStarted {
        root: String,
    },
    /// A non-fatal problem found by the scan or route compilation.
    IssueRecorded(IndexIssue),
    GenerationCommitted {
        generation: String,
        backend: String,
        item_count: usize,
    },
    RebuildFailed {
        error: String,
    },
}

type Listener = Box<dyn Fn(&IndexEvent) + Send + Sync>;

/// Listeners for [`IndexEvent`]s, called in registration order.
#[derive(Default)]
pub struct HookRegistry {
    listeners: Vec<Listener>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, listener: impl Fn(&IndexEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn emit(&self, event: &IndexEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
