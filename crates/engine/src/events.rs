//! Change notifications for sheet transactions.
//!
//! Every committed transaction bumps the sheet revision and emits exactly one
//! event. Renderers subscribe to know when to repaint; tests use the
//! collector to check revision ordering.

/// Events emitted by [`crate::data_proxy::DataProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetEvent {
    /// A mutation was applied.
    Changed { revision: u64 },
    /// Undo or redo replaced the sheet state.
    Restored { revision: u64 },
}

impl SheetEvent {
    pub fn revision(&self) -> u64 {
        match self {
            SheetEvent::Changed { revision } | SheetEvent::Restored { revision } => *revision,
        }
    }
}

/// Callback type for receiving sheet events.
pub type EventCallback = Box<dyn FnMut(&SheetEvent)>;

/// Simple event collector for testing.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<SheetEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: SheetEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SheetEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Revisions in emission order.
    pub fn revisions(&self) -> Vec<u64> {
        self.events.iter().map(SheetEvent::revision).collect()
    }

    /// Filter to only Restored events.
    pub fn restored(&self) -> Vec<&SheetEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, SheetEvent::Restored { .. }))
            .collect()
    }
}
