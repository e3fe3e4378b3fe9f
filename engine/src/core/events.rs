//! Subtitle Event Module
//!
//! Change notifications emitted by the subtitle model. Events are broadcast to any number
//! of subscribers; a model with no subscriber simply drops them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::{Frame, ItemId};

/// Capacity of the event channel. Slow subscribers observe `Lagged` instead of blocking edits.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Data fields a `DataChanged` event refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubtitleRole {
    Text,
    StartPos,
    EndPos,
    StartFrame,
    EndFrame,
}

/// Subtitle model change notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubtitleEvent {
    /// An entry was inserted at `row`
    #[serde(rename_all = "camelCase")]
    Inserted { id: ItemId, row: usize },
    /// An entry was removed from `row`
    #[serde(rename_all = "camelCase")]
    Removed { id: ItemId, row: usize },
    /// Fields of the entry at `row` changed
    #[serde(rename_all = "camelCase")]
    DataChanged {
        id: ItemId,
        row: usize,
        roles: Vec<SubtitleRole>,
    },
    /// The timeline view should redraw the given frame zone
    #[serde(rename_all = "camelCase")]
    ViewRefresh {
        id: ItemId,
        start_frame: Frame,
        end_frame: Frame,
    },
    /// Persisted content changed; the render output is regenerated
    ModelChanged,
    /// The render attachment was attached or detached
    #[serde(rename_all = "camelCase")]
    AttachmentChanged { attached: bool },
}

/// Broadcast sender wrapper used by the model
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SubtitleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubtitleEvent> {
        self.sender.subscribe()
    }

    /// Emits an event. Having no subscriber is not an error.
    pub fn emit(&self, event: SubtitleEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(SubtitleEvent::ModelChanged);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(SubtitleEvent::Inserted { id: 1, row: 0 });
        bus.emit(SubtitleEvent::ModelChanged);

        assert_eq!(rx.try_recv().unwrap(), SubtitleEvent::Inserted { id: 1, row: 0 });
        assert_eq!(rx.try_recv().unwrap(), SubtitleEvent::ModelChanged);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn event_serialization_is_tagged() {
        let json = serde_json::to_string(&SubtitleEvent::ViewRefresh {
            id: 3,
            start_frame: 10,
            end_frame: 20,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"viewRefresh\""));
        assert!(json.contains("\"startFrame\":10"));
    }
}
