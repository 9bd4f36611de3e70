//! Shape-addressed command channel from toolbar UI to mounted notes.
//!
//! The bus is owned by the board root. Each mounted note editor holds one
//! [`Subscription`] keyed by its shape id; publishing a command hands it to
//! that subscription's queue and nowhere else. There is no buffering for
//! shapes without a subscriber: such commands are dropped.

use std::sync::mpsc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::markup::{Align, FormatCommand};
use crate::shapes::ShapeId;

/// Formatting actions a toolbar can send to a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteAction {
    Bold,
    Italic,
    H1,
    H2,
    List,
    Align,
    Color,
    Emoji,
}

impl std::str::FromStr for NoteAction {
    type Err = crate::error::BoardError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| crate::error::BoardError::validation(format!("unknown note action {s:?}")))
    }
}

/// Wire message: `{id, action, value?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCommand {
    pub id: ShapeId,
    pub action: NoteAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl NoteCommand {
    pub fn new(id: ShapeId, action: NoteAction) -> Self {
        Self {
            id,
            action,
            value: None,
        }
    }

    pub fn with_value(id: ShapeId, action: NoteAction, value: impl Into<String>) -> Self {
        Self {
            id,
            action,
            value: Some(value.into()),
        }
    }

    /// The formatting-chain step this command stands for. `None` when an
    /// action that needs a value arrives without a usable one.
    pub fn to_format(&self) -> Option<FormatCommand> {
        let value = self.value.as_deref();
        match self.action {
            NoteAction::Bold => Some(FormatCommand::ToggleBold),
            NoteAction::Italic => Some(FormatCommand::ToggleItalic),
            NoteAction::H1 => Some(FormatCommand::ToggleHeading(1)),
            NoteAction::H2 => Some(FormatCommand::ToggleHeading(2)),
            NoteAction::List => Some(FormatCommand::ToggleBulletList),
            NoteAction::Align => value.and_then(Align::parse).map(FormatCommand::SetTextAlign),
            NoteAction::Color => value
                .filter(|v| !v.trim().is_empty())
                .map(|v| FormatCommand::SetColor(v.trim().to_string())),
            NoteAction::Emoji => value
                .filter(|v| !v.is_empty())
                .map(|v| FormatCommand::InsertContent(v.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Outcome of a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No live subscriber for the target shape
    Dropped,
}

/// Receiving end held by one mounted editor
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    shape: ShapeId,
    rx: mpsc::Receiver<NoteCommand>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    /// Non-blocking check for the next command
    pub fn try_next(&self) -> Option<NoteCommand> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    shape: ShapeId,
    tx: mpsc::Sender<NoteCommand>,
}

#[derive(Debug, Default)]
pub struct CommandBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to commands addressed to `shape`. A shape has at most one
    /// subscriber; a newer subscription replaces an older one.
    pub fn subscribe(&mut self, shape: ShapeId) -> Subscription {
        if self.subscribers.iter().any(|s| s.shape == shape) {
            warn!(%shape, "replacing existing subscription");
            self.subscribers.retain(|s| s.shape != shape);
        }
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(Subscriber { id, shape, tx });
        debug!(%shape, ?id, "subscribed");
        Subscription { id, shape, rx }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        before != self.subscribers.len()
    }

    /// Deliver `command` to the subscriber for its shape, if any.
    pub fn publish(&mut self, command: NoteCommand) -> Delivery {
        let Some(pos) = self.subscribers.iter().position(|s| s.shape == command.id) else {
            debug!(shape = %command.id, action = ?command.action, "no subscriber, dropped");
            return Delivery::Dropped;
        };
        let shape = command.id;
        match self.subscribers[pos].tx.send(command) {
            Ok(()) => Delivery::Delivered,
            Err(_) => {
                // Receiver went away without unsubscribing
                warn!(%shape, "pruning dead subscription");
                self.subscribers.remove(pos);
                Delivery::Dropped
            }
        }
    }

    pub fn is_subscribed(&self, shape: ShapeId) -> bool {
        self.subscribers.iter().any(|s| s.shape == shape)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_parse() {
        assert_eq!("H1".parse::<NoteAction>().unwrap(), NoteAction::H1);
        assert_eq!("emoji".parse::<NoteAction>().unwrap(), NoteAction::Emoji);
        assert!("underline".parse::<NoteAction>().unwrap_err().is_validation());
    }

    #[test]
    fn wire_format_matches_toolbar_message() {
        let id = ShapeId::new();
        let cmd = NoteCommand::with_value(id, NoteAction::Emoji, "😀");
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["action"], "emoji");
        assert_eq!(json["value"], "😀");

        let bare = serde_json::to_string(&NoteCommand::new(id, NoteAction::Bold)).unwrap();
        assert!(!bare.contains("value"));
        let back: NoteCommand = serde_json::from_str(&bare).unwrap();
        assert_eq!(back.action, NoteAction::Bold);
    }

    #[test]
    fn delivers_only_to_matching_shape() {
        let mut bus = CommandBus::new();
        let a = ShapeId::new();
        let b = ShapeId::new();
        let sub_a = bus.subscribe(a);
        let sub_b = bus.subscribe(b);

        assert_eq!(bus.publish(NoteCommand::new(a, NoteAction::Bold)), Delivery::Delivered);
        assert_eq!(sub_a.try_next().map(|c| c.action), Some(NoteAction::Bold));
        assert!(sub_a.try_next().is_none());
        assert!(sub_b.try_next().is_none());
    }

    #[test]
    fn unknown_shape_is_dropped() {
        let mut bus = CommandBus::new();
        let _sub = bus.subscribe(ShapeId::new());
        assert_eq!(bus.publish(NoteCommand::new(ShapeId::new(), NoteAction::Bold)), Delivery::Dropped);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = CommandBus::new();
        let shape = ShapeId::new();
        let sub = bus.subscribe(shape);
        assert!(bus.unsubscribe(sub.id()));
        assert_eq!(bus.publish(NoteCommand::new(shape, NoteAction::Italic)), Delivery::Dropped);
    }

    #[test]
    fn dropped_receiver_is_pruned() {
        let mut bus = CommandBus::new();
        let shape = ShapeId::new();
        drop(bus.subscribe(shape));
        assert_eq!(bus.publish(NoteCommand::new(shape, NoteAction::Bold)), Delivery::Dropped);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn value_actions_need_values() {
        let id = ShapeId::new();
        assert_eq!(NoteCommand::new(id, NoteAction::Color).to_format(), None);
        assert_eq!(
            NoteCommand::with_value(id, NoteAction::Align, "center").to_format(),
            Some(FormatCommand::SetTextAlign(Align::Center))
        );
        assert_eq!(NoteCommand::with_value(id, NoteAction::Align, "sideways").to_format(), None);
    }
}
