//! Static dispatch table: what each lifecycle step does to an entity's metadata.
//!
//! Each [`Handler`] row describes the metadata delta for one [`EventKind`]:
//! the new fetch phase (or its removal), the named-action phase (or its
//! removal), which meta field receives the payload `response`, and whether
//! the entity value itself is cleared. The engine looks the row up by kind and
//! applies it; nothing here touches the tree.

use crate::event::{Delta, EventKind};
use crate::tree::SuccessKind;

/// Fetch phase written by a handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchTemplate {
    /// `fetch.pending = true`, stamped with `initiatedAt`
    Pending,
    /// `fetch.success = kind`, stamped with `completedAt`
    Success(SuccessKind),
    /// `fetch.error = response`, stamped with `completedAt`
    Error,
}

/// Named-action phase written by a handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTemplate {
    /// `actions[id].pending = true`, stamped with `initiatedAt`
    Pending,
    /// `actions[id].success = response or true`, stamped with `completedAt`
    Success,
    /// `actions[id].error = response`, stamped with `completedAt`
    Error,
}

/// Meta field that receives the payload `response`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseProp {
    /// `fetch.error`
    FetchError,
    /// `actions[id].success`
    ActionSuccess,
    /// `actions[id].error`
    ActionError,
}

/// One row of the dispatch table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handler {
    /// Event kind this row handles
    pub kind: EventKind,
    /// Replacement for the fetch state, if the row touches it
    pub fetch: Option<Delta<FetchTemplate>>,
    /// Replacement for `actions[actionId]`; `Delete` without an action id clears all actions
    pub action: Option<Delta<ActionTemplate>>,
    /// Drop every named action
    pub clear_actions: bool,
    /// Where the payload `response` goes
    pub response_prop: Option<ResponseProp>,
    /// Remove the entity value
    pub clear_model: bool,
}

impl Handler {
    const fn row(kind: EventKind) -> Self {
        Self {
            kind,
            fetch: None,
            action: None,
            clear_actions: false,
            response_prop: None,
            clear_model: false,
        }
    }

    const fn fetch(mut self, template: FetchTemplate) -> Self {
        self.fetch = Some(Delta::Set(template));
        self
    }

    const fn delete_fetch(mut self) -> Self {
        self.fetch = Some(Delta::Delete);
        self
    }

    const fn action(mut self, template: ActionTemplate) -> Self {
        self.action = Some(Delta::Set(template));
        self
    }

    const fn delete_action(mut self) -> Self {
        self.action = Some(Delta::Delete);
        self
    }

    const fn clear_actions(mut self) -> Self {
        self.clear_actions = true;
        self
    }

    const fn response(mut self, prop: ResponseProp) -> Self {
        self.response_prop = Some(prop);
        self
    }

    const fn clear_model(mut self) -> Self {
        self.clear_model = true;
        self
    }

    /// Whether this row operates on a named action and needs an `actionId`
    #[must_use]
    pub const fn is_action_scoped(&self) -> bool {
        matches!(self.action, Some(Delta::Set(_)))
    }
}

/// The dispatch table
pub static HANDLERS: [Handler; 11] = [
    Handler::row(EventKind::FetchPending)
        .fetch(FetchTemplate::Pending)
        .clear_actions()
        .clear_model(),
    Handler::row(EventKind::FetchSuccess)
        .fetch(FetchTemplate::Success(SuccessKind::Fetched))
        .clear_actions(),
    Handler::row(EventKind::FetchError)
        .fetch(FetchTemplate::Error)
        .response(ResponseProp::FetchError)
        .clear_model(),
    Handler::row(EventKind::ActionPending).action(ActionTemplate::Pending),
    Handler::row(EventKind::ActionSuccess)
        .action(ActionTemplate::Success)
        .response(ResponseProp::ActionSuccess),
    Handler::row(EventKind::ActionError)
        .action(ActionTemplate::Error)
        .response(ResponseProp::ActionError),
    Handler::row(EventKind::ActionClear).delete_action(),
    Handler::row(EventKind::Set).fetch(FetchTemplate::Success(SuccessKind::Set)),
    Handler::row(EventKind::SetData),
    Handler::row(EventKind::Data),
    Handler::row(EventKind::Delete).delete_fetch().clear_model(),
];

/// Row for an event kind
#[must_use]
pub fn handler_for(kind: EventKind) -> Option<&'static Handler> {
    HANDLERS.iter().find(|handler| handler.kind == kind)
}
