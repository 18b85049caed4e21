//! View models for the graph list and graph detail screens.
//!
//! A view owns its local state exclusively. It learns about the signed-in user
//! through a [`SessionFeed`], talks to persistence only through
//! [`GraphRepository`](crate::operations::GraphRepository), and reports
//! navigation by returning a [`Route`](crate::routes::Route). Failures never
//! escape a view: they become the `error` string shown inline.

pub mod detail;
pub mod list;

use tokio::sync::mpsc;

use crate::session::{SessionGate, SessionUser, Subscription};

pub use detail::{DetailState, GraphDetailView, SettingsDraft};
pub use list::{GraphCard, GraphListView, NewGraphForm};

/// Session changes queued for a view between event-loop turns.
#[derive(Debug)]
pub struct SessionFeed {
    receiver: mpsc::UnboundedReceiver<Option<SessionUser>>,
    _subscription: Subscription,
}

impl SessionFeed {
    /// Subscribes to `gate`; the current state is queued immediately.
    pub fn attach(gate: &dyn SessionGate) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = gate.subscribe(Box::new(move |user: Option<&SessionUser>| {
            // A closed receiver means the view is gone.
            let _ = sender.send(user.cloned());
        }));
        Self {
            receiver,
            _subscription: subscription,
        }
    }

    /// Drains pending changes and returns the most recent one, if any.
    pub fn latest(&mut self) -> Option<Option<SessionUser>> {
        let mut latest = None;
        while let Ok(user) = self.receiver.try_recv() {
            latest = Some(user);
        }
        latest
    }
}
