use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use crate::models::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

type Listener = Arc<dyn Fn(Option<&SessionUser>) + Send + Sync>;

/// Current-user identity plus sign-in/sign-out notifications.
///
/// Handed to views as a capability; nothing in the crate reaches for a global
/// session.
pub trait SessionGate: Send + Sync {
    fn current_user(&self) -> Option<SessionUser>;

    /// Registers `listener`, calls it once with the current state, then again
    /// on every change until the returned [`Subscription`] is dropped.
    fn subscribe(&self, listener: Box<dyn Fn(Option<&SessionUser>) + Send + Sync>)
    -> Subscription;

    fn sign_out(&self);
}

/// Handle that detaches a session listener when dropped.
#[must_use = "dropping a subscription immediately unsubscribes"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

#[derive(Default)]
struct SessionState {
    user: Option<SessionUser>,
    /// Bumped on every change; a dispatch stops once a newer one has run.
    generation: u64,
    listeners: BTreeMap<u64, Listener>,
    next_listener: u64,
}

/// Process-local session: identity is set by whoever verified credentials.
///
/// Notifications are delivered under `delivery`, so every listener sees
/// changes in the order they were made, starting with the snapshot it got on
/// subscribing. The lock is reentrant so listeners may sign in or out.
#[derive(Clone)]
pub struct LocalSession {
    state: Arc<Mutex<SessionState>>,
    delivery: Arc<ReentrantMutex<()>>,
}

impl Default for LocalSession {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            delivery: Arc::new(ReentrantMutex::new(())),
        }
    }
}

impl LocalSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: SessionUser) -> Self {
        let session = Self::new();
        session.state.lock().user = Some(user);
        session
    }

    pub fn sign_in(&self, user: SessionUser) {
        tracing::info!(user = %user.id, "session signed in");
        self.set_user(Some(user));
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn set_user(&self, user: Option<SessionUser>) {
        let _delivery = self.delivery.lock();
        // Listeners run outside the state lock so they may call back into the session.
        let (generation, listeners): (u64, Vec<Listener>) = {
            let mut state = self.state.lock();
            state.user = user.clone();
            state.generation += 1;
            (state.generation, state.listeners.values().cloned().collect())
        };
        for listener in listeners {
            if self.state.lock().generation != generation {
                break;
            }
            listener(user.as_ref());
        }
    }
}

fn detach_listener(state: Weak<Mutex<SessionState>>, id: u64) {
    if let Some(state) = state.upgrade() {
        state.lock().listeners.remove(&id);
    }
}

impl SessionGate for LocalSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.state.lock().user.clone()
    }

    fn subscribe(
        &self,
        listener: Box<dyn Fn(Option<&SessionUser>) + Send + Sync>,
    ) -> Subscription {
        let listener: Listener = Arc::from(listener);
        let _delivery = self.delivery.lock();
        let (id, current) = {
            let mut state = self.state.lock();
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.insert(id, Arc::clone(&listener));
            (id, state.user.clone())
        };
        listener(current.as_ref());

        let state = Arc::downgrade(&self.state);
        Subscription::new(move || detach_listener(state, id))
    }

    fn sign_out(&self) {
        if let Some(user) = self.current_user() {
            tracing::info!(user = %user.id, "session signed out");
        }
        self.set_user(None);
    }
}

/// "Chris" → "Chris'", "Anna" → "Anna's"; used for the account menu heading.
pub fn possessive_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return "Your".to_string();
    }
    if name.ends_with('s') || name.ends_with('S') {
        format!("{name}'")
    } else {
        format!("{name}'s")
    }
}
