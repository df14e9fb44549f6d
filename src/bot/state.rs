use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::MessageId;

/// Per-identity dialogue state. Held in process memory only; a restart
/// drops every session back to [`State::Idle`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub enum State {
    /// Normal operation: plain messages are relayed, replies correlated.
    #[default]
    Idle,
    /// `/admin` was issued; the next text input is checked as the login.
    AwaitingLogin,
    /// Login accepted; the next text input is checked as the password.
    AwaitingPassword,
    /// Panel is open and showing the action menu.
    Authorized(PanelSession),
    /// Panel is waiting for a contact, handle or id to add to the roster.
    AwaitingAddResponder(PanelSession),
    /// Panel is waiting for the id of the responder to demote.
    AwaitingRemoveResponder(PanelSession),
    /// Panel is waiting for a replacement admin password.
    AwaitingPasswordChange(PanelSession),
}

/// Bookkeeping carried through the authorized admin states. Tracks the
/// bot messages sent while the panel is open so logout can clear them.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PanelSession {
    pub messages: Vec<i32>,
}

impl PanelSession {
    pub fn remember(&mut self, id: MessageId) {
        self.messages.push(id.0);
    }
}

pub type RelayDialogue = Dialogue<State, InMemStorage<State>>;
