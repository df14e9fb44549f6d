/// Admin panel dialogue handlers
pub mod admin;
/// Subscription gate
pub mod gate;
/// Commands, request intake and reply correlation
pub mod handlers;
/// Dialogue state machine types
pub mod state;
