//! Opening a session for one CLI invocation.

use std::rc::Rc;
use std::sync::Arc;

use heroic_core::{
    toast_for, Config, Database, HttpRemoteStore, Identity, RemoteStore, SessionContext,
    SessionController, SessionStatus,
};

/// Guest session over the on-device database, or a signed-in session over
/// the configured remote store when `user` is given.
pub fn open(user: Option<&str>) -> Result<SessionController, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let slots = Rc::new(Database::open()?);

    let remote: Option<Arc<dyn RemoteStore>> = match user {
        Some(_) => match HttpRemoteStore::from_config(&config.remote) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %e, "remote store unavailable");
                None
            }
        },
        None => None,
    };

    let mut session = SessionController::new(SessionContext::from_config(&config), slots, remote);
    match user {
        Some(user_id) => session.on_identity_changed(Identity::SignedIn {
            user_id: user_id.to_string(),
        }),
        None => {
            session.enter_guest();
        }
    }

    if session.status() == SessionStatus::Degraded {
        report_events(&mut session);
        return Err("could not load tasks; check remote.base_url or the guest database".into());
    }
    // Session transitions are not worth a notice on every invocation.
    session.drain_events();
    Ok(session)
}

/// Print toasts for pending events to stderr.
pub fn report_events(session: &mut SessionController) {
    let guest = session.is_guest();
    for event in session.drain_events() {
        tracing::debug!(event = event.name(), "session event");
        if let Some(toast) = toast_for(&event, guest) {
            eprintln!("{}: {}", toast.title, toast.description);
        }
    }
}
