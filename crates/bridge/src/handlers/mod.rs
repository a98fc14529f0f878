//! Eingebaute Event-Handler
//!
//! Jeder Handler liest seine Argumente positionsweise ueber den
//! [`ArgLeser`](vimbridge_protocol::ArgLeser) und meldet das Ergebnis als
//! [`BridgeBenachrichtigung`](crate::BridgeBenachrichtigung).

pub mod buffer_handler;
pub mod editor_handler;
pub mod lifecycle_handler;

use crate::registry::HandlerRegistry;

/// Event-Namen der eingebauten Handler
pub mod namen {
    pub const FILE_OPENED: &str = "fileOpened";
    pub const FILE_CLOSED: &str = "fileClosed";
    pub const SAVE: &str = "save";
    pub const DISCONNECT: &str = "disconnect";
    pub const KILLED: &str = "killed";
    pub const STARTUP_DONE: &str = "startupDone";
    pub const VERSION: &str = "version";
    pub const KEY_COMMAND: &str = "keyCommand";
    pub const KEY_AT_POS: &str = "keyAtPos";
    pub const INSERT: &str = "insert";
    pub const REMOVE: &str = "remove";
}

/// Registriert alle eingebauten Handler
pub fn standard_registrieren(registry: &HandlerRegistry) {
    registry.registrieren(namen::FILE_OPENED, buffer_handler::FileOpenedHandler);
    registry.registrieren(namen::FILE_CLOSED, buffer_handler::FileClosedHandler);
    registry.registrieren(namen::SAVE, buffer_handler::SaveHandler);

    registry.registrieren(namen::DISCONNECT, lifecycle_handler::DisconnectHandler);
    registry.registrieren(namen::STARTUP_DONE, lifecycle_handler::StartupDoneHandler);
    registry.registrieren(namen::VERSION, lifecycle_handler::VersionHandler);
    if let Err(e) = registry.alias_registrieren(namen::KILLED, namen::DISCONNECT) {
        tracing::error!(fehler = %e, "Alias fuer 'killed' fehlgeschlagen");
    }

    registry.registrieren(namen::KEY_COMMAND, editor_handler::KeyCommandHandler);
    registry.registrieren(namen::KEY_AT_POS, editor_handler::KeyAtPosHandler);
    registry.registrieren(namen::INSERT, editor_handler::InsertHandler);
    registry.registrieren(namen::REMOVE, editor_handler::RemoveHandler);
}

#[cfg(test)]
pub(crate) mod test_hilfen {
    use std::sync::{Arc, Weak};

    use tokio::sync::{broadcast, mpsc};
    use vimbridge_core::SessionId;
    use vimbridge_protocol::Ausgehend;

    use crate::benachrichtigung::BridgeBenachrichtigung;
    use crate::session::{Session, SessionOptionen};

    /// Aktive Session ohne Register und ohne Socket
    pub fn aktive_session(optionen: SessionOptionen) -> (Arc<Session>, mpsc::Receiver<Ausgehend>) {
        let (tx, _) = broadcast::channel(64);
        let (session, rx) = Session::neu(
            SessionId(1),
            "127.0.0.1:40000".parse().unwrap(),
            optionen,
            tx,
            Weak::new(),
        );
        session.aktivieren();
        (session, rx)
    }

    /// Wie [`aktive_session`], mit Empfaenger fuer Benachrichtigungen
    pub fn beobachtete_session(
        optionen: SessionOptionen,
    ) -> (
        Arc<Session>,
        mpsc::Receiver<Ausgehend>,
        broadcast::Receiver<BridgeBenachrichtigung>,
    ) {
        let (tx, events) = broadcast::channel(64);
        let (session, rx) = Session::neu(
            SessionId(1),
            "127.0.0.1:40000".parse().unwrap(),
            optionen,
            tx,
            Weak::new(),
        );
        session.aktivieren();
        (session, rx, events)
    }

    /// Alle bisher eingereihten Nachrichten als Wire-Zeilen
    pub fn ausgehende(rx: &mut mpsc::Receiver<Ausgehend>) -> Vec<String> {
        let mut zeilen = Vec::new();
        while let Ok(nachricht) = rx.try_recv() {
            zeilen.push(nachricht.zeile());
        }
        zeilen
    }

    /// Alle Benachrichtigungen ausser `SessionAktiv`
    pub fn benachrichtigungen(
        events: &mut broadcast::Receiver<BridgeBenachrichtigung>,
    ) -> Vec<BridgeBenachrichtigung> {
        let mut liste = Vec::new();
        while let Ok(b) = events.try_recv() {
            if !matches!(b, BridgeBenachrichtigung::SessionAktiv { .. }) {
                liste.push(b);
            }
        }
        liste
    }
}
