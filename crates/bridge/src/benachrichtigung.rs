//! Benachrichtigungen an externe Kollaborateure
//!
//! Die Bridge meldet Lebenszyklus- und Editor-Ereignisse ueber einen
//! `tokio::sync::broadcast`-Kanal. Pro Session wird genau ein
//! `SessionBeendet` versendet.

use vimbridge_core::{BufferId, SessionId};

/// Groesse des Broadcast-Kanals fuer Benachrichtigungen
pub const BENACHRICHTIGUNGS_KANAL_GROESSE: usize = 256;

/// Warum eine Session beendet wurde
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeendigungsGrund {
    /// `disconnect` oder `killed` vom Editor
    EditorGetrennt,
    /// Socket vom Editor geschlossen (EOF)
    VerbindungVerloren,
    /// IO-Fehler auf dem Socket
    Transport(String),
    /// Falsches `AUTH`-Passwort
    AuthFehlgeschlagen,
    /// `BridgeServer::stoppen`
    ServerStopp,
    /// Explizit durch einen Kollaborateur oder den Admin-Kanal
    Administrativ,
}

/// Ereignis fuer Kollaborateure (Editor-Support, Projekt-Modell, UI)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeBenachrichtigung {
    SessionAktiv {
        session: SessionId,
    },
    SessionBeendet {
        session: SessionId,
        grund: BeendigungsGrund,
    },
    /// `startupDone` empfangen
    EditorBereit {
        session: SessionId,
        version: Option<String>,
    },
    BufferGeoeffnet {
        session: SessionId,
        buffer: BufferId,
        pfad: String,
        geaendert: bool,
    },
    BufferGeschlossen {
        session: SessionId,
        buffer: BufferId,
    },
    BufferGespeichert {
        session: SessionId,
        buffer: BufferId,
    },
    /// Antwort auf `getCursor`
    Cursor {
        session: SessionId,
        buffer: BufferId,
        zeile: i64,
        spalte: i64,
        offset: i64,
    },
    /// `keyCommand` / `keyAtPos`
    Taste {
        session: SessionId,
        buffer: BufferId,
        taste: String,
        offset: Option<i64>,
    },
    TextEingefuegt {
        session: SessionId,
        buffer: BufferId,
        offset: i64,
        text: String,
    },
    TextEntfernt {
        session: SessionId,
        buffer: BufferId,
        offset: i64,
        laenge: i64,
    },
}

impl BridgeBenachrichtigung {
    /// Session auf die sich die Benachrichtigung bezieht
    pub fn session(&self) -> SessionId {
        match self {
            Self::SessionAktiv { session }
            | Self::SessionBeendet { session, .. }
            | Self::EditorBereit { session, .. }
            | Self::BufferGeoeffnet { session, .. }
            | Self::BufferGeschlossen { session, .. }
            | Self::BufferGespeichert { session, .. }
            | Self::Cursor { session, .. }
            | Self::Taste { session, .. }
            | Self::TextEingefuegt { session, .. }
            | Self::TextEntfernt { session, .. } => *session,
        }
    }
}
