//! Fehlertypen fuer die Bridge

use thiserror::Error;
use vimbridge_protocol::ProtokollFehler;

/// Fehlertyp fuer die Bridge
///
/// Protokoll- und Korrelationsfehler werden an der Session-Grenze behandelt
/// und erreichen den Aufrufer nur ueber Handler-Ergebnisse. Ein
/// Transportfehler beendet immer nur die betroffene Session.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Ungueltige Zeile oder falsches Argument
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Senden auf einer nicht aktiven Session
    #[error("Session geschlossen")]
    SessionGeschlossen,

    /// Antwort fuer eine unbekannte oder bereits aufgeloeste Sequenz
    #[error("Keine offene Anfrage fuer Sequenz {0}")]
    KorrelationFehlt(u32),

    /// Socket-IO-Fehler
    #[error("Transportfehler: {0}")]
    Transport(#[from] std::io::Error),

    /// Die Sende-Queue der Session ist voll
    #[error("Sende-Queue voll")]
    SendeQueueVoll,

    /// Editor erfuellt eine Pflicht-Faehigkeit nicht
    #[error("Editor-Faehigkeit fehlt: {0}")]
    FaehigkeitFehlt(String),

    /// Faehigkeits-Pruefung fehlgeschlagen (Start, Timeout, Ausgabe)
    #[error("Faehigkeits-Pruefung fehlgeschlagen: {0}")]
    Pruefung(String),

    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Operation erfordert einen laufenden Server
    #[error("Bridge-Server nicht gestartet")]
    NichtGestartet,
}

impl BridgeError {
    /// Erstellt einen Pruef-Fehler
    pub fn pruefung(msg: impl Into<String>) -> Self {
        Self::Pruefung(msg.into())
    }

    /// `true` wenn der Fehler die Session beendet
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::SessionGeschlossen)
    }
}

/// Result-Typ fuer die Bridge
pub type BridgeResult<T> = Result<T, BridgeError>;
