//! Laufzeit-Konfiguration der Bridge
//!
//! Wird vom Server-Binary aus der TOML-Konfiguration befuellt.

use std::path::PathBuf;

/// Konfiguration fuer den Bridge-Server
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Erwartetes `AUTH`-Passwort (None = keine Anmeldung noetig)
    pub passwort: Option<String>,
    /// Maximale gleichzeitige Sessions
    pub max_sessions: usize,
    /// Maximale Laenge einer eingehenden Zeile in Bytes
    pub max_zeilen_laenge: usize,
    /// Groesse der Sende-Queue pro Session
    pub sende_queue_groesse: usize,
    /// Editor-Programm fuer die Faehigkeits-Pruefung beim Start
    pub editor_programm: Option<PathBuf>,
    /// Maximale Frame-Groesse im Admin-Kanal
    pub admin_max_frame_groesse: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            passwort: None,
            max_sessions: 64,
            max_zeilen_laenge: vimbridge_protocol::codec::DEFAULT_MAX_ZEILEN_LAENGE,
            sende_queue_groesse: 256,
            editor_programm: None,
            admin_max_frame_groesse: vimbridge_protocol::admin::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
