//! Gemeinsame Identifikationstypen fuer vimbridge
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Session- und Buffer-Nummern zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};

/// Eindeutige Session-ID (eine Verbindung zu einer Editor-Instanz)
///
/// Wird vom Bridge-Server fortlaufend ab 1 vergeben.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl SessionId {
    /// Gibt die innere Nummer zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Buffer-Nummer des Editors, gueltig innerhalb einer Session
///
/// `0` steht fuer globale Events, die keinem Buffer zugeordnet sind.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BufferId(pub u32);

impl BufferId {
    /// Buffer-ID fuer globale Events
    pub const GLOBAL: BufferId = BufferId(0);

    /// Gibt die innere Nummer zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }

    /// `true` fuer die globale Buffer-ID 0
    pub fn ist_global(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_anzeige() {
        assert_eq!(SessionId(7).to_string(), "session:7");
    }

    #[test]
    fn buffer_id_global() {
        assert!(BufferId::GLOBAL.ist_global());
        assert!(BufferId::default().ist_global());
        assert!(!BufferId(3).ist_global());
        assert_eq!(BufferId(3).to_string(), "3");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let json = serde_json::to_string(&SessionId(42)).unwrap();
        assert_eq!(json, "42");
        let zurueck: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, SessionId(42));
    }
}
