//! Faehigkeiten einer Editor-Installation
//!
//! Ergebnis des Faehigkeits-Pruefers: eine Abbildung Faehigkeitsname -> bool.
//! Unbekannte Namen gelten als nicht vorhanden.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Editor kann in ein fremdes Fenster eingebettet werden
pub const EMBED: &str = "embed";
/// Editor spricht das Netbeans-Protokoll (Pflicht fuer eine Session)
pub const NETBEANS: &str = "netbeans";
/// Editor unterstuetzt `startDocumentListen`
pub const NETBEANS_DOCUMENT_LISTEN: &str = "netbeansDocumentListen";

/// Menge benannter Faehigkeiten
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Faehigkeiten {
    eintraege: BTreeMap<String, bool>,
}

impl Faehigkeiten {
    /// Erstellt eine leere Faehigkeitsmenge
    pub fn neu() -> Self {
        Self::default()
    }

    /// Setzt eine Faehigkeit (Builder-Stil)
    pub fn mit(mut self, name: impl Into<String>, vorhanden: bool) -> Self {
        self.setzen(name, vorhanden);
        self
    }

    /// Setzt eine Faehigkeit
    pub fn setzen(&mut self, name: impl Into<String>, vorhanden: bool) {
        self.eintraege.insert(name.into(), vorhanden);
    }

    /// Prueft ob eine Faehigkeit vorhanden ist
    pub fn hat(&self, name: &str) -> bool {
        self.eintraege.get(name).copied().unwrap_or(false)
    }

    /// Kurzform fuer die Pflicht-Faehigkeit `netbeans`
    pub fn hat_netbeans(&self) -> bool {
        self.hat(NETBEANS)
    }

    /// Alle bekannten Eintraege in Namensreihenfolge
    pub fn eintraege(&self) -> impl Iterator<Item = (&str, bool)> {
        self.eintraege.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }
}
