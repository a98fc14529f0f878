//! Korrelation von Funktionsaufrufen und Antworten
//!
//! Jeder ausgehende Funktionsaufruf wird unter seiner Sequenznummer
//! registriert, bevor er die Sende-Queue erreicht. Eine Antwort loest genau
//! einen Eintrag auf. Beim Schliessen der Session wird jeder offene Aufruf
//! mit [`BridgeError::SessionGeschlossen`] abgeschlossen.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use vimbridge_core::BufferId;
use vimbridge_protocol::{Antwort, FunctionCall};

use crate::error::{BridgeError, BridgeResult};

/// Ergebnis eines Funktionsaufrufs
pub type AufrufErgebnis = Result<Antwort, BridgeError>;

type Rueckruf = Box<dyn FnOnce(AufrufErgebnis) + Send + 'static>;

/// Ein gesendeter Funktionsaufruf, der noch auf seine Antwort wartet
pub struct AusstehenderAufruf {
    pub sequenz: u32,
    pub name: String,
    pub buffer_id: BufferId,
    rueckruf: Rueckruf,
}

impl AusstehenderAufruf {
    pub fn neu<F>(sequenz: u32, aufruf: &FunctionCall, rueckruf: F) -> Self
    where
        F: FnOnce(AufrufErgebnis) + Send + 'static,
    {
        Self {
            sequenz,
            name: aufruf.name.clone(),
            buffer_id: aufruf.buffer_id,
            rueckruf: Box::new(rueckruf),
        }
    }

    /// Ruft den Rueckruf genau einmal auf
    pub fn abschliessen(self, ergebnis: AufrufErgebnis) {
        (self.rueckruf)(ergebnis)
    }
}

impl fmt::Debug for AusstehenderAufruf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AusstehenderAufruf")
            .field("sequenz", &self.sequenz)
            .field("name", &self.name)
            .field("buffer_id", &self.buffer_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CorrelationTable
// ---------------------------------------------------------------------------

/// Offene Funktionsaufrufe einer Session, nach Sequenznummer
#[derive(Debug, Default)]
pub struct CorrelationTable {
    offen: Mutex<HashMap<u32, AusstehenderAufruf>>,
}

impl CorrelationTable {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen Aufruf
    ///
    /// Liefert einen verdraengten Eintrag zurueck, falls die Sequenz bereits
    /// belegt war (nur nach einem Umlauf aller 2^32 Sequenzen moeglich).
    pub fn registrieren(&self, aufruf: AusstehenderAufruf) -> Option<AusstehenderAufruf> {
        let verdraengt = self.offen.lock().insert(aufruf.sequenz, aufruf);
        if let Some(ref alt) = verdraengt {
            tracing::warn!(sequenz = alt.sequenz, name = %alt.name, "Offener Aufruf verdraengt");
        }
        verdraengt
    }

    /// Entfernt den Eintrag zu `sequenz`
    ///
    /// Eine zweite Antwort auf dieselbe Sequenz liefert `KorrelationFehlt`.
    pub fn aufloesen(&self, sequenz: u32) -> BridgeResult<AusstehenderAufruf> {
        self.offen
            .lock()
            .remove(&sequenz)
            .ok_or(BridgeError::KorrelationFehlt(sequenz))
    }

    pub fn enthaelt(&self, sequenz: u32) -> bool {
        self.offen.lock().contains_key(&sequenz)
    }

    /// Leert die Tabelle und liefert alle offenen Aufrufe nach Sequenz sortiert
    pub fn alle_abbrechen(&self) -> Vec<AusstehenderAufruf> {
        let mut offen: Vec<_> = self.offen.lock().drain().map(|(_, a)| a).collect();
        offen.sort_by_key(|a| a.sequenz);
        offen
    }

    pub fn anzahl(&self) -> usize {
        self.offen.lock().len()
    }

    pub fn ist_leer(&self) -> bool {
        self.offen.lock().is_empty()
    }
}
