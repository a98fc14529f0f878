//! Fehlertypen fuer das Editor-Protokoll

use thiserror::Error;

/// Fehler beim Parsen einer Zeile oder beim Lesen von Argumenten
///
/// Ein Protokollfehler betrifft immer nur eine einzelne Zeile. Die Session
/// verwirft die Zeile und bleibt bestehen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtokollFehler {
    #[error("Leere Zeile")]
    LeereZeile,

    #[error("Ungueltige Zeile: {0}")]
    UngueltigeZeile(String),

    #[error("Ungueltiger Event-Name: {0:?}")]
    UngueltigerName(String),

    #[error("Ungueltige Sequenznummer: {0:?}")]
    UngueltigeSequenz(String),

    #[error("Ungueltige Buffer-Nummer: {0:?}")]
    UngueltigeBufferId(String),

    #[error("String-Argument nicht abgeschlossen")]
    OffenerString,

    #[error("Argumente erschoepft: {erwartet} an Position {position} erwartet")]
    ArgumenteErschoepft {
        erwartet: &'static str,
        position: usize,
    },

    #[error("Falscher Argumenttyp an Position {position}: erwartet {erwartet}, gefunden {gefunden}")]
    FalscherTyp {
        erwartet: &'static str,
        gefunden: &'static str,
        position: usize,
    },

    #[error("Zeile zu lang (Maximum: {max} Bytes)")]
    ZeileZuLang { max: usize },

    #[error("Zeile ist kein gueltiges UTF-8")]
    KeinUtf8,

    #[error("Zeilenumbruch innerhalb einer Roh-Zeile")]
    Zeilenumbruch,
}

/// Result-Typ fuer das Protokoll-Crate
pub type ProtokollResult<T> = Result<T, ProtokollFehler>;
