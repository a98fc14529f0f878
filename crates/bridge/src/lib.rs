//! vimbridge-bridge – Protokoll-Engine fuer externe Editoren
//!
//! Nimmt Verbindungen von Editor-Prozessen an, zerlegt deren Zeilen in
//! typisierte Events, verteilt sie nach Event-Namen an Handler, ordnet
//! Antworten den ausstehenden Funktionsaufrufen zu und schreibt Commands
//! und Funktionsaufrufe mit korrekter Sequenz zurueck.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (BridgeServer)
//!     |
//!     v
//! EditorVerbindung (pro Verbindung ein Task)
//!     |  Bytes -> Session::bytes_empfangen -> NetbeansCodec
//!     v
//! Session
//!     +-- CorrelationTable  (Antwort -> ausstehender Aufruf)
//!     +-- HandlerRegistry   (Event-Name -> Handler)
//!     +-- Sende-Queue       (Command / FunctionCall -> Socket)
//!
//! AdminKanal           – Laengen-praefixierte JSON-Anfragen
//! FaehigkeitsPruefer   – Editor-Features vor dem Start ermitteln
//! ```

pub mod admin;
pub mod benachrichtigung;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod handlers;
pub mod probe;
pub mod registry;
pub mod server;
pub mod session;

// Bequeme Re-Exporte
pub use benachrichtigung::{BeendigungsGrund, BridgeBenachrichtigung};
pub use config::BridgeConfig;
pub use correlation::{AufrufErgebnis, CorrelationTable};
pub use error::{BridgeError, BridgeResult};
pub use probe::{FaehigkeitsPruefer, VimSkriptPruefer};
pub use registry::{EventHandler, HandlerKontext, HandlerRegistry};
pub use server::{BridgeServer, BridgeState};
pub use session::{Session, SessionZustand, Zustellung};
