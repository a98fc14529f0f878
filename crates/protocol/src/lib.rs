//! vimbridge-protocol – Wire-Protokoll zwischen Bridge und Editor
//!
//! Zwei voneinander unabhaengige Unterprotokolle:
//! - **Editor-Protokoll**: zeilenbasiert, `<buf>:<name>=<seq> args` (siehe [`codec`])
//! - **Admin-Kanal**: 4 Byte Laenge (big-endian) + Payload (siehe [`admin`])

pub mod admin;
pub mod codec;
pub mod error;
pub mod nachricht;
pub mod token;

pub use admin::{AdminAnfrage, AdminAntwort, AdminCodec, AdminNachricht, SessionUebersicht};
pub use codec::NetbeansCodec;
pub use error::{ProtokollFehler, ProtokollResult};
pub use nachricht::{zeile_parsen, Antwort, Ausgehend, Command, Eingang, Event, FunctionCall};
pub use token::{ArgLeser, Token};
