//! Wire-Format fuer den Admin-Kanal
//!
//! Frame-basiertes Protokoll, unabhaengig vom zeilenbasierten Editor-Protokoll.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Ein Frame wird erst extrahiert wenn Laengen-Feld und Payload vollstaendig
//! im Buffer liegen. Der Encoder reicht rohe Payloads unveraendert durch und
//! serialisiert nur bekannte Strukturen ([`AdminAntwort`]) als JSON.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use vimbridge_core::SessionId;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Anfrage eines Admin-Clients (JSON-Payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "befehl", rename_all = "snake_case")]
pub enum AdminAnfrage {
    SessionsAuflisten,
    AnAlleSenden { zeile: String },
    SessionBeenden { session_id: SessionId },
}

/// Kurzuebersicht einer Session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUebersicht {
    pub session_id: SessionId,
    pub peer: String,
    pub zustand: String,
    pub buffer_anzahl: usize,
    pub offene_aufrufe: usize,
    pub editor_version: Option<String>,
}

/// Antwort der Bridge an einen Admin-Client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum AdminAntwort {
    Sessions { sessions: Vec<SessionUebersicht> },
    Gesendet { anzahl: usize },
    Beendet { session_id: SessionId, gefunden: bool },
    Fehler { nachricht: String },
}

/// Ausgehender Admin-Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminNachricht {
    /// Wird unveraendert gerahmt
    Roh(Bytes),
    /// Wird als JSON serialisiert
    Antwort(AdminAntwort),
}

// ---------------------------------------------------------------------------
// AdminCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer den laengen-praefixierten Admin-Kanal
#[derive(Debug, Clone)]
pub struct AdminCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl AdminCodec {
    /// Erstellt einen neuen `AdminCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for AdminCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AdminCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<AdminNachricht> for AdminCodec {
    type Error = io::Error;

    fn encode(&mut self, item: AdminNachricht, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = match item {
            AdminNachricht::Roh(bytes) => bytes,
            AdminNachricht::Antwort(antwort) => {
                let json = serde_json::to_vec(&antwort).map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("JSON-Serialisierung fehlgeschlagen: {}", e),
                    )
                })?;
                Bytes::from(json)
            }
        };

        if payload.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    payload.len(),
                    self.max_frame_size
                ),
            ));
        }

        dst.reserve(LENGTH_FIELD_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

/// Dekodiert die JSON-Payload eines Admin-Frames
pub fn anfrage_parsen(payload: &[u8]) -> Result<AdminAnfrage, serde_json::Error> {
    serde_json::from_slice(payload)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
