//! Zeilen-Codec fuer das Editor-Protokoll
//!
//! Kumulativer Stream-Decoder: ein TCP-Read kann null, eine oder mehrere
//! vollstaendige Zeilen plus eine angefangene Zeile enthalten. Angefangene
//! Zeilen bleiben im Buffer bis das `\n` eintrifft.
//!
//! Ein Protokollfehler in einer Zeile wird als `Some(Err(..))` geliefert und
//! beendet den Stream nicht. Nur IO-Fehler sind fatal.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtokollFehler, ProtokollResult};
use crate::nachricht::{zeile_parsen, Antwort, Ausgehend, Eingang, Event};

/// Standard-maximale Zeilenlaenge (1 MB)
pub const DEFAULT_MAX_ZEILEN_LAENGE: usize = 1024 * 1024;

/// tokio-util Codec fuer das zeilenbasierte Editor-Protokoll
#[derive(Debug, Clone)]
pub struct NetbeansCodec {
    max_zeilen_laenge: usize,
    /// Bis hierhin wurde der Buffer bereits erfolglos nach `\n` durchsucht
    naechster_index: usize,
    /// Eine zu lange Zeile wird bis zum naechsten `\n` verworfen
    verwerfen: bool,
}

impl NetbeansCodec {
    pub fn new() -> Self {
        Self::with_max_laenge(DEFAULT_MAX_ZEILEN_LAENGE)
    }

    pub fn with_max_laenge(max_zeilen_laenge: usize) -> Self {
        Self {
            max_zeilen_laenge,
            naechster_index: 0,
            verwerfen: false,
        }
    }

    pub fn max_zeilen_laenge(&self) -> usize {
        self.max_zeilen_laenge
    }
}

impl Default for NetbeansCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for NetbeansCodec {
    type Item = ProtokollResult<Eingang>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let lese_ende = src.len().min(self.max_zeilen_laenge.saturating_add(1));
            let zeilenende = src[self.naechster_index..lese_ende]
                .iter()
                .position(|b| *b == b'\n');

            match (self.verwerfen, zeilenende) {
                (true, Some(offset)) => {
                    src.advance(self.naechster_index + offset + 1);
                    self.verwerfen = false;
                    self.naechster_index = 0;
                }
                (true, None) => {
                    src.advance(lese_ende);
                    self.naechster_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let index = self.naechster_index + offset;
                    self.naechster_index = 0;
                    let zeile = src.split_to(index + 1);
                    let zeile = &zeile[..zeile.len() - 1];

                    // Leerzeilen (auch nur "\r") werden uebersprungen
                    if zeile.iter().all(|b| *b == b'\r' || *b == b' ') {
                        continue;
                    }

                    let ergebnis = match std::str::from_utf8(zeile) {
                        Ok(text) => zeile_parsen(text),
                        Err(_) => Err(ProtokollFehler::KeinUtf8),
                    };
                    return Ok(Some(ergebnis));
                }
                (false, None) if src.len() > self.max_zeilen_laenge => {
                    self.verwerfen = true;
                    return Ok(Some(Err(ProtokollFehler::ZeileZuLang {
                        max: self.max_zeilen_laenge,
                    })));
                }
                (false, None) => {
                    self.naechster_index = lese_ende;
                    return Ok(None);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierungen
// ---------------------------------------------------------------------------

fn zeile_schreiben(zeile: &str, dst: &mut BytesMut) {
    dst.reserve(zeile.len() + 1);
    dst.put_slice(zeile.as_bytes());
    dst.put_u8(b'\n');
}

impl Encoder<Ausgehend> for NetbeansCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Ausgehend, dst: &mut BytesMut) -> Result<(), Self::Error> {
        zeile_schreiben(&item.zeile(), dst);
        Ok(())
    }
}

/// Editor-Seite: Events kodieren (Tests, Simulatoren)
impl Encoder<Event> for NetbeansCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Event, dst: &mut BytesMut) -> Result<(), Self::Error> {
        zeile_schreiben(&item.zeile(), dst);
        Ok(())
    }
}

impl Encoder<Antwort> for NetbeansCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Antwort, dst: &mut BytesMut) -> Result<(), Self::Error> {
        zeile_schreiben(&item.zeile(), dst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nachricht::{Command, FunctionCall};
    use crate::token::Token;
    use vimbridge_core::BufferId;

    fn alle_dekodieren(codec: &mut NetbeansCodec, buf: &mut BytesMut) -> Vec<ProtokollResult<Eingang>> {
        let mut ergebnis = Vec::new();
        while let Some(item) = codec.decode(buf).unwrap() {
            ergebnis.push(item);
        }
        ergebnis
    }

    const STROM: &str = concat!(
        "AUTH geheim\n",
        "0:version=0 \"2.5\"\n",
        "3:fileOpened=12 \"test.txt\" T F\n",
        "kaputt\n",
        "4 3 10 2 99\n",
        "3:insert=13 5 \"a\\nb\"\r\n",
        "0:disconnect=14\n",
    );

    #[test]
    fn mehrere_zeilen_in_einem_chunk() {
        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::from(STROM);
        let items = alle_dekodieren(&mut codec, &mut buf);
        assert_eq!(items.len(), 7);
        assert!(items[3].is_err(), "kaputte Zeile muss Fehler liefern");
        assert!(buf.is_empty());
    }

    #[test]
    fn angefangene_zeile_bleibt_im_buffer() {
        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::from("3:fileOpened=12 \"te");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 19);

        buf.extend_from_slice(b"st.txt\" T F\n");
        let item = codec.decode(&mut buf).unwrap().expect("Zeile erwartet");
        match item.unwrap() {
            Eingang::Event(ev) => assert_eq!(ev.args[0], Token::text("test.txt")),
            other => panic!("Event erwartet: {other:?}"),
        }
    }

    #[test]
    fn byteweise_zustellung_gleich_wie_am_stueck() {
        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::from(STROM);
        let am_stueck = alle_dekodieren(&mut codec, &mut buf);

        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::new();
        let mut byteweise = Vec::new();
        for b in STROM.as_bytes() {
            buf.put_u8(*b);
            byteweise.extend(alle_dekodieren(&mut codec, &mut buf));
        }

        assert_eq!(am_stueck, byteweise);
    }

    #[test]
    fn leerzeilen_werden_uebersprungen() {
        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::from("\n\r\n0:startupDone=0\n");
        let items = alle_dekodieren(&mut codec, &mut buf);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn zu_lange_zeile_wird_verworfen() {
        let mut codec = NetbeansCodec::with_max_laenge(16);
        let mut buf = BytesMut::new();
        buf.put_slice(&[b'x'; 40]);

        let item = codec.decode(&mut buf).unwrap();
        assert_eq!(item, Some(Err(ProtokollFehler::ZeileZuLang { max: 16 })));

        // Rest der langen Zeile plus eine gueltige Zeile
        buf.put_slice(b"yyyy\n0:save=1\n");
        let items = alle_dekodieren(&mut codec, &mut buf);
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Ok(Eingang::Event(ev)) if ev.name == "save"));
    }

    #[test]
    fn ungueltiges_utf8() {
        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::from(&[0xff, 0xfe, b'\n'][..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Err(ProtokollFehler::KeinUtf8))
        );
    }

    #[test]
    fn encode_decode_round_trip_event() {
        let mut codec = NetbeansCodec::new();
        let original = Event::neu(BufferId(3), "keyCommand", 9).mit_arg("F5");
        let mut buf = BytesMut::new();
        codec.encode(original.clone(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"3:keyCommand=9 \"F5\"\n");

        let zurueck = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(zurueck, Eingang::Event(original));
    }

    #[test]
    fn encode_ausgehend() {
        let mut codec = NetbeansCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Ausgehend::Command(Command::init_done(BufferId(3))), &mut buf)
            .unwrap();
        codec
            .encode(
                Ausgehend::Funktion {
                    aufruf: FunctionCall::get_cursor(BufferId(3)),
                    sequenz: 1,
                },
                &mut buf,
            )
            .unwrap();
        codec
            .encode(Ausgehend::Roh("0:raise!0".into()), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"3:initDone!0\n3:getCursor/1\n0:raise!0\n");
    }
}
