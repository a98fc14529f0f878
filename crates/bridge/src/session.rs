//! Session: ein verbundener Editor
//!
//! Eine Session besitzt den Eingangspuffer samt Codec, den Sequenzzaehler,
//! die Buffer-Tabelle und die [`CorrelationTable`]. Ausgehende Nachrichten
//! laufen ueber eine begrenzte mpsc-Queue zum Verbindungs-Task, der sie in
//! Sende-Reihenfolge auf den Socket schreibt.
//!
//! ## Lebenszyklus
//!
//! ```text
//! Verbindend --(AUTH ok / kein Passwort)--> Aktiv --(schliessen)--> Schliessend --> Geschlossen
//! ```
//!
//! `schliessen` wirkt genau einmal: es bricht alle offenen Aufrufe ab,
//! verwirft die Buffer-Tabelle, bricht blockierte Socket-Operationen ueber
//! das [`CancellationToken`] ab und entfernt die Session aus dem Register.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Weak};

use bytes::BytesMut;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use vimbridge_core::{BufferId, Faehigkeiten, SessionId};
use vimbridge_protocol::{
    Antwort, Ausgehend, Command, Eingang, Event, FunctionCall, NetbeansCodec, ProtokollFehler,
    ProtokollResult, SessionUebersicht,
};

use crate::benachrichtigung::{BeendigungsGrund, BridgeBenachrichtigung};
use crate::config::BridgeConfig;
use crate::correlation::{AufrufErgebnis, AusstehenderAufruf, CorrelationTable};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{HandlerKontext, HandlerRegistry};

/// Alle aktiven Sessions eines Servers
pub type SessionRegister = DashMap<SessionId, Arc<Session>>;

// ---------------------------------------------------------------------------
// Zustand und Zustellung
// ---------------------------------------------------------------------------

/// Lebenszyklus-Zustand einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    /// Verbunden, wartet auf `AUTH`
    Verbindend,
    Aktiv,
    Schliessend,
    Geschlossen,
}

impl SessionZustand {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Verbindend => "verbindend",
            Self::Aktiv => "aktiv",
            Self::Schliessend => "schliessend",
            Self::Geschlossen => "geschlossen",
        }
    }

    fn ist_offen(&self) -> bool {
        matches!(self, Self::Verbindend | Self::Aktiv)
    }
}

/// Was mit einer eingehenden Zeile passiert ist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zustellung {
    /// Offener Funktionsaufruf aufgeloest
    Aufgeloest { sequenz: u32 },
    /// An einen Handler zugestellt
    Verteilt { event: String },
    /// Kein Handler registriert
    Unbehandelt { event: String },
    /// Antwort ohne offenen Aufruf
    KorrelationFehlt { sequenz: u32 },
    /// Zeile nicht parsebar, verworfen
    Protokollfehler(ProtokollFehler),
    /// Handler lieferte einen Fehler
    HandlerFehler { event: String, fehler: String },
    Authentifiziert,
    /// Im aktuellen Zustand nicht zulaessig
    Verworfen,
}

/// Eintrag der Buffer-Tabelle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEintrag {
    pub pfad: Option<String>,
    /// Vom Editor per `fileOpened` bestaetigt
    pub bestaetigt: bool,
}

/// Parameter fuer eine neue Session
#[derive(Debug, Clone)]
pub struct SessionOptionen {
    pub passwort: Option<String>,
    pub sende_queue_groesse: usize,
    pub max_zeilen_laenge: usize,
    pub faehigkeiten: Faehigkeiten,
}

impl SessionOptionen {
    pub fn aus_config(config: &BridgeConfig, faehigkeiten: Faehigkeiten) -> Self {
        Self {
            passwort: config.passwort.clone(),
            sende_queue_groesse: config.sende_queue_groesse,
            max_zeilen_laenge: config.max_zeilen_laenge,
            faehigkeiten,
        }
    }
}

impl Default for SessionOptionen {
    fn default() -> Self {
        Self::aus_config(&BridgeConfig::default(), Faehigkeiten::neu())
    }
}

// ---------------------------------------------------------------------------
// Interne Zustaende
// ---------------------------------------------------------------------------

struct Ausgang {
    /// None sobald die Session schliesst
    tx: Option<mpsc::Sender<Ausgehend>>,
    naechste_sequenz: u32,
}

impl Ausgang {
    /// Vergibt die naechste Sequenz, 0 bleibt fuer Commands reserviert
    fn sequenz_vergeben(&mut self) -> u32 {
        let sequenz = self.naechste_sequenz;
        self.naechste_sequenz = match self.naechste_sequenz.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        sequenz
    }
}

struct Eingangspuffer {
    codec: NetbeansCodec,
    puffer: BytesMut,
}

struct BufferTabelle {
    eintraege: HashMap<BufferId, BufferEintrag>,
    naechste_id: u32,
}

impl BufferTabelle {
    fn vergeben(&mut self) -> BufferId {
        while self.eintraege.contains_key(&BufferId(self.naechste_id)) {
            self.naechste_id += 1;
        }
        let id = BufferId(self.naechste_id);
        self.naechste_id += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Ein verbundener Editor
pub struct Session {
    id: SessionId,
    peer_addr: SocketAddr,
    passwort: Option<String>,
    faehigkeiten: Faehigkeiten,
    zustand: Mutex<SessionZustand>,
    ausgang: Mutex<Ausgang>,
    korrelation: CorrelationTable,
    buffer: Mutex<BufferTabelle>,
    eingang: Mutex<Eingangspuffer>,
    editor_version: Mutex<Option<String>>,
    abbruch: CancellationToken,
    benachrichtigungen: broadcast::Sender<BridgeBenachrichtigung>,
    register: Weak<SessionRegister>,
}

impl Session {
    /// Erstellt eine Session im Zustand `Verbindend`
    ///
    /// Der Receiver gehoert dem Verbindungs-Task.
    pub fn neu(
        id: SessionId,
        peer_addr: SocketAddr,
        optionen: SessionOptionen,
        benachrichtigungen: broadcast::Sender<BridgeBenachrichtigung>,
        register: Weak<SessionRegister>,
    ) -> (Arc<Self>, mpsc::Receiver<Ausgehend>) {
        let (tx, rx) = mpsc::channel(optionen.sende_queue_groesse.max(1));
        let session = Arc::new(Self {
            id,
            peer_addr,
            passwort: optionen.passwort,
            faehigkeiten: optionen.faehigkeiten,
            zustand: Mutex::new(SessionZustand::Verbindend),
            ausgang: Mutex::new(Ausgang {
                tx: Some(tx),
                naechste_sequenz: 1,
            }),
            korrelation: CorrelationTable::neu(),
            buffer: Mutex::new(BufferTabelle {
                eintraege: HashMap::new(),
                naechste_id: 1,
            }),
            eingang: Mutex::new(Eingangspuffer {
                codec: NetbeansCodec::with_max_laenge(optionen.max_zeilen_laenge),
                puffer: BytesMut::new(),
            }),
            editor_version: Mutex::new(None),
            abbruch: CancellationToken::new(),
            benachrichtigungen,
            register,
        });
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn zustand(&self) -> SessionZustand {
        *self.zustand.lock()
    }

    pub fn ist_aktiv(&self) -> bool {
        self.zustand() == SessionZustand::Aktiv
    }

    pub fn faehigkeiten(&self) -> &Faehigkeiten {
        &self.faehigkeiten
    }

    /// Token wird beim Schliessen ausgeloest
    pub fn abbruch_token(&self) -> CancellationToken {
        self.abbruch.clone()
    }

    pub fn editor_version(&self) -> Option<String> {
        self.editor_version.lock().clone()
    }

    pub fn editor_version_setzen(&self, version: impl Into<String>) {
        *self.editor_version.lock() = Some(version.into());
    }

    pub fn offene_aufrufe(&self) -> usize {
        self.korrelation.anzahl()
    }

    /// Sendet eine Benachrichtigung (ohne Empfaenger wird sie verworfen)
    pub fn benachrichtigen(&self, benachrichtigung: BridgeBenachrichtigung) {
        let _ = self.benachrichtigungen.send(benachrichtigung);
    }

    /// Sender fuer Rueckrufe, die die Session nicht besitzen
    pub fn benachrichtiger(&self) -> broadcast::Sender<BridgeBenachrichtigung> {
        self.benachrichtigungen.clone()
    }

    /// Uebergang `Verbindend -> Aktiv`
    pub fn aktivieren(&self) -> bool {
        {
            let mut zustand = self.zustand.lock();
            if *zustand != SessionZustand::Verbindend {
                return false;
            }
            *zustand = SessionZustand::Aktiv;
        }
        tracing::info!(session = %self.id, peer = %self.peer_addr, "Session aktiv");
        self.benachrichtigen(BridgeBenachrichtigung::SessionAktiv { session: self.id });
        true
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    fn einreihen(&self, ausgang: &Ausgang, nachricht: Ausgehend) -> BridgeResult<()> {
        if self.zustand() != SessionZustand::Aktiv {
            return Err(BridgeError::SessionGeschlossen);
        }
        let tx = ausgang.tx.as_ref().ok_or(BridgeError::SessionGeschlossen)?;
        tx.try_send(nachricht).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!(session = %self.id, "Sende-Queue voll, Nachricht verworfen");
                BridgeError::SendeQueueVoll
            }
            TrySendError::Closed(_) => BridgeError::SessionGeschlossen,
        })
    }

    /// Sendet einen Command (Sequenz 0, keine Antwort)
    pub fn senden(&self, command: Command) -> BridgeResult<()> {
        let ausgang = self.ausgang.lock();
        self.einreihen(&ausgang, Ausgehend::Command(command))
    }

    /// Sendet eine fertige Protokollzeile
    ///
    /// Zeilen mit eingebettetem Umbruch werden mit einem Protokollfehler
    /// abgelehnt.
    pub fn roh_senden(&self, zeile: impl Into<String>) -> BridgeResult<()> {
        let nachricht = Ausgehend::roh(zeile)?;
        let ausgang = self.ausgang.lock();
        self.einreihen(&ausgang, nachricht)
    }

    /// Sendet einen Funktionsaufruf und liefert die vergebene Sequenz
    ///
    /// Der Aufruf ist registriert bevor er die Sende-Queue erreicht. Der
    /// Rueckruf wird genau einmal aufgerufen: mit der Antwort oder mit
    /// `SessionGeschlossen`. Schlaegt das Einreihen fehl, wird er nie
    /// aufgerufen und der Fehler direkt geliefert.
    pub fn funktion_aufrufen<F>(&self, aufruf: FunctionCall, rueckruf: F) -> BridgeResult<u32>
    where
        F: FnOnce(AufrufErgebnis) + Send + 'static,
    {
        let (ergebnis, verdraengt) = {
            let mut ausgang = self.ausgang.lock();
            if self.zustand() != SessionZustand::Aktiv || ausgang.tx.is_none() {
                return Err(BridgeError::SessionGeschlossen);
            }
            let sequenz = ausgang.sequenz_vergeben();
            let verdraengt = self
                .korrelation
                .registrieren(AusstehenderAufruf::neu(sequenz, &aufruf, rueckruf));

            let ergebnis = match self.einreihen(&ausgang, Ausgehend::Funktion { aufruf, sequenz }) {
                Ok(()) => Ok(sequenz),
                Err(e) => {
                    let _ = self.korrelation.aufloesen(sequenz);
                    Err(e)
                }
            };
            (ergebnis, verdraengt)
        };

        // Rueckrufe nie unter dem Ausgangs-Lock
        if let Some(alt) = verdraengt {
            let sequenz = alt.sequenz;
            alt.abschliessen(Err(BridgeError::KorrelationFehlt(sequenz)));
        }
        ergebnis
    }

    /// Wie [`Session::funktion_aufrufen`], Antwort ueber einen oneshot-Kanal
    pub fn funktion_erwarten(
        &self,
        aufruf: FunctionCall,
    ) -> BridgeResult<oneshot::Receiver<AufrufErgebnis>> {
        let (tx, rx) = oneshot::channel();
        self.funktion_aufrufen(aufruf, move |ergebnis| {
            let _ = tx.send(ergebnis);
        })?;
        Ok(rx)
    }

    // -----------------------------------------------------------------------
    // Buffer-Tabelle
    // -----------------------------------------------------------------------

    /// Vergibt eine Buffer-ID und weist den Editor an, `pfad` zu oeffnen
    ///
    /// Die ID gilt als unbestaetigt bis der Editor `fileOpened` meldet.
    pub fn buffer_oeffnen(&self, pfad: &str) -> BridgeResult<BufferId> {
        let id = {
            let mut buffer = self.buffer.lock();
            let id = buffer.vergeben();
            buffer.eintraege.insert(
                id,
                BufferEintrag {
                    pfad: Some(pfad.to_string()),
                    bestaetigt: false,
                },
            );
            id
        };

        let titel = Path::new(pfad)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| pfad.to_string());

        let gesendet = self
            .senden(Command::edit_file(id, pfad))
            .and_then(|_| self.senden(Command::set_title(id, &titel)));
        if let Err(e) = gesendet {
            self.buffer.lock().eintraege.remove(&id);
            return Err(e);
        }

        tracing::debug!(session = %self.id, buffer = %id, pfad, "Buffer geoeffnet");
        Ok(id)
    }

    /// Aendert den Dateinamen eines bekannten Buffers
    pub fn buffer_umbenennen(&self, id: BufferId, pfad: &str) -> BridgeResult<()> {
        if !self.buffer.lock().eintraege.contains_key(&id) {
            return Err(BridgeError::NichtGefunden(format!("Buffer {}", id)));
        }
        self.senden(Command::set_full_name(id, pfad))?;
        if let Some(eintrag) = self.buffer.lock().eintraege.get_mut(&id) {
            eintrag.pfad = Some(pfad.to_string());
        }
        Ok(())
    }

    /// Vergibt eine bestaetigte ID fuer einen vom Editor geoeffneten Buffer
    pub fn buffer_zuweisen(&self, pfad: &str) -> BufferId {
        let mut buffer = self.buffer.lock();
        let id = buffer.vergeben();
        buffer.eintraege.insert(
            id,
            BufferEintrag {
                pfad: Some(pfad.to_string()),
                bestaetigt: true,
            },
        );
        id
    }

    /// Markiert `id` als vom Editor bestaetigt
    pub fn buffer_bestaetigen(&self, id: BufferId, pfad: Option<String>) {
        let mut buffer = self.buffer.lock();
        let eintrag = buffer.eintraege.entry(id).or_insert(BufferEintrag {
            pfad: None,
            bestaetigt: false,
        });
        eintrag.bestaetigt = true;
        if pfad.is_some() {
            eintrag.pfad = pfad;
        }
    }

    pub fn buffer_entfernen(&self, id: BufferId) -> Option<BufferEintrag> {
        self.buffer.lock().eintraege.remove(&id)
    }

    pub fn buffer_eintrag(&self, id: BufferId) -> Option<BufferEintrag> {
        self.buffer.lock().eintraege.get(&id).cloned()
    }

    /// Bekannte Buffer-IDs, sortiert
    pub fn buffer_ids(&self) -> Vec<BufferId> {
        let mut ids: Vec<BufferId> = self.buffer.lock().eintraege.keys().copied().collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Empfangen
    // -----------------------------------------------------------------------

    /// Fuettert einen Chunk vom Socket in den Decoder und stellt alle
    /// vollstaendigen Zeilen in Reihenfolge zu
    ///
    /// Chunk-Grenzen beliebig, auch byteweise. Nach dem Schliessen der
    /// Session (z.B. durch `disconnect`) werden restliche Zeilen verworfen.
    pub fn bytes_empfangen(
        self: &Arc<Self>,
        chunk: &[u8],
        registry: &HandlerRegistry,
    ) -> Vec<Zustellung> {
        if !self.zustand().ist_offen() {
            return Vec::new();
        }

        let eingaenge = {
            let mut eingang = self.eingang.lock();
            let Eingangspuffer { codec, puffer } = &mut *eingang;
            puffer.extend_from_slice(chunk);

            let mut eingaenge = Vec::new();
            loop {
                match codec.decode(puffer) {
                    Ok(Some(ergebnis)) => eingaenge.push(ergebnis),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(session = %self.id, fehler = %e, "Decoder-Fehler");
                        puffer.clear();
                        break;
                    }
                }
            }
            eingaenge
        };

        let mut zustellungen = Vec::with_capacity(eingaenge.len());
        for eingang in eingaenge {
            if !self.zustand().ist_offen() {
                break;
            }
            zustellungen.push(self.eingang_verarbeiten(eingang, registry));
        }
        zustellungen
    }

    /// Stellt eine dekodierte Zeile zu
    pub fn eingang_verarbeiten(
        self: &Arc<Self>,
        eingang: ProtokollResult<Eingang>,
        registry: &HandlerRegistry,
    ) -> Zustellung {
        let eingang = match eingang {
            Ok(eingang) => eingang,
            Err(fehler) => {
                tracing::warn!(session = %self.id, fehler = %fehler, "Ungueltige Zeile verworfen");
                return Zustellung::Protokollfehler(fehler);
            }
        };

        match eingang {
            Eingang::Auth(passwort) => self.auth_pruefen(&passwort),
            _ if self.zustand() != SessionZustand::Aktiv => {
                tracing::debug!(session = %self.id, "Zeile vor Anmeldung verworfen");
                Zustellung::Verworfen
            }
            Eingang::Antwort(antwort) => self.antwort_zustellen(antwort),
            Eingang::Event(event) => {
                // Antwort in Event-Form
                if event.sequenz != 0 && self.korrelation.enthaelt(event.sequenz) {
                    return self.antwort_zustellen(Antwort::neu(event.sequenz, event.args));
                }
                self.event_zustellen(event, registry)
            }
        }
    }

    fn auth_pruefen(&self, passwort: &str) -> Zustellung {
        match (self.zustand(), self.passwort.as_deref()) {
            (SessionZustand::Verbindend, Some(erwartet)) if erwartet == passwort => {
                self.aktivieren();
                Zustellung::Authentifiziert
            }
            (SessionZustand::Verbindend, Some(_)) => {
                tracing::warn!(session = %self.id, peer = %self.peer_addr, "Falsches Passwort");
                self.schliessen(BeendigungsGrund::AuthFehlgeschlagen);
                Zustellung::Verworfen
            }
            _ => {
                tracing::debug!(session = %self.id, "AUTH ignoriert");
                Zustellung::Verworfen
            }
        }
    }

    fn antwort_zustellen(&self, antwort: Antwort) -> Zustellung {
        let sequenz = antwort.sequenz;
        match self.korrelation.aufloesen(sequenz) {
            Ok(offen) => {
                tracing::trace!(session = %self.id, sequenz, name = %offen.name, "Antwort zugestellt");
                offen.abschliessen(Ok(antwort));
                Zustellung::Aufgeloest { sequenz }
            }
            Err(_) => {
                tracing::warn!(session = %self.id, sequenz, "Antwort ohne offene Anfrage verworfen");
                Zustellung::KorrelationFehlt { sequenz }
            }
        }
    }

    fn event_zustellen(self: &Arc<Self>, event: Event, registry: &HandlerRegistry) -> Zustellung {
        let Some(handler) = registry.nachschlagen(&event.name) else {
            tracing::debug!(session = %self.id, event = %event.name, "Kein Handler registriert");
            return Zustellung::Unbehandelt { event: event.name };
        };

        let mut ctx = HandlerKontext::neu(self, &event);
        match handler.ausfuehren(&mut ctx) {
            Ok(()) => Zustellung::Verteilt { event: event.name },
            Err(fehler) => {
                if fehler.ist_fatal() {
                    tracing::debug!(
                        session = %self.id,
                        event = %event.name,
                        fehler = %fehler,
                        "Handler abgebrochen, Session beendet"
                    );
                } else {
                    tracing::warn!(
                        session = %self.id,
                        event = %event.name,
                        fehler = %fehler,
                        "Handler fehlgeschlagen"
                    );
                }
                Zustellung::HandlerFehler {
                    event: event.name,
                    fehler: fehler.to_string(),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Schliessen
    // -----------------------------------------------------------------------

    /// Beendet die Session
    ///
    /// Liefert `false` wenn die Session bereits schliesst oder geschlossen
    /// ist. Nur der erste Aufruf bricht offene Aufrufe ab und sendet
    /// `SessionBeendet`.
    pub fn schliessen(&self, grund: BeendigungsGrund) -> bool {
        {
            let mut zustand = self.zustand.lock();
            if !zustand.ist_offen() {
                return false;
            }
            *zustand = SessionZustand::Schliessend;
        }

        self.abbruch.cancel();
        self.ausgang.lock().tx = None;

        for offen in self.korrelation.alle_abbrechen() {
            offen.abschliessen(Err(BridgeError::SessionGeschlossen));
        }
        self.buffer.lock().eintraege.clear();
        self.eingang.lock().puffer.clear();

        if let Some(register) = self.register.upgrade() {
            register.remove(&self.id);
        }

        *self.zustand.lock() = SessionZustand::Geschlossen;
        tracing::info!(session = %self.id, peer = %self.peer_addr, grund = ?grund, "Session beendet");
        self.benachrichtigen(BridgeBenachrichtigung::SessionBeendet {
            session: self.id,
            grund,
        });
        true
    }

    /// Kurzuebersicht fuer den Admin-Kanal
    pub fn uebersicht(&self) -> SessionUebersicht {
        SessionUebersicht {
            session_id: self.id,
            peer: self.peer_addr.to_string(),
            zustand: self.zustand().als_str().to_string(),
            buffer_anzahl: self.buffer.lock().eintraege.len(),
            offene_aufrufe: self.korrelation.anzahl(),
            editor_version: self.editor_version(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("zustand", &self.zustand())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_hilfen::{aktive_session, ausgehende};
    use vimbridge_protocol::Token;

    #[test]
    fn sequenzen_starten_bei_eins() {
        let (session, mut rx) = aktive_session(SessionOptionen::default());
        let a = session
            .funktion_aufrufen(FunctionCall::get_cursor(BufferId(1)), |_| {})
            .unwrap();
        let b = session
            .funktion_aufrufen(FunctionCall::get_cursor(BufferId(1)), |_| {})
            .unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(
            ausgehende(&mut rx),
            vec!["1:getCursor/1".to_string(), "1:getCursor/2".to_string()]
        );
    }

    #[test]
    fn sequenz_ueberspringt_null() {
        let mut ausgang = Ausgang {
            tx: None,
            naechste_sequenz: u32::MAX,
        };
        assert_eq!(ausgang.sequenz_vergeben(), u32::MAX);
        assert_eq!(ausgang.sequenz_vergeben(), 1);
    }

    #[test]
    fn command_hat_sequenz_null() {
        let (session, mut rx) = aktive_session(SessionOptionen::default());
        session.senden(Command::init_done(BufferId(3))).unwrap();
        assert_eq!(ausgehende(&mut rx), vec!["3:initDone!0".to_string()]);
        assert_eq!(session.offene_aufrufe(), 0);
    }

    #[test]
    fn antwort_loest_genau_einmal_auf() {
        let (session, _rx) = aktive_session(SessionOptionen::default());
        let registry = HandlerRegistry::neu();
        let treffer = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&treffer);
        let seq = session
            .funktion_aufrufen(FunctionCall::get_cursor(BufferId(3)), move |e| {
                t.lock().push(e.map(|a| a.args));
            })
            .unwrap();

        let z = session.bytes_empfangen(format!("{seq} 3 10 2 99\n").as_bytes(), &registry);
        assert_eq!(z, vec![Zustellung::Aufgeloest { sequenz: seq }]);

        let z = session.bytes_empfangen(format!("{seq} 3 10 2 99\n").as_bytes(), &registry);
        assert_eq!(z, vec![Zustellung::KorrelationFehlt { sequenz: seq }]);

        let treffer = treffer.lock();
        assert_eq!(treffer.len(), 1);
        assert_eq!(
            treffer[0].as_ref().unwrap(),
            &vec![Token::Zahl(3), Token::Zahl(10), Token::Zahl(2), Token::Zahl(99)]
        );
    }

    #[test]
    fn antwort_in_event_form() {
        let (session, _rx) = aktive_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        let rx_antwort = session
            .funktion_erwarten(FunctionCall::neu(BufferId(2), "getLength"))
            .unwrap();

        let z = session.bytes_empfangen(b"2:reply=1 42\n", &registry);
        assert_eq!(z, vec![Zustellung::Aufgeloest { sequenz: 1 }]);
        let antwort = rx_antwort.blocking_recv().unwrap().unwrap();
        assert_eq!(antwort.args, vec![Token::Zahl(42)]);
    }

    #[test]
    fn fehlerhafte_zeile_haelt_session_offen() {
        let (session, _rx) = aktive_session(SessionOptionen::default());
        let registry = HandlerRegistry::neu();
        let z = session.bytes_empfangen(b"3:=1\n0:unbekannt=0\n", &registry);
        assert!(matches!(z[0], Zustellung::Protokollfehler(_)));
        assert_eq!(
            z[1],
            Zustellung::Unbehandelt {
                event: "unbekannt".into()
            }
        );
        assert!(session.ist_aktiv());
    }

    #[test]
    fn chunk_grenzen_sind_egal() {
        let strom: &[u8] = b"0:version=0 \"9.0\"\n0:startupDone=0\n3:fileClosed=0\n0:foo=0\n";
        let registry = HandlerRegistry::standard();

        let (a, _rx_a) = aktive_session(SessionOptionen::default());
        let am_stueck = a.bytes_empfangen(strom, &registry);

        let (b, _rx_b) = aktive_session(SessionOptionen::default());
        let mut byteweise = Vec::new();
        for byte in strom {
            byteweise.extend(b.bytes_empfangen(std::slice::from_ref(byte), &registry));
        }
        assert_eq!(am_stueck, byteweise);
        assert_eq!(am_stueck.len(), 4);
    }

    #[test]
    fn schliessen_bricht_offene_aufrufe_ab() {
        let (session, _rx) = aktive_session(SessionOptionen::default());
        let ergebnisse = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let e = Arc::clone(&ergebnisse);
            session
                .funktion_aufrufen(FunctionCall::get_cursor(BufferId(1)), move |r| {
                    e.lock().push(matches!(r, Err(BridgeError::SessionGeschlossen)));
                })
                .unwrap();
        }
        session.buffer_zuweisen("/tmp/a.txt");

        assert!(session.schliessen(BeendigungsGrund::Administrativ));
        assert!(!session.schliessen(BeendigungsGrund::Administrativ));

        assert_eq!(ergebnisse.lock().as_slice(), [true, true, true]);
        assert_eq!(session.offene_aufrufe(), 0);
        assert!(session.buffer_ids().is_empty());
        assert_eq!(session.zustand(), SessionZustand::Geschlossen);
        assert!(session.abbruch_token().is_cancelled());
    }

    #[test]
    fn senden_nach_schliessen() {
        let (session, _rx) = aktive_session(SessionOptionen::default());
        session.schliessen(BeendigungsGrund::VerbindungVerloren);
        assert!(matches!(
            session.senden(Command::init_done(BufferId(1))),
            Err(BridgeError::SessionGeschlossen)
        ));
        assert!(matches!(
            session.funktion_aufrufen(FunctionCall::get_cursor(BufferId(1)), |_| {}),
            Err(BridgeError::SessionGeschlossen)
        ));
    }

    #[test]
    fn volle_queue() {
        let optionen = SessionOptionen {
            sende_queue_groesse: 1,
            ..SessionOptionen::default()
        };
        let (session, _rx) = aktive_session(optionen);
        session.senden(Command::init_done(BufferId(1))).unwrap();
        assert!(matches!(
            session.senden(Command::init_done(BufferId(1))),
            Err(BridgeError::SendeQueueVoll)
        ));
        // Fehlgeschlagener Aufruf bleibt nicht registriert
        assert!(session
            .funktion_aufrufen(FunctionCall::get_cursor(BufferId(1)), |_| {})
            .is_err());
        assert_eq!(session.offene_aufrufe(), 0);
    }

    #[test]
    fn auth_mit_passwort() {
        let optionen = SessionOptionen {
            passwort: Some("geheim".into()),
            ..SessionOptionen::default()
        };
        let (tx, _) = broadcast::channel(16);
        let (session, _rx) = Session::neu(
            SessionId(1),
            "127.0.0.1:1".parse().unwrap(),
            optionen,
            tx,
            Weak::new(),
        );
        let registry = HandlerRegistry::standard();

        // Vor der Anmeldung wird nichts zugestellt
        let z = session.bytes_empfangen(b"0:startupDone=0\n", &registry);
        assert_eq!(z, vec![Zustellung::Verworfen]);

        let z = session.bytes_empfangen(b"AUTH geheim\n", &registry);
        assert_eq!(z, vec![Zustellung::Authentifiziert]);
        assert!(session.ist_aktiv());
    }

    #[test]
    fn falsches_passwort_schliesst() {
        let optionen = SessionOptionen {
            passwort: Some("geheim".into()),
            ..SessionOptionen::default()
        };
        let (tx, mut events) = broadcast::channel(16);
        let (session, _rx) = Session::neu(
            SessionId(4),
            "127.0.0.1:1".parse().unwrap(),
            optionen,
            tx,
            Weak::new(),
        );
        let registry = HandlerRegistry::neu();
        session.bytes_empfangen(b"AUTH falsch\n0:startupDone=0\n", &registry);
        assert_eq!(session.zustand(), SessionZustand::Geschlossen);
        assert_eq!(
            events.try_recv().unwrap(),
            BridgeBenachrichtigung::SessionBeendet {
                session: SessionId(4),
                grund: BeendigungsGrund::AuthFehlgeschlagen
            }
        );
    }

    #[test]
    fn buffer_oeffnen_sendet_edit_file() {
        let (session, mut rx) = aktive_session(SessionOptionen::default());
        let id = session.buffer_oeffnen("/src/main.rs").unwrap();
        assert_eq!(id, BufferId(1));
        assert_eq!(
            ausgehende(&mut rx),
            vec![
                "1:editFile!0 \"/src/main.rs\"".to_string(),
                "1:setTitle!0 \"main.rs\"".to_string()
            ]
        );
        let eintrag = session.buffer_eintrag(id).unwrap();
        assert!(!eintrag.bestaetigt);

        session.buffer_bestaetigen(id, None);
        assert!(session.buffer_eintrag(id).unwrap().bestaetigt);

        session.buffer_umbenennen(id, "/src/lib.rs").unwrap();
        assert_eq!(
            ausgehende(&mut rx),
            vec!["1:setFullName!0 \"/src/lib.rs\"".to_string()]
        );
        assert!(matches!(
            session.buffer_umbenennen(BufferId(9), "x"),
            Err(BridgeError::NichtGefunden(_))
        ));
    }

    #[test]
    fn register_eintrag_wird_entfernt() {
        let register: Arc<SessionRegister> = Arc::new(DashMap::new());
        let (tx, _) = broadcast::channel(16);
        let (session, _rx) = Session::neu(
            SessionId(7),
            "127.0.0.1:1".parse().unwrap(),
            SessionOptionen::default(),
            tx,
            Arc::downgrade(&register),
        );
        register.insert(session.id(), Arc::clone(&session));
        session.schliessen(BeendigungsGrund::ServerStopp);
        assert!(register.is_empty());
    }
}
