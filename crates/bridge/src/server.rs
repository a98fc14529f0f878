//! Bridge-Server – Bindet den Socket und verwaltet alle Sessions
//!
//! Der `BridgeServer` besitzt den Listener-Task, das Session-Register und
//! die Handler-Registry. Jede akzeptierte Verbindung wird zur [`Session`]
//! mit eigenem Verbindungs-Task.
//!
//! ## Concurrency-Modell
//! Alle Tasks laufen auf einem [`TaskTracker`]. `stoppen` loest die
//! Abbruch-Tokens aller Sessions gleichzeitig aus und wartet danach auf den
//! Tracker: die Stop-Latenz entspricht dem langsamsten einzelnen Socket,
//! nicht der Summe.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vimbridge_core::{Faehigkeiten, SessionId};
use vimbridge_protocol::{Ausgehend, SessionUebersicht};

use crate::admin::AdminKanal;
use crate::benachrichtigung::{
    BeendigungsGrund, BridgeBenachrichtigung, BENACHRICHTIGUNGS_KANAL_GROESSE,
};
use crate::config::BridgeConfig;
use crate::connection::EditorVerbindung;
use crate::error::{BridgeError, BridgeResult};
use crate::probe::FaehigkeitsPruefer;
use crate::registry::{EventHandler, HandlerRegistry};
use crate::session::{Session, SessionOptionen, SessionRegister, SessionZustand};

// ---------------------------------------------------------------------------
// BridgeState
// ---------------------------------------------------------------------------

/// Gemeinsamer Zustand (Arc-geteilt zwischen Server, Accept- und Admin-Task)
pub struct BridgeState {
    pub config: BridgeConfig,
    pub registry: Arc<HandlerRegistry>,
    sessions: Arc<SessionRegister>,
    benachrichtigungen: broadcast::Sender<BridgeBenachrichtigung>,
    faehigkeiten: RwLock<Faehigkeiten>,
    naechste_session_id: AtomicU32,
}

impl BridgeState {
    pub fn neu(config: BridgeConfig, registry: Arc<HandlerRegistry>) -> Arc<Self> {
        let (benachrichtigungen, _) = broadcast::channel(BENACHRICHTIGUNGS_KANAL_GROESSE);
        Arc::new(Self {
            config,
            registry,
            sessions: Arc::new(DashMap::new()),
            benachrichtigungen,
            faehigkeiten: RwLock::new(Faehigkeiten::neu()),
            naechste_session_id: AtomicU32::new(1),
        })
    }

    /// Legt eine Session an und traegt sie ins Register ein
    pub fn session_anlegen(
        &self,
        peer_addr: SocketAddr,
    ) -> (Arc<Session>, tokio::sync::mpsc::Receiver<vimbridge_protocol::Ausgehend>) {
        let id = SessionId(self.naechste_session_id.fetch_add(1, Ordering::Relaxed));
        let optionen = SessionOptionen::aus_config(&self.config, self.faehigkeiten());
        let (session, rx) = Session::neu(
            id,
            peer_addr,
            optionen,
            self.benachrichtigungen.clone(),
            Arc::downgrade(&self.sessions),
        );
        self.sessions.insert(id, Arc::clone(&session));
        (session, rx)
    }

    pub fn session_holen(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| Arc::clone(s.value()))
    }

    pub fn session_anzahl(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot aller Sessions (ohne DashMap-Guards)
    pub fn alle_sessions(&self) -> Vec<Arc<Session>> {
        let mut alle: Vec<Arc<Session>> =
            self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        alle.sort_by_key(|s| s.id());
        alle
    }

    /// Sendet eine rohe Zeile an alle aktiven Sessions
    ///
    /// Liefert die Anzahl der Sessions, die die Zeile angenommen haben.
    pub fn an_alle_senden(&self, zeile: &str) -> BridgeResult<usize> {
        // Einmal vorab pruefen, damit keine Session eine halbe Zeile bekommt
        Ausgehend::roh(zeile)?;
        Ok(self
            .alle_sessions()
            .iter()
            .filter(|s| s.zustand() == SessionZustand::Aktiv)
            .filter(|s| match s.roh_senden(zeile) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(session = %s.id(), fehler = %e, "Broadcast nicht zugestellt");
                    false
                }
            })
            .count())
    }

    /// Beendet eine einzelne Session
    pub fn session_beenden(&self, id: SessionId, grund: BeendigungsGrund) -> bool {
        match self.session_holen(id) {
            Some(session) => session.schliessen(grund),
            None => false,
        }
    }

    /// Uebersicht aller Sessions, nach ID sortiert
    pub fn sessions(&self) -> Vec<SessionUebersicht> {
        self.alle_sessions().iter().map(|s| s.uebersicht()).collect()
    }

    pub fn faehigkeiten(&self) -> Faehigkeiten {
        self.faehigkeiten.read().clone()
    }

    pub fn abonnieren(&self) -> broadcast::Receiver<BridgeBenachrichtigung> {
        self.benachrichtigungen.subscribe()
    }
}

// ---------------------------------------------------------------------------
// BridgeServer
// ---------------------------------------------------------------------------

struct Laufzeit {
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    adresse: SocketAddr,
    admin_adresse: Option<SocketAddr>,
}

/// TCP-Server fuer Editor-Verbindungen
pub struct BridgeServer {
    state: Arc<BridgeState>,
    pruefer: Option<Arc<dyn FaehigkeitsPruefer>>,
    laufzeit: Mutex<Option<Laufzeit>>,
    tracker: TaskTracker,
}

impl BridgeServer {
    pub fn neu(config: BridgeConfig, registry: HandlerRegistry) -> Self {
        Self {
            state: BridgeState::neu(config, Arc::new(registry)),
            pruefer: None,
            laufzeit: Mutex::new(None),
            tracker: TaskTracker::new(),
        }
    }

    /// Faehigkeits-Pruefung beim Start (nur mit `editor_programm`)
    pub fn mit_pruefer(mut self, pruefer: Arc<dyn FaehigkeitsPruefer>) -> Self {
        self.pruefer = Some(pruefer);
        self
    }

    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// Bindet den Listener und startet die Accept-Loop
    ///
    /// Idempotent: laeuft der Server bereits, wird die gebundene Adresse
    /// geliefert. Bind-Fehler und eine fehlende `netbeans`-Faehigkeit gehen
    /// an den Aufrufer.
    pub async fn starten(&self, adresse: SocketAddr) -> BridgeResult<SocketAddr> {
        if let Some(laufzeit) = self.laufzeit.lock().as_ref() {
            return Ok(laufzeit.adresse);
        }

        if let (Some(programm), Some(pruefer)) = (&self.state.config.editor_programm, &self.pruefer) {
            let faehigkeiten = pruefer.pruefen(programm).await?;
            if !faehigkeiten.hat_netbeans() {
                tracing::error!(programm = %programm.display(), "Editor ohne Netbeans-Unterstuetzung");
                return Err(BridgeError::FaehigkeitFehlt(
                    vimbridge_core::faehigkeiten::NETBEANS.to_string(),
                ));
            }
            *self.state.faehigkeiten.write() = faehigkeiten;
        }

        let listener = TcpListener::bind(adresse).await?;
        let lokale_adresse = listener.local_addr()?;

        let mut laufzeit = self.laufzeit.lock();
        if let Some(l) = laufzeit.as_ref() {
            // Paralleler Start hat gewonnen
            return Ok(l.adresse);
        }
        let shutdown = CancellationToken::new();
        let accept_task = self.tracker.spawn(accept_loop(
            listener,
            Arc::clone(&self.state),
            shutdown.clone(),
            self.tracker.clone(),
        ));
        *laufzeit = Some(Laufzeit {
            shutdown,
            accept_task,
            adresse: lokale_adresse,
            admin_adresse: None,
        });
        drop(laufzeit);

        tracing::info!(adresse = %lokale_adresse, "Bridge-Server gestartet");
        Ok(lokale_adresse)
    }

    /// Startet den Admin-Kanal auf einem eigenen Listener
    pub async fn admin_starten(&self, adresse: SocketAddr) -> BridgeResult<SocketAddr> {
        let shutdown = match self.laufzeit.lock().as_ref() {
            Some(Laufzeit {
                admin_adresse: Some(a),
                ..
            }) => return Ok(*a),
            Some(l) => l.shutdown.clone(),
            None => return Err(BridgeError::NichtGestartet),
        };

        let listener = TcpListener::bind(adresse).await?;
        let lokale_adresse = listener.local_addr()?;
        if let Some(l) = self.laufzeit.lock().as_mut() {
            l.admin_adresse = Some(lokale_adresse);
        }

        let kanal = AdminKanal::neu(Arc::clone(&self.state), self.tracker.clone());
        self.tracker.spawn(kanal.accept_loop(listener, shutdown));
        tracing::info!(adresse = %lokale_adresse, "Admin-Kanal gestartet");
        Ok(lokale_adresse)
    }

    /// Stoppt Listener und alle Sessions
    ///
    /// Jede Session wird genau einmal geschlossen. Kehrt zurueck, sobald alle
    /// Tasks beendet sind. Ohne laufenden Server ein No-op.
    pub async fn stoppen(&self) {
        let Some(laufzeit) = self.laufzeit.lock().take() else {
            return;
        };
        laufzeit.shutdown.cancel();

        // Erst nach dem Ende der Accept-Loop entstehen keine Sessions mehr
        if let Err(e) = laufzeit.accept_task.await {
            tracing::error!(fehler = %e, "Accept-Loop abgebrochen");
        }

        let sessions = self.state.alle_sessions();
        tracing::info!(sessions = sessions.len(), "Bridge-Server stoppt");
        for session in &sessions {
            session.schliessen(BeendigungsGrund::ServerStopp);
        }

        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
        tracing::info!(adresse = %laufzeit.adresse, "Bridge-Server gestoppt");
    }

    pub fn laeuft(&self) -> bool {
        self.laufzeit.lock().is_some()
    }

    pub fn lokale_adresse(&self) -> Option<SocketAddr> {
        self.laufzeit.lock().as_ref().map(|l| l.adresse)
    }

    pub fn session_holen(&self, id: SessionId) -> Option<Arc<Session>> {
        self.state.session_holen(id)
    }

    pub fn an_alle_senden(&self, zeile: &str) -> BridgeResult<usize> {
        self.state.an_alle_senden(zeile)
    }

    pub fn sessions(&self) -> Vec<SessionUebersicht> {
        self.state.sessions()
    }

    pub fn handler_registrieren<H>(&self, name: impl Into<String>, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.state.registry.registrieren(name, handler);
    }

    pub fn benachrichtigungen_abonnieren(&self) -> broadcast::Receiver<BridgeBenachrichtigung> {
        self.state.abonnieren()
    }

    pub fn faehigkeiten(&self) -> Faehigkeiten {
        self.state.faehigkeiten()
    }
}

// ---------------------------------------------------------------------------
// Accept-Loop
// ---------------------------------------------------------------------------

async fn accept_loop(
    listener: TcpListener,
    state: Arc<BridgeState>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            ergebnis = listener.accept() => {
                match ergebnis {
                    Ok((stream, peer_addr)) => {
                        if shutdown.is_cancelled() {
                            drop(stream);
                            break;
                        }

                        if state.session_anzahl() >= state.config.max_sessions {
                            tracing::warn!(
                                peer = %peer_addr,
                                max = state.config.max_sessions,
                                "Session-Limit erreicht, Verbindung abgelehnt"
                            );
                            drop(stream);
                            continue;
                        }

                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                        }

                        let (session, ausgang_rx) = state.session_anlegen(peer_addr);
                        if state.config.passwort.is_none() {
                            session.aktivieren();
                        }

                        let verbindung = EditorVerbindung::neu(session, Arc::clone(&state.registry));
                        tracker.spawn(verbindung.verarbeiten(stream, ausgang_rx));
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }
    }
    tracing::debug!("Accept-Loop beendet");
}
