//! Editor-Verbindung – Bedient den Socket einer Session
//!
//! Jede akzeptierte TCP-Verbindung bekommt eine `EditorVerbindung` in einem
//! eigenen tokio-Task. Rohe Bytes vom Socket gehen an
//! [`Session::bytes_empfangen`], die Sende-Queue der Session wird ueber den
//! [`NetbeansCodec`] auf den Socket geschrieben.
//!
//! Der Task endet bei EOF, IO-Fehler oder sobald das Abbruch-Token der
//! Session ausgeloest wird. Auch ein gerade blockierter Schreibvorgang wird
//! dabei abgebrochen.

use std::sync::Arc;

use futures_util::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use vimbridge_protocol::{Ausgehend, NetbeansCodec};

use crate::benachrichtigung::BeendigungsGrund;
use crate::registry::HandlerRegistry;
use crate::session::{Session, Zustellung};

/// Groesse des Lese-Puffers pro Socket-Read
const LESE_PUFFER_GROESSE: usize = 8 * 1024;

/// Socket-Task einer Session
pub struct EditorVerbindung {
    session: Arc<Session>,
    registry: Arc<HandlerRegistry>,
}

impl EditorVerbindung {
    pub fn neu(session: Arc<Session>, registry: Arc<HandlerRegistry>) -> Self {
        Self { session, registry }
    }

    /// Verarbeitungsschleife bis die Verbindung endet
    pub async fn verarbeiten(self, stream: TcpStream, mut ausgang_rx: mpsc::Receiver<Ausgehend>) {
        let session = self.session;
        let peer_addr = session.peer_addr();
        let abbruch = session.abbruch_token();

        tracing::info!(session = %session.id(), peer = %peer_addr, "Neue Editor-Verbindung");

        let (mut leser, schreiber) = stream.into_split();
        let mut schreiber = FramedWrite::new(schreiber, NetbeansCodec::new());
        let mut puffer = vec![0u8; LESE_PUFFER_GROESSE];

        loop {
            tokio::select! {
                _ = abbruch.cancelled() => break,

                // Eingehende Bytes vom Editor
                gelesen = leser.read(&mut puffer) => {
                    match gelesen {
                        Ok(0) => {
                            tracing::info!(session = %session.id(), "Verbindung vom Editor getrennt");
                            session.schliessen(BeendigungsGrund::VerbindungVerloren);
                            break;
                        }
                        Ok(n) => {
                            for zustellung in session.bytes_empfangen(&puffer[..n], &self.registry) {
                                if let Zustellung::Verteilt { event } = &zustellung {
                                    tracing::trace!(session = %session.id(), event = %event, "Event verteilt");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(session = %session.id(), fehler = %e, "Lesefehler");
                            session.schliessen(BeendigungsGrund::Transport(e.to_string()));
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der Sende-Queue
                nachricht = ausgang_rx.recv() => {
                    let Some(nachricht) = nachricht else { break };
                    tracing::trace!(session = %session.id(), zeile = %nachricht.zeile(), "Sende");
                    tokio::select! {
                        _ = abbruch.cancelled() => break,
                        ergebnis = schreiber.send(nachricht) => {
                            if let Err(e) = ergebnis {
                                tracing::warn!(session = %session.id(), fehler = %e, "Senden fehlgeschlagen");
                                session.schliessen(BeendigungsGrund::Transport(e.to_string()));
                                break;
                            }
                        }
                    }
                }
            }
        }

        // No-op wenn die Session bereits geschlossen wurde
        session.schliessen(BeendigungsGrund::VerbindungVerloren);
        tracing::debug!(session = %session.id(), peer = %peer_addr, "Verbindungs-Task beendet");
    }
}
