//! Admin-Kanal – Laengen-praefixierte JSON-Anfragen fuer Betreiber
//!
//! Unabhaengig vom Editor-Protokoll: eigener Listener, eigener Codec
//! ([`AdminCodec`]). Pro Frame eine [`AdminAnfrage`], pro Anfrage genau
//! eine [`AdminAntwort`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use vimbridge_protocol::admin::anfrage_parsen;
use vimbridge_protocol::{AdminAnfrage, AdminAntwort, AdminCodec, AdminNachricht};

use crate::benachrichtigung::BeendigungsGrund;
use crate::server::BridgeState;

/// Listener und Verbindungen des Admin-Kanals
pub struct AdminKanal {
    state: Arc<BridgeState>,
    tracker: TaskTracker,
}

impl AdminKanal {
    pub fn neu(state: Arc<BridgeState>, tracker: TaskTracker) -> Self {
        Self { state, tracker }
    }

    /// Akzeptiert Admin-Verbindungen bis `shutdown` ausgeloest wird
    pub async fn accept_loop(self, listener: TcpListener, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                ergebnis = listener.accept() => {
                    match ergebnis {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Admin-Verbindung akzeptiert");
                            self.tracker.spawn(verbindung_bedienen(
                                stream,
                                peer_addr,
                                Arc::clone(&self.state),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "Admin-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }
            }
        }
        tracing::debug!("Admin-Kanal beendet");
    }
}

async fn verbindung_bedienen(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<BridgeState>,
    shutdown: CancellationToken,
) {
    let codec = AdminCodec::with_max_size(state.config.admin_max_frame_groesse);
    let mut framed = Framed::new(stream, codec);

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = framed.next() => frame,
        };

        let antwort = match frame {
            Some(Ok(payload)) => match anfrage_parsen(&payload) {
                Ok(anfrage) => anfrage_bearbeiten(&state, anfrage),
                Err(e) => AdminAntwort::Fehler {
                    nachricht: format!("Ungueltige Anfrage: {e}"),
                },
            },
            Some(Err(e)) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Admin-Frame-Lesefehler");
                break;
            }
            None => break,
        };

        if let Err(e) = framed.send(AdminNachricht::Antwort(antwort)).await {
            tracing::warn!(peer = %peer_addr, fehler = %e, "Admin-Antwort fehlgeschlagen");
            break;
        }
    }
    tracing::debug!(peer = %peer_addr, "Admin-Verbindung beendet");
}

/// Fuehrt eine Admin-Anfrage aus
pub fn anfrage_bearbeiten(state: &BridgeState, anfrage: AdminAnfrage) -> AdminAntwort {
    match anfrage {
        AdminAnfrage::SessionsAuflisten => AdminAntwort::Sessions {
            sessions: state.sessions(),
        },
        AdminAnfrage::AnAlleSenden { zeile } => {
            match state.an_alle_senden(&zeile) {
                Ok(anzahl) => {
                    tracing::info!(anzahl, "Admin-Broadcast gesendet");
                    AdminAntwort::Gesendet { anzahl }
                }
                Err(e) => {
                    tracing::warn!(fehler = %e, "Admin-Broadcast abgelehnt");
                    AdminAntwort::Fehler {
                        nachricht: e.to_string(),
                    }
                }
            }
        }
        AdminAnfrage::SessionBeenden { session_id } => {
            let gefunden = state.session_beenden(session_id, BeendigungsGrund::Administrativ);
            AdminAntwort::Beendet {
                session_id,
                gefunden,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::registry::HandlerRegistry;
    use vimbridge_core::SessionId;

    fn state() -> Arc<BridgeState> {
        BridgeState::neu(BridgeConfig::default(), Arc::new(HandlerRegistry::standard()))
    }

    #[test]
    fn sessions_auflisten() {
        let state = state();
        let (session, _rx) = state.session_anlegen("127.0.0.1:5000".parse().unwrap());
        session.aktivieren();

        match anfrage_bearbeiten(&state, AdminAnfrage::SessionsAuflisten) {
            AdminAntwort::Sessions { sessions } => {
                assert_eq!(sessions.len(), 1);
                assert_eq!(sessions[0].zustand, "aktiv");
                assert_eq!(sessions[0].peer, "127.0.0.1:5000");
            }
            andere => panic!("Sessions erwartet: {andere:?}"),
        }
    }

    #[test]
    fn broadcast_mit_umbruch_wird_abgelehnt() {
        let state = state();
        let (session, mut rx) = state.session_anlegen("127.0.0.1:5000".parse().unwrap());
        session.aktivieren();

        let antwort = anfrage_bearbeiten(
            &state,
            AdminAnfrage::AnAlleSenden {
                zeile: "0:raise!0\n0:close!0".into(),
            },
        );
        assert!(matches!(antwort, AdminAntwort::Fehler { .. }));
        assert!(rx.try_recv().is_err());

        assert_eq!(
            anfrage_bearbeiten(
                &state,
                AdminAnfrage::AnAlleSenden {
                    zeile: "0:raise!0".into()
                }
            ),
            AdminAntwort::Gesendet { anzahl: 1 }
        );
    }

    #[test]
    fn session_beenden() {
        let state = state();
        let (session, _rx) = state.session_anlegen("127.0.0.1:5000".parse().unwrap());
        let id = session.id();

        assert_eq!(
            anfrage_bearbeiten(&state, AdminAnfrage::SessionBeenden { session_id: id }),
            AdminAntwort::Beendet {
                session_id: id,
                gefunden: true
            }
        );
        assert_eq!(
            anfrage_bearbeiten(
                &state,
                AdminAnfrage::SessionBeenden {
                    session_id: SessionId(999)
                }
            ),
            AdminAntwort::Beendet {
                session_id: SessionId(999),
                gefunden: false
            }
        );
    }
}
