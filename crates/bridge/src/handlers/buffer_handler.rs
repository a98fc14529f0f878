//! Buffer-Events: `fileOpened`, `fileClosed`, `save`

use vimbridge_core::faehigkeiten::NETBEANS_DOCUMENT_LISTEN;
use vimbridge_core::{BufferId, SessionId};
use vimbridge_protocol::{Antwort, Command, FunctionCall, ProtokollFehler, ProtokollResult};

use crate::benachrichtigung::BridgeBenachrichtigung;
use crate::error::BridgeResult;
use crate::registry::{EventHandler, HandlerKontext};

/// `<buf>:fileOpened=<seq> "pfad" <geoeffnet> <geaendert>`
///
/// Bei Buffer 0 hat der Editor eine Datei selbst geoeffnet; die Bridge
/// vergibt dann eine ID und teilt sie per `putBufferNumber` mit. Ist der
/// Buffer geoeffnet und unveraendert, folgen `initDone` und `getCursor`.
pub struct FileOpenedHandler;

impl EventHandler for FileOpenedHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let mut args = ctx.args();
        let pfad = args.naechster_text()?;
        let geoeffnet = args.naechster_bool()?;
        let geaendert = args.naechster_bool()?;
        let session = ctx.session;

        let buffer = if ctx.event.ist_global() {
            let id = session.buffer_zuweisen(pfad);
            if let Err(e) = session.senden(Command::put_buffer_number(id, pfad)) {
                session.buffer_entfernen(id);
                return Err(e);
            }
            id
        } else {
            session.buffer_bestaetigen(ctx.event.buffer_id, Some(pfad.to_string()));
            ctx.event.buffer_id
        };

        ctx.benachrichtigen(BridgeBenachrichtigung::BufferGeoeffnet {
            session: session.id(),
            buffer,
            pfad: pfad.to_string(),
            geaendert,
        });

        if geoeffnet && !geaendert {
            session.senden(Command::init_done(buffer))?;

            let session_id = session.id();
            let melder = session.benachrichtiger();
            session.funktion_aufrufen(FunctionCall::get_cursor(buffer), move |ergebnis| {
                match ergebnis.map_err(|e| e.to_string()).and_then(|antwort| {
                    cursor_aus_antwort(session_id, &antwort).map_err(|e| e.to_string())
                }) {
                    Ok(cursor) => {
                        let _ = melder.send(cursor);
                    }
                    Err(fehler) => {
                        tracing::debug!(session = %session_id, fehler = %fehler, "getCursor ohne Ergebnis");
                    }
                }
            })?;

            if session.faehigkeiten().hat(NETBEANS_DOCUMENT_LISTEN) {
                session.senden(Command::start_document_listen(buffer))?;
            }
        }
        Ok(())
    }
}

/// Antwort auf `getCursor`: `<seq> <bufID> <zeile> <spalte> <offset>`
pub fn cursor_aus_antwort(
    session: SessionId,
    antwort: &Antwort,
) -> ProtokollResult<BridgeBenachrichtigung> {
    let mut args = antwort.args();
    let buffer = args.naechste_zahl()?;
    let zeile = args.naechste_zahl()?;
    let spalte = args.naechste_zahl()?;
    let offset = args.naechste_zahl()?;
    Ok(BridgeBenachrichtigung::Cursor {
        session,
        buffer: BufferId(
            u32::try_from(buffer)
                .map_err(|_| ProtokollFehler::UngueltigeBufferId(buffer.to_string()))?,
        ),
        zeile,
        spalte,
        offset,
    })
}

/// `<buf>:fileClosed=<seq>`
pub struct FileClosedHandler;

impl EventHandler for FileClosedHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let buffer = ctx.event.buffer_id;
        if ctx.session.buffer_entfernen(buffer).is_none() {
            tracing::debug!(session = %ctx.session.id(), buffer = %buffer, "fileClosed fuer unbekannten Buffer");
        }
        ctx.benachrichtigen(BridgeBenachrichtigung::BufferGeschlossen {
            session: ctx.session.id(),
            buffer,
        });
        Ok(())
    }
}

/// `<buf>:save=<seq>`
pub struct SaveHandler;

impl EventHandler for SaveHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        ctx.benachrichtigen(BridgeBenachrichtigung::BufferGespeichert {
            session: ctx.session.id(),
            buffer: ctx.event.buffer_id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_hilfen::{ausgehende, beobachtete_session, benachrichtigungen};
    use crate::registry::HandlerRegistry;
    use crate::session::{SessionOptionen, Zustellung};
    use vimbridge_core::Faehigkeiten;
    use vimbridge_protocol::Token;

    #[test]
    fn file_opened_sendet_init_done_und_get_cursor() {
        let (session, mut rx, mut events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();

        let z = session.bytes_empfangen(b"3:fileOpened=12 \"test.txt\" T F\n", &registry);
        assert_eq!(
            z,
            vec![Zustellung::Verteilt {
                event: "fileOpened".into()
            }]
        );
        assert_eq!(
            ausgehende(&mut rx),
            vec!["3:initDone!0".to_string(), "3:getCursor/1".to_string()]
        );
        assert!(session.buffer_eintrag(BufferId(3)).unwrap().bestaetigt);

        // Antwort auf getCursor erzeugt eine Cursor-Benachrichtigung
        session.bytes_empfangen(b"1 3 10 2 99\n", &registry);
        assert_eq!(
            benachrichtigungen(&mut events),
            vec![
                BridgeBenachrichtigung::BufferGeoeffnet {
                    session: SessionId(1),
                    buffer: BufferId(3),
                    pfad: "test.txt".into(),
                    geaendert: false,
                },
                BridgeBenachrichtigung::Cursor {
                    session: SessionId(1),
                    buffer: BufferId(3),
                    zeile: 10,
                    spalte: 2,
                    offset: 99,
                },
            ]
        );
    }

    #[test]
    fn file_opened_mit_document_listen() {
        let optionen = SessionOptionen {
            faehigkeiten: Faehigkeiten::neu().mit(NETBEANS_DOCUMENT_LISTEN, true),
            ..SessionOptionen::default()
        };
        let (session, mut rx, _events) = beobachtete_session(optionen);
        let registry = HandlerRegistry::standard();

        session.bytes_empfangen(b"3:fileOpened=12 \"test.txt\" T F\n", &registry);
        assert_eq!(
            ausgehende(&mut rx),
            vec![
                "3:initDone!0".to_string(),
                "3:getCursor/1".to_string(),
                "3:startDocumentListen!0".to_string()
            ]
        );
    }

    #[test]
    fn file_opened_geaendert_sendet_nichts() {
        let (session, mut rx, _events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        session.bytes_empfangen(b"3:fileOpened=12 \"test.txt\" T T\n", &registry);
        assert!(ausgehende(&mut rx).is_empty());
    }

    #[test]
    fn file_opened_ohne_buffer_id() {
        let (session, mut rx, _events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        session.bytes_empfangen(b"0:fileOpened=5 \"/tmp/x.c\" F F\n", &registry);
        assert_eq!(
            ausgehende(&mut rx),
            vec!["1:putBufferNumber!0 \"/tmp/x.c\"".to_string()]
        );
        assert_eq!(session.buffer_ids(), vec![BufferId(1)]);
    }

    #[test]
    fn file_opened_ohne_buffer_id_volle_queue_vergibt_nichts() {
        let optionen = SessionOptionen {
            sende_queue_groesse: 1,
            ..SessionOptionen::default()
        };
        let (session, mut rx, _events) = beobachtete_session(optionen);
        let registry = HandlerRegistry::standard();
        session.senden(Command::init_done(BufferId(9))).unwrap();

        let z = session.bytes_empfangen(b"0:fileOpened=5 \"/tmp/x.c\" F F\n", &registry);
        assert!(matches!(&z[0], Zustellung::HandlerFehler { event, .. } if event == "fileOpened"));
        assert!(session.buffer_ids().is_empty());
        assert_eq!(ausgehende(&mut rx), vec!["9:initDone!0".to_string()]);
    }

    #[test]
    fn cursor_mit_ungueltiger_buffer_nummer() {
        for buffer in [-1, i64::from(u32::MAX) + 1] {
            let antwort = Antwort::neu(
                1,
                vec![Token::Zahl(buffer), Token::Zahl(1), Token::Zahl(0), Token::Zahl(0)],
            );
            assert_eq!(
                cursor_aus_antwort(SessionId(1), &antwort),
                Err(ProtokollFehler::UngueltigeBufferId(buffer.to_string()))
            );
        }
    }

    #[test]
    fn file_opened_falsche_argumente() {
        let (session, mut rx, _events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        let z = session.bytes_empfangen(b"3:fileOpened=12 \"test.txt\" 1 F\n", &registry);
        assert!(matches!(&z[0], Zustellung::HandlerFehler { event, .. } if event == "fileOpened"));
        assert!(ausgehende(&mut rx).is_empty());
        assert!(session.ist_aktiv());
    }

    #[test]
    fn file_closed_entfernt_buffer() {
        let (session, _rx, mut events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        session.buffer_bestaetigen(BufferId(4), Some("a".into()));
        session.bytes_empfangen(b"4:fileClosed=0\n4:save=0\n", &registry);
        assert!(session.buffer_eintrag(BufferId(4)).is_none());
        assert_eq!(
            benachrichtigungen(&mut events),
            vec![
                BridgeBenachrichtigung::BufferGeschlossen {
                    session: SessionId(1),
                    buffer: BufferId(4)
                },
                BridgeBenachrichtigung::BufferGespeichert {
                    session: SessionId(1),
                    buffer: BufferId(4)
                },
            ]
        );
    }
}
