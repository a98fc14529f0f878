//! Lebenszyklus-Events: `disconnect`/`killed`, `startupDone`, `version`

use crate::benachrichtigung::{BeendigungsGrund, BridgeBenachrichtigung};
use crate::error::BridgeResult;
use crate::registry::{EventHandler, HandlerKontext};

/// Editor beendet die Verbindung
///
/// Unter `disconnect` und dem Alias `killed` registriert.
pub struct DisconnectHandler;

impl EventHandler for DisconnectHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        tracing::info!(session = %ctx.session.id(), event = %ctx.event.name, "Editor trennt Verbindung");
        ctx.session.schliessen(BeendigungsGrund::EditorGetrennt);
        Ok(())
    }
}

pub struct StartupDoneHandler;

impl EventHandler for StartupDoneHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        ctx.benachrichtigen(BridgeBenachrichtigung::EditorBereit {
            session: ctx.session.id(),
            version: ctx.session.editor_version(),
        });
        Ok(())
    }
}

/// `0:version=<seq> "2.5"`
pub struct VersionHandler;

impl EventHandler for VersionHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let version = ctx.args().naechster_text()?;
        tracing::debug!(session = %ctx.session.id(), version, "Editor-Version");
        ctx.session.editor_version_setzen(version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_hilfen::{beobachtete_session, benachrichtigungen};
    use crate::registry::HandlerRegistry;
    use crate::session::{SessionOptionen, SessionZustand, Zustellung};
    use vimbridge_core::SessionId;

    #[test]
    fn disconnect_schliesst_session() {
        let (session, _rx, mut events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();

        let z = session.bytes_empfangen(b"0:disconnect=3\n0:startupDone=0\n", &registry);
        // Nach dem Schliessen wird nichts mehr zugestellt
        assert_eq!(z.len(), 1);
        assert_eq!(session.zustand(), SessionZustand::Geschlossen);
        assert_eq!(
            benachrichtigungen(&mut events),
            vec![BridgeBenachrichtigung::SessionBeendet {
                session: SessionId(1),
                grund: BeendigungsGrund::EditorGetrennt
            }]
        );
    }

    #[test]
    fn killed_ist_alias() {
        let (session, _rx, _events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        let z = session.bytes_empfangen(b"killed=0\n", &registry);
        assert_eq!(
            z,
            vec![Zustellung::Verteilt {
                event: "killed".into()
            }]
        );
        assert_eq!(session.zustand(), SessionZustand::Geschlossen);
    }

    #[test]
    fn version_und_startup_done() {
        let (session, _rx, mut events) = beobachtete_session(SessionOptionen::default());
        let registry = HandlerRegistry::standard();
        session.bytes_empfangen(b"0:version=0 \"2.5\"\n0:startupDone=0\n", &registry);
        assert_eq!(session.editor_version().as_deref(), Some("2.5"));
        assert_eq!(
            benachrichtigungen(&mut events),
            vec![BridgeBenachrichtigung::EditorBereit {
                session: SessionId(1),
                version: Some("2.5".into())
            }]
        );
    }
}
