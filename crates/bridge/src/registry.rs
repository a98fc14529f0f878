//! Handler-Registry fuer eingehende Events
//!
//! Bildet Event-Namen auf Handler ab. Lookups arbeiten auf einem Snapshot
//! der Tabelle, Aenderungen ersetzen die Tabelle komplett (Copy-on-Write).
//! Registrieren waehrend laufender Zustellung ist dadurch sicher: eine
//! Zustellung sieht entweder die alte oder die neue Tabelle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use vimbridge_protocol::{ArgLeser, Event};

use crate::benachrichtigung::BridgeBenachrichtigung;
use crate::error::{BridgeError, BridgeResult};
use crate::handlers;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Handler-Trait
// ---------------------------------------------------------------------------

/// Kontext einer Event-Zustellung
pub struct HandlerKontext<'a> {
    pub session: &'a Arc<Session>,
    pub event: &'a Event,
}

impl<'a> HandlerKontext<'a> {
    pub fn neu(session: &'a Arc<Session>, event: &'a Event) -> Self {
        Self { session, event }
    }

    /// Typisierter Leser ueber die Event-Argumente
    pub fn args(&self) -> ArgLeser<'a> {
        self.event.args()
    }

    pub fn benachrichtigen(&self, benachrichtigung: BridgeBenachrichtigung) {
        self.session.benachrichtigen(benachrichtigung);
    }
}

/// Behandelt ein eingehendes Event
///
/// Handler laufen synchron im Lese-Task der Session und duerfen nicht
/// blockieren. Ein Fehler wird geloggt und beendet die Session nicht.
pub trait EventHandler: Send + Sync {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&mut HandlerKontext<'_>) -> BridgeResult<()> + Send + Sync,
{
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        self(ctx)
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

type Tabelle = HashMap<String, Arc<dyn EventHandler>>;

/// Event-Name -> Handler
pub struct HandlerRegistry {
    tabelle: RwLock<Arc<Tabelle>>,
}

impl HandlerRegistry {
    /// Leere Registry
    pub fn neu() -> Self {
        Self {
            tabelle: RwLock::new(Arc::new(Tabelle::new())),
        }
    }

    /// Registry mit allen eingebauten Handlern
    pub fn standard() -> Self {
        let registry = Self::neu();
        handlers::standard_registrieren(&registry);
        registry
    }

    /// Registriert einen Handler, ein vorhandener Eintrag wird ersetzt
    pub fn registrieren<H>(&self, name: impl Into<String>, handler: H) -> Option<Arc<dyn EventHandler>>
    where
        H: EventHandler + 'static,
    {
        self.registrieren_arc(name, Arc::new(handler))
    }

    pub fn registrieren_arc(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        let name = name.into();
        tracing::debug!(event = %name, "Handler registriert");
        self.aendern(|tabelle| tabelle.insert(name, handler))
    }

    /// Registriert `alias` mit demselben Handler wie `ziel`
    pub fn alias_registrieren(&self, alias: impl Into<String>, ziel: &str) -> BridgeResult<()> {
        let handler = self
            .nachschlagen(ziel)
            .ok_or_else(|| BridgeError::NichtGefunden(format!("Handler '{}'", ziel)))?;
        self.registrieren_arc(alias, handler);
        Ok(())
    }

    pub fn entfernen(&self, name: &str) -> bool {
        self.aendern(|tabelle| tabelle.remove(name).is_some())
    }

    pub fn nachschlagen(&self, name: &str) -> Option<Arc<dyn EventHandler>> {
        self.tabelle.read().get(name).cloned()
    }

    pub fn ist_registriert(&self, name: &str) -> bool {
        self.tabelle.read().contains_key(name)
    }

    /// Alle registrierten Event-Namen, sortiert
    pub fn namen(&self) -> Vec<String> {
        let mut namen: Vec<String> = self.tabelle.read().keys().cloned().collect();
        namen.sort();
        namen
    }

    pub fn anzahl(&self) -> usize {
        self.tabelle.read().len()
    }

    fn aendern<R>(&self, f: impl FnOnce(&mut Tabelle) -> R) -> R {
        let mut guard = self.tabelle.write();
        let mut neu = Tabelle::clone(&guard);
        let ergebnis = f(&mut neu);
        *guard = Arc::new(neu);
        ergebnis
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("namen", &self.namen())
            .finish()
    }
}
