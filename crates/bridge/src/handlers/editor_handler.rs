//! Editor-Events: Tasten und Textaenderungen

use crate::benachrichtigung::BridgeBenachrichtigung;
use crate::error::BridgeResult;
use crate::registry::{EventHandler, HandlerKontext};

/// `<buf>:keyCommand=<seq> "taste"`
pub struct KeyCommandHandler;

impl EventHandler for KeyCommandHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let taste = ctx.args().naechster_text()?;
        ctx.benachrichtigen(BridgeBenachrichtigung::Taste {
            session: ctx.session.id(),
            buffer: ctx.event.buffer_id,
            taste: taste.to_string(),
            offset: None,
        });
        Ok(())
    }
}

/// `<buf>:keyAtPos=<seq> "taste" <offset> <zeile>/<spalte>`
///
/// Die Position `zeile/spalte` ist ein nacktes Wort und wird ignoriert.
pub struct KeyAtPosHandler;

impl EventHandler for KeyAtPosHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let mut args = ctx.args();
        let taste = args.naechster_text()?;
        let offset = args.naechste_zahl()?;
        ctx.benachrichtigen(BridgeBenachrichtigung::Taste {
            session: ctx.session.id(),
            buffer: ctx.event.buffer_id,
            taste: taste.to_string(),
            offset: Some(offset),
        });
        Ok(())
    }
}

/// `<buf>:insert=<seq> <offset> "text"`
pub struct InsertHandler;

impl EventHandler for InsertHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let mut args = ctx.args();
        let offset = args.naechste_zahl()?;
        let text = args.naechster_text()?;
        ctx.benachrichtigen(BridgeBenachrichtigung::TextEingefuegt {
            session: ctx.session.id(),
            buffer: ctx.event.buffer_id,
            offset,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// `<buf>:remove=<seq> <offset> <laenge>`
pub struct RemoveHandler;

impl EventHandler for RemoveHandler {
    fn ausfuehren(&self, ctx: &mut HandlerKontext<'_>) -> BridgeResult<()> {
        let mut args = ctx.args();
        let offset = args.naechste_zahl()?;
        let laenge = args.naechste_zahl()?;
        ctx.benachrichtigen(BridgeBenachrichtigung::TextEntfernt {
            session: ctx.session.id(),
            buffer: ctx.event.buffer_id,
            offset,
            laenge,
        });
        Ok(())
    }
}
