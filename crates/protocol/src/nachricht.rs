//! Nachrichtentypen des Editor-Protokolls
//!
//! ## Eingehend (Editor -> Bridge)
//! ```text
//! <bufferId>:<eventName>=<sequenz> [args...]    Buffer-Event
//! <eventName>=<sequenz> [args...]               globales Event (bufferId 0)
//! <sequenz> [args...]                           Antwort auf einen Funktionsaufruf
//! AUTH <passwort>                               Anmeldung
//! ```
//!
//! ## Ausgehend (Bridge -> Editor)
//! ```text
//! <bufferId>:<name>!0 [args...]                 Command (keine Antwort)
//! <bufferId>:<name>/<sequenz> [args...]         FunctionCall (Antwort erwartet)
//! ```
//!
//! Buffer-ID und Name werden immer geschrieben, auch wenn sie 0 bzw. leer sind.

use std::fmt::Write as _;

use vimbridge_core::BufferId;

use crate::error::{ProtokollFehler, ProtokollResult};
use crate::token::{tokens_parsen, ArgLeser, Token};

// ---------------------------------------------------------------------------
// Eingehend
// ---------------------------------------------------------------------------

/// Ein dekodiertes Event des Editors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub buffer_id: BufferId,
    /// Symbolischer Name, niemals leer
    pub name: String,
    /// Korrelations-ID, 0 wenn keine Antwort
    pub sequenz: u32,
    pub args: Vec<Token>,
}

impl Event {
    pub fn neu(buffer_id: BufferId, name: impl Into<String>, sequenz: u32) -> Self {
        Self {
            buffer_id,
            name: name.into(),
            sequenz,
            args: Vec::new(),
        }
    }

    /// Haengt ein Argument an (Builder-Stil)
    pub fn mit_arg(mut self, token: impl Into<Token>) -> Self {
        self.args.push(token.into());
        self
    }

    /// Positioneller Leser ueber die Argumente
    pub fn args(&self) -> ArgLeser<'_> {
        ArgLeser::neu(&self.args)
    }

    pub fn ist_global(&self) -> bool {
        self.buffer_id.ist_global()
    }

    /// Wire-Darstellung ohne Zeilenende
    pub fn zeile(&self) -> String {
        let mut zeile = format!("{}:{}={}", self.buffer_id, self.name, self.sequenz);
        args_anhaengen(&mut zeile, &self.args);
        zeile
    }
}

/// Antwort des Editors auf einen FunctionCall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Antwort {
    pub sequenz: u32,
    pub args: Vec<Token>,
}

impl Antwort {
    pub fn neu(sequenz: u32, args: Vec<Token>) -> Self {
        Self { sequenz, args }
    }

    pub fn args(&self) -> ArgLeser<'_> {
        ArgLeser::neu(&self.args)
    }

    pub fn zeile(&self) -> String {
        let mut zeile = self.sequenz.to_string();
        args_anhaengen(&mut zeile, &self.args);
        zeile
    }
}

/// Eine vollstaendig dekodierte eingehende Zeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingang {
    Event(Event),
    Antwort(Antwort),
    /// `AUTH <passwort>`
    Auth(String),
}

// ---------------------------------------------------------------------------
// Ausgehend
// ---------------------------------------------------------------------------

/// Anweisung an den Editor ohne erwartete Antwort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub buffer_id: BufferId,
    pub name: String,
    pub args: Vec<Token>,
}

impl Command {
    pub fn neu(buffer_id: BufferId, name: impl Into<String>) -> Self {
        Self {
            buffer_id,
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn mit_arg(mut self, token: impl Into<Token>) -> Self {
        self.args.push(token.into());
        self
    }

    /// Buffer ist initialisiert, der Editor darf ihn anzeigen
    pub fn init_done(buffer_id: BufferId) -> Self {
        Self::neu(buffer_id, "initDone")
    }

    /// Aenderungen am Buffer als `insert`/`remove` melden
    pub fn start_document_listen(buffer_id: BufferId) -> Self {
        Self::neu(buffer_id, "startDocumentListen")
    }

    pub fn set_title(buffer_id: BufferId, titel: &str) -> Self {
        Self::neu(buffer_id, "setTitle").mit_arg(titel)
    }

    pub fn set_full_name(buffer_id: BufferId, pfad: &str) -> Self {
        Self::neu(buffer_id, "setFullName").mit_arg(pfad)
    }

    pub fn edit_file(buffer_id: BufferId, pfad: &str) -> Self {
        Self::neu(buffer_id, "editFile").mit_arg(pfad)
    }

    pub fn put_buffer_number(buffer_id: BufferId, pfad: &str) -> Self {
        Self::neu(buffer_id, "putBufferNumber").mit_arg(pfad)
    }
}

/// Anweisung an den Editor mit erwarteter Antwort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub buffer_id: BufferId,
    pub name: String,
    pub args: Vec<Token>,
}

impl FunctionCall {
    pub fn neu(buffer_id: BufferId, name: impl Into<String>) -> Self {
        Self {
            buffer_id,
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn mit_arg(mut self, token: impl Into<Token>) -> Self {
        self.args.push(token.into());
        self
    }

    /// Antwort: `<seq> <bufId> <zeile> <spalte> <offset>`
    pub fn get_cursor(buffer_id: BufferId) -> Self {
        Self::neu(buffer_id, "getCursor")
    }
}

/// Eine Nachricht in der Sende-Queue einer Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ausgehend {
    Command(Command),
    /// FunctionCall mit bereits vergebener Sequenznummer
    Funktion { aufruf: FunctionCall, sequenz: u32 },
    /// Unveraenderte Zeile (Operator-/Debug-Broadcast), siehe [`Ausgehend::roh`]
    Roh(String),
}

impl Ausgehend {
    /// Roh-Zeile mit Pruefung: genau eine Protokollzeile
    ///
    /// Ein abschliessendes `\n` (oder `\r\n`) wird entfernt, jeder weitere
    /// Zeilenumbruch ist ein Fehler.
    pub fn roh(zeile: impl Into<String>) -> ProtokollResult<Self> {
        let mut zeile = zeile.into();
        if zeile.ends_with('\n') {
            zeile.pop();
            if zeile.ends_with('\r') {
                zeile.pop();
            }
        }
        if zeile.contains(['\n', '\r']) {
            return Err(ProtokollFehler::Zeilenumbruch);
        }
        Ok(Ausgehend::Roh(zeile))
    }

    /// Wire-Darstellung ohne Zeilenende
    pub fn zeile(&self) -> String {
        match self {
            Ausgehend::Command(cmd) => {
                let mut zeile = format!("{}:{}!0", cmd.buffer_id, cmd.name);
                args_anhaengen(&mut zeile, &cmd.args);
                zeile
            }
            Ausgehend::Funktion { aufruf, sequenz } => {
                let mut zeile = format!("{}:{}/{}", aufruf.buffer_id, aufruf.name, sequenz);
                args_anhaengen(&mut zeile, &aufruf.args);
                zeile
            }
            Ausgehend::Roh(zeile) => zeile.trim_end_matches('\n').to_string(),
        }
    }

    /// Sequenznummer (0 fuer Commands und Roh-Zeilen)
    pub fn sequenz(&self) -> u32 {
        match self {
            Ausgehend::Funktion { sequenz, .. } => *sequenz,
            _ => 0,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Ausgehend::Command(cmd) => Some(&cmd.name),
            Ausgehend::Funktion { aufruf, .. } => Some(&aufruf.name),
            Ausgehend::Roh(_) => None,
        }
    }
}

fn args_anhaengen(zeile: &mut String, args: &[Token]) {
    for arg in args {
        let _ = write!(zeile, " {arg}");
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parst eine einzelne Zeile (ohne `\n`, ein `\r` am Ende wird ignoriert)
pub fn zeile_parsen(zeile: &str) -> ProtokollResult<Eingang> {
    let zeile = zeile.strip_suffix('\r').unwrap_or(zeile);
    if zeile.trim().is_empty() {
        return Err(ProtokollFehler::LeereZeile);
    }

    if zeile == "AUTH" {
        return Ok(Eingang::Auth(String::new()));
    }
    if let Some(passwort) = zeile.strip_prefix("AUTH ") {
        return Ok(Eingang::Auth(passwort.trim().to_string()));
    }

    let (kopf, rest) = match zeile.split_once(' ') {
        Some((kopf, rest)) => (kopf, rest),
        None => (zeile, ""),
    };
    let args = tokens_parsen(rest)?;

    // Antwortzeile: nur die Sequenznummer im Kopf
    if kopf.bytes().all(|b| b.is_ascii_digit()) {
        let sequenz = sequenz_parsen(kopf)?;
        return Ok(Eingang::Antwort(Antwort { sequenz, args }));
    }

    let (buffer_id, name_und_sequenz) = match kopf.split_once(':') {
        Some((buf, rest)) => {
            let id = buf
                .parse::<u32>()
                .map_err(|_| ProtokollFehler::UngueltigeBufferId(buf.to_string()))?;
            (BufferId(id), rest)
        }
        None => (BufferId::GLOBAL, kopf),
    };

    let (name, sequenz) = name_und_sequenz
        .split_once('=')
        .ok_or_else(|| ProtokollFehler::UngueltigeZeile(zeile.to_string()))?;

    if !name_gueltig(name) {
        return Err(ProtokollFehler::UngueltigerName(name.to_string()));
    }

    Ok(Eingang::Event(Event {
        buffer_id,
        name: name.to_string(),
        sequenz: sequenz_parsen(sequenz)?,
        args,
    }))
}

fn sequenz_parsen(s: &str) -> ProtokollResult<u32> {
    s.parse::<u32>()
        .map_err(|_| ProtokollFehler::UngueltigeSequenz(s.to_string()))
}

fn name_gueltig(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
