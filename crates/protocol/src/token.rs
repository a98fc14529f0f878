//! Argument-Tokens und positioneller Argument-Leser
//!
//! Argumente einer Zeile sind durch Leerzeichen getrennt. Jedes Token ist
//! genau eines von:
//! - `"..."` – String mit Escapes `\"`, `\\`, `\n`, `\t`, `\r`
//! - Dezimalzahl (optional mit Vorzeichen)
//! - `T` / `F` – Boolean
//! - sonstiges Wort ohne Leerzeichen (z.B. Positionen `12/4` oder `none`)

use std::fmt;

use crate::error::{ProtokollFehler, ProtokollResult};

/// Ein typisiertes Argument einer Zeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Zahl(i64),
    Bool(bool),
    /// Ungequotetes Wort; darf keine Leerzeichen oder Anfuehrungszeichen enthalten
    Wort(String),
}

impl Token {
    /// Kurzer Typname fuer Fehlermeldungen
    pub fn typ_name(&self) -> &'static str {
        match self {
            Token::Text(_) => "text",
            Token::Zahl(_) => "zahl",
            Token::Bool(_) => "bool",
            Token::Wort(_) => "wort",
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Token::Text(s.into())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Text(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Text(s)
    }
}

impl From<i64> for Token {
    fn from(n: i64) -> Self {
        Token::Zahl(n)
    }
}

impl From<bool> for Token {
    fn from(b: bool) -> Self {
        Token::Bool(b)
    }
}

/// Wire-Darstellung eines Tokens
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(s) => f.write_str(&text_kodieren(s)),
            Token::Zahl(n) => write!(f, "{n}"),
            Token::Bool(true) => f.write_str("T"),
            Token::Bool(false) => f.write_str("F"),
            Token::Wort(w) => f.write_str(w),
        }
    }
}

/// Kodiert einen String als gequotetes Argument
pub fn text_kodieren(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Zerlegt den Argument-Teil einer Zeile in Tokens
pub fn tokens_parsen(eingabe: &str) -> ProtokollResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = eingabe.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == ' ' {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut geschlossen = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        geschlossen = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some(other) => {
                            text.push('\\');
                            text.push(other);
                        }
                        None => return Err(ProtokollFehler::OffenerString),
                    },
                    other => text.push(other),
                }
            }
            if !geschlossen {
                return Err(ProtokollFehler::OffenerString);
            }
            tokens.push(Token::Text(text));
            continue;
        }

        let mut wort = String::new();
        while let Some(&c) = chars.peek() {
            if c == ' ' {
                break;
            }
            wort.push(c);
            chars.next();
        }
        tokens.push(wort_klassifizieren(wort));
    }

    Ok(tokens)
}

fn wort_klassifizieren(wort: String) -> Token {
    match wort.as_str() {
        "T" => Token::Bool(true),
        "F" => Token::Bool(false),
        s => match s.parse::<i64>() {
            Ok(n) => Token::Zahl(n),
            Err(_) => Token::Wort(wort),
        },
    }
}

// ---------------------------------------------------------------------------
// ArgLeser
// ---------------------------------------------------------------------------

/// Sequentieller Leser ueber die Argumente eines Events
///
/// Jeder Aufruf verbraucht genau ein Token. Ist keines mehr vorhanden oder hat
/// es den falschen Typ, schlaegt der Aufruf fehl; bei falschem Typ bleibt die
/// Position unveraendert.
#[derive(Debug, Clone)]
pub struct ArgLeser<'a> {
    args: &'a [Token],
    position: usize,
}

impl<'a> ArgLeser<'a> {
    pub fn neu(args: &'a [Token]) -> Self {
        Self { args, position: 0 }
    }

    fn naechstes(&self, erwartet: &'static str) -> ProtokollResult<&'a Token> {
        self.args
            .get(self.position)
            .ok_or(ProtokollFehler::ArgumenteErschoepft {
                erwartet,
                position: self.position,
            })
    }

    fn falscher_typ(&self, erwartet: &'static str, token: &Token) -> ProtokollFehler {
        ProtokollFehler::FalscherTyp {
            erwartet,
            gefunden: token.typ_name(),
            position: self.position,
        }
    }

    /// Liest ein gequotetes String-Argument
    pub fn naechster_text(&mut self) -> ProtokollResult<&'a str> {
        match self.naechstes("text")? {
            Token::Text(s) => {
                self.position += 1;
                Ok(s.as_str())
            }
            other => Err(self.falscher_typ("text", other)),
        }
    }

    /// Liest ein Boolean-Argument (`T`/`F`)
    pub fn naechster_bool(&mut self) -> ProtokollResult<bool> {
        match self.naechstes("bool")? {
            Token::Bool(b) => {
                self.position += 1;
                Ok(*b)
            }
            other => Err(self.falscher_typ("bool", other)),
        }
    }

    /// Liest ein Zahl-Argument
    pub fn naechste_zahl(&mut self) -> ProtokollResult<i64> {
        match self.naechstes("zahl")? {
            Token::Zahl(n) => {
                self.position += 1;
                Ok(*n)
            }
            other => Err(self.falscher_typ("zahl", other)),
        }
    }

    /// Liest ein ungequotetes Wort
    pub fn naechstes_wort(&mut self) -> ProtokollResult<&'a str> {
        match self.naechstes("wort")? {
            Token::Wort(w) => {
                self.position += 1;
                Ok(w.as_str())
            }
            other => Err(self.falscher_typ("wort", other)),
        }
    }

    /// Anzahl noch nicht gelesener Tokens
    pub fn verbleibend(&self) -> usize {
        self.args.len().saturating_sub(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl<'a> Iterator for ArgLeser<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.args.get(self.position)?;
        self.position += 1;
        Some(token)
    }
}
