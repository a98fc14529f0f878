//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vimbridge_bridge::BridgeConfig;
use vimbridge_observability::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Editor-Verbindungen
    pub bridge: BridgeEinstellungen,
    /// Editor-Programm und Faehigkeits-Pruefung
    pub editor: EditorEinstellungen,
    /// Admin-Kanal
    pub admin: AdminEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Einstellungen fuer Editor-Verbindungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeEinstellungen {
    /// Bind-Adresse fuer den Editor-Listener
    pub bind_adresse: String,
    pub port: u16,
    /// Erwartetes `AUTH`-Passwort (leer = keine Anmeldung)
    pub passwort: Option<String>,
    /// Maximale gleichzeitige Sessions
    pub max_sessions: usize,
    /// Maximale Zeilenlaenge in Bytes
    pub max_zeilen_laenge: usize,
    /// Ausgehende Nachrichten pro Session, die gepuffert werden
    pub sende_queue_groesse: usize,
}

impl Default for BridgeEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "127.0.0.1".into(),
            port: 3219,
            passwort: None,
            max_sessions: 64,
            max_zeilen_laenge: 1024 * 1024,
            sende_queue_groesse: 256,
        }
    }
}

/// Editor-Programm
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorEinstellungen {
    /// Pfad zum Editor (gesetzt = Faehigkeits-Pruefung beim Start)
    pub programm: Option<PathBuf>,
    /// Zeitlimit fuer die Pruefung in Sekunden
    pub pruef_timeout_sek: u64,
}

impl Default for EditorEinstellungen {
    fn default() -> Self {
        Self {
            programm: None,
            pruef_timeout_sek: 10,
        }
    }
}

/// Admin-Kanal (laengen-praefixierte JSON-Frames)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminEinstellungen {
    pub aktiviert: bool,
    pub port: u16,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for AdminEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            port: 3220,
            max_frame_groesse: 1024 * 1024,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config
                    .validieren()
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format: '{}'", self.logging.format);
        }
        if self.bridge.max_sessions == 0 {
            anyhow::bail!("bridge.max_sessions muss groesser als 0 sein");
        }
        if self.bridge.sende_queue_groesse == 0 {
            anyhow::bail!("bridge.sende_queue_groesse muss groesser als 0 sein");
        }
        Ok(())
    }

    /// Bind-Adresse fuer Editor-Verbindungen
    pub fn bridge_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse_parsen(&self.bridge.bind_adresse, self.bridge.port)
    }

    /// Bind-Adresse fuer den Admin-Kanal
    pub fn admin_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse_parsen(&self.bridge.bind_adresse, self.admin.port)
    }

    pub fn pruef_timeout(&self) -> Duration {
        Duration::from_secs(self.editor.pruef_timeout_sek)
    }

    /// Laufzeit-Konfiguration fuer die Bridge
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            passwort: self.bridge.passwort.clone().filter(|p| !p.is_empty()),
            max_sessions: self.bridge.max_sessions,
            max_zeilen_laenge: self.bridge.max_zeilen_laenge,
            sende_queue_groesse: self.bridge.sende_queue_groesse,
            editor_programm: self.editor.programm.clone(),
            admin_max_frame_groesse: self.admin.max_frame_groesse,
        }
    }
}

fn adresse_parsen(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse '{host}:{port}': {e}"))
}
