//! vimbridge-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::Result;
use config::ServerConfig;
use vimbridge_bridge::{BridgeServer, HandlerRegistry, VimSkriptPruefer};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    bridge: BridgeServer,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        let pruefer = VimSkriptPruefer::neu(config.pruef_timeout());
        let bridge = BridgeServer::neu(config.bridge_config(), HandlerRegistry::standard())
            .mit_pruefer(Arc::new(pruefer));
        Self { config, bridge }
    }

    pub fn bridge(&self) -> &BridgeServer {
        &self.bridge
    }

    /// Startet Editor-Listener und (optional) Admin-Kanal
    ///
    /// Reihenfolge:
    /// 1. Faehigkeits-Pruefung (falls `editor.programm` gesetzt)
    /// 2. Editor-Listener binden
    /// 3. Admin-Kanal binden
    pub async fn starten(&self) -> Result<()> {
        let adresse = self.bridge.starten(self.config.bridge_bind_adresse()?).await?;
        tracing::info!(
            adresse = %adresse,
            max_sessions = self.config.bridge.max_sessions,
            passwort = self.config.bridge_config().passwort.is_some(),
            "Editor-Listener bereit"
        );

        if self.config.admin.aktiviert {
            let admin = self
                .bridge
                .admin_starten(self.config.admin_bind_adresse()?)
                .await?;
            tracing::info!(adresse = %admin, "Admin-Kanal bereit");
        }
        Ok(())
    }

    /// Startet alles und laeuft bis zum Shutdown-Signal (Ctrl-C)
    pub async fn ausfuehren(self) -> Result<()> {
        self.starten().await?;

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        self.bridge.stoppen().await;
        Ok(())
    }
}
