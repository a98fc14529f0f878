//! Faehigkeits-Pruefung des Editor-Programms
//!
//! Vor dem Start fragt die Bridge das konfigurierte Editor-Programm, welche
//! Features es mitbringt. Der Editor wird dazu im Ex-Modus mit einem kurzen
//! Skript gestartet, das pro Faehigkeit eine Zeile `name 0|1` in eine
//! temporaere Datei schreibt. Die Datei wird in jedem Fall wieder entfernt,
//! ein haengender Prozess nach Ablauf des Zeitlimits beendet.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use vimbridge_core::faehigkeiten::{EMBED, NETBEANS, NETBEANS_DOCUMENT_LISTEN};
use vimbridge_core::Faehigkeiten;

use crate::error::{BridgeError, BridgeResult};

/// Faehigkeit -> Vim-Ausdruck, der 0 oder 1 liefert
pub const PRUEF_AUSDRUECKE: &[(&str, &str)] = &[
    (EMBED, "has('gui_gtk') || has('gui_gtk2')"),
    (NETBEANS, "has('netbeans_intg')"),
    (
        NETBEANS_DOCUMENT_LISTEN,
        "has('netbeans_intg') && v:version >= 702",
    ),
];

/// Ermittelt die Faehigkeiten eines Editor-Programms
#[async_trait]
pub trait FaehigkeitsPruefer: Send + Sync {
    async fn pruefen(&self, programm: &Path) -> BridgeResult<Faehigkeiten>;
}

/// Prueft per Vim-Skript im Ex-Modus
#[derive(Debug, Clone)]
pub struct VimSkriptPruefer {
    timeout: Duration,
    temp_verzeichnis: Option<PathBuf>,
}

impl VimSkriptPruefer {
    pub fn neu(timeout: Duration) -> Self {
        Self {
            timeout,
            temp_verzeichnis: None,
        }
    }

    /// Temporaere Ausgabedatei in `verzeichnis` statt im System-Temp
    pub fn mit_temp_verzeichnis(mut self, verzeichnis: impl Into<PathBuf>) -> Self {
        self.temp_verzeichnis = Some(verzeichnis.into());
        self
    }

    /// Kommandozeile fuer den Editor, Ausgabe nach `ausgabe`
    pub fn argumente(ausgabe: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-u", "NONE", "-U", "NONE", "-N", "-i", "NONE", "-X", "-es"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        args.push("-c".into());
        args.push(format!("redir! > {}", ausgabe.display()));
        for (name, ausdruck) in PRUEF_AUSDRUECKE {
            args.push("-c".into());
            args.push(format!("echo '{}' ({})", name, ausdruck));
        }
        args.push("-c".into());
        args.push("redir END".into());
        args.push("-c".into());
        args.push("qa!".into());
        args
    }

    fn temp_datei(&self) -> BridgeResult<NamedTempFile> {
        let ergebnis = match &self.temp_verzeichnis {
            Some(verzeichnis) => NamedTempFile::new_in(verzeichnis),
            None => NamedTempFile::new(),
        };
        ergebnis.map_err(|e| BridgeError::pruefung(format!("Temp-Datei: {e}")))
    }
}

impl Default for VimSkriptPruefer {
    fn default() -> Self {
        Self::neu(Duration::from_secs(10))
    }
}

#[async_trait]
impl FaehigkeitsPruefer for VimSkriptPruefer {
    async fn pruefen(&self, programm: &Path) -> BridgeResult<Faehigkeiten> {
        // Wird beim Verlassen der Funktion geloescht
        let ausgabe = self.temp_datei()?;

        let mut cmd = tokio::process::Command::new(programm);
        cmd.args(Self::argumente(ausgabe.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(programm = %programm.display(), "Starte Faehigkeits-Pruefung");

        let mut child = cmd.spawn().map_err(|e| {
            BridgeError::pruefung(format!("Start von {} fehlgeschlagen: {e}", programm.display()))
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .map_err(|e| BridgeError::pruefung(format!("Warten fehlgeschlagen: {e}")))?;
                if !status.success() {
                    tracing::debug!(code = ?status.code(), "Editor mit Fehlercode beendet");
                }
            }
            () = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                tracing::warn!(
                    programm = %programm.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Faehigkeits-Pruefung abgebrochen"
                );
                return Err(BridgeError::pruefung(format!(
                    "Zeitlimit von {:?} ueberschritten",
                    self.timeout
                )));
            }
        }

        let text = tokio::fs::read_to_string(ausgabe.path())
            .await
            .map_err(|e| BridgeError::pruefung(format!("Ausgabe nicht lesbar: {e}")))?;
        let faehigkeiten = ausgabe_parsen(&text);
        tracing::info!(faehigkeiten = ?faehigkeiten, "Editor-Faehigkeiten ermittelt");
        Ok(faehigkeiten)
    }
}

/// Parst Zeilen der Form `name 0|1`, andere Zeilen werden ignoriert
pub fn ausgabe_parsen(text: &str) -> Faehigkeiten {
    let mut faehigkeiten = Faehigkeiten::neu();
    for zeile in text.lines() {
        let mut teile = zeile.split_whitespace();
        let (Some(name), Some(wert), None) = (teile.next(), teile.next(), teile.next()) else {
            continue;
        };
        match wert {
            "1" => faehigkeiten.setzen(name, true),
            "0" => faehigkeiten.setzen(name, false),
            _ => {}
        }
    }
    faehigkeiten
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ausgabe_parsen_liest_flags() {
        let f = ausgabe_parsen("\nembed 0\nnetbeans 1\nnetbeansDocumentListen 1\nmuell\nx y z\n");
        assert!(!f.hat(EMBED));
        assert!(f.hat_netbeans());
        assert!(f.hat(NETBEANS_DOCUMENT_LISTEN));
        assert_eq!(f.eintraege().count(), 3);
    }

    #[test]
    fn argumente_enthalten_redir() {
        let args = VimSkriptPruefer::argumente(Path::new("/tmp/aus.txt"));
        assert!(args.contains(&"redir! > /tmp/aus.txt".to_string()));
        assert!(args.contains(&"echo 'netbeans' (has('netbeans_intg'))".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("qa!"));
    }

    #[cfg(unix)]
    fn skript_schreiben(verzeichnis: &Path, inhalt: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let pfad = verzeichnis.join("fake-editor.sh");
        std::fs::write(&pfad, inhalt).unwrap();
        std::fs::set_permissions(&pfad, std::fs::Permissions::from_mode(0o755)).unwrap();
        pfad
    }

    #[cfg(unix)]
    const FAKE_EDITOR: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    "redir! > "*) out="${arg#redir! > }" ;;
  esac
done
printf 'embed 0\nnetbeans 1\nnetbeansDocumentListen 0\n' > "$out"
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn pruefen_mit_fake_editor() {
        let skripte = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let programm = skript_schreiben(skripte.path(), FAKE_EDITOR);

        let pruefer = VimSkriptPruefer::neu(Duration::from_secs(5)).mit_temp_verzeichnis(temp.path());
        let f = pruefer.pruefen(&programm).await.unwrap();
        assert!(f.hat_netbeans());
        assert!(!f.hat(NETBEANS_DOCUMENT_LISTEN));

        // Ausgabedatei wurde entfernt
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zeitlimit_beendet_prozess() {
        let skripte = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let programm = skript_schreiben(skripte.path(), "#!/bin/sh\nsleep 30\n");

        let pruefer =
            VimSkriptPruefer::neu(Duration::from_millis(200)).mit_temp_verzeichnis(temp.path());
        let start = std::time::Instant::now();
        let ergebnis = pruefer.pruefen(&programm).await;
        assert!(matches!(ergebnis, Err(BridgeError::Pruefung(_))));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fehlendes_programm() {
        let temp = tempfile::tempdir().unwrap();
        let pruefer = VimSkriptPruefer::default().mit_temp_verzeichnis(temp.path());
        let ergebnis = pruefer
            .pruefen(Path::new("/gibt/es/nicht/vim"))
            .await;
        assert!(matches!(ergebnis, Err(BridgeError::Pruefung(_))));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
