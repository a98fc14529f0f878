//! Integrationstest: Server aus Konfiguration starten und ansprechen

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use vimbridge_server::config::ServerConfig;
use vimbridge_server::Server;

#[tokio::test]
async fn server_aus_toml_starten() {
    let cfg: ServerConfig = toml::from_str(
        r#"
            [bridge]
            port = 0
            passwort = "geheim"

            [admin]
            aktiviert = true
            port = 0
        "#,
    )
    .unwrap();

    let server = Server::neu(cfg);
    server.starten().await.unwrap();
    let adresse = server.bridge().lokale_adresse().expect("Server laeuft");

    let stream = TcpStream::connect(adresse).await.unwrap();
    let (leser, mut schreiber) = stream.into_split();
    let mut leser = BufReader::new(leser);
    schreiber
        .write_all(b"AUTH geheim\n3:fileOpened=1 \"a.txt\" T F\n")
        .await
        .unwrap();

    let mut zeile = String::new();
    leser.read_line(&mut zeile).await.unwrap();
    assert_eq!(zeile, "3:initDone!0\n");

    server.bridge().stoppen().await;
    assert!(!server.bridge().laeuft());
}
