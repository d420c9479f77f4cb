//! Scripted FTP servers for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;

use rax_ftp_client::config::{ClientConfig, ConnectionConfig, TransferConfig};
use rax_ftp_client::transfer::TransferMode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Server side of one control connection
pub struct ScriptedPeer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Every command line the client sent, in order
    pub received: Vec<String>,
    /// Bytes received on data connections
    pub uploaded: Vec<u8>,
}

impl ScriptedPeer {
    pub async fn reply(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Next command line, or `None` once the client hung up.
    pub async fn command(&mut self) -> Option<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await.unwrap_or(0) == 0 {
            return None;
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        self.received.push(line.clone());
        Some(line)
    }

    pub async fn expect(&mut self, prefix: &str) -> String {
        let line = self.command().await.expect("client hung up");
        assert!(line.starts_with(prefix), "expected {prefix}, got {line}");
        line
    }

    pub async fn login(&mut self) {
        self.expect("USER").await;
        self.reply("331 Password required").await;
        self.expect("PASS").await;
        self.reply("230 Logged in").await;
        self.expect("TYPE I").await;
        self.reply("200 Type set to I").await;
    }

    /// Answers `PASV` with a fresh listener on the loopback interface.
    pub async fn passive(&mut self) -> TcpListener {
        self.expect("PASV").await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        self.reply(&format!(
            "227 Entering Passive Mode (127,0,0,1,{},{})",
            port >> 8,
            port & 0xff
        ))
        .await;
        listener
    }

    /// Accepts `PORT` and returns the address the client listens on.
    pub async fn active(&mut self) -> SocketAddr {
        let line = self.expect("PORT").await;
        let numbers: Vec<u16> = line[5..].split(',').map(|n| n.trim().parse().unwrap()).collect();
        assert_eq!(numbers.len(), 6);
        self.reply("200 PORT command successful").await;
        let ip = format!("{}.{}.{}.{}", numbers[0], numbers[1], numbers[2], numbers[3]);
        format!("{}:{}", ip, numbers[4] * 256 + numbers[5]).parse().unwrap()
    }

    /// Answers `QUIT` and reads until the client hangs up.
    pub async fn drain(&mut self) {
        while let Some(line) = self.command().await {
            if line == "QUIT" {
                self.reply("221 Goodbye").await;
            }
        }
    }
}

/// Binds a server that greets with `220` and then runs `script`.
pub async fn spawn_server<F, Fut>(script: F) -> (SocketAddr, JoinHandle<ScriptedPeer>)
where
    F: FnOnce(ScriptedPeer) -> Fut + Send + 'static,
    Fut: Future<Output = ScriptedPeer> + Send + 'static,
{
    spawn_server_with_greeting("220 Service ready", script).await
}

pub async fn spawn_server_with_greeting<F, Fut>(
    greeting: &'static str,
    script: F,
) -> (SocketAddr, JoinHandle<ScriptedPeer>)
where
    F: FnOnce(ScriptedPeer) -> Fut + Send + 'static,
    Fut: Future<Output = ScriptedPeer> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut peer = ScriptedPeer {
            reader: BufReader::new(read_half),
            writer: write_half,
            received: Vec::new(),
            uploaded: Vec::new(),
        };
        peer.reply(greeting).await;
        script(peer).await
    });

    (addr, handle)
}

/// Client settings pointing at `addr`, with files under `local_root`.
pub fn client_config(addr: SocketAddr, local_root: &Path, grace_ms: u64) -> ClientConfig {
    ClientConfig {
        connection: ConnectionConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            username: "tester".into(),
            password: "secret".into(),
            connect_timeout_secs: 5,
            reply_timeout_secs: 5,
        },
        transfer: TransferConfig {
            transfer_mode: TransferMode::Passive,
            buffer_size: 4,
            data_timeout_secs: 5,
            grace_period_ms: grace_ms,
            local_root: local_root.display().to_string(),
        },
    }
}

/// Accepts one data connection and writes `payload` on it.
pub async fn serve_data(listener: &TcpListener, payload: &[u8]) {
    let (mut data, _) = listener.accept().await.unwrap();
    data.write_all(payload).await.unwrap();
    data.shutdown().await.unwrap();
}

/// Connects to the client's active-mode listener and writes `payload`.
pub async fn push_data(addr: SocketAddr, payload: &[u8]) {
    let mut data = TcpStream::connect(addr).await.unwrap();
    data.write_all(payload).await.unwrap();
    data.shutdown().await.unwrap();
}
