//! Connection server: one OS thread per accepted client, a read-line loop
//! per connection. A connection failing mid-command only takes its own
//! thread down; the accept loop keeps serving everyone else.

use log::{debug, error, info};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::protocol::handlers::arquivos;
use crate::protocol::{dispatch, AppState, Request};

pub fn run(listener: TcpListener, state: Arc<AppState>) {
    for conexao in listener.incoming() {
        match conexao {
            Ok(stream) => {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "?".to_string());
                    info!("conexão aberta: {}", peer);
                    if let Err(e) = handle_connection(stream, &state) {
                        debug!("conexão {} encerrada com erro: {}", peer, e);
                    }
                    info!("conexão fechada: {}", peer);
                });
            }
            Err(e) => error!("falha no accept: {}", e),
        }
    }
}

/// Serves one client until EOF or transport error. Commands arrive one per
/// line; the two file commands switch into the raw byte sub-protocol and
/// then return here.
pub fn handle_connection(stream: TcpStream, state: &AppState) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }

        let req = Request::parse(trimmed);
        debug!("comando: {}", req.command);
        match req.command.as_str() {
            "UPLOAD_FILE" => arquivos::upload(state, &req, &mut reader, &mut writer)?,
            "DOWNLOAD_FILE" => arquivos::download(state, &req, &mut writer)?,
            _ => {
                let resposta = dispatch(state, &req);
                writer.write_all(resposta.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
        }
    }
}
