//! Per-turma file exchange. `UPLOAD_FILE` and `DOWNLOAD_FILE` leave the
//! line protocol for a raw byte sub-protocol, so the connection loop calls
//! into this module with the socket halves instead of going through the
//! router.

use super::{arg, arg_i32};
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, Request};
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

fn turma_dir(state: &AppState, id_turma: i32) -> PathBuf {
    state.uploads_dir.join(format!("turma_{}", id_turma))
}

/// Directory components and anything outside `[A-Za-z0-9._-]` are dropped
/// from client-supplied names.
fn sanitize_name(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw);
    let clean: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if clean.is_empty() {
        "arquivo".to_string()
    } else {
        clean
    }
}

/// `UPLOAD_FILE|id_turma|nome|tamanho`: answers `PRONTO`, then reads exactly
/// `tamanho` bytes into `uploads/turma_{id}/{timestamp}_{nome}`. A peer that
/// closes early leaves a truncated file behind; this layer is best effort
/// and attempts no cleanup.
pub fn upload(
    state: &AppState,
    req: &Request,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    let parsed = (|| -> Result<(i32, String, u64), String> {
        let id_turma = arg_i32(req, 0, "id_turma")?;
        let nome = sanitize_name(arg(req, 1, "nome")?);
        let tamanho = arg(req, 2, "tamanho")?
            .trim()
            .parse::<u64>()
            .map_err(|_| "tamanho inválido".to_string())?;
        Ok((id_turma, nome, tamanho))
    })();
    let (id_turma, nome, tamanho) = match parsed {
        Ok(v) => v,
        Err(e) => {
            writer.write_all(erro(e).as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            return Ok(());
        }
    };

    let _guard = state.write_lock.lock().unwrap_or_else(|e| e.into_inner());

    let dir = turma_dir(state, id_turma);
    std::fs::create_dir_all(&dir)?;
    let destino = dir.join(format!("{}_{}", Utc::now().timestamp(), nome));

    writer.write_all(b"PRONTO\n")?;
    writer.flush()?;

    let mut file = File::create(&destino)?;
    let recebido = std::io::copy(&mut reader.take(tamanho), &mut file)?;
    log::info!(
        "upload turma {}: {} ({}/{} bytes)",
        id_turma,
        destino.to_string_lossy(),
        recebido,
        tamanho
    );

    let resposta = sucesso(format!(
        "arquivo {} recebido ({} bytes)",
        destino
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        recebido
    ));
    writer.write_all(resposta.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// `DOWNLOAD_FILE|id_turma|nome`: answers `OK_DOWNLOAD|size` and streams the
/// raw bytes. No trailing status line follows, so the client's byte-count
/// loop terminates on its own.
pub fn download(state: &AppState, req: &Request, writer: &mut impl Write) -> anyhow::Result<()> {
    let parsed = (|| -> Result<PathBuf, String> {
        let id_turma = arg_i32(req, 0, "id_turma")?;
        let nome = sanitize_name(arg(req, 1, "nome")?);
        Ok(turma_dir(state, id_turma).join(nome))
    })();
    let caminho = match parsed {
        Ok(p) => p,
        Err(e) => {
            writer.write_all(erro(e).as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            return Ok(());
        }
    };

    let mut file = match File::open(&caminho) {
        Ok(f) => f,
        Err(_) => {
            writer.write_all(erro("arquivo não encontrado").as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            return Ok(());
        }
    };
    let tamanho = file.metadata()?.len();

    writer.write_all(format!("OK_DOWNLOAD|{}\n", tamanho).as_bytes())?;
    std::io::copy(&mut file, writer)?;
    writer.flush()?;
    Ok(())
}

fn list_files(state: &AppState, req: &Request) -> Result<String, String> {
    let id_turma = arg_i32(req, 0, "id_turma")?;
    let dir = turma_dir(state, id_turma);
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(_) => return Ok("Nenhum arquivo na turma.".to_string()),
    };
    let mut nomes: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    if nomes.is_empty() {
        return Ok("Nenhum arquivo na turma.".to_string());
    }
    nomes.sort();
    Ok(nomes.join("\n"))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "LIST_FILES" => list_files(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
