pub mod alunos;
pub mod anotacoes;
pub mod arquivos;
pub mod contas;
pub mod notas;
pub mod presencas;
pub mod provas;
pub mod turmas;

use std::sync::Arc;

use crate::engine::ClassEngine;
use crate::protocol::types::{AppState, Request};

pub(crate) fn arg<'a>(req: &'a Request, idx: usize, name: &str) -> Result<&'a str, String> {
    req.args
        .get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("campo obrigatório ausente: {}", name))
}

pub(crate) fn arg_i32(req: &Request, idx: usize, name: &str) -> Result<i32, String> {
    let raw = arg(req, idx, name)?;
    raw.trim()
        .parse::<i32>()
        .map_err(|_| format!("campo numérico inválido: {} ({})", name, raw))
}

pub(crate) fn arg_f32(req: &Request, idx: usize, name: &str) -> Result<f32, String> {
    let raw = arg(req, idx, name)?;
    raw.trim()
        .replace(',', ".")
        .parse::<f32>()
        .map_err(|_| format!("campo numérico inválido: {} ({})", name, raw))
}

/// Engine-dependent commands short-circuit with a fixed message when the
/// native library was not loaded at startup.
pub(crate) fn engine(state: &AppState) -> Result<&Arc<dyn ClassEngine>, String> {
    state
        .engine
        .as_ref()
        .ok_or_else(|| "motor de dados nativo indisponível".to_string())
}
