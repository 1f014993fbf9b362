use super::arg;
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{Anotacao, AppState, Request};
use chrono::Utc;

/// The payload of ADD/UPDATE is a JSON object; pipes inside the body are
/// legal, so the arguments are rejoined before parsing.
fn parse_anotacao(req: &Request) -> Result<Anotacao, String> {
    let blob = req.raw_payload();
    if blob.trim().is_empty() {
        return Err("anotação vazia".to_string());
    }
    let mut nota: Anotacao =
        serde_json::from_str(&blob).map_err(|e| format!("JSON inválido: {}", e))?;
    if nota.titulo.trim().is_empty() {
        return Err("anotação sem título".to_string());
    }
    if nota.data.is_empty() {
        nota.data = Utc::now().to_rfc3339();
    }
    Ok(nota)
}

fn get_anotacoes(state: &AppState) -> Result<String, String> {
    let notas = state.anotacoes.read();
    serde_json::to_string(&*notas).map_err(|e| format!("falha ao serializar anotações: {}", e))
}

fn add_anotacao(state: &AppState, req: &Request) -> Result<String, String> {
    let nota = parse_anotacao(req)?;
    let (dup, saved) = state.anotacoes.update(|notas| {
        if notas.iter().any(|n| n.titulo == nota.titulo) {
            return true;
        }
        notas.push(nota.clone());
        false
    });
    if dup {
        return Err(format!("anotação '{}' já existe", nota.titulo));
    }
    if !saved {
        return Err("falha ao gravar anotações".to_string());
    }
    Ok(sucesso(format!("anotação '{}' adicionada", nota.titulo)))
}

fn update_anotacao(state: &AppState, req: &Request) -> Result<String, String> {
    let nota = parse_anotacao(req)?;
    let (found, saved) = state.anotacoes.update(|notas| {
        match notas.iter_mut().find(|n| n.titulo == nota.titulo) {
            Some(existente) => {
                *existente = nota.clone();
                true
            }
            None => false,
        }
    });
    if !found {
        return Err(format!("anotação '{}' não encontrada", nota.titulo));
    }
    if !saved {
        return Err("falha ao gravar anotações".to_string());
    }
    Ok(sucesso(format!("anotação '{}' atualizada", nota.titulo)))
}

fn delete_anotacao(state: &AppState, req: &Request) -> Result<String, String> {
    let titulo = arg(req, 0, "titulo")?.trim().to_string();
    let (found, saved) = state.anotacoes.update(|notas| {
        let antes = notas.len();
        notas.retain(|n| n.titulo != titulo);
        notas.len() != antes
    });
    if !found {
        return Err(format!("anotação '{}' não encontrada", titulo));
    }
    if !saved {
        return Err("falha ao gravar anotações".to_string());
    }
    Ok(sucesso(format!("anotação '{}' removida", titulo)))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "GET_ANOTACOES" => get_anotacoes(state),
        "ADD_ANOTACAO" => add_anotacao(state, req),
        "UPDATE_ANOTACAO" => update_anotacao(state, req),
        "DELETE_ANOTACAO" => delete_anotacao(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
