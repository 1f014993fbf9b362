use super::{arg, arg_i32};
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, ProvasTurma, Request};

const TURNOS: &[&str] = &["morning", "afternoon", "evening"];

fn campo_data(req: &Request, idx: usize) -> Option<String> {
    req.args
        .get(idx)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `SET_PROVAS_TURMA|id|np1?|np2?|pim?|exame?` — empty fields clear the date.
fn set_provas(state: &AppState, req: &Request) -> Result<String, String> {
    let id = arg_i32(req, 0, "id_turma")?;
    let datas = ProvasTurma {
        np1: campo_data(req, 1),
        np2: campo_data(req, 2),
        pim: campo_data(req, 3),
        exame: campo_data(req, 4),
    };
    let (_, saved) = state.provas.update(|p| p.insert(id.to_string(), datas));
    if !saved {
        return Err("falha ao gravar calendário de provas".to_string());
    }
    Ok(sucesso(format!("provas da turma {} agendadas", id)))
}

fn get_provas(state: &AppState, req: &Request) -> Result<String, String> {
    let id = arg_i32(req, 0, "id_turma")?;
    let provas = state.provas.read();
    let datas = provas.get(&id.to_string()).cloned().unwrap_or_default();
    Ok(format!(
        "NP1: {} | NP2: {} | PIM: {} | Exame: {}",
        datas.np1.as_deref().unwrap_or("-"),
        datas.np2.as_deref().unwrap_or("-"),
        datas.pim.as_deref().unwrap_or("-"),
        datas.exame.as_deref().unwrap_or("-")
    ))
}

fn set_turno(state: &AppState, req: &Request) -> Result<String, String> {
    let id = arg_i32(req, 0, "id_turma")?;
    let turno = arg(req, 1, "turno")?.trim().to_lowercase();
    if !TURNOS.contains(&turno.as_str()) {
        return Err(format!(
            "turno inválido: {} (esperado morning, afternoon ou evening)",
            turno
        ));
    }
    let (_, saved) = state.turnos.update(|t| t.insert(id.to_string(), turno));
    if !saved {
        return Err("falha ao gravar turnos".to_string());
    }
    Ok(sucesso(format!("turno da turma {} definido", id)))
}

fn get_turno(state: &AppState, req: &Request) -> Result<String, String> {
    let id = arg_i32(req, 0, "id_turma")?;
    let turnos = state.turnos.read();
    match turnos.get(&id.to_string()) {
        Some(turno) => Ok(format!("Turno: {}", turno)),
        None => Err(format!("turma {} não tem turno definido", id)),
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "SET_PROVAS_TURMA" => set_provas(state, req),
        "GET_PROVAS_TURMA" => get_provas(state, req),
        "SET_TURNO_TURMA" => set_turno(state, req),
        "GET_TURNO_TURMA" => get_turno(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
