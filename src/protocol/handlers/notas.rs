use super::{arg_f32, arg_i32};
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, Request};
use crate::records::Notas;

/// Grades go to the native engine when it knows the matricula, and always to
/// the binary fallback file, so a later engine outage still serves them.
fn update_notas(state: &AppState, req: &Request) -> Result<String, String> {
    let matricula = arg_i32(req, 0, "matricula")?;
    let notas = Notas {
        np1: arg_f32(req, 1, "np1")?,
        np2: arg_f32(req, 2, "np2")?,
        pim: arg_f32(req, 3, "pim")?,
        media: arg_f32(req, 4, "media")?,
    };

    if let Some(eng) = &state.engine {
        if eng.matricula_existe(matricula) && !eng.salvar_notas(matricula, &notas) {
            return Err(format!(
                "falha ao gravar notas da matrícula {} no motor",
                matricula
            ));
        }
    }
    state
        .records
        .save_notas(matricula, &notas)
        .map_err(|_| "falha ao gravar arquivo de notas".to_string())?;

    Ok(sucesso(format!(
        "notas da matrícula {} atualizadas",
        matricula
    )))
}

fn get_notas(state: &AppState, req: &Request) -> Result<String, String> {
    let matricula = arg_i32(req, 0, "matricula")?;
    let notas = state
        .engine
        .as_ref()
        .and_then(|eng| eng.buscar_notas(matricula))
        .or_else(|| state.records.load_notas().get(&matricula).copied())
        .ok_or_else(|| format!("notas da matrícula {} não encontradas", matricula))?;
    Ok(format!(
        "NP1: {:.1} | NP2: {:.1} | PIM: {:.1} | Media: {:.1}",
        notas.np1, notas.np2, notas.pim, notas.media
    ))
}

fn set_exame(state: &AppState, req: &Request) -> Result<String, String> {
    let matricula = arg_i32(req, 0, "matricula")?;
    let nota = arg_f32(req, 1, "nota")?;
    let (_, saved) = state
        .exames
        .update(|e| e.insert(matricula.to_string(), nota));
    if !saved {
        return Err("falha ao gravar exames".to_string());
    }
    Ok(sucesso(format!(
        "exame da matrícula {} registrado: {:.1}",
        matricula, nota
    )))
}

fn get_exame(state: &AppState, req: &Request) -> Result<String, String> {
    let matricula = arg_i32(req, 0, "matricula")?;
    let exames = state.exames.read();
    match exames.get(&matricula.to_string()) {
        Some(nota) => Ok(format!("Exame: {:.1}", nota)),
        None => Err(format!("exame da matrícula {} não encontrado", matricula)),
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "UPDATE_NOTAS" => update_notas(state, req),
        "GET_NOTAS" => get_notas(state, req),
        "SET_EXAME" => set_exame(state, req),
        "GET_EXAME" => get_exame(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
