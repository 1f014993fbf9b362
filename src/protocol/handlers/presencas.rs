use super::{arg, arg_i32};
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, Request};

/// `SAVE_PRESENCAS|id_turma|data|matricula:presente;...`
/// The batch is merged into the turma file keyed on (matricula, data).
fn save_presencas(state: &AppState, req: &Request) -> Result<String, String> {
    let id_turma = arg_i32(req, 0, "id_turma")?;
    let data = arg(req, 1, "data")?.trim();
    if data.len() != 10 {
        return Err(format!("data inválida: {} (esperado DD/MM/AAAA)", data));
    }
    let lista = arg(req, 2, "lista")?;

    let mut marcas = Vec::new();
    for item in lista.split(';').filter(|s| !s.trim().is_empty()) {
        let Some((mat, pres)) = item.split_once(':') else {
            return Err(format!("item de presença inválido: {}", item));
        };
        let matricula = mat
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("matrícula inválida: {}", mat))?;
        let presente = match pres.trim() {
            "1" => true,
            "0" => false,
            other => return Err(format!("presença inválida: {}", other)),
        };
        marcas.push((matricula, presente));
    }
    if marcas.is_empty() {
        return Err("nenhuma presença informada".to_string());
    }

    state
        .records
        .save_presencas(id_turma, data, &marcas)
        .map_err(|_| "falha ao gravar arquivo de presenças".to_string())?;
    Ok(sucesso(format!(
        "{} presenças registradas para a turma {} em {}",
        marcas.len(),
        id_turma,
        data
    )))
}

fn get_presencas(state: &AppState, req: &Request) -> Result<String, String> {
    let id_turma = arg_i32(req, 0, "id_turma")?;
    let filtro_data = req
        .args
        .get(1)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let registros = state.records.load_presencas(id_turma);
    let linhas: Vec<String> = registros
        .iter()
        .filter(|p| filtro_data.as_deref().map_or(true, |d| p.data == d))
        .map(|p| {
            format!(
                "Matricula: {} | Data: {} | Presente: {}",
                p.matricula,
                p.data,
                if p.presente { "sim" } else { "nao" }
            )
        })
        .collect();
    if linhas.is_empty() {
        return Ok("Nenhuma presença registrada.".to_string());
    }
    Ok(linhas.join("\n"))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "SAVE_PRESENCAS" => save_presencas(state, req),
        "GET_PRESENCAS" => get_presencas(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
