use super::{arg, arg_i32, engine};
use crate::auth::{self, Role};
use crate::engine::Turma;
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, Request};

fn add_turma(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let id = arg_i32(req, 0, "id")?;
    let disciplina = arg(req, 1, "disciplina")?.trim().to_string();
    let professor = arg(req, 2, "professor")?.trim().to_string();
    if disciplina.is_empty() {
        return Err("disciplina vazia".to_string());
    }
    if eng.turma_existe(id) {
        return Err(format!("turma {} já existe", id));
    }
    eng.salvar_turma(&Turma {
        id,
        disciplina: disciplina.clone(),
        professor: professor.clone(),
    });

    // Administrative creation auto-provisions an approved teacher account.
    // A professor who already owns an account just gains access to the turma.
    let mut extra = String::new();
    if !professor.is_empty() {
        let base = auth::username_slug(&professor);
        match state.users.get(&base) {
            Some(conta) if conta.role == Role::Teacher => {
                let mut turmas = conta.turmas;
                let id_str = id.to_string();
                if !turmas.contains(&id_str) {
                    turmas.push(id_str);
                    state.users.set_turmas(&base, turmas)?;
                }
            }
            _ => {
                let username = state.users.generate_username(&professor);
                let senha = auth::generate_temp_password();
                state
                    .users
                    .add_user(&username, &senha, Role::Teacher, None, false, None, None)?;
                state.users.set_turmas(&username, vec![id.to_string()])?;
                extra = format!(
                    " Conta do professor: {} | Senha temporária: {}",
                    username, senha
                );
            }
        }
    }

    Ok(sucesso(format!(
        "turma {} ({}) adicionada.{}",
        id, disciplina, extra
    )))
}

fn list_turmas(state: &AppState) -> Result<String, String> {
    let eng = engine(state)?;
    let turmas = eng.listar_turmas();
    if turmas.is_empty() {
        return Ok("Nenhuma turma cadastrada.".to_string());
    }
    let turnos = state.turnos.read();
    let linhas: Vec<String> = turmas
        .iter()
        .map(|t| {
            let turno = turnos
                .get(&t.id.to_string())
                .map(String::as_str)
                .unwrap_or("-");
            format!(
                "ID: {} | Disciplina: {} | Professor: {} | Turno: {}",
                t.id, t.disciplina, t.professor, turno
            )
        })
        .collect();
    Ok(linhas.join("\n"))
}

fn update_turma(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let id = arg_i32(req, 0, "id")?;
    let disciplina = arg(req, 1, "disciplina")?.trim();
    let professor = arg(req, 2, "professor")?.trim();
    if !eng.atualizar_turma(id, disciplina, professor) {
        return Err(format!("turma {} não encontrada", id));
    }
    Ok(sucesso(format!("turma {} atualizada", id)))
}

fn delete_turma(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let id = arg_i32(req, 0, "id")?;
    if !eng.deletar_turma(id) {
        return Err(format!("turma {} não encontrada", id));
    }
    // Secondary state keyed by this turma goes with it. Best effort: a
    // failed cleanup save does not undo the engine delete.
    let chave = id.to_string();
    state.turnos.update(|t| t.remove(&chave));
    state.provas.update(|p| p.remove(&chave));
    let _ = std::fs::remove_file(state.records.presencas_file(id));
    Ok(sucesso(format!("turma {} removida", id)))
}

fn change_id_turma(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let antigo = arg_i32(req, 0, "id_antigo")?;
    let novo = arg_i32(req, 1, "id_novo")?;
    if !eng.alterar_id_turma(antigo, novo) {
        return Err(format!(
            "não foi possível alterar id {} para {}",
            antigo, novo
        ));
    }
    let de = antigo.to_string();
    let para = novo.to_string();
    state.turnos.update(|t| {
        if let Some(v) = t.remove(&de) {
            t.insert(para.clone(), v);
        }
    });
    state.provas.update(|p| {
        if let Some(v) = p.remove(&de) {
            p.insert(para.clone(), v);
        }
    });
    Ok(sucesso(format!("turma {} agora tem id {}", antigo, novo)))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "ADD_TURMA" => add_turma(state, req),
        "LIST_TURMAS" => list_turmas(state),
        "UPDATE_TURMA" => update_turma(state, req),
        "DELETE_TURMA" => delete_turma(state, req),
        "CHANGE_ID_TURMA" => change_id_turma(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
