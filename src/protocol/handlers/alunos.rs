use super::{arg, arg_i32, engine};
use crate::auth::{self, Role};
use crate::engine::Aluno;
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, Request};
use crate::records::Notas;

fn add_aluno(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let id_turma = arg_i32(req, 0, "id_turma")?;
    let matricula = arg_i32(req, 1, "matricula")?;
    let nome = arg(req, 2, "nome")?.trim().to_string();
    if nome.is_empty() {
        return Err("nome vazio".to_string());
    }
    if !eng.turma_existe(id_turma) {
        return Err(format!("turma {} não encontrada", id_turma));
    }
    if eng.matricula_existe(matricula) {
        return Err(format!("matrícula {} já existe", matricula));
    }
    eng.salvar_aluno(&Aluno {
        id_turma,
        matricula,
        nome: nome.clone(),
        notas: Notas::default(),
    });

    // Auto-provisioned student account, already approved, shift inherited
    // from the turma.
    let username = state.users.generate_username(&nome);
    let senha = auth::generate_temp_password();
    let turno = state.turnos.read().get(&id_turma.to_string()).cloned();
    state.users.add_user(
        &username,
        &senha,
        Role::Student,
        None,
        false,
        turno.as_deref(),
        Some(matricula),
    )?;

    Ok(sucesso(format!(
        "aluno {} (matrícula {}) adicionado à turma {}. Usuário: {} | Senha temporária: {}",
        nome, matricula, id_turma, username, senha
    )))
}

fn list_alunos(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let id_turma = arg_i32(req, 0, "id_turma")?;
    if !eng.turma_existe(id_turma) {
        return Err(format!("turma {} não encontrada", id_turma));
    }
    let alunos = eng.listar_alunos_por_turma(id_turma);
    if alunos.is_empty() {
        return Ok("Nenhum aluno na turma.".to_string());
    }
    let linhas: Vec<String> = alunos
        .iter()
        .map(|a| {
            format!(
                "Matricula: {} | Nome: {} | Media: {:.1}",
                a.matricula, a.nome, a.notas.media
            )
        })
        .collect();
    Ok(linhas.join("\n"))
}

fn get_aluno(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let matricula = arg_i32(req, 0, "matricula")?;
    let aluno = eng
        .buscar_aluno_por_matricula(matricula)
        .ok_or_else(|| format!("matrícula {} não encontrada", matricula))?;
    Ok(format!(
        "Matricula: {} | Nome: {} | Turma: {} | NP1: {:.1} | NP2: {:.1} | PIM: {:.1} | Media: {:.1}",
        aluno.matricula,
        aluno.nome,
        aluno.id_turma,
        aluno.notas.np1,
        aluno.notas.np2,
        aluno.notas.pim,
        aluno.notas.media
    ))
}

fn update_aluno(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let matricula = arg_i32(req, 0, "matricula")?;
    let nome = arg(req, 1, "nome")?.trim();
    if nome.is_empty() {
        return Err("nome vazio".to_string());
    }
    if !eng.atualizar_aluno(matricula, nome) {
        return Err(format!("matrícula {} não encontrada", matricula));
    }
    Ok(sucesso(format!("aluno {} atualizado", matricula)))
}

fn delete_aluno(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let matricula = arg_i32(req, 0, "matricula")?;
    if !eng.deletar_aluno(matricula) {
        return Err(format!("matrícula {} não encontrada", matricula));
    }
    state.exames.update(|e| e.remove(&matricula.to_string()));
    // The fallback grade record goes with the aluno; a reused matricula must
    // not inherit it.
    let _ = state.records.delete_notas(matricula);
    Ok(sucesso(format!("aluno {} removido", matricula)))
}

fn change_matricula(state: &AppState, req: &Request) -> Result<String, String> {
    let eng = engine(state)?;
    let antiga = arg_i32(req, 0, "matricula_antiga")?;
    let nova = arg_i32(req, 1, "matricula_nova")?;
    if !eng.alterar_matricula_aluno(antiga, nova) {
        return Err(format!(
            "não foi possível alterar matrícula {} para {}",
            antiga, nova
        ));
    }
    state.exames.update(|e| {
        if let Some(v) = e.remove(&antiga.to_string()) {
            e.insert(nova.to_string(), v);
        }
    });
    let _ = state.records.rename_notas(antiga, nova);
    Ok(sucesso(format!(
        "matrícula {} alterada para {}",
        antiga, nova
    )))
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "ADD_ALUNO" => add_aluno(state, req),
        "LIST_ALUNOS" => list_alunos(state, req),
        "GET_ALUNO" => get_aluno(state, req),
        "UPDATE_ALUNO" => update_aluno(state, req),
        "DELETE_ALUNO" => delete_aluno(state, req),
        "CHANGE_MATRICULA" => change_matricula(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
