use super::error::erro;
use super::handlers;
use super::types::{AppState, Request};

/// Commands that write to shared state. They serialize on the process-wide
/// lock; everything else dispatches without it and may observe a
/// stale-but-consistent snapshot.
const MUTATING: &[&str] = &[
    "ADD_TURMA",
    "UPDATE_TURMA",
    "DELETE_TURMA",
    "CHANGE_ID_TURMA",
    "ADD_ALUNO",
    "UPDATE_ALUNO",
    "DELETE_ALUNO",
    "CHANGE_MATRICULA",
    "UPDATE_NOTAS",
    "SET_EXAME",
    "SAVE_PRESENCAS",
    "LOGIN",
    "LOGOUT",
    "CREATE_USER",
    "DELETE_USER",
    "APPROVE_USER",
    "REJECT_USER",
    "CHANGE_PASSWORD",
    "SET_PASSWORD",
    "SET_SECRET_QUESTION",
    "SET_USER_TURMAS",
    "UPDATE_PROFILE",
    "SET_PROVAS_TURMA",
    "SET_TURNO_TURMA",
    "ADD_ANOTACAO",
    "UPDATE_ANOTACAO",
    "DELETE_ANOTACAO",
];

pub fn is_mutating(command: &str) -> bool {
    MUTATING.contains(&command)
}

pub fn dispatch(state: &AppState, req: &Request) -> String {
    let _guard = if is_mutating(&req.command) {
        Some(
            state
                .write_lock
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        )
    } else {
        None
    };

    if let Some(resp) = handlers::turmas::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::alunos::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::notas::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::presencas::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::arquivos::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::contas::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::provas::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::anotacoes::try_handle(state, req) {
        return resp;
    }

    erro(format!("comando desconhecido: {}", req.command))
}
