use super::{arg, arg_i32};
use crate::auth::{Role, Status};
use crate::protocol::error::{erro, sucesso};
use crate::protocol::types::{AppState, Request};
use std::str::FromStr;

fn login(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let senha = arg(req, 1, "senha")?;
    if !state.users.verify_user(user, senha) {
        // Fails closed for unknown users, wrong passwords and pending
        // accounts alike; the client gets no distinction.
        return Err("usuário ou senha inválidos".to_string());
    }
    state.users.record_login(user);
    let conta = state
        .users
        .get(user)
        .ok_or_else(|| "usuário ou senha inválidos".to_string())?;
    Ok(format!("SUCESSO|{}", conta.role))
}

fn logout(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let segundos = arg(req, 1, "segundos")?
        .trim()
        .parse::<u64>()
        .map_err(|_| "segundos inválidos".to_string())?;
    state.users.record_logout(user, segundos);
    Ok(sucesso("sessão encerrada"))
}

fn create_user(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let senha = arg(req, 1, "senha")?;
    let role = Role::from_str(arg(req, 2, "papel")?.trim())?;
    let email = req.args.get(3).map(|e| e.trim()).filter(|e| !e.is_empty());
    // Self-registration always lands pending until an admin approves it.
    state
        .users
        .add_user(user, senha, role, email, true, None, None)?;
    Ok(sucesso(format!(
        "usuário '{}' criado, aguardando aprovação",
        user
    )))
}

fn delete_user(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    state.users.delete_user(user)?;
    Ok(sucesso(format!("usuário '{}' removido", user)))
}

fn list_users(state: &AppState) -> Result<String, String> {
    let contas = state.users.list_users();
    if contas.is_empty() {
        return Ok("Nenhum usuário cadastrado.".to_string());
    }
    let linhas: Vec<String> = contas
        .iter()
        .map(|(nome, c)| {
            format!(
                "Usuario: {} | Papel: {} | Status: {}",
                nome,
                c.role,
                match c.status {
                    Status::Pending => "pending",
                    Status::Approved => "approved",
                }
            )
        })
        .collect();
    Ok(linhas.join("\n"))
}

fn list_pending(state: &AppState) -> Result<String, String> {
    let pendentes = state.users.list_pending();
    if pendentes.is_empty() {
        return Ok("Nenhum usuário pendente.".to_string());
    }
    Ok(pendentes.join("\n"))
}

fn approve_user(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    state.users.approve_user(user)?;
    Ok(sucesso(format!("usuário '{}' aprovado", user)))
}

fn reject_user(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    state.users.reject_user(user)?;
    Ok(sucesso(format!("usuário '{}' rejeitado e removido", user)))
}

fn change_password(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let antiga = arg(req, 1, "senha_antiga")?;
    let nova = arg(req, 2, "senha_nova")?;
    state.users.update_password(user, antiga, nova)?;
    Ok(sucesso("senha alterada"))
}

fn set_password(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let nova = arg(req, 1, "senha_nova")?;
    state.users.set_password(user, nova)?;
    Ok(sucesso(format!("senha de '{}' redefinida", user)))
}

fn set_secret_question(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let pergunta = arg(req, 1, "pergunta")?;
    let resposta = arg(req, 2, "resposta")?;
    state.users.set_secret_question(user, pergunta, resposta)?;
    Ok(sucesso("pergunta secreta definida"))
}

fn get_secret_question(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    state
        .users
        .secret_question(user)
        .map(|p| format!("Pergunta: {}", p))
        .ok_or_else(|| format!("usuário '{}' não tem pergunta secreta", user))
}

fn verify_secret_answer(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let resposta = arg(req, 1, "resposta")?;
    if state.users.verify_secret_answer(user, resposta) {
        Ok(sucesso("resposta correta"))
    } else {
        Err("resposta incorreta".to_string())
    }
}

fn set_user_turmas(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let ids: Vec<String> = arg(req, 1, "turmas")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    state.users.set_turmas(user, ids)?;
    Ok(sucesso(format!("turmas de '{}' atualizadas", user)))
}

fn get_user_info(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let conta = state
        .users
        .get(user)
        .ok_or_else(|| format!("usuário '{}' não encontrado", user))?;
    Ok(format!(
        "Usuario: {} | Papel: {} | Status: {} | Email: {} | Turno: {} | Matricula: {} | Turmas: {} | UltimoLogin: {} | TempoSessao: {}s",
        user,
        conta.role,
        match conta.status {
            Status::Pending => "pending",
            Status::Approved => "approved",
        },
        conta.email.as_deref().unwrap_or("-"),
        conta.turno.as_deref().unwrap_or("-"),
        conta
            .matricula
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string()),
        if conta.turmas.is_empty() {
            "-".to_string()
        } else {
            conta.turmas.join(",")
        },
        conta.ultimo_login.as_deref().unwrap_or("-"),
        conta.tempo_sessao_segundos
    ))
}

fn update_profile(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let campo = arg(req, 1, "campo")?;
    let valor = arg(req, 2, "valor")?;
    state.users.update_profile(user, campo, valor)?;
    Ok(sucesso(format!("perfil de '{}' atualizado", user)))
}

fn check_access(state: &AppState, req: &Request) -> Result<String, String> {
    let user = arg(req, 0, "usuario")?;
    let id_turma = arg_i32(req, 1, "id_turma")?;
    if state.users.can_access_subject(user, id_turma) {
        Ok(sucesso("acesso permitido"))
    } else {
        Err("acesso negado".to_string())
    }
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<String> {
    let out = match req.command.as_str() {
        "LOGIN" => login(state, req),
        "LOGOUT" => logout(state, req),
        "CREATE_USER" => create_user(state, req),
        "DELETE_USER" => delete_user(state, req),
        "LIST_USERS" => list_users(state),
        "LIST_PENDING_USERS" => list_pending(state),
        "APPROVE_USER" => approve_user(state, req),
        "REJECT_USER" => reject_user(state, req),
        "CHANGE_PASSWORD" => change_password(state, req),
        "SET_PASSWORD" => set_password(state, req),
        "SET_SECRET_QUESTION" => set_secret_question(state, req),
        "GET_SECRET_QUESTION" => get_secret_question(state, req),
        "VERIFY_SECRET_ANSWER" => verify_secret_answer(state, req),
        "SET_USER_TURMAS" => set_user_turmas(state, req),
        "GET_USER_INFO" => get_user_info(state, req),
        "UPDATE_PROFILE" => update_profile(state, req),
        "CHECK_ACCESS" => check_access(state, req),
        _ => return None,
    };
    Some(out.unwrap_or_else(erro))
}
