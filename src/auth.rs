//! User accounts: salted-hash credentials, the pending/approved gate and the
//! per-professor subject access list.
//!
//! Credentials are stored self-describing
//! (`pbkdf2_sha256$iterations$base64(salt)$base64(dk)`) so the iteration
//! count can be raised later without invalidating existing hashes. A stored
//! value with no `$` is a legacy plaintext credential from the old deploy;
//! `verify_user` accepts it once and re-hashes on the spot.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::Utc;
use pbkdf2::pbkdf2_hmac;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::jsonstore::{load_json, save_json};

const PBKDF2_ALG: &str = "pbkdf2_sha256";
const PBKDF2_ITERATIONS: u32 = 200_000;
const SALT_LEN: usize = 16;
const DK_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" | "aluno" => Ok(Role::Student),
            "teacher" | "professor" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("papel desconhecido: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub senha_hash: String,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    pub status: Status,
    pub criado_em: String,
    #[serde(default)]
    pub ultimo_login: Option<String>,
    #[serde(default)]
    pub tempo_sessao_segundos: u64,
    #[serde(default)]
    pub pergunta_secreta: Option<String>,
    #[serde(default)]
    pub resposta_hash: Option<String>,
    /// Shift the account signed up under (morning/afternoon/evening).
    #[serde(default)]
    pub turno: Option<String>,
    /// Teacher only: turma IDs this professor may touch, string-normalized.
    #[serde(default)]
    pub turmas: Vec<String>,
    /// Student only.
    #[serde(default)]
    pub matricula: Option<i32>,
    #[serde(default)]
    pub perfil: HashMap<String, String>,
}

pub struct UserStore {
    path: PathBuf,
    users: Mutex<HashMap<String, UserAccount>>,
}

impl UserStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = Mutex::new(load_json(&path, HashMap::new()));
        UserStore { path, users }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserAccount>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, users: &HashMap<String, UserAccount>) -> bool {
        save_json(&self.path, users)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
        email: Option<&str>,
        pending: bool,
        turno: Option<&str>,
        matricula: Option<i32>,
    ) -> Result<(), String> {
        if username.trim().is_empty() {
            return Err("nome de usuário vazio".to_string());
        }
        validate_password(password)?;
        if let Some(e) = email {
            if !e.is_empty() && !email_valido(e) {
                return Err(format!("email inválido: {}", e));
            }
        }

        let mut users = self.lock();
        if users.contains_key(username) {
            return Err(format!("usuário '{}' já existe", username));
        }
        users.insert(
            username.to_string(),
            UserAccount {
                senha_hash: hash_password(password),
                role,
                email: email.filter(|e| !e.is_empty()).map(str::to_string),
                status: if pending {
                    Status::Pending
                } else {
                    Status::Approved
                },
                criado_em: Utc::now().to_rfc3339(),
                ultimo_login: None,
                tempo_sessao_segundos: 0,
                pergunta_secreta: None,
                resposta_hash: None,
                turno: turno.filter(|t| !t.is_empty()).map(str::to_string),
                turmas: Vec::new(),
                matricula,
                perfil: HashMap::new(),
            },
        );
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    /// Fails closed: unknown username or `pending` status never authenticate,
    /// whatever the password. A legacy plaintext match is upgraded to the
    /// current hash scheme before returning.
    pub fn verify_user(&self, username: &str, password: &str) -> bool {
        let mut users = self.lock();
        let Some(user) = users.get_mut(username) else {
            return false;
        };
        if user.status == Status::Pending {
            return false;
        }
        match check_password(password, &user.senha_hash) {
            PasswordCheck::Match => true,
            PasswordCheck::LegacyMatch => {
                user.senha_hash = hash_password(password);
                let _ = self.persist(&users);
                true
            }
            PasswordCheck::NoMatch => false,
        }
    }

    pub fn set_password(&self, username: &str, new_password: &str) -> Result<(), String> {
        validate_password(new_password)?;
        let mut users = self.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| format!("usuário '{}' não encontrado", username))?;
        user.senha_hash = hash_password(new_password);
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    pub fn update_password(&self, username: &str, old: &str, new: &str) -> Result<(), String> {
        {
            let users = self.lock();
            let user = users
                .get(username)
                .ok_or_else(|| format!("usuário '{}' não encontrado", username))?;
            match check_password(old, &user.senha_hash) {
                PasswordCheck::Match | PasswordCheck::LegacyMatch => {}
                PasswordCheck::NoMatch => return Err("senha atual incorreta".to_string()),
            }
        }
        self.set_password(username, new)
    }

    pub fn set_secret_question(
        &self,
        username: &str,
        pergunta: &str,
        resposta: &str,
    ) -> Result<(), String> {
        let mut users = self.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| format!("usuário '{}' não encontrado", username))?;
        user.pergunta_secreta = Some(pergunta.to_string());
        user.resposta_hash = Some(hash_password(resposta));
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    pub fn secret_question(&self, username: &str) -> Option<String> {
        self.lock().get(username)?.pergunta_secreta.clone()
    }

    pub fn verify_secret_answer(&self, username: &str, resposta: &str) -> bool {
        let users = self.lock();
        let Some(user) = users.get(username) else {
            return false;
        };
        let Some(hash) = &user.resposta_hash else {
            return false;
        };
        matches!(
            check_password(resposta, hash),
            PasswordCheck::Match | PasswordCheck::LegacyMatch
        )
    }

    pub fn approve_user(&self, username: &str) -> Result<(), String> {
        let mut users = self.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| format!("usuário '{}' não encontrado", username))?;
        if user.status != Status::Pending {
            return Err(format!("usuário '{}' não está pendente", username));
        }
        user.status = Status::Approved;
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    /// Rejecting a pending request removes the account outright.
    pub fn reject_user(&self, username: &str) -> Result<(), String> {
        let mut users = self.lock();
        let Some(user) = users.get(username) else {
            return Err(format!("usuário '{}' não encontrado", username));
        };
        if user.status != Status::Pending {
            return Err(format!("usuário '{}' não está pendente", username));
        }
        users.remove(username);
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    pub fn delete_user(&self, username: &str) -> Result<(), String> {
        let mut users = self.lock();
        if users.remove(username).is_none() {
            return Err(format!("usuário '{}' não encontrado", username));
        }
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    pub fn can_access_subject(&self, username: &str, id_turma: i32) -> bool {
        let users = self.lock();
        let Some(user) = users.get(username) else {
            return false;
        };
        match user.role {
            Role::Admin => true,
            Role::Student => false,
            Role::Teacher => user.turmas.iter().any(|t| t == &id_turma.to_string()),
        }
    }

    pub fn set_turmas(&self, username: &str, ids: Vec<String>) -> Result<(), String> {
        let mut users = self.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| format!("usuário '{}' não encontrado", username))?;
        user.turmas = ids;
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    pub fn record_login(&self, username: &str) {
        let mut users = self.lock();
        if let Some(user) = users.get_mut(username) {
            user.ultimo_login = Some(Utc::now().to_rfc3339());
            let _ = self.persist(&users);
        }
    }

    pub fn record_logout(&self, username: &str, segundos: u64) {
        let mut users = self.lock();
        if let Some(user) = users.get_mut(username) {
            user.tempo_sessao_segundos += segundos;
            let _ = self.persist(&users);
        }
    }

    pub fn update_profile(&self, username: &str, campo: &str, valor: &str) -> Result<(), String> {
        let mut users = self.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| format!("usuário '{}' não encontrado", username))?;
        user.perfil.insert(campo.to_string(), valor.to_string());
        if !self.persist(&users) {
            return Err("falha ao gravar usuários".to_string());
        }
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<UserAccount> {
        self.lock().get(username).cloned()
    }

    pub fn list_users(&self) -> Vec<(String, UserAccount)> {
        let mut out: Vec<_> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn list_pending(&self) -> Vec<String> {
        let mut out: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, u)| u.status == Status::Pending)
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }

    /// `first.last` slug from a display name, with a numeric suffix when the
    /// slug is taken.
    pub fn generate_username(&self, nome: &str) -> String {
        let base = username_slug(nome);
        let users = self.lock();
        if !users.contains_key(&base) {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{}{}", base, n);
            if !users.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Deterministic `first.last` slug for a display name, before collision
/// disambiguation.
pub fn username_slug(nome: &str) -> String {
    let tokens: Vec<String> = nome
        .split_whitespace()
        .map(slugify_token)
        .filter(|t| !t.is_empty())
        .collect();
    match tokens.as_slice() {
        [] => "usuario".to_string(),
        [only] => only.clone(),
        [first, .., last] => format!("{}.{}", first, last),
    }
}

fn slugify_token(token: &str) -> String {
    token
        .chars()
        .filter_map(|c| {
            let folded = match c {
                'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
                'é' | 'è' | 'ê' | 'ë' => 'e',
                'í' | 'ì' | 'î' | 'ï' => 'i',
                'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
                'ú' | 'ù' | 'û' | 'ü' => 'u',
                'ç' => 'c',
                other => other,
            };
            let lower = folded.to_ascii_lowercase();
            lower.is_ascii_alphanumeric().then_some(lower)
        })
        .collect()
}

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghjkmnpqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%&*?";

/// Eight characters with at least one of each class, shuffled.
pub fn generate_temp_password() -> String {
    let mut rng = rand::thread_rng();
    let mut chars: Vec<u8> = vec![
        UPPER[rng.gen_range(0..UPPER.len())],
        LOWER[rng.gen_range(0..LOWER.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
        SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
    ];
    let all: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();
    for _ in 0..4 {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);
    String::from_utf8_lossy(&chars).into_owned()
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("senha deve ter pelo menos 8 caracteres".to_string());
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("senha deve conter uma letra maiúscula".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("senha deve conter uma letra minúscula".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("senha deve conter um dígito".to_string());
    }
    if password.chars().all(|c| c.is_alphanumeric()) {
        return Err("senha deve conter um símbolo".to_string());
    }
    Ok(())
}

pub fn email_valido(email: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex")
    });
    re.is_match(email)
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill(&mut salt[..]);
    hash_with(password, &salt, PBKDF2_ITERATIONS)
}

fn hash_with(password: &str, salt: &[u8], iterations: u32) -> String {
    let mut dk = [0u8; DK_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut dk);
    format!(
        "{}${}${}${}",
        PBKDF2_ALG,
        iterations,
        B64.encode(salt),
        B64.encode(dk)
    )
}

enum PasswordCheck {
    Match,
    LegacyMatch,
    NoMatch,
}

fn check_password(password: &str, stored: &str) -> PasswordCheck {
    if !stored.contains('$') {
        // Credential migrated from the old plaintext deploy.
        return if stored == password {
            PasswordCheck::LegacyMatch
        } else {
            PasswordCheck::NoMatch
        };
    }
    let parts: Vec<&str> = stored.split('$').collect();
    if parts.len() != 4 || parts[0] != PBKDF2_ALG {
        return PasswordCheck::NoMatch;
    }
    let Ok(iterations) = parts[1].parse::<u32>() else {
        return PasswordCheck::NoMatch;
    };
    let Ok(salt) = B64.decode(parts[2]) else {
        return PasswordCheck::NoMatch;
    };
    if hash_with(password, &salt, iterations) == *stored {
        PasswordCheck::Match
    } else {
        PasswordCheck::NoMatch
    }
}
