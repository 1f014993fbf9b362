use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::auth::UserStore;
use crate::engine::ClassEngine;
use crate::jsonstore::JsonStore;
use crate::records::RecordStore;

/// One pipe-delimited command line. Field 0 is the command name, the rest
/// are positional arguments.
#[derive(Debug, Clone)]
pub struct Request {
    pub command: String,
    pub args: Vec<String>,
}

impl Request {
    pub fn parse(line: &str) -> Request {
        let mut fields = line.split('|');
        let command = fields.next().unwrap_or("").trim().to_string();
        let args = fields.map(|f| f.to_string()).collect();
        Request { command, args }
    }

    /// Rejoins the arguments with the original delimiter, for commands whose
    /// single payload may itself contain pipes (JSON blobs).
    pub fn raw_payload(&self) -> String {
        self.args.join("|")
    }
}

/// Exam dates for one turma. Absent dates stay unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvasTurma {
    #[serde(default)]
    pub np1: Option<String>,
    #[serde(default)]
    pub np2: Option<String>,
    #[serde(default)]
    pub pim: Option<String>,
    #[serde(default)]
    pub exame: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anotacao {
    pub titulo: String,
    #[serde(default)]
    pub texto: String,
    #[serde(default)]
    pub data: String,
}

/// Everything a connection thread can reach. The five JSON documents and the
/// two binary-file families are the only cross-connection mutable state;
/// mutating commands serialize on `write_lock`.
pub struct AppState {
    pub engine: Option<Arc<dyn ClassEngine>>,
    pub records: RecordStore,
    pub users: UserStore,
    pub provas: JsonStore<HashMap<String, ProvasTurma>>,
    pub turnos: JsonStore<HashMap<String, String>>,
    pub exames: JsonStore<HashMap<String, f32>>,
    pub anotacoes: JsonStore<Vec<Anotacao>>,
    pub uploads_dir: PathBuf,
    pub write_lock: Mutex<()>,
}

impl AppState {
    pub fn new(data_dir: &Path, uploads_dir: &Path, engine: Option<Arc<dyn ClassEngine>>) -> Self {
        AppState {
            engine,
            records: RecordStore::new(uploads_dir),
            users: UserStore::open(data_dir.join("users.json")),
            provas: JsonStore::open(data_dir.join("provas.json"), HashMap::new()),
            turnos: JsonStore::open(data_dir.join("turnos_turmas.json"), HashMap::new()),
            exames: JsonStore::open(data_dir.join("exames.json"), HashMap::new()),
            anotacoes: JsonStore::open(data_dir.join("anotacoes.json"), Vec::new()),
            uploads_dir: uploads_dir.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}
