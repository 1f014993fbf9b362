//! Seam to the native class/student engine.
//!
//! The real engine is a foreign library with a fixed call surface; the server
//! only ever talks to it through this trait. `MemoryEngine` implements the
//! same contract in memory for test runs and for deployments without the
//! native library.

use crate::records::Notas;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Turma {
    pub id: i32,
    pub disciplina: String,
    pub professor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aluno {
    pub id_turma: i32,
    pub matricula: i32,
    pub nome: String,
    pub notas: Notas,
}

/// Fixed native call surface. Method names follow the foreign library.
pub trait ClassEngine: Send + Sync {
    fn salvar_turma(&self, turma: &Turma);
    fn salvar_aluno(&self, aluno: &Aluno);
    fn turma_existe(&self, id: i32) -> bool;
    fn matricula_existe(&self, matricula: i32) -> bool;
    fn listar_turmas(&self) -> Vec<Turma>;
    fn listar_alunos_por_turma(&self, id_turma: i32) -> Vec<Aluno>;
    fn buscar_turma_por_id(&self, id: i32) -> Option<Turma>;
    fn buscar_aluno_por_matricula(&self, matricula: i32) -> Option<Aluno>;
    fn atualizar_turma(&self, id: i32, disciplina: &str, professor: &str) -> bool;
    fn atualizar_aluno(&self, matricula: i32, nome: &str) -> bool;
    fn alterar_id_turma(&self, id_antigo: i32, id_novo: i32) -> bool;
    fn alterar_matricula_aluno(&self, antiga: i32, nova: i32) -> bool;
    /// Removes the turma and every aluno enrolled in it.
    fn deletar_turma(&self, id_turma: i32) -> bool;
    fn deletar_aluno(&self, matricula: i32) -> bool;
    fn salvar_notas(&self, matricula: i32, notas: &Notas) -> bool;
    fn buscar_notas(&self, matricula: i32) -> Option<Notas>;
}

#[derive(Default)]
struct MemoryTables {
    turmas: Vec<Turma>,
    alunos: Vec<Aluno>,
}

/// In-memory engine with the native contract.
#[derive(Default)]
pub struct MemoryEngine {
    tables: Mutex<MemoryTables>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClassEngine for MemoryEngine {
    fn salvar_turma(&self, turma: &Turma) {
        let mut t = self.lock();
        if t.turmas.iter().any(|x| x.id == turma.id) {
            return;
        }
        t.turmas.push(turma.clone());
    }

    fn salvar_aluno(&self, aluno: &Aluno) {
        let mut t = self.lock();
        if t.alunos.iter().any(|x| x.matricula == aluno.matricula) {
            return;
        }
        t.alunos.push(aluno.clone());
    }

    fn turma_existe(&self, id: i32) -> bool {
        self.lock().turmas.iter().any(|x| x.id == id)
    }

    fn matricula_existe(&self, matricula: i32) -> bool {
        self.lock().alunos.iter().any(|x| x.matricula == matricula)
    }

    fn listar_turmas(&self) -> Vec<Turma> {
        self.lock().turmas.clone()
    }

    fn listar_alunos_por_turma(&self, id_turma: i32) -> Vec<Aluno> {
        self.lock()
            .alunos
            .iter()
            .filter(|a| a.id_turma == id_turma)
            .cloned()
            .collect()
    }

    fn buscar_turma_por_id(&self, id: i32) -> Option<Turma> {
        self.lock().turmas.iter().find(|x| x.id == id).cloned()
    }

    fn buscar_aluno_por_matricula(&self, matricula: i32) -> Option<Aluno> {
        self.lock()
            .alunos
            .iter()
            .find(|x| x.matricula == matricula)
            .cloned()
    }

    fn atualizar_turma(&self, id: i32, disciplina: &str, professor: &str) -> bool {
        let mut t = self.lock();
        match t.turmas.iter_mut().find(|x| x.id == id) {
            Some(turma) => {
                turma.disciplina = disciplina.to_string();
                turma.professor = professor.to_string();
                true
            }
            None => false,
        }
    }

    fn atualizar_aluno(&self, matricula: i32, nome: &str) -> bool {
        let mut t = self.lock();
        match t.alunos.iter_mut().find(|x| x.matricula == matricula) {
            Some(aluno) => {
                aluno.nome = nome.to_string();
                true
            }
            None => false,
        }
    }

    fn alterar_id_turma(&self, id_antigo: i32, id_novo: i32) -> bool {
        let mut t = self.lock();
        if t.turmas.iter().any(|x| x.id == id_novo) {
            return false;
        }
        if !t.turmas.iter().any(|x| x.id == id_antigo) {
            return false;
        }
        for turma in t.turmas.iter_mut() {
            if turma.id == id_antigo {
                turma.id = id_novo;
            }
        }
        for aluno in t.alunos.iter_mut() {
            if aluno.id_turma == id_antigo {
                aluno.id_turma = id_novo;
            }
        }
        true
    }

    fn alterar_matricula_aluno(&self, antiga: i32, nova: i32) -> bool {
        let mut t = self.lock();
        if t.alunos.iter().any(|x| x.matricula == nova) {
            return false;
        }
        match t.alunos.iter_mut().find(|x| x.matricula == antiga) {
            Some(aluno) => {
                aluno.matricula = nova;
                true
            }
            None => false,
        }
    }

    fn deletar_turma(&self, id_turma: i32) -> bool {
        let mut t = self.lock();
        let before = t.turmas.len();
        t.turmas.retain(|x| x.id != id_turma);
        if t.turmas.len() == before {
            return false;
        }
        t.alunos.retain(|a| a.id_turma != id_turma);
        true
    }

    fn deletar_aluno(&self, matricula: i32) -> bool {
        let mut t = self.lock();
        let before = t.alunos.len();
        t.alunos.retain(|x| x.matricula != matricula);
        t.alunos.len() != before
    }

    fn salvar_notas(&self, matricula: i32, notas: &Notas) -> bool {
        let mut t = self.lock();
        match t.alunos.iter_mut().find(|x| x.matricula == matricula) {
            Some(aluno) => {
                aluno.notas = *notas;
                true
            }
            None => false,
        }
    }

    fn buscar_notas(&self, matricula: i32) -> Option<Notas> {
        self.lock()
            .alunos
            .iter()
            .find(|x| x.matricula == matricula)
            .map(|a| a.notas)
    }
}
