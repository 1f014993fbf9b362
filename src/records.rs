//! Fixed-width binary record store for the grade fallback file and the
//! per-turma attendance files.
//!
//! Both record kinds live under the uploads directory as flat files that are
//! always rewritten whole: read existing, merge by key in memory, write a
//! sibling `.tmp`, rename over the target. A reader either sees the previous
//! file or the new one, never a partial write.

use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Grade tuple as the native engine defines it: two partials, the project
/// grade and the (client-computed) average.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Notas {
    pub np1: f32,
    pub np2: f32,
    pub pim: f32,
    pub media: f32,
}

/// One attendance mark: a matricula on a DD/MM/YYYY date.
#[derive(Debug, Clone, PartialEq)]
pub struct Presenca {
    pub matricula: i32,
    pub data: String,
    pub presente: bool,
}

// i32 matricula + 4 x f32, little-endian.
const NOTAS_REC_LEN: usize = 20;
// i32 matricula + 10 date bytes + 1 presence flag.
const PRESENCA_REC_LEN: usize = 15;

pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        RecordStore { dir: dir.into() }
    }

    fn notas_path(&self) -> PathBuf {
        self.dir.join("notas.dat")
    }

    /// Path of one turma's attendance file, exposed so a turma delete can
    /// drop it.
    pub fn presencas_file(&self, id_turma: i32) -> PathBuf {
        self.dir.join(format!("presencas_turma_{}.dat", id_turma))
    }

    /// Loads the grade fallback file. Absent, unreadable or misaligned files
    /// degrade to an empty map; a foreign-format file must never take the
    /// server down.
    pub fn load_notas(&self) -> HashMap<i32, Notas> {
        let bytes = match read_aligned(&self.notas_path(), NOTAS_REC_LEN) {
            Some(b) => b,
            None => return HashMap::new(),
        };
        let mut out = HashMap::new();
        for rec in bytes.chunks_exact(NOTAS_REC_LEN) {
            let matricula = i32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]);
            out.insert(
                matricula,
                Notas {
                    np1: read_f32(rec, 4),
                    np2: read_f32(rec, 8),
                    pim: read_f32(rec, 12),
                    media: read_f32(rec, 16),
                },
            );
        }
        out
    }

    /// Replaces (or inserts) the record for one matricula and rewrites the
    /// whole file atomically.
    pub fn save_notas(&self, matricula: i32, notas: &Notas) -> anyhow::Result<()> {
        let mut all = self.load_notas();
        all.insert(matricula, *notas);
        self.write_notas(&all)
    }

    /// Drops the record for one matricula. A missing key is a no-op: the
    /// fallback file must shrink when an aluno goes, never grow stale.
    pub fn delete_notas(&self, matricula: i32) -> anyhow::Result<()> {
        let mut all = self.load_notas();
        if all.remove(&matricula).is_none() {
            return Ok(());
        }
        self.write_notas(&all)
    }

    /// Moves a record to a new matricula when the registration changes.
    pub fn rename_notas(&self, antiga: i32, nova: i32) -> anyhow::Result<()> {
        let mut all = self.load_notas();
        match all.remove(&antiga) {
            Some(notas) => {
                all.insert(nova, notas);
                self.write_notas(&all)
            }
            None => Ok(()),
        }
    }

    fn write_notas(&self, all: &HashMap<i32, Notas>) -> anyhow::Result<()> {
        let mut keys: Vec<i32> = all.keys().copied().collect();
        keys.sort_unstable();
        let mut buf = Vec::with_capacity(keys.len() * NOTAS_REC_LEN);
        for k in keys {
            let n = &all[&k];
            buf.extend_from_slice(&k.to_le_bytes());
            buf.extend_from_slice(&n.np1.to_le_bytes());
            buf.extend_from_slice(&n.np2.to_le_bytes());
            buf.extend_from_slice(&n.pim.to_le_bytes());
            buf.extend_from_slice(&n.media.to_le_bytes());
        }
        write_atomic(&self.notas_path(), &buf)
    }

    /// Loads every attendance record for one turma, in file order.
    pub fn load_presencas(&self, id_turma: i32) -> Vec<Presenca> {
        let bytes = match read_aligned(&self.presencas_file(id_turma), PRESENCA_REC_LEN) {
            Some(b) => b,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        for rec in bytes.chunks_exact(PRESENCA_REC_LEN) {
            let matricula = i32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]);
            let raw_date = &rec[4..14];
            let end = raw_date.iter().position(|&b| b == 0).unwrap_or(10);
            let data = String::from_utf8_lossy(&raw_date[..end]).into_owned();
            out.push(Presenca {
                matricula,
                data,
                presente: rec[14] != 0,
            });
        }
        out
    }

    /// Merges one day's marks into the turma file. The composite key is
    /// (matricula, data): a record with the same key is overwritten, every
    /// other record is preserved, and the file is rewritten atomically.
    pub fn save_presencas(
        &self,
        id_turma: i32,
        data: &str,
        marcas: &[(i32, bool)],
    ) -> anyhow::Result<()> {
        let mut existing = self.load_presencas(id_turma);
        for &(matricula, presente) in marcas {
            match existing
                .iter_mut()
                .find(|p| p.matricula == matricula && p.data == data)
            {
                Some(p) => p.presente = presente,
                None => existing.push(Presenca {
                    matricula,
                    data: data.to_string(),
                    presente,
                }),
            }
        }

        let mut buf = Vec::with_capacity(existing.len() * PRESENCA_REC_LEN);
        for p in &existing {
            buf.extend_from_slice(&p.matricula.to_le_bytes());
            let mut date_bytes = [0u8; 10];
            for (i, b) in p.data.as_bytes().iter().take(10).enumerate() {
                date_bytes[i] = *b;
            }
            buf.extend_from_slice(&date_bytes);
            buf.push(u8::from(p.presente));
        }
        write_atomic(&self.presencas_file(id_turma), &buf)
    }
}

fn read_f32(rec: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([rec[at], rec[at + 1], rec[at + 2], rec[at + 3]])
}

/// Reads a record file, requiring the length to be an exact multiple of
/// `rec_len`. Anything else is reported as "no data".
fn read_aligned(path: &Path, rec_len: usize) -> Option<Vec<u8>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(_) => return None,
    };
    if bytes.len() % rec_len != 0 {
        log::warn!(
            "{}: tamanho {} não é múltiplo de {}, ignorando arquivo",
            path.to_string_lossy(),
            bytes.len(),
            rec_len
        );
        return None;
    }
    Some(bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let tmp = path.with_extension("dat.tmp");
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.to_string_lossy()))?;
    Ok(())
}
