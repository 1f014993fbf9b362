use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use academicod::engine::{ClassEngine, MemoryEngine};
use academicod::protocol::AppState;
use academicod::server;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Servidor acadêmico: turmas, alunos, notas e contas")]
struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value = "5000")]
    port: u16,
    /// Directory for the JSON documents (users, provas, turnos, exames, anotações)
    #[clap(long, default_value = "server_data")]
    data_dir: PathBuf,
    /// Directory for binary record files and per-turma uploads
    #[clap(long, default_value = "uploads")]
    uploads_dir: PathBuf,
    /// Start without the class/student engine; engine commands answer a
    /// fixed error and everything else keeps working
    #[clap(long)]
    no_engine: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create {}", args.data_dir.to_string_lossy()))?;
    std::fs::create_dir_all(&args.uploads_dir)
        .with_context(|| format!("failed to create {}", args.uploads_dir.to_string_lossy()))?;

    let engine: Option<Arc<dyn ClassEngine>> = if args.no_engine {
        warn!("iniciando sem o motor de dados nativo; comandos de turma/aluno ficarão indisponíveis");
        None
    } else {
        Some(Arc::new(MemoryEngine::new()))
    };
    let state = Arc::new(AppState::new(&args.data_dir, &args.uploads_dir, engine));

    let endereco = format!("{}:{}", args.host, args.port);
    let listener =
        TcpListener::bind(&endereco).with_context(|| format!("failed to bind {}", endereco))?;
    info!("servidor acadêmico ouvindo em {}", endereco);

    server::run(listener, state);
    Ok(())
}
