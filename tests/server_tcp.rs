use academicod::engine::{ClassEngine, MemoryEngine};
use academicod::protocol::AppState;
use academicod::server;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// Boots the real accept loop on an ephemeral port and returns its address
/// plus the shared state for white-box assertions.
fn spawn_server(dir: &PathBuf) -> (SocketAddr, Arc<AppState>) {
    let engine: Arc<dyn ClassEngine> = Arc::new(MemoryEngine::new());
    let state = Arc::new(AppState::new(
        &dir.join("data"),
        &dir.join("uploads"),
        Some(engine),
    ));
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let run_state = Arc::clone(&state);
    thread::spawn(move || server::run(listener, run_state));
    (addr, state)
}

fn send_line(addr: SocketAddr, line: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect");
    writeln!(stream, "{}", line).expect("send command");
    let mut reader = BufReader::new(stream);
    let mut resposta = String::new();
    reader.read_line(&mut resposta).expect("read response");
    resposta.trim_end().to_string()
}

#[test]
fn serves_multiple_commands_on_one_connection() {
    let dir = temp_dir("academicod-tcp-multi");
    let (addr, _state) = spawn_server(&dir);

    let mut stream = TcpStream::connect(addr).expect("connect");
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    let mut resposta = String::new();

    writeln!(stream, "ADD_TURMA|5|Calculus|Dr.Lin").expect("send");
    reader.read_line(&mut resposta).expect("read");
    assert!(resposta.starts_with("SUCESSO"), "unexpected: {}", resposta);

    // Unknown commands keep the connection open.
    resposta.clear();
    writeln!(stream, "NADA_DISSO|1").expect("send");
    reader.read_line(&mut resposta).expect("read");
    assert!(resposta.starts_with("ERRO"), "unexpected: {}", resposta);

    resposta.clear();
    writeln!(stream, "GET_TURNO_TURMA|5").expect("send");
    reader.read_line(&mut resposta).expect("read");
    assert!(resposta.starts_with("ERRO"), "turno unset: {}", resposta);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn concurrent_updates_for_distinct_matriculas_all_persist() {
    let dir = temp_dir("academicod-tcp-distinct");
    let (addr, state) = spawn_server(&dir);

    let mut handles = Vec::new();
    for i in 0..8 {
        handles.push(thread::spawn(move || {
            let matricula = 1000 + i;
            let resp = send_line(
                addr,
                &format!("UPDATE_NOTAS|{}|{}.0|5.0|5.0|5.0", matricula, i),
            );
            assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);
        }));
    }
    for h in handles {
        h.join().expect("writer thread");
    }

    let all = state.records.load_notas();
    for i in 0..8 {
        let notas = all.get(&(1000 + i)).expect("record persisted");
        assert_eq!(notas.np1, i as f32, "no lost update");
    }

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn concurrent_updates_for_same_matricula_keep_exactly_one_value() {
    let dir = temp_dir("academicod-tcp-same");
    let (addr, state) = spawn_server(&dir);

    let mut handles = Vec::new();
    for i in 0..8 {
        handles.push(thread::spawn(move || {
            let resp = send_line(addr, &format!("UPDATE_NOTAS|500|{}.0|0.0|0.0|0.0", i));
            assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);
        }));
    }
    for h in handles {
        h.join().expect("writer thread");
    }

    let all = state.records.load_notas();
    assert_eq!(all.len(), 1, "one record, not eight");
    let survivor = all.get(&500).expect("record").np1;
    assert!(
        (0..8).any(|i| survivor == i as f32),
        "surviving value {} must be one of the writers'",
        survivor
    );

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn upload_then_list_then_download_round_trip() {
    let dir = temp_dir("academicod-tcp-files");
    let (addr, _state) = spawn_server(&dir);

    let payload = b"conteudo do trabalho\x00\x01\x02 final";

    let mut stream = TcpStream::connect(addr).expect("connect");
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    writeln!(
        stream,
        "UPLOAD_FILE|7|../escape/trabalho final.pdf|{}",
        payload.len()
    )
    .expect("send header");

    let mut linha = String::new();
    reader.read_line(&mut linha).expect("ready token");
    assert_eq!(linha.trim_end(), "PRONTO");

    stream.write_all(payload).expect("send bytes");
    linha.clear();
    reader.read_line(&mut linha).expect("confirmation");
    assert!(linha.starts_with("SUCESSO"), "unexpected: {}", linha);

    // The stored name is timestamped and sanitized: no path separators.
    let lista = send_line(addr, "LIST_FILES|7");
    assert_eq!(lista.lines().count(), 1);
    let nome = lista.lines().next().expect("one file");
    assert!(nome.ends_with("_trabalhofinal.pdf"), "unexpected: {}", nome);
    assert!(!nome.contains('/'));

    // Download: header line, then exactly `size` raw bytes, no status line.
    let mut stream = TcpStream::connect(addr).expect("connect");
    writeln!(stream, "DOWNLOAD_FILE|7|{}", nome).expect("send download");
    let mut reader = BufReader::new(stream);
    let mut cabecalho = String::new();
    reader.read_line(&mut cabecalho).expect("header");
    let cabecalho = cabecalho.trim_end();
    assert_eq!(cabecalho, format!("OK_DOWNLOAD|{}", payload.len()));

    let mut corpo = vec![0u8; payload.len()];
    reader.read_exact(&mut corpo).expect("body");
    assert_eq!(corpo, payload);

    let inexistente = send_line(addr, "DOWNLOAD_FILE|7|nao_existe.pdf");
    assert!(inexistente.starts_with("ERRO"), "unexpected: {}", inexistente);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn short_upload_truncates_silently() {
    let dir = temp_dir("academicod-tcp-short");
    let (addr, state) = spawn_server(&dir);

    {
        let mut stream = TcpStream::connect(addr).expect("connect");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        writeln!(stream, "UPLOAD_FILE|2|nota.txt|1000").expect("send header");
        let mut linha = String::new();
        reader.read_line(&mut linha).expect("ready token");
        assert_eq!(linha.trim_end(), "PRONTO");
        stream.write_all(b"so isso").expect("partial bytes");
        // Peer closes early; the server keeps the truncated file.
    }

    // Poll for the connection thread to finish writing.
    let turma_dir = dir.join("uploads").join("turma_2");
    let mut arquivos = Vec::new();
    for _ in 0..50 {
        thread::sleep(std::time::Duration::from_millis(20));
        arquivos = std::fs::read_dir(&turma_dir)
            .map(|rd| rd.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        if !arquivos.is_empty() {
            break;
        }
    }
    assert_eq!(arquivos.len(), 1, "truncated file is kept, not cleaned up");
    let conteudo = std::fs::read(arquivos[0].path()).expect("read truncated");
    assert_eq!(conteudo, b"so isso");

    drop(state);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn login_over_tcp_returns_role_token() {
    let dir = temp_dir("academicod-tcp-login");
    let (addr, state) = spawn_server(&dir);

    state
        .users
        .add_user(
            "root",
            "Adm1n!pwd",
            academicod::auth::Role::Admin,
            None,
            false,
            None,
            None,
        )
        .expect("seed admin");

    assert_eq!(send_line(addr, "LOGIN|root|Adm1n!pwd"), "SUCESSO|admin");
    assert!(send_line(addr, "LOGIN|root|errada").starts_with("ERRO"));
    assert!(send_line(addr, "LOGOUT|root|42").starts_with("SUCESSO"));
    assert_eq!(
        state.users.get("root").expect("account").tempo_sessao_segundos,
        42
    );

    let _ = std::fs::remove_dir_all(dir);
}
