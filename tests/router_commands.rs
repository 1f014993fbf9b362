use academicod::engine::{ClassEngine, MemoryEngine};
use academicod::protocol::{dispatch, AppState, Request};
use std::path::PathBuf;
use std::sync::Arc;
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

fn state_with_engine(dir: &PathBuf) -> AppState {
    let engine: Arc<dyn ClassEngine> = Arc::new(MemoryEngine::new());
    AppState::new(&dir.join("data"), &dir.join("uploads"), Some(engine))
}

fn send(state: &AppState, line: &str) -> String {
    dispatch(state, &Request::parse(line))
}

#[test]
fn add_turma_then_list_then_duplicate() {
    let dir = temp_dir("academicod-router-turmas");
    let state = state_with_engine(&dir);

    let resp = send(&state, "ADD_TURMA|5|Calculus|Dr.Lin");
    assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);

    let lista = send(&state, "LIST_TURMAS");
    let linha = lista
        .lines()
        .find(|l| l.contains("ID: 5"))
        .expect("turma 5 listed");
    assert!(linha.contains("Disciplina: Calculus"));
    assert!(linha.contains("Professor: Dr.Lin"));

    let dup = send(&state, "ADD_TURMA|5|Algebra|Dr.Wu");
    assert!(dup.starts_with("ERRO"));
    assert!(dup.contains("já existe"), "unexpected: {}", dup);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn add_turma_provisions_an_approved_teacher_account() {
    let dir = temp_dir("academicod-router-prof");
    let state = state_with_engine(&dir);

    let resp = send(&state, "ADD_TURMA|1|Fisica|Marie Curie");
    assert!(resp.contains("marie.curie"), "unexpected: {}", resp);

    let conta = state.users.get("marie.curie").expect("teacher account");
    assert!(state.users.can_access_subject("marie.curie", 1));
    assert!(!state.users.can_access_subject("marie.curie", 2));
    assert_eq!(conta.turmas, vec!["1".to_string()]);

    // A second turma for the same professor extends access instead of
    // creating a duplicate account.
    send(&state, "ADD_TURMA|2|Quimica|Marie Curie");
    assert!(state.users.can_access_subject("marie.curie", 2));
    assert!(state.users.get("marie.curie1").is_none());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn create_user_scenario_weak_then_strong_then_duplicate() {
    let dir = temp_dir("academicod-router-users");
    let state = state_with_engine(&dir);

    let fraca = send(&state, "CREATE_USER|bob|Weak1|teacher");
    assert!(fraca.starts_with("ERRO"));
    assert!(fraca.contains("8 caracteres"), "unexpected: {}", fraca);

    let sem_simbolo = send(&state, "CREATE_USER|bob|Weak1234|teacher");
    assert!(sem_simbolo.contains("símbolo"), "unexpected: {}", sem_simbolo);

    let ok = send(&state, "CREATE_USER|bob|Str0ng!pwd|teacher");
    assert!(ok.starts_with("SUCESSO"), "unexpected: {}", ok);

    let dup = send(&state, "CREATE_USER|bob|Str0ng!pwd|teacher");
    assert!(dup.contains("já existe"), "unexpected: {}", dup);

    // Self-registered users are pending: login fails until approval.
    assert!(send(&state, "LOGIN|bob|Str0ng!pwd").starts_with("ERRO"));
    assert!(send(&state, "APPROVE_USER|bob").starts_with("SUCESSO"));
    assert_eq!(send(&state, "LOGIN|bob|Str0ng!pwd"), "SUCESSO|teacher");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn contas_commands_round_trip_over_the_router() {
    let dir = temp_dir("academicod-router-contas");
    let state = state_with_engine(&dir);

    assert!(
        send(&state, "CREATE_USER|nina|Str0ng!pwd|teacher|nina@escola.edu").starts_with("SUCESSO")
    );
    assert!(send(&state, "LIST_USERS").contains("Usuario: nina | Papel: teacher | Status: pending"));
    assert_eq!(send(&state, "LIST_PENDING_USERS"), "nina");
    assert!(send(&state, "APPROVE_USER|nina").starts_with("SUCESSO"));
    // Approved accounts are out of reach for REJECT_USER.
    assert!(send(&state, "REJECT_USER|nina").starts_with("ERRO"));

    assert!(send(&state, "CHANGE_PASSWORD|nina|errada|Outr@Senha1").starts_with("ERRO"));
    assert!(send(&state, "CHANGE_PASSWORD|nina|Str0ng!pwd|Outr@Senha1").starts_with("SUCESSO"));
    assert_eq!(send(&state, "LOGIN|nina|Outr@Senha1"), "SUCESSO|teacher");

    assert!(send(&state, "SET_PASSWORD|nina|N0va!Senha").starts_with("SUCESSO"));
    assert_eq!(send(&state, "LOGIN|nina|N0va!Senha"), "SUCESSO|teacher");

    assert!(send(&state, "SET_SECRET_QUESTION|nina|Cidade natal?|Recife").starts_with("SUCESSO"));
    assert_eq!(send(&state, "GET_SECRET_QUESTION|nina"), "Pergunta: Cidade natal?");
    assert!(send(&state, "VERIFY_SECRET_ANSWER|nina|Recife").starts_with("SUCESSO"));
    assert!(send(&state, "VERIFY_SECRET_ANSWER|nina|Olinda").starts_with("ERRO"));

    assert!(send(&state, "SET_USER_TURMAS|nina|3, 4").starts_with("SUCESSO"));
    assert!(send(&state, "CHECK_ACCESS|nina|3").starts_with("SUCESSO"));
    assert!(send(&state, "CHECK_ACCESS|nina|9").starts_with("ERRO"));

    assert!(send(&state, "UPDATE_PROFILE|nina|telefone|5581999990000").starts_with("SUCESSO"));

    let info = send(&state, "GET_USER_INFO|nina");
    assert!(info.contains("Usuario: nina"), "unexpected: {}", info);
    assert!(info.contains("Email: nina@escola.edu"));
    assert!(info.contains("Turmas: 3,4"));
    assert!(info.contains("Status: approved"));

    assert!(send(&state, "DELETE_USER|nina").starts_with("SUCESSO"));
    assert!(send(&state, "GET_USER_INFO|nina").starts_with("ERRO"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn aluno_lifecycle_with_auto_account() {
    let dir = temp_dir("academicod-router-alunos");
    let state = state_with_engine(&dir);

    send(&state, "ADD_TURMA|3|Historia|Dr. Reis");
    send(&state, "SET_TURNO_TURMA|3|evening");

    let resp = send(&state, "ADD_ALUNO|3|1001|Pedro Alves");
    assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);
    assert!(resp.contains("pedro.alves"));

    let conta = state.users.get("pedro.alves").expect("student account");
    assert_eq!(conta.matricula, Some(1001));
    assert_eq!(conta.turno.as_deref(), Some("evening"));

    let lista = send(&state, "LIST_ALUNOS|3");
    assert!(lista.contains("Matricula: 1001"));
    assert!(lista.contains("Nome: Pedro Alves"));

    let dup = send(&state, "ADD_ALUNO|3|1001|Outro Aluno");
    assert!(dup.contains("já existe"), "unexpected: {}", dup);

    let sem_turma = send(&state, "ADD_ALUNO|99|1002|Maria");
    assert!(sem_turma.contains("não encontrada"), "unexpected: {}", sem_turma);

    assert!(send(&state, "UPDATE_ALUNO|1001|Pedro A. Alves").starts_with("SUCESSO"));
    let aluno = send(&state, "GET_ALUNO|1001");
    assert!(aluno.contains("Nome: Pedro A. Alves"));
    assert!(send(&state, "DELETE_ALUNO|1001").starts_with("SUCESSO"));
    assert!(send(&state, "GET_ALUNO|1001").starts_with("ERRO"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn notas_update_goes_to_engine_and_fallback() {
    let dir = temp_dir("academicod-router-notas");
    let state = state_with_engine(&dir);

    send(&state, "ADD_TURMA|1|Calculo|Dr. Lin");
    send(&state, "ADD_ALUNO|1|500|Lia Souza");

    let resp = send(&state, "UPDATE_NOTAS|500|7.5|8.0|9.0|8.0");
    assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);

    let notas = send(&state, "GET_NOTAS|500");
    assert!(notas.contains("NP1: 7.5"), "unexpected: {}", notas);
    assert!(notas.contains("Media: 8.0"));

    // The fallback file serves grades for matriculas the engine ignores.
    let resp = send(&state, "UPDATE_NOTAS|999|1.0|2.0|3.0|1.8");
    assert!(resp.starts_with("SUCESSO"));
    assert!(send(&state, "GET_NOTAS|999").contains("PIM: 3.0"));

    let invalida = send(&state, "UPDATE_NOTAS|500|abc|8.0|9.0|8.0");
    assert!(invalida.starts_with("ERRO"), "unexpected: {}", invalida);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn delete_aluno_and_change_matricula_update_fallback_grades() {
    let dir = temp_dir("academicod-router-fallback");
    let state = state_with_engine(&dir);

    send(&state, "ADD_TURMA|1|Calculo|Dr. Lin");
    send(&state, "ADD_ALUNO|1|500|Lia Souza");
    send(&state, "UPDATE_NOTAS|500|9.0|9.5|10.0|9.4");
    assert!(send(&state, "DELETE_ALUNO|500").starts_with("SUCESSO"));

    // The fallback record is purged with the aluno: a reused matricula must
    // not inherit the old grades, with or without the engine.
    assert!(send(&state, "GET_NOTAS|500").starts_with("ERRO"));
    let sem_motor = AppState::new(&dir.join("data"), &dir.join("uploads"), None);
    assert!(send(&sem_motor, "GET_NOTAS|500").starts_with("ERRO"));

    send(&state, "ADD_ALUNO|1|600|Ivo Prado");
    send(&state, "UPDATE_NOTAS|600|1.0|2.0|3.0|1.8");
    assert!(send(&state, "CHANGE_MATRICULA|600|601").starts_with("SUCESSO"));
    assert!(send(&state, "GET_NOTAS|600").starts_with("ERRO"));
    assert!(send(&sem_motor, "GET_NOTAS|601").contains("PIM: 3.0"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn exame_and_provas_and_turno_round_trip() {
    let dir = temp_dir("academicod-router-provas");
    let state = state_with_engine(&dir);

    assert!(send(&state, "SET_EXAME|500|6.5").starts_with("SUCESSO"));
    assert_eq!(send(&state, "GET_EXAME|500"), "Exame: 6.5");
    assert!(send(&state, "GET_EXAME|501").starts_with("ERRO"));

    assert!(send(&state, "SET_PROVAS_TURMA|2|10/03/2025|12/05/2025||20/06/2025")
        .starts_with("SUCESSO"));
    let provas = send(&state, "GET_PROVAS_TURMA|2");
    assert!(provas.contains("NP1: 10/03/2025"), "unexpected: {}", provas);
    assert!(provas.contains("PIM: -"));
    assert!(provas.contains("Exame: 20/06/2025"));

    assert!(send(&state, "SET_TURNO_TURMA|2|madrugada").starts_with("ERRO"));
    assert!(send(&state, "SET_TURNO_TURMA|2|morning").starts_with("SUCESSO"));
    assert_eq!(send(&state, "GET_TURNO_TURMA|2"), "Turno: morning");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn presencas_commands_merge_batches() {
    let dir = temp_dir("academicod-router-presencas");
    let state = state_with_engine(&dir);

    let resp = send(&state, "SAVE_PRESENCAS|4|02/06/2025|100:0;101:1");
    assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);
    send(&state, "SAVE_PRESENCAS|4|02/06/2025|100:1;102:0");

    let todas = send(&state, "GET_PRESENCAS|4");
    assert_eq!(todas.lines().count(), 3);
    assert!(todas.contains("Matricula: 100 | Data: 02/06/2025 | Presente: sim"));
    assert!(todas.contains("Matricula: 102 | Data: 02/06/2025 | Presente: nao"));

    let filtrada = send(&state, "GET_PRESENCAS|4|03/06/2025");
    assert_eq!(filtrada, "Nenhuma presença registrada.");

    let invalida = send(&state, "SAVE_PRESENCAS|4|02/06/2025|100:2");
    assert!(invalida.starts_with("ERRO"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn anotacoes_crud_with_json_payloads() {
    let dir = temp_dir("academicod-router-anotacoes");
    let state = state_with_engine(&dir);

    assert_eq!(send(&state, "GET_ANOTACOES"), "[]");

    let resp = send(
        &state,
        r#"ADD_ANOTACAO|{"titulo":"Reunião","texto":"pauta | itens"}"#,
    );
    assert!(resp.starts_with("SUCESSO"), "unexpected: {}", resp);

    let dup = send(&state, r#"ADD_ANOTACAO|{"titulo":"Reunião","texto":"outra"}"#);
    assert!(dup.contains("já existe"), "unexpected: {}", dup);

    let lista = send(&state, "GET_ANOTACOES");
    let notas: serde_json::Value = serde_json::from_str(&lista).expect("json array");
    assert_eq!(notas.as_array().expect("array").len(), 1);
    assert_eq!(notas[0]["texto"], "pauta | itens");
    assert!(
        !notas[0]["data"].as_str().expect("timestamp").is_empty(),
        "missing data field gets a timestamp"
    );

    let upd = send(
        &state,
        r#"UPDATE_ANOTACAO|{"titulo":"Reunião","texto":"revisada"}"#,
    );
    assert!(upd.starts_with("SUCESSO"));
    assert!(send(&state, "GET_ANOTACOES").contains("revisada"));

    assert!(send(&state, "DELETE_ANOTACAO|Reunião").starts_with("SUCESSO"));
    assert_eq!(send(&state, "GET_ANOTACOES"), "[]");
    assert!(send(&state, "DELETE_ANOTACAO|Reunião").starts_with("ERRO"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unknown_command_and_missing_fields_report_errors() {
    let dir = temp_dir("academicod-router-proto");
    let state = state_with_engine(&dir);

    let resp = send(&state, "FAZ_TUDO|1|2");
    assert!(resp.starts_with("ERRO"));
    assert!(resp.contains("comando desconhecido"));

    let resp = send(&state, "ADD_TURMA|5");
    assert!(resp.starts_with("ERRO"), "unexpected: {}", resp);

    let resp = send(&state, "ADD_TURMA|nao-numero|Calc|Lin");
    assert!(resp.contains("numérico"), "unexpected: {}", resp);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn engine_dependent_commands_degrade_without_engine() {
    let dir = temp_dir("academicod-router-noengine");
    let state = AppState::new(&dir.join("data"), &dir.join("uploads"), None);

    let resp = send(&state, "ADD_TURMA|5|Calculus|Dr.Lin");
    assert!(resp.contains("motor de dados nativo indisponível"));
    assert!(send(&state, "LIST_TURMAS").contains("indisponível"));

    // Everything that does not need the engine keeps working.
    assert!(send(&state, "SET_TURNO_TURMA|5|morning").starts_with("SUCESSO"));
    assert!(send(&state, "CREATE_USER|gina|Str0ng!pwd|admin").starts_with("SUCESSO"));
    assert!(send(&state, "UPDATE_NOTAS|77|1.0|2.0|3.0|1.8").starts_with("SUCESSO"));
    assert!(send(&state, "GET_NOTAS|77").contains("NP2: 2.0"));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn delete_turma_cascades_to_secondary_state() {
    let dir = temp_dir("academicod-router-cascade");
    let state = state_with_engine(&dir);

    send(&state, "ADD_TURMA|8|Biologia|Dr. Dias");
    send(&state, "ADD_ALUNO|8|2000|Rita Melo");
    send(&state, "SET_TURNO_TURMA|8|afternoon");
    send(&state, "SET_PROVAS_TURMA|8|01/09/2025|||");
    send(&state, "SAVE_PRESENCAS|8|01/08/2025|2000:1");

    assert!(send(&state, "DELETE_TURMA|8").starts_with("SUCESSO"));
    assert!(send(&state, "GET_TURNO_TURMA|8").starts_with("ERRO"));
    assert_eq!(send(&state, "GET_PRESENCAS|8"), "Nenhuma presença registrada.");
    // Cascade removes the turma's alunos in the engine too.
    assert!(send(&state, "GET_ALUNO|2000").starts_with("ERRO"));

    let _ = std::fs::remove_dir_all(dir);
}
