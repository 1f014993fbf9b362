//! Response markers of the wire protocol. Clients pattern-match on the
//! leading token, so every textual response goes through one of these.

pub fn sucesso(msg: impl Into<String>) -> String {
    format!("SUCESSO: {}", msg.into())
}

pub fn erro(msg: impl Into<String>) -> String {
    format!("ERRO: {}", msg.into())
}
