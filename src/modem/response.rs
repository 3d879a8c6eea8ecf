pub const OK: &[u8] = b"OK\n\n";
pub const TX_INFO: &str = "+TX_INFO:";

/// What the module answered to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Empty,
    Ok,
    TxInfo(u8),
    Text(String),
}

pub fn parse(raw: &[u8]) -> Response {
    if raw.is_empty() {
        return Response::Empty;
    }
    if raw == OK {
        return Response::Ok;
    }

    let text = String::from_utf8_lossy(raw);
    if let Some(idx) = text.find(TX_INFO) {
        let code = text[idx + TX_INFO.len()..]
            .chars()
            .next()
            .and_then(|c| c.to_digit(10));
        if let Some(code) = code {
            return Response::TxInfo(code as u8);
        }
    }
    Response::Text(text.into_owned())
}
