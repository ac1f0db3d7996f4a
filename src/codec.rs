//! Binary wire framing: the serial-version header and response-status
//! dispatch described in the codec component design.

use nosql_core::{NoSqlError, NoSqlErrorCode};

/// Protocol version written ahead of every request body.
pub const SERIAL_VERSION: u16 = 3;

pub fn write_serial_version(out: &mut Vec<u8>) {
    out.extend_from_slice(&SERIAL_VERSION.to_be_bytes());
}

/// The engine's view of a decoded response: either the payload to hand to
/// the request's own deserializer, or a terminal error already classified.
pub enum Classified {
    Success(Vec<u8>),
    Failure(NoSqlError),
}

/// Classifies an HTTP response by status code, per the response
/// classification table: 200 demuxes on an internal status byte, 400
/// carries a plain UTF-8 message, anything else is generic.
pub fn classify_response(status: u16, body: &[u8], reason_phrase: &str) -> Classified {
    match status {
        200 => classify_200(body),
        400 => {
            let msg = if body.is_empty() {
                reason_phrase.to_string()
            } else {
                String::from_utf8_lossy(body).into_owned()
            };
            Classified::Failure(NoSqlError::new(
                NoSqlErrorCode::IllegalArgument,
                format!("Error response: {msg}"),
            ))
        }
        other => Classified::Failure(NoSqlError::new(
            NoSqlErrorCode::UnknownError,
            format!("Error response = {other}, reason = {reason_phrase}"),
        )),
    }
}

fn classify_200(body: &[u8]) -> Classified {
    let Some(&code) = body.first() else {
        return Classified::Failure(NoSqlError::new(
            NoSqlErrorCode::UnknownError,
            "empty response body on status 200",
        ));
    };
    if code == 0 {
        return Classified::Success(body[1..].to_vec());
    }
    if body.len() < 5 {
        return Classified::Failure(NoSqlError::from_int(
            code as i32,
            "truncated error response",
        ));
    }
    let len = u32::from_be_bytes(body[1..5].try_into().unwrap()) as usize;
    let message = body
        .get(5..5 + len)
        .and_then(|b| std::str::from_utf8(b).ok())
        .unwrap_or("<invalid error message>");
    Classified::Failure(NoSqlError::from_int(code as i32, message))
}
