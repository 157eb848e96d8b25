//! In-situ connect protocol: the line-oriented exchange a simulation
//! performs before any shared-memory traffic.
//!
//! Wire format, newline-terminated ASCII over a plain stream socket:
//!
//! ```text
//! writer → module   <security token>\n
//! module → writer   success\n            (or a failure reason line)
//! writer → module   <launch arg>\n       (zero or more)
//! writer → module   \n                   (empty line ends the args)
//! ```
//!
//! Only after `success` and the argument block does the mailbox and
//! id-range handshake begin.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::HandshakeError;

/// Response line sent when the security token matches.
pub const RESPONSE_SUCCESS: &str = "success";

fn read_line(reader: &mut BufReader<TcpStream>) -> Result<String, HandshakeError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Err(HandshakeError::Protocol {
            reason: "peer closed the stream mid-handshake".to_string(),
        });
    }
    if !line.ends_with('\n') {
        return Err(HandshakeError::Protocol {
            reason: "unterminated line".to_string(),
        });
    }
    line.pop();
    if line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn check_line_clean(what: &str, value: &str) -> Result<(), HandshakeError> {
    if value.contains('\n') || value.contains('\r') {
        return Err(HandshakeError::Protocol {
            reason: format!("{what} must not contain line breaks"),
        });
    }
    Ok(())
}

/// Accept one external writer on the module side.
///
/// Blocks on `listener` for a connection, verifies the security token,
/// answers with [`RESPONSE_SUCCESS`] or a failure reason, then reads the
/// launch-argument block. A token mismatch is answered on the wire and
/// reported as [`HandshakeError::Rejected`]; the writer never attaches.
pub fn accept_writer(
    listener: &TcpListener,
    expected_token: &str,
) -> Result<(TcpStream, Vec<String>), HandshakeError> {
    let (stream, _addr) = listener.accept()?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let token = read_line(&mut reader)?;
    if token != expected_token {
        let mut stream = reader.into_inner();
        stream.write_all(b"failure: token mismatch\n")?;
        stream.flush()?;
        return Err(HandshakeError::Rejected {
            reason: "token mismatch".to_string(),
        });
    }

    {
        let stream = reader.get_mut();
        stream.write_all(RESPONSE_SUCCESS.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
    }

    let mut args = Vec::new();
    loop {
        let line = read_line(&mut reader)?;
        if line.is_empty() {
            break;
        }
        args.push(line);
    }
    Ok((reader.into_inner(), args))
}

/// Connect to a module as the external writer.
///
/// Sends the security token, waits for the response line, then sends the
/// launch arguments terminated by an empty line. Returns the connected
/// stream on `success`; any other response line is
/// [`HandshakeError::Rejected`] with that line as the reason.
pub fn connect_writer<A: ToSocketAddrs>(
    addr: A,
    token: &str,
    args: &[String],
) -> Result<TcpStream, HandshakeError> {
    check_line_clean("security token", token)?;
    if token.is_empty() {
        return Err(HandshakeError::Protocol {
            reason: "security token must not be empty".to_string(),
        });
    }
    for arg in args {
        check_line_clean("launch argument", arg)?;
        if arg.is_empty() {
            return Err(HandshakeError::Protocol {
                reason: "launch arguments must not be empty lines".to_string(),
            });
        }
    }

    let stream = TcpStream::connect(addr)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    {
        let stream = reader.get_mut();
        stream.write_all(token.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
    }

    let response = read_line(&mut reader)?;
    if response != RESPONSE_SUCCESS {
        return Err(HandshakeError::Rejected { reason: response });
    }

    let mut stream = reader.into_inner();
    for arg in args {
        stream.write_all(arg.as_bytes())?;
        stream.write_all(b"\n")?;
    }
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(stream)
}
