// Health-check client - one connect, send, receive cycle

use crate::error::Result;
use crate::server::MAX_REQUEST_BYTES;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Send `token` to the server at `addr` and return its reply
///
/// Mirrors the server's framing: one write, one read of at most
/// [`MAX_REQUEST_BYTES`]. `timeout` bounds the read when given.
pub fn check<A: ToSocketAddrs>(addr: A, token: &str, timeout: Option<Duration>) -> Result<String> {
    tracing::debug!("Connecting to server");
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(timeout)?;

    tracing::debug!("Sending data: {:?}", token);
    stream.write_all(token.as_bytes())?;
    stream.flush()?;

    tracing::debug!("Waiting for response");
    let mut buf = [0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf)?;
    let response = String::from_utf8_lossy(&buf[..n]).into_owned();
    tracing::debug!("response from server: {:?}", response);

    if let Err(e) = stream.shutdown(Shutdown::Both) {
        tracing::debug!("Failed to shut down connection: {}", e);
    }
    Ok(response)
}
