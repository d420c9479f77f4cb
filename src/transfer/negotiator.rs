//! Data channel negotiation
//!
//! Opens the data connection for one transfer and issues the transfer
//! command on the control connection. Passive mode is preferred; a server
//! that refuses `PASV` gets exactly one retry in active mode.

use log::{info, warn};
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::timeout;

use crate::config::TransferConfig;
use crate::control::{ControlConnection, DeferredReply};
use crate::error::TransferError;
use crate::protocol::Command;
use crate::protocol::responses::{COMMAND_OK, ENTERING_PASSIVE_MODE};
use crate::transfer::{DataChannel, Direction, TransferMode};

/// Six comma-separated numbers anywhere in the reply text. Reply formats
/// differ between servers, so nothing around the numbers is required; a
/// coincidental six-number run earlier in the text would match first.
static PASSIVE_ADDRESS: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})")
});

/// Establishes the data channel for `command` and sends it.
///
/// Returns the open channel together with the deferred completion reply
/// of `command`.
pub async fn prepare(
    control: &mut ControlConnection,
    mode: TransferMode,
    command: &Command,
    direction: Direction,
    settings: &TransferConfig,
) -> Result<(DataChannel, DeferredReply), TransferError> {
    match mode {
        TransferMode::Active => prepare_active(control, command, direction, settings).await,
        TransferMode::Passive => {
            match prepare_passive(control, command, direction, settings).await {
                Err(TransferError::PassiveRejected(reply)) => {
                    warn!("Passive mode refused ({}), retrying in active mode", reply);
                    prepare_active(control, command, direction, settings).await
                }
                other => other,
            }
        }
    }
}

/// Listens locally, announces the address with `PORT` and waits for the
/// server to connect.
async fn prepare_active(
    control: &mut ControlConnection,
    command: &Command,
    direction: Direction,
    settings: &TransferConfig,
) -> Result<(DataChannel, DeferredReply), TransferError> {
    let local = control.local_addr();
    let announced_ip = match local.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => ip
            .to_ipv4_mapped()
            .ok_or(TransferError::UnsupportedAddressFamily(local))?,
    };

    let listener = TcpListener::bind(SocketAddr::new(local.ip(), 0))
        .await
        .map_err(TransferError::ListenerSetupFailed)?;
    let port = listener
        .local_addr()
        .map_err(TransferError::ListenerSetupFailed)?
        .port();

    let announce = Command::PORT(SocketAddrV4::new(announced_ip, port));
    let reply = control
        .send_and_wait(&announce, announce.expected_replies())
        .await?;
    if reply.code != COMMAND_OK {
        return Err(TransferError::PortRejected(reply));
    }

    let mut deferred = control
        .send_deferred(command, command.expected_replies())
        .await?;

    // A refused command never gets a data connection, so watch the reply
    // while waiting for the server to connect.
    let stream = tokio::select! {
        accepted = accept_within(&listener, settings.data_timeout()) => accepted?,
        reply = &mut deferred => {
            let reply = reply?;
            if !reply.is_one_of(command.expected_replies()) {
                return Err(TransferError::Rejected(reply));
            }
            let stream = accept_within(&listener, settings.data_timeout()).await?;
            return Ok((DataChannel::new(stream, direction), DeferredReply::ready(Ok(reply))));
        }
    };

    Ok((DataChannel::new(stream, direction), deferred))
}

async fn accept_within(listener: &TcpListener, limit: Duration) -> Result<TcpStream, TransferError> {
    match timeout(limit, listener.accept()).await {
        Ok(Ok((stream, peer))) => {
            info!("Data connection accepted from {}", peer);
            Ok(stream)
        }
        Ok(Err(e)) => Err(TransferError::AcceptFailed(e)),
        Err(_) => Err(TransferError::AcceptTimeout(limit)),
    }
}

/// Asks the server for a passive address with `PASV` and connects to it.
async fn prepare_passive(
    control: &mut ControlConnection,
    command: &Command,
    direction: Direction,
    settings: &TransferConfig,
) -> Result<(DataChannel, DeferredReply), TransferError> {
    let reply = control
        .send_and_wait(&Command::PASV, Command::PASV.expected_replies())
        .await?;
    if reply.code != ENTERING_PASSIVE_MODE {
        return Err(TransferError::PassiveRejected(reply));
    }

    let target = SocketAddr::V4(parse_passive_address(&reply.text)?);
    let stream = connect_from(control.local_addr(), target, settings.data_timeout()).await?;
    info!("Data connection opened to {}", target);

    let deferred = control
        .send_deferred(command, command.expected_replies())
        .await?;

    Ok((DataChannel::new(stream, direction), deferred))
}

/// Connects to `target` from the control connection's local address when
/// the address families agree.
async fn connect_from(
    local: SocketAddr,
    target: SocketAddr,
    limit: Duration,
) -> Result<TcpStream, TransferError> {
    let failed = |e: std::io::Error| TransferError::DataConnectFailed(target, e);

    let socket = TcpSocket::new_v4().map_err(failed)?;
    if local.is_ipv4() {
        socket.bind(SocketAddr::new(local.ip(), 0)).map_err(failed)?;
    }

    match timeout(limit, socket.connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(failed(e)),
        Err(_) => Err(failed(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no connection within {:?}", limit),
        ))),
    }
}

/// Extracts the data address from a `227` reply text: four address octets
/// followed by the port's high and low bytes.
pub fn parse_passive_address(text: &str) -> Result<SocketAddrV4, TransferError> {
    let pattern = PASSIVE_ADDRESS
        .as_ref()
        .map_err(|e| TransferError::MalformedPassiveReply(e.to_string()))?;

    pattern
        .captures_iter(text)
        .find_map(|groups| {
            let mut values = [0u8; 6];
            for (i, value) in values.iter_mut().enumerate() {
                *value = groups[i + 1].parse().ok()?;
            }
            let [a, b, c, d, high, low] = values;
            let port = u16::from(high) << 8 | u16::from(low);
            Some(SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port))
        })
        .ok_or_else(|| TransferError::MalformedPassiveReply(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_passive_reply() {
        let addr = parse_passive_address("Entering Passive Mode (127,0,0,1,200,10)").unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 51210));
    }

    #[test]
    fn finds_address_without_parentheses() {
        let addr = parse_passive_address("Entering Passive Mode 10,0,0,7,4,1.").unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), 1025));
    }

    #[test]
    fn skips_runs_with_out_of_range_values() {
        let addr = parse_passive_address("=999,1,1,1,1,1 then (192,168,0,2,0,21)").unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 2), 21));
    }

    #[test]
    fn rejects_text_without_address() {
        assert!(matches!(
            parse_passive_address("Entering Passive Mode"),
            Err(TransferError::MalformedPassiveReply(_))
        ));
        assert!(parse_passive_address("(127,0,0,1,200)").is_err());
    }
}
