use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{DNSClass, Name, RData, RecordType};

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use crate::core::common::Transport;
use crate::core::error::QueryError;

/// Largest UDP response accepted (EDNS(0) sized buffer).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Performs one DNS query against one resolver.
///
/// Returns the raw answer section. A response without records of the
/// requested type is an empty answer, not an error; only transport
/// failures, timeouts and server failures are errors.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(
        &self,
        host: &str,
        record_type: RecordType,
        resolver: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Vec<RData>, QueryError>;
}

/// `QueryExecutor` that puts exactly one question on the wire per call.
///
/// Nothing is answered locally: no cache, no hosts file, no special
/// handling of `localhost`. A response only counts when it comes back
/// from `resolver` with the id that was sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct HickoryExecutor;

#[async_trait]
impl QueryExecutor for HickoryExecutor {
    async fn query(
        &self,
        host: &str,
        record_type: RecordType,
        resolver: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> Result<Vec<RData>, QueryError> {
        let (id, request) = build_query(host, record_type).map_err(|reason| transport_error(resolver, reason))?;

        // One deadline for the whole exchange, connection setup included.
        let response = tokio::time::timeout(timeout, async {
            match transport {
                Transport::Udp => {
                    let response = exchange_udp(&request, id, resolver).await?;
                    match is_truncated(&response) {
                        true => {
                            debug!(host, %resolver, "truncated over UDP, retrying over TCP");
                            exchange_tcp(&request, resolver).await
                        }
                        false => Ok(response),
                    }
                }
                Transport::Tcp => exchange_tcp(&request, resolver).await,
            }
        })
        .await
        .map_err(|_| QueryError::Timeout {
            resolver: resolver.to_string(),
            timeout,
        })?
        .map_err(|reason| transport_error(resolver, reason))?;

        parse_response(id, &response, resolver)
    }
}

fn transport_error(resolver: SocketAddr, reason: String) -> QueryError {
    QueryError::Transport {
        resolver: resolver.to_string(),
        reason,
    }
}

/// Recursive query for `host` with a single question. Returns the message
/// id along with the wire bytes.
fn build_query(host: &str, record_type: RecordType) -> Result<(u16, Vec<u8>), String> {
    // Fully qualified so no search domain is appended.
    let fqdn = match host.ends_with('.') {
        true => host.to_owned(),
        false => format!("{host}."),
    };
    let name = Name::from_ascii(&fqdn).map_err(|e| format!("invalid name `{host}`: {e}"))?;

    let mut query = Query::query(name, record_type);
    query.set_query_class(DNSClass::IN);

    let id = fastrand::u16(..);
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(query);

    let bytes = message.to_vec().map_err(|e| format!("failed to encode query: {e}"))?;
    Ok((id, bytes))
}

/// TC bit of the header flags.
fn is_truncated(bytes: &[u8]) -> bool {
    bytes.get(2).is_some_and(|flags| flags & 0x02 != 0)
}

/// Decode a response and hand back its answer section.
///
/// NOERROR and NXDOMAIN are answers (possibly empty). Any other response
/// code means the resolver did not answer the question.
fn parse_response(id: u16, bytes: &[u8], resolver: SocketAddr) -> Result<Vec<RData>, QueryError> {
    let message = Message::from_vec(bytes).map_err(|e| transport_error(resolver, format!("bad response: {e}")))?;

    if message.id() != id || message.message_type() != MessageType::Response {
        return Err(transport_error(resolver, format!("unexpected message id {}", message.id())));
    }

    match message.response_code() {
        ResponseCode::NoError | ResponseCode::NXDomain => {}
        rcode => {
            return Err(QueryError::Rejected {
                resolver: resolver.to_string(),
                rcode: rcode.to_string(),
            });
        }
    }

    debug!(
        %resolver,
        rcode = %message.response_code(),
        answers = message.answers().len(),
        truncated = message.truncated(),
        "response received"
    );
    Ok(message.answers().iter().map(|record| record.data().clone()).collect())
}

async fn exchange_udp(request: &[u8], id: u16, resolver: SocketAddr) -> Result<Vec<u8>, String> {
    let bind_addr: SocketAddr = match resolver.is_ipv4() {
        true => (std::net::Ipv4Addr::UNSPECIFIED, 0).into(),
        false => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| format!("failed to bind UDP socket: {e}"))?;
    // Connected, so datagrams from other sources are dropped by the kernel.
    socket
        .connect(resolver)
        .await
        .map_err(|e| format!("failed to connect UDP socket: {e}"))?;
    socket.send(request).await.map_err(|e| format!("failed to send: {e}"))?;

    let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
    loop {
        let len = socket.recv(&mut buf).await.map_err(|e| format!("failed to receive: {e}"))?;
        // Stray datagrams with another id are skipped until the deadline.
        if len >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == id {
            buf.truncate(len);
            return Ok(buf);
        }
        debug!(%resolver, len, "ignoring unmatched datagram");
    }
}

async fn exchange_tcp(request: &[u8], resolver: SocketAddr) -> Result<Vec<u8>, String> {
    let mut stream = TcpStream::connect(resolver)
        .await
        .map_err(|e| format!("failed to connect: {e}"))?;
    stream.set_nodelay(true).map_err(|e| format!("failed to set TCP_NODELAY: {e}"))?;

    let len = u16::try_from(request.len()).map_err(|_| "query too large".to_owned())?;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| format!("failed to write length prefix: {e}"))?;
    stream.write_all(request).await.map_err(|e| format!("failed to send: {e}"))?;
    stream.flush().await.map_err(|e| format!("failed to flush: {e}"))?;

    let len = stream
        .read_u16()
        .await
        .map_err(|e| format!("failed to read response length: {e}"))?;
    let mut response = vec![0u8; usize::from(len)];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| format!("failed to read response: {e}"))?;
    Ok(response)
}
