//! UDP 엔드포인트
//!
//! 서버와 클라이언트가 공유하는 소켓 래퍼.
//! 수신 타임아웃은 에러가 아니라 `None`으로 돌려준다 (생존 신호).

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use crate::packet::Packet;
use crate::{Result, MAX_PACKET_SIZE};

/// 수신 버퍼 크기
///
/// 최대 패킷보다 한 바이트 크게 잡아 초과 길이 데이터그램도 감지한다.
const RECV_BUFFER_SIZE: usize = MAX_PACKET_SIZE + 1;

/// UDP 엔드포인트
pub struct Endpoint {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl Endpoint {
    /// 소켓 바인딩
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket))
    }

    /// 기존 소켓 사용
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 데이터그램 하나 수신
    ///
    /// `timeout` 안에 아무것도 오지 않으면 `Ok(None)`
    pub async fn recv_datagram(&mut self, timeout: Duration) -> Result<Option<(Bytes, SocketAddr)>> {
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((len, addr))) => {
                // 버퍼보다 큰 데이터그램은 잘려서 들어오므로 길이 검사에서 걸러진다
                trace!("{} bytes 수신: {}", len, addr);
                Ok(Some((Bytes::copy_from_slice(&self.buf[..len]), addr)))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }

    /// 패킷 인코딩 후 전송
    pub async fn send_packet(&self, packet: &Packet, target: SocketAddr) -> Result<()> {
        let bytes = packet.to_bytes()?;
        let sent = self.socket.send_to(&bytes, target).await?;
        if sent != bytes.len() {
            warn!("부분 전송: {}/{} bytes → {}", sent, bytes.len(), target);
        }
        trace!("전송: {} → {}", packet, target);
        Ok(())
    }
}
