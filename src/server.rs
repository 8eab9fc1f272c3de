//! 서버 전송 루프
//!
//! - 단일 UDP 엔드포인트에서 데이터그램 수신
//! - 디코딩 → 세션 처리 → 응답을 라우터로 전송
//! - 수신, 분류, 응답은 한 태스크에서 순차 처리

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::packet::Packet;
use crate::processor::RequestProcessor;
use crate::session::{Phase, Session};
use crate::stats::SessionStats;
use crate::transport::Endpoint;
use crate::{Config, Error, Result};

/// 다른 태스크에서 통계를 읽기 위한 공유 핸들
pub type StatsHandle = Arc<RwLock<SessionStats>>;

/// RSP 서버
pub struct Server<P> {
    config: Config,
    endpoint: Endpoint,
    session: Session<P>,
    stats: StatsHandle,
}

impl<P: RequestProcessor> Server<P> {
    /// `0.0.0.0:listen_port`에 바인딩
    ///
    /// 바인딩 실패는 복구 불가능한 에러
    pub async fn bind(config: Config, processor: P) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
        Self::bind_to(config, addr, processor).await
    }

    /// 지정 주소에 바인딩
    pub async fn bind_to(config: Config, addr: SocketAddr, processor: P) -> Result<Self> {
        config.validate()?;
        let endpoint = Endpoint::bind(addr).await?;
        Self::from_endpoint(config, endpoint, processor)
    }

    /// 이미 준비된 엔드포인트 사용
    pub fn from_endpoint(config: Config, endpoint: Endpoint, processor: P) -> Result<Self> {
        config.validate()?;

        let session = Session::new(&config, processor);

        info!(
            "RSP Server listening on {}, relay: {}",
            endpoint.local_addr()?,
            config
                .relay_addr
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "direct".into())
        );

        Ok(Self {
            config,
            endpoint,
            session,
            stats: Arc::new(RwLock::new(SessionStats::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }

    /// 통계 공유 핸들
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// 현재 세션 단계
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    /// 데이터그램 하나를 기다려 처리
    ///
    /// 타임아웃이면 `Ok(false)` (피어 무응답 신호), 그 외에는 `Ok(true)`.
    /// 소켓 수신 에러는 기록만 하고 루프를 멈추지 않는다.
    pub async fn poll_once(&mut self) -> Result<bool> {
        let received = match self.endpoint.recv_datagram(self.config.recv_timeout()).await {
            Ok(received) => received,
            Err(Error::Io(e)) => {
                warn!("수신 에러: {}", e);
                self.stats.write().recv_errors += 1;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        match received {
            Some((datagram, source)) => {
                self.handle_datagram(&datagram, source).await?;
                Ok(true)
            }
            None => {
                self.stats.write().idle_timeouts += 1;
                Ok(false)
            }
        }
    }

    /// 수신 데이터그램 처리
    ///
    /// 디코딩 에러는 기록 후 버린다. 응답 인코딩 실패만 에러로 전파된다.
    pub async fn handle_datagram(&mut self, datagram: &[u8], source: SocketAddr) -> Result<()> {
        self.stats.write().record_datagram();

        let packet = match Packet::from_bytes(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("패킷 디코딩 실패 ({}): {}", source, e);
                self.stats.write().decode_errors += 1;
                return Ok(());
            }
        };

        debug!("수신: {} (router: {})", packet, source);

        let step = self.session.handle(&packet);
        self.stats.write().record_outcome(&step.outcome);

        // 응답은 라우터로, 피어 주소는 패킷 헤더가 담는다
        let target = self.config.relay_addr.unwrap_or(source);

        for reply in &step.replies {
            match self.endpoint.send_packet(reply, target).await {
                Ok(()) => {
                    self.stats.write().packets_sent += 1;
                    debug!("전송: {} → {}", reply, target);
                }
                Err(Error::Io(e)) => {
                    warn!("전송 실패 ({}): {}", target, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// 프로세스 종료까지 수신 루프 실행
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if !self.poll_once().await? {
                debug!(
                    "{}ms 동안 수신 없음 (phase={:?})",
                    self.config.recv_timeout_ms,
                    self.session.phase()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::Duration;

    use bytes::Bytes;

    use crate::packet::PacketKind;
    use crate::processor::EchoProcessor;
    use crate::transport::Endpoint;

    async fn direct_server() -> Server<EchoProcessor> {
        let config = Config {
            recv_timeout_ms: 50,
            ..Config::direct()
        };
        Server::bind_to(config, "127.0.0.1:0".parse().unwrap(), EchoProcessor)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_idle_poll_returns_false() {
        let mut server = direct_server().await;

        assert!(!server.poll_once().await.unwrap());
        assert_eq!(server.stats().idle_timeouts, 1);
    }

    #[tokio::test]
    async fn test_recv_error_is_not_idle() {
        // 닫힌 포트
        let dead = {
            let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
            socket.local_addr().unwrap()
        };

        // 연결된 UDP 소켓은 ICMP port unreachable을 다음 수신 에러로 받는다
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(dead).await.unwrap();
        socket.send(b"ping").await.unwrap();

        let config = Config {
            recv_timeout_ms: 2000,
            ..Config::direct()
        };
        let mut server =
            Server::from_endpoint(config, Endpoint::from_socket(socket), EchoProcessor).unwrap();

        assert!(server.poll_once().await.unwrap());
        let stats = server.stats();
        assert_eq!(stats.recv_errors, 1);
        assert_eq!(stats.idle_timeouts, 0);
        assert_eq!(stats.datagrams_received, 0);
    }

    #[tokio::test]
    async fn test_malformed_datagram_does_not_stop_loop() {
        let mut server = direct_server().await;
        let server_addr = server.local_addr().unwrap();

        let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[1, 2, 3], server_addr).await.unwrap();

        assert!(server.poll_once().await.unwrap());
        assert_eq!(server.stats().decode_errors, 1);
        assert_eq!(server.phase(), Phase::Closed);

        // 다음 패킷은 정상 처리
        let mut client = Endpoint::from_socket(client);
        let syn = Packet::new(
            PacketKind::Syn,
            77,
            0,
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9999),
            Bytes::new(),
        );
        client.send_packet(&syn, server_addr).await.unwrap();

        assert!(server.poll_once().await.unwrap());
        assert_eq!(server.phase(), Phase::SynReceived);

        let (bytes, _) = client
            .recv_datagram(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("SYN_ACK");
        let syn_ack = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(syn_ack.kind, PacketKind::SynAck);
        assert_eq!(syn_ack.ack_number, 78);
        assert_eq!(syn_ack.peer_port, 9999);
    }

    #[tokio::test]
    async fn test_replies_go_to_relay() {
        let relay = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay_addr = relay.local_addr().unwrap();

        let config = Config {
            relay_addr: Some(relay_addr),
            recv_timeout_ms: 50,
            ..Config::direct()
        };
        let mut server = Server::bind_to(config, "127.0.0.1:0".parse().unwrap(), EchoProcessor)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        // 라우터가 아닌 다른 소켓에서 SYN 전송
        let origin = Endpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let syn = Packet::new(
            PacketKind::Syn,
            1,
            0,
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), 4000),
            Bytes::new(),
        );
        origin.send_packet(&syn, server_addr).await.unwrap();
        assert!(server.poll_once().await.unwrap());

        let mut relay = Endpoint::from_socket(relay);
        let (bytes, _) = relay
            .recv_datagram(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("SYN_ACK at relay");
        let syn_ack = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(syn_ack.peer(), SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), 4000));
        assert_eq!(server.stats().packets_sent, 1);
    }
}
