//! 클라이언트 (송신측)
//!
//! - 핸드쉐이크 시작 (SYN → SYN_ACK → ACK)
//! - 요청을 세그먼트로 분할해 stop-and-wait 전송
//! - 패킷별 재전송 타이머, N회 실패 시 PeerUnreachable
//! - FINAL_RESPONSE 수집 및 조립

use std::collections::BTreeMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::packet::{Packet, PacketKind};
use crate::transport::Endpoint;
use crate::window::Sequence;
use crate::{Config, Error, Result, MAX_PAYLOAD_SIZE, MIN_SEQUENCE_SEPARATION};

/// RSP 클라이언트
pub struct Client {
    config: Config,
    endpoint: Endpoint,

    /// 논리적 서버 주소 (패킷 헤더에 기록)
    server: SocketAddrV4,

    /// 실제 전송 대상 (라우터 또는 서버)
    target: SocketAddr,

    rng: StdRng,
}

impl Client {
    /// 임의 포트에 바인딩
    pub async fn bind(config: Config, server: SocketAddrV4) -> Result<Self> {
        let local = SocketAddr::from(([0, 0, 0, 0], 0));
        Self::bind_to(config, local, server).await
    }

    /// 지정 주소에 바인딩
    pub async fn bind_to(config: Config, local: SocketAddr, server: SocketAddrV4) -> Result<Self> {
        config.validate()?;

        let endpoint = Endpoint::bind(local).await?;
        let target = config.relay_addr.unwrap_or(SocketAddr::V4(server));

        info!(
            "RSP Client started on {}, server: {}, via: {}",
            endpoint.local_addr()?,
            server,
            target
        );

        Ok(Self {
            config,
            endpoint,
            server,
            target,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// 요청 하나를 보내고 응답을 받는다
    ///
    /// 세션 하나 = 핸드쉐이크 + DATA 세그먼트들 + DATA_END/FINAL_RESPONSE
    pub async fn request(&mut self, request: &[u8]) -> Result<Bytes> {
        let started = Instant::now();
        let isn: Sequence = self.rng.gen_range(0..1u64 << 32);

        // 1. 핸드쉐이크
        let syn = self.packet(PacketKind::Syn, isn, 0, Bytes::new());
        let syn_ack = self
            .send_reliable(&syn, None, |p| {
                p.kind == PacketKind::SynAck && p.ack_number == isn.wrapping_add(1)
            })
            .await?;

        let server_seq = syn_ack.sequence_number;
        if server_seq.wrapping_sub(isn) < MIN_SEQUENCE_SEPARATION {
            return Err(Error::HandshakeFailed(format!(
                "서버 시퀀스 간격 부족: client={}, server={}",
                isn, server_seq
            )));
        }

        let ack = self.packet(
            PacketKind::Ack,
            isn.wrapping_add(1),
            server_seq.wrapping_add(1),
            Bytes::new(),
        );
        self.endpoint.send_packet(&ack, self.target).await?;
        debug!("핸드쉐이크 완료: isn={}, server_seq={}", isn, server_seq);

        // 2. 세그먼트 전송
        // ACK에는 응답이 없으므로 첫 DATA_ACK 전까지는 재전송마다 ACK도 함께 보낸다
        let mut seq = isn.wrapping_add(2);
        let mut server_position = server_seq.wrapping_add(1);
        let mut confirmed = false;

        let payload = Bytes::copy_from_slice(request);
        let mut offset = 0;
        while offset < payload.len() {
            let end = (offset + self.config.segment_size).min(payload.len());
            let data = self.packet(
                PacketKind::Data,
                seq,
                server_position,
                payload.slice(offset..end),
            );
            let expected_ack = seq.wrapping_add(1);
            let preamble = (!confirmed).then_some(&ack);

            let data_ack = self
                .send_reliable(&data, preamble, |p| {
                    p.kind == PacketKind::DataAck && p.ack_number == expected_ack
                })
                .await?;

            confirmed = true;
            server_position = server_position.max(data_ack.sequence_number);
            seq = seq.wrapping_add(1);
            offset = end;
        }

        // 3. DATA_END 및 응답 수집
        let data_end = self.packet(PacketKind::DataEnd, seq, server_position, Bytes::new());
        let preamble = (!confirmed).then_some(&ack);
        let response = self
            .collect_response(&data_end, preamble, server_position.wrapping_add(1))
            .await?;

        info!(
            "요청 완료: 요청 {} bytes, 응답 {} bytes, {:.2}ms",
            request.len(),
            response.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(response)
    }

    fn packet(&self, kind: PacketKind, seq: Sequence, ack: Sequence, payload: Bytes) -> Packet {
        Packet::new(kind, seq, ack, self.server, payload)
    }

    /// 응답이 올 때까지 재전송
    ///
    /// `preamble`이 있으면 매 전송마다 먼저 보낸다.
    async fn send_reliable<F>(
        &mut self,
        packet: &Packet,
        preamble: Option<&Packet>,
        matches: F,
    ) -> Result<Packet>
    where
        F: Fn(&Packet) -> bool,
    {
        let timeout = self.config.retransmit_timeout();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("재전송 #{}: {}", attempt, packet);
            }
            if let Some(preamble) = preamble {
                self.endpoint.send_packet(preamble, self.target).await?;
            }
            self.endpoint.send_packet(packet, self.target).await?;

            let deadline = Instant::now() + timeout;
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                let Some((datagram, _)) = self.endpoint.recv_datagram(remaining).await? else {
                    break;
                };
                match Packet::from_bytes(&datagram) {
                    Ok(reply) if matches(&reply) => return Ok(reply),
                    Ok(reply) => debug!("응답 대기 중 무시: {}", reply),
                    Err(e) => warn!("패킷 디코딩 실패: {}", e),
                }
            }
        }

        Err(Error::PeerUnreachable {
            kind: packet.kind,
            retries: self.config.max_retries,
        })
    }

    /// DATA_END 전송 후 FINAL_RESPONSE 조각을 모두 받을 때까지 대기
    ///
    /// 서버는 DATA_END 재수신 시 캐시된 응답 전체를 다시 보내므로
    /// 누락이 있으면 DATA_END를 재전송한다.
    async fn collect_response(
        &mut self,
        data_end: &Packet,
        preamble: Option<&Packet>,
        first_seq: Sequence,
    ) -> Result<Bytes> {
        let expected_ack = data_end.sequence_number.wrapping_add(1);
        let timeout = self.config.retransmit_timeout();
        let mut parts: BTreeMap<Sequence, Bytes> = BTreeMap::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("DATA_END 재전송 #{} (수신 조각 {}개)", attempt, parts.len());
            }
            if let Some(preamble) = preamble {
                self.endpoint.send_packet(preamble, self.target).await?;
            }
            self.endpoint.send_packet(data_end, self.target).await?;

            let deadline = Instant::now() + timeout;
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                let Some((datagram, _)) = self.endpoint.recv_datagram(remaining).await? else {
                    break;
                };
                let reply = match Packet::from_bytes(&datagram) {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!("패킷 디코딩 실패: {}", e);
                        continue;
                    }
                };
                if reply.kind != PacketKind::FinalResponse || reply.ack_number != expected_ack {
                    debug!("응답 대기 중 무시: {}", reply);
                    continue;
                }

                parts.entry(reply.sequence_number).or_insert(reply.payload);
                if let Some(response) = assemble_response(&parts, first_seq) {
                    return Ok(response);
                }
            }
        }

        Err(Error::PeerUnreachable {
            kind: PacketKind::DataEnd,
            retries: self.config.max_retries,
        })
    }
}

/// `first_seq`부터 연속된 조각을 이어 붙인다
///
/// 1024바이트 미만 조각에 도달해야 완성. 중간이 비어 있으면 None.
fn assemble_response(parts: &BTreeMap<Sequence, Bytes>, first_seq: Sequence) -> Option<Bytes> {
    let mut response = BytesMut::new();
    let mut seq = first_seq;

    loop {
        let part = parts.get(&seq)?;
        response.extend_from_slice(part);
        if part.len() < MAX_PAYLOAD_SIZE {
            return Some(response.freeze());
        }
        seq = seq.wrapping_add(1);
    }
}
