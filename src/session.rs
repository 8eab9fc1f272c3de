//! 세션 상태 머신
//!
//! - 핸드쉐이크 진행 (SYN → SYN_ACK → ACK)
//! - DATA 분류: 수락 / 중복 / 윈도우 밖
//! - DATA_END 시 재조립 후 처리기 호출, FINAL_RESPONSE 생성
//!
//! 소켓과 무관하게 패킷 하나를 받아 응답 패킷 목록을 돌려주므로
//! 네트워크 없이 단위 테스트가 가능하다.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::{Config, OutOfWindowPolicy};
use crate::packet::{Packet, PacketKind};
use crate::processor::RequestProcessor;
use crate::window::{ReassemblyLog, Sequence, WindowBuffer};
use crate::MAX_PAYLOAD_SIZE;

/// 세션 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Closed,
    SynReceived,
    Established,
    Terminated,
}

/// 패킷 하나를 처리한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// SYN 수신, 세션 초기화 후 SYN_ACK 전송
    HandshakeStarted {
        client_sequence: Sequence,
        server_sequence: Sequence,
    },

    /// 현재 세션과 같은 초기 시퀀스의 SYN, 기존 SYN_ACK 재전송
    SynRetransmitted,

    /// 핸드쉐이크 완료
    Established,

    /// DATA 수락
    Accepted { seq: Sequence, len: usize },

    /// 이미 기록된 DATA 재수신
    Duplicate { seq: Sequence },

    /// 윈도우 밖 DATA (기록하지 않음)
    OutOfWindow { seq: Sequence },

    /// DATA_END 처리 완료, FINAL_RESPONSE 전송
    Completed {
        request_len: usize,
        response_len: usize,
    },

    /// 종료된 세션에 DATA_END 재수신, 캐시된 응답 재전송
    ResponseResent,

    /// 기대값과 다른 ACK (무시)
    IgnoredAck { ack: Sequence },

    /// 핸드쉐이크 전 DATA (무시)
    IgnoredData { seq: Sequence },

    /// 수립되지 않은 세션의 DATA_END (무시)
    IgnoredEnd,

    /// 서버가 받을 일이 없는 타입
    Unexpected(PacketKind),
}

/// 처리 결과와 보낼 응답 패킷
#[derive(Debug, Clone)]
pub struct Step {
    pub outcome: Outcome,
    pub replies: Vec<Packet>,
}

impl Step {
    fn silent(outcome: Outcome) -> Self {
        Self {
            outcome,
            replies: Vec::new(),
        }
    }

    fn reply(outcome: Outcome, packet: Packet) -> Self {
        Self {
            outcome,
            replies: vec![packet],
        }
    }
}

/// 논리적 연결 하나의 상태
///
/// 서버 프로세스당 하나만 존재하며 새 SYN마다 초기화된다.
pub struct Session<P> {
    processor: P,
    rng: StdRng,

    window_size: usize,
    sequence_separation: u64,
    sequence_jitter: u64,
    out_of_window: OutOfWindowPolicy,

    phase: Phase,

    /// 클라이언트 초기 시퀀스 (SYN)
    client_sequence: Sequence,

    /// 서버 시퀀스 카운터
    server_sequence: Sequence,

    /// SYN_ACK에 실었던 서버 시퀀스
    handshake_sequence: Sequence,

    /// 서버가 마지막으로 확인한 클라이언트 시퀀스 (SYN + 1)
    last_client_ack: Sequence,

    /// 다음으로 로그에 들어갈 수 있는 시퀀스
    expected_next: Sequence,

    window: WindowBuffer,
    log: ReassemblyLog,

    /// DATA_END 재수신 시 그대로 재전송할 응답
    final_response: Vec<Packet>,
}

impl<P: RequestProcessor> Session<P> {
    pub fn new(config: &Config, processor: P) -> Self {
        Self::with_rng(config, processor, StdRng::from_entropy())
    }

    /// 난수 생성기를 지정한 생성자 (테스트 재현용)
    pub fn with_rng(config: &Config, processor: P, rng: StdRng) -> Self {
        Self {
            processor,
            rng,
            window_size: config.window_size,
            sequence_separation: config.sequence_separation,
            sequence_jitter: config.sequence_jitter,
            out_of_window: config.out_of_window,
            phase: Phase::Closed,
            client_sequence: 0,
            server_sequence: 0,
            handshake_sequence: 0,
            last_client_ack: 0,
            expected_next: 0,
            window: WindowBuffer::new(config.window_size),
            log: ReassemblyLog::new(),
            final_response: Vec::new(),
        }
    }

    /// 수신 패킷 처리
    pub fn handle(&mut self, packet: &Packet) -> Step {
        match packet.kind {
            PacketKind::Syn => self.on_syn(packet),
            PacketKind::Ack => self.on_ack(packet),
            PacketKind::Data => self.on_data(packet),
            PacketKind::DataEnd => self.on_data_end(packet),
            PacketKind::SynAck | PacketKind::DataAck | PacketKind::FinalResponse => {
                warn!("예상치 못한 패킷: {}", packet);
                Step::silent(Outcome::Unexpected(packet.kind))
            }
        }
    }

    /// 세션 초기화 (모든 버퍼와 카운터)
    pub fn reset(&mut self) {
        self.phase = Phase::Closed;
        self.client_sequence = 0;
        self.server_sequence = 0;
        self.handshake_sequence = 0;
        self.last_client_ack = 0;
        self.expected_next = 0;
        self.window.clear();
        self.log.clear();
        self.final_response.clear();
    }

    fn on_syn(&mut self, packet: &Packet) -> Step {
        // SYN_ACK를 놓친 클라이언트의 재전송이거나 라우터가 복제한 SYN.
        // SYN_RECEIVED에서는 기록된 것이 없으므로 같은 SYN_ACK를 다시 보내도 된다.
        if self.phase == Phase::SynReceived && packet.sequence_number == self.client_sequence {
            debug!("SYN 재수신: client_seq={}, SYN_ACK 재전송", self.client_sequence);
            let syn_ack = packet.reply(
                PacketKind::SynAck,
                self.handshake_sequence,
                self.last_client_ack,
                Bytes::new(),
            );
            return Step::reply(Outcome::SynRetransmitted, syn_ack);
        }

        if self.phase != Phase::Closed {
            info!("세션 재시작: {:?} 상태에서 새 SYN 수신", self.phase);
        }
        self.reset();

        let client_sequence = packet.sequence_number;
        let jitter = if self.sequence_jitter > 0 {
            self.rng.gen_range(0..self.sequence_jitter)
        } else {
            0
        };

        self.client_sequence = client_sequence;
        self.server_sequence = client_sequence
            .wrapping_add(self.sequence_separation)
            .wrapping_add(jitter);
        self.handshake_sequence = self.server_sequence;
        self.last_client_ack = client_sequence.wrapping_add(1);
        self.phase = Phase::SynReceived;

        info!(
            "SYN 수신: client_seq={}, server_seq={}, peer={}",
            client_sequence,
            self.server_sequence,
            packet.peer()
        );

        let syn_ack = packet.reply(
            PacketKind::SynAck,
            self.server_sequence,
            self.last_client_ack,
            Bytes::new(),
        );

        Step::reply(
            Outcome::HandshakeStarted {
                client_sequence,
                server_sequence: self.server_sequence,
            },
            syn_ack,
        )
    }

    fn on_ack(&mut self, packet: &Packet) -> Step {
        let expected = self.server_sequence.wrapping_add(1);

        if self.phase != Phase::SynReceived || packet.ack_number != expected {
            debug!(
                "ACK 무시: phase={:?}, ack={}, expected={}",
                self.phase, packet.ack_number, expected
            );
            return Step::silent(Outcome::IgnoredAck {
                ack: packet.ack_number,
            });
        }

        self.server_sequence = packet.ack_number;
        self.expected_next = self.last_client_ack.wrapping_add(1);
        self.window.open(self.expected_next);
        self.phase = Phase::Established;

        info!(
            "핸드쉐이크 완료: window={}..={}",
            self.expected_next,
            self.expected_next
                .wrapping_add(self.window_size as u64)
                .wrapping_sub(1)
        );

        Step::silent(Outcome::Established)
    }

    fn on_data(&mut self, packet: &Packet) -> Step {
        let seq = packet.sequence_number;

        if self.phase != Phase::Established {
            debug!("DATA 무시 (핸드쉐이크 미완료): seq={}", seq);
            return Step::silent(Outcome::IgnoredData { seq });
        }

        // 이전 DATA_ACK를 놓친 송신측의 재전송
        if self.log.contains(seq) {
            debug!("중복 DATA: seq={}", seq);
            let ack = packet.reply(
                PacketKind::DataAck,
                self.server_sequence,
                seq.wrapping_add(1),
                Bytes::new(),
            );
            return Step::reply(Outcome::Duplicate { seq }, ack);
        }

        if self.window.fill(seq) {
            // 로그에 없는 시퀀스만 여기까지 오므로 슬롯과 로그는 함께 채워진다
            let logged = self.log.insert(seq, packet.payload.clone());
            debug_assert!(logged, "윈도우 슬롯 {}이 로그와 어긋남", seq);

            self.server_sequence = self.server_sequence.wrapping_add(1);
            let released = self.window.slide();
            self.expected_next = self.window.base().unwrap_or_else(|| seq.wrapping_add(1));

            debug!(
                "DATA 수락: seq={}, {} bytes, 슬라이드 {}, expected_next={}",
                seq,
                packet.payload.len(),
                released,
                self.expected_next
            );

            let ack = packet.reply(
                PacketKind::DataAck,
                self.server_sequence,
                seq.wrapping_add(1),
                Bytes::new(),
            );
            return Step::reply(
                Outcome::Accepted {
                    seq,
                    len: packet.payload.len(),
                },
                ack,
            );
        }

        debug!(
            "윈도우 밖 DATA: seq={}, window_base={:?}",
            seq,
            self.window.base()
        );

        match self.out_of_window {
            OutOfWindowPolicy::AckAnyway => {
                let ack = packet.reply(
                    PacketKind::DataAck,
                    self.server_sequence,
                    self.expected_next,
                    Bytes::new(),
                );
                Step::reply(Outcome::OutOfWindow { seq }, ack)
            }
            OutOfWindowPolicy::Drop => Step::silent(Outcome::OutOfWindow { seq }),
        }
    }

    fn on_data_end(&mut self, packet: &Packet) -> Step {
        match self.phase {
            Phase::Established => {}
            Phase::Terminated => {
                debug!("DATA_END 재수신: 응답 {}개 재전송", self.final_response.len());
                return Step {
                    outcome: Outcome::ResponseResent,
                    replies: self.final_response.clone(),
                };
            }
            Phase::Closed | Phase::SynReceived => {
                debug!("DATA_END 무시: phase={:?}", self.phase);
                return Step::silent(Outcome::IgnoredEnd);
            }
        }

        let request = self.log.assemble();
        let response = self.processor.process(&request);

        info!(
            "세션 완료: {} 세그먼트, 요청 {} bytes → 응답 {} bytes",
            self.log.len(),
            request.len(),
            response.len()
        );

        self.final_response = self.frame_response(packet, &response);
        self.phase = Phase::Terminated;
        self.window.clear();
        self.log.clear();

        Step {
            outcome: Outcome::Completed {
                request_len: request.len(),
                response_len: response.len(),
            },
            replies: self.final_response.clone(),
        }
    }

    /// 응답을 FINAL_RESPONSE 패킷들로 분할
    ///
    /// 1024바이트 미만인 패킷이 응답의 끝. 길이가 1024의 배수이면
    /// 빈 종료 패킷을 덧붙인다.
    fn frame_response(&self, trigger: &Packet, response: &Bytes) -> Vec<Packet> {
        let ack = trigger.sequence_number.wrapping_add(1);
        let mut seq = self.server_sequence.wrapping_add(1);
        let mut packets = Vec::with_capacity(response.len() / MAX_PAYLOAD_SIZE + 1);

        let mut offset = 0;
        while offset < response.len() {
            let end = (offset + MAX_PAYLOAD_SIZE).min(response.len());
            packets.push(trigger.reply(
                PacketKind::FinalResponse,
                seq,
                ack,
                response.slice(offset..end),
            ));
            seq = seq.wrapping_add(1);
            offset = end;
        }

        if response.len() % MAX_PAYLOAD_SIZE == 0 {
            packets.push(trigger.reply(PacketKind::FinalResponse, seq, ack, Bytes::new()));
        }

        packets
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn client_sequence(&self) -> Sequence {
        self.client_sequence
    }

    pub fn server_sequence(&self) -> Sequence {
        self.server_sequence
    }

    pub fn last_client_ack(&self) -> Sequence {
        self.last_client_ack
    }

    pub fn expected_next(&self) -> Sequence {
        self.expected_next
    }

    pub fn window(&self) -> &WindowBuffer {
        &self.window
    }

    pub fn log(&self) -> &ReassemblyLog {
        &self.log
    }
}
