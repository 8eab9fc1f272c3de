//! 세션 통계

use std::time::{Duration, Instant};

use crate::session::Outcome;

/// 서버 통계
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 수신한 데이터그램 수
    pub datagrams_received: u64,

    /// 디코딩 실패로 버린 데이터그램 수
    pub decode_errors: u64,

    /// 전송한 패킷 수
    pub packets_sent: u64,

    /// 시작된 핸드쉐이크 수 (SYN)
    pub handshakes: u64,

    /// 재전송/복제된 SYN 수
    pub syn_retransmissions: u64,

    /// ESTABLISHED까지 도달한 세션 수
    pub established: u64,

    /// 수락된 DATA 세그먼트 수
    pub segments_accepted: u64,

    /// 수락된 페이로드 바이트
    pub bytes_accepted: u64,

    /// 중복 DATA 수
    pub duplicates: u64,

    /// 윈도우 밖 DATA 수
    pub out_of_window: u64,

    /// 무시된 패킷 수 (ACK 불일치, 핸드쉐이크 전 DATA 등)
    pub ignored: u64,

    /// 예상치 못한 타입의 패킷 수
    pub unexpected: u64,

    /// 완료된 세션 수 (FINAL_RESPONSE 최초 전송)
    pub completed_sessions: u64,

    /// DATA_END 재수신으로 응답을 다시 보낸 횟수
    pub responses_resent: u64,

    /// 수신 타임아웃 횟수
    pub idle_timeouts: u64,

    /// 소켓 수신 에러 횟수
    pub recv_errors: u64,

    /// 마지막 데이터그램 수신 시간
    pub last_activity: Option<Instant>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            datagrams_received: 0,
            decode_errors: 0,
            packets_sent: 0,
            handshakes: 0,
            syn_retransmissions: 0,
            established: 0,
            segments_accepted: 0,
            bytes_accepted: 0,
            duplicates: 0,
            out_of_window: 0,
            ignored: 0,
            unexpected: 0,
            completed_sessions: 0,
            responses_resent: 0,
            idle_timeouts: 0,
            recv_errors: 0,
            last_activity: None,
        }
    }

    /// 데이터그램 도착 기록
    pub fn record_datagram(&mut self) {
        self.datagrams_received += 1;
        self.last_activity = Some(Instant::now());
    }

    /// 세션 처리 결과 기록
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::HandshakeStarted { .. } => self.handshakes += 1,
            Outcome::Established => self.established += 1,
            Outcome::Accepted { len, .. } => {
                self.segments_accepted += 1;
                self.bytes_accepted += *len as u64;
            }
            Outcome::Duplicate { .. } => self.duplicates += 1,
            Outcome::OutOfWindow { .. } => self.out_of_window += 1,
            Outcome::Completed { .. } => self.completed_sessions += 1,
            Outcome::SynRetransmitted => self.syn_retransmissions += 1,
            Outcome::ResponseResent => self.responses_resent += 1,
            Outcome::IgnoredAck { .. } | Outcome::IgnoredData { .. } | Outcome::IgnoredEnd => {
                self.ignored += 1
            }
            Outcome::Unexpected(_) => self.unexpected += 1,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 마지막 활동 이후 경과 시간
    pub fn idle_for(&self) -> Option<Duration> {
        self.last_activity.map(|t| t.elapsed())
    }

    /// 중복 비율 (중복 / 전체 DATA)
    pub fn duplicate_ratio(&self) -> f64 {
        let total = self.segments_accepted + self.duplicates + self.out_of_window;
        if total == 0 {
            return 0.0;
        }
        self.duplicates as f64 / total as f64
    }

    /// 통계 출력용 요약
    pub fn summary(&self) -> String {
        format!(
            "datagrams={} decode_errors={} recv_errors={} sent={} handshakes={} completed={} \
             accepted={} ({} bytes) duplicates={} out_of_window={} ignored={} unexpected={}",
            self.datagrams_received,
            self.decode_errors,
            self.recv_errors,
            self.packets_sent,
            self.handshakes,
            self.completed_sessions,
            self.segments_accepted,
            self.bytes_accepted,
            self.duplicates,
            self.out_of_window,
            self.ignored,
            self.unexpected,
        )
    }
}
