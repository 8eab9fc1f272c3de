//! 프로토콜 설정

use std::net::SocketAddr;
use std::time::Duration;

use crate::{
    Error, Result, DEFAULT_WINDOW_SIZE, MAX_PAYLOAD_SIZE, MAX_WINDOW_SIZE, MIN_SEQUENCE_SEPARATION,
};

/// 윈도우 밖 DATA 처리 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfWindowPolicy {
    /// 기록하지 않고 현재 상태로 DATA_ACK 응답
    AckAnyway,

    /// 응답 없이 버림
    Drop,
}

/// RSP 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 수신 포트
    pub listen_port: u16,

    /// 라우터(다음 홉) 주소
    /// None이면 데이터그램 출발지로 직접 응답
    pub relay_addr: Option<SocketAddr>,

    /// 수신 윈도우 슬롯 수
    pub window_size: usize,

    /// 수신 대기 타임아웃 (밀리초)
    pub recv_timeout_ms: u64,

    /// 서버 시퀀스와 클라이언트 시퀀스 사이 최소 간격
    pub sequence_separation: u64,

    /// 서버 시퀀스 무작위 범위 (separation 위에 더해짐)
    pub sequence_jitter: u64,

    /// 윈도우 밖 DATA 처리 정책
    pub out_of_window: OutOfWindowPolicy,

    /// 송신 세그먼트 크기 (바이트, 최대 1024)
    pub segment_size: usize,

    /// 재전송 타임아웃 (밀리초)
    pub retransmit_timeout_ms: u64,

    /// 최대 재전송 횟수
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8007,
            relay_addr: Some(SocketAddr::from(([127, 0, 0, 1], 3000))),
            window_size: DEFAULT_WINDOW_SIZE,
            recv_timeout_ms: 7000,                    // 7초
            sequence_separation: MIN_SEQUENCE_SEPARATION,
            sequence_jitter: 1000,
            out_of_window: OutOfWindowPolicy::AckAnyway,
            segment_size: MAX_PAYLOAD_SIZE,
            retransmit_timeout_ms: 500,               // 500ms
            max_retries: 10,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 수신 타임아웃
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// 재전송 타임아웃
    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(Error::InvalidConfig(format!(
                "window_size는 1..={} 범위여야 함: {}",
                MAX_WINDOW_SIZE, self.window_size
            )));
        }
        if self.segment_size == 0 || self.segment_size > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidConfig(format!(
                "segment_size는 1..={} 범위여야 함: {}",
                MAX_PAYLOAD_SIZE, self.segment_size
            )));
        }
        if self.sequence_separation < MIN_SEQUENCE_SEPARATION {
            return Err(Error::InvalidConfig(format!(
                "sequence_separation은 {} 이상이어야 함: {}",
                MIN_SEQUENCE_SEPARATION, self.sequence_separation
            )));
        }
        if self.retransmit_timeout_ms == 0 || self.recv_timeout_ms == 0 {
            return Err(Error::InvalidConfig("타임아웃은 0일 수 없음".into()));
        }
        Ok(())
    }

    /// 라우터 없이 직접 통신하는 설정 (로컬 테스트용)
    pub fn direct() -> Self {
        Self {
            listen_port: 0,                           // OS 자동 할당
            relay_addr: None,
            recv_timeout_ms: 200,
            retransmit_timeout_ms: 100,
            max_retries: 20,
            ..Self::default()
        }
    }

    /// 손실이 많은 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            window_size: 8,
            segment_size: 512,                        // 작은 세그먼트
            retransmit_timeout_ms: 300,
            max_retries: 30,
            ..Self::default()
        }
    }
}
