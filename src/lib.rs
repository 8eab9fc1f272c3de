//! # RSP (Relay Session Protocol)
//!
//! 라우터를 거치는 UDP 위의 신뢰성 있는 요청/응답 세션
//!
//! ## 핵심 특징
//! - **고정 헤더 바이너리 패킷**: 23바이트 헤더 + 최대 1024바이트 페이로드
//! - **3-way 핸드쉐이크**: 새 SYN은 항상 세션을 재시작
//! - **슬라이딩 윈도우**: 순서가 어긋난 세그먼트를 윈도우 안에서 수락
//! - **중복 제거**: 재조립 로그 키로 중복 판정, 재전송에도 DATA_ACK 응답
//! - **라우터 분리**: 데이터그램 출발지와 논리적 피어 주소가 다를 수 있음
//! - **송신측 재전송**: 패킷별 타이머, N회 실패 시 피어 응답 없음 보고

pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod processor;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;
pub mod window;

pub use client::Client;
pub use config::{Config, OutOfWindowPolicy};
pub use error::{DecodeError, Error, Result};
pub use packet::{Packet, PacketKind};
pub use processor::{EchoProcessor, RequestProcessor};
pub use server::{Server, StatsHandle};
pub use session::{Outcome, Phase, Session, Step};
pub use stats::SessionStats;
pub use window::{ReassemblyLog, Sequence, WindowBuffer};

/// 고정 헤더 크기 (바이트)
/// kind(1) + sequence(8) + ack(8) + address(4) + port(2)
pub const HEADER_SIZE: usize = 23;

/// 최대 페이로드 크기 (바이트)
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// 최대 패킷 크기 (바이트)
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// 기본 수신 윈도우 슬롯 수
pub const DEFAULT_WINDOW_SIZE: usize = 4;

/// 최대 수신 윈도우 슬롯 수
pub const MAX_WINDOW_SIZE: usize = 1024;

/// 서버/클라이언트 초기 시퀀스 최소 간격
pub const MIN_SEQUENCE_SEPARATION: u64 = 1000;
