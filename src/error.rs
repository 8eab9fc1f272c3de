//! 에러 타입 정의

use thiserror::Error;

use crate::packet::PacketKind;

/// 패킷 디코딩 에러
///
/// 항상 복구 가능: 해당 데이터그램만 버리고 루프는 계속된다.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("유효하지 않은 패킷 길이: {len} bytes (허용 범위 {min}..={max})")]
    MalformedLength { len: usize, min: usize, max: usize },

    #[error("알 수 없는 패킷 타입: {0}")]
    UnknownKind(u8),
}

/// RSP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("디코딩 에러: {0}")]
    Decode(#[from] DecodeError),

    #[error("페이로드 크기 초과: {len} bytes (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("피어 응답 없음: {kind} 패킷 {retries}회 재전송 후 포기")]
    PeerUnreachable { kind: PacketKind, retries: u32 },

    #[error("핸드쉐이크 실패: {0}")]
    HandshakeFailed(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
