//! 패킷 정의 및 와이어 포맷
//!
//! 모든 필드는 고정 길이 big-endian.
//!
//! ```text
//! +------+-----------------+-----------------+--------------+-----------+--------------+
//! | kind | sequence_number |   ack_number    | peer_address | peer_port |   payload    |
//! |  1   |        8        |        8        |      4       |     2     |  0 ~ 1024    |
//! +------+-----------------+-----------------+--------------+-----------+--------------+
//! ```
//!
//! 헤더 23바이트 + 페이로드, 총 23 ~ 1047 바이트.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;
use crate::{Error, Result, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE};

/// 패킷 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// 연결 요청 (클라이언트 → 서버)
    Syn = 0,

    /// 연결 요청 응답
    SynAck = 1,

    /// 핸드쉐이크 완료 확인
    Ack = 2,

    /// 요청 스트림 세그먼트
    Data = 3,

    /// 세그먼트 수신 확인
    DataAck = 4,

    /// 요청 스트림 종료
    DataEnd = 5,

    /// 처리 결과 (서버 → 클라이언트)
    FinalResponse = 6,
}

impl TryFrom<u8> for PacketKind {
    type Error = DecodeError;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        match tag {
            0 => Ok(PacketKind::Syn),
            1 => Ok(PacketKind::SynAck),
            2 => Ok(PacketKind::Ack),
            3 => Ok(PacketKind::Data),
            4 => Ok(PacketKind::DataAck),
            5 => Ok(PacketKind::DataEnd),
            6 => Ok(PacketKind::FinalResponse),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Syn => "SYN",
            PacketKind::SynAck => "SYN_ACK",
            PacketKind::Ack => "ACK",
            PacketKind::Data => "DATA",
            PacketKind::DataAck => "DATA_ACK",
            PacketKind::DataEnd => "DATA_END",
            PacketKind::FinalResponse => "FINAL_RESPONSE",
        };
        f.write_str(name)
    }
}

/// 단일 와이어 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 패킷 타입
    pub kind: PacketKind,

    /// 이 패킷의 시퀀스 번호 (제어 패킷은 송신측 스트림 위치)
    pub sequence_number: u64,

    /// 상대방으로부터 확인한 시퀀스 번호
    pub ack_number: u64,

    /// 논리적 피어 주소
    ///
    /// 라우터를 거치므로 데이터그램의 실제 출발지와 다를 수 있다
    pub peer_address: Ipv4Addr,

    /// 논리적 피어 포트
    pub peer_port: u16,

    /// 불투명 데이터 (최대 1024바이트)
    pub payload: Bytes,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        sequence_number: u64,
        ack_number: u64,
        peer: SocketAddrV4,
        payload: Bytes,
    ) -> Self {
        Self {
            kind,
            sequence_number,
            ack_number,
            peer_address: *peer.ip(),
            peer_port: peer.port(),
            payload,
        }
    }

    /// 같은 논리적 피어로 향하는 응답 패킷 생성
    ///
    /// 라우터가 이미 피어 필드를 상대방 주소로 바꿔 놓았으므로 그대로 복사한다.
    pub fn reply(
        &self,
        kind: PacketKind,
        sequence_number: u64,
        ack_number: u64,
        payload: Bytes,
    ) -> Self {
        Self {
            kind,
            sequence_number,
            ack_number,
            peer_address: self.peer_address,
            peer_port: self.peer_port,
            payload,
        }
    }

    /// 논리적 피어 주소
    pub fn peer(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.peer_address, self.peer_port)
    }

    /// 인코딩된 길이
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// 바이트로 직렬화
    ///
    /// 페이로드가 1024바이트를 넘는 패킷은 내부 불변식 위반이다.
    pub fn to_bytes(&self) -> Result<Bytes> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.kind as u8);
        buf.put_u64(self.sequence_number);
        buf.put_u64(self.ack_number);
        buf.put_slice(&self.peer_address.octets());
        buf.put_u16(self.peer_port);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// 바이트에서 역직렬화
    ///
    /// 길이 검사가 필드 해석보다 먼저 수행된다.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE || bytes.len() > MAX_PACKET_SIZE {
            return Err(DecodeError::MalformedLength {
                len: bytes.len(),
                min: HEADER_SIZE,
                max: MAX_PACKET_SIZE,
            });
        }

        let mut buf = bytes;
        let kind = PacketKind::try_from(buf.get_u8())?;
        let sequence_number = buf.get_u64();
        let ack_number = buf.get_u64();
        let peer_address = Ipv4Addr::from(buf.get_u32());
        let peer_port = buf.get_u16();
        let payload = Bytes::copy_from_slice(buf);

        Ok(Self {
            kind,
            sequence_number,
            ack_number,
            peer_address,
            peer_port,
            payload,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} ack={} peer={}:{}, size={}",
            self.kind,
            self.sequence_number,
            self.ack_number,
            self.peer_address,
            self.peer_port,
            self.payload.len()
        )
    }
}
