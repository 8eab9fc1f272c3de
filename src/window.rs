//! 수신 윈도우와 재조립 로그
//!
//! - WindowBuffer: 현재 받아들일 수 있는 시퀀스 범위 (고정 슬롯 수)
//! - ReassemblyLog: 수락된 모든 세그먼트를 시퀀스 순으로 보관

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

/// 시퀀스 번호
pub type Sequence = u64;

/// 수신 윈도우
///
/// 키는 항상 연속된 시퀀스 범위이며 `capacity`개를 넘지 않는다.
/// 슬롯은 도착 여부만 기록하고 페이로드는 재조립 로그가 보관한다.
/// 가장 낮은 슬롯부터 채워진 구간은 `slide`로 밀려나고
/// 그만큼 위쪽에 빈 슬롯이 추가된다.
#[derive(Debug)]
pub struct WindowBuffer {
    slots: BTreeMap<Sequence, bool>,
    capacity: usize,
}

impl WindowBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            capacity,
        }
    }

    /// `first`부터 `capacity`개의 빈 슬롯으로 윈도우를 연다
    pub fn open(&mut self, first: Sequence) {
        self.slots.clear();
        for offset in 0..self.capacity as u64 {
            self.slots.insert(first.wrapping_add(offset), false);
        }
    }

    /// 윈도우 범위 안의 시퀀스인지
    pub fn contains(&self, seq: Sequence) -> bool {
        self.slots.contains_key(&seq)
    }

    /// 빈 슬롯을 채움으로 표시
    ///
    /// 범위 밖이거나 이미 채워진 슬롯이면 false
    pub fn fill(&mut self, seq: Sequence) -> bool {
        match self.slots.get_mut(&seq) {
            Some(filled @ false) => {
                *filled = true;
                true
            }
            _ => false,
        }
    }

    /// 앞쪽의 채워진 슬롯을 밀어내고 같은 수만큼 빈 슬롯을 뒤에 추가
    ///
    /// 밀려난 슬롯 수를 반환
    pub fn slide(&mut self) -> usize {
        let mut released = 0;

        while let Some(entry) = self.slots.first_entry() {
            if !*entry.get() {
                break;
            }
            let seq = *entry.key();
            entry.remove();
            released += 1;

            let next = self
                .slots
                .last_key_value()
                .map(|(&last, _)| last.wrapping_add(1))
                .unwrap_or_else(|| seq.wrapping_add(1));
            self.slots.insert(next, false);
        }

        released
    }

    /// 아직 채워지지 않은 가장 낮은 시퀀스
    pub fn base(&self) -> Option<Sequence> {
        self.slots.keys().next().copied()
    }

    /// 현재 슬롯 수
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 채워진 슬롯 수
    pub fn filled(&self) -> usize {
        self.slots.values().filter(|filled| **filled).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// 재조립 로그
///
/// 같은 키의 두 번째 삽입은 거부되며, 이것이 중복 판정 신호가 된다.
#[derive(Debug, Default)]
pub struct ReassemblyLog {
    segments: BTreeMap<Sequence, Bytes>,
    total_bytes: usize,
}

impl ReassemblyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세그먼트 삽입 (이미 있으면 false)
    pub fn insert(&mut self, seq: Sequence, payload: Bytes) -> bool {
        if self.segments.contains_key(&seq) {
            return false;
        }
        self.total_bytes += payload.len();
        self.segments.insert(seq, payload);
        true
    }

    pub fn contains(&self, seq: Sequence) -> bool {
        self.segments.contains_key(&seq)
    }

    /// 시퀀스 오름차순으로 이어 붙인 전체 스트림
    pub fn assemble(&self) -> Bytes {
        let mut stream = BytesMut::with_capacity(self.total_bytes);
        for payload in self.segments.values() {
            stream.extend_from_slice(payload);
        }
        stream.freeze()
    }

    /// 세그먼트 수
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 누적 페이로드 크기
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.total_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_open() {
        let mut window = WindowBuffer::new(4);
        window.open(101);

        assert_eq!(window.len(), 4);
        assert_eq!(window.base(), Some(101));
        assert!(window.contains(101));
        assert!(window.contains(104));
        assert!(!window.contains(100));
        assert!(!window.contains(105));
    }

    #[test]
    fn test_window_slides_over_filled_prefix() {
        let mut window = WindowBuffer::new(4);
        window.open(10);

        // 순서가 어긋난 도착: 12가 먼저
        assert!(window.fill(12));
        assert_eq!(window.slide(), 0);
        assert_eq!(window.base(), Some(10));

        assert!(window.fill(10));
        assert_eq!(window.slide(), 1);
        assert_eq!(window.base(), Some(11));
        assert!(window.contains(14));

        // 11이 채워지면 11, 12가 함께 밀려난다
        assert!(window.fill(11));
        assert_eq!(window.slide(), 2);
        assert_eq!(window.base(), Some(13));
        assert!(window.contains(16));
        assert!(!window.contains(17));
        assert_eq!(window.len(), window.capacity());
        assert_eq!(window.filled(), 0);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = WindowBuffer::new(3);
        window.open(1);

        for seq in 1..50 {
            assert!(window.fill(seq));
            window.slide();
            assert!(window.len() <= 3);
        }
        assert_eq!(window.base(), Some(50));
    }

    #[test]
    fn test_window_rejects_refill_and_outside() {
        let mut window = WindowBuffer::new(2);
        window.open(5);

        assert!(window.fill(6));
        assert!(!window.fill(6));
        assert!(!window.fill(9));
        assert_eq!(window.filled(), 1);
    }

    #[test]
    fn test_log_assembles_in_sequence_order() {
        let mut log = ReassemblyLog::new();

        assert!(log.insert(3, Bytes::from_static(b"three")));
        assert!(log.insert(1, Bytes::from_static(b"one-")));
        assert!(log.insert(2, Bytes::from_static(b"two-")));

        assert_eq!(log.assemble().as_ref(), b"one-two-three");
        assert_eq!(log.total_bytes(), 13);
    }

    #[test]
    fn test_log_rejects_duplicate_key() {
        let mut log = ReassemblyLog::new();

        assert!(log.insert(7, Bytes::from_static(b"first")));
        assert!(!log.insert(7, Bytes::from_static(b"second")));

        assert_eq!(log.len(), 1);
        assert_eq!(log.assemble().as_ref(), b"first");
    }
}
