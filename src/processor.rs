//! 요청 처리기 인터페이스
//!
//! 재조립된 요청 스트림을 해석하는 애플리케이션 계층과의 유일한 접점.
//! 세션당 한 번 호출되며 반환값이 FINAL_RESPONSE 페이로드가 된다.

use bytes::Bytes;

/// 요청 처리기
pub trait RequestProcessor: Send {
    fn process(&mut self, request: &[u8]) -> Bytes;
}

impl<F> RequestProcessor for F
where
    F: FnMut(&[u8]) -> Vec<u8> + Send,
{
    fn process(&mut self, request: &[u8]) -> Bytes {
        Bytes::from(self(request))
    }
}

/// 받은 요청을 그대로 돌려주는 처리기
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoProcessor;

impl RequestProcessor for EchoProcessor {
    fn process(&mut self, request: &[u8]) -> Bytes {
        Bytes::copy_from_slice(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_processor() {
        let mut calls = 0;
        let mut processor = |request: &[u8]| {
            calls += 1;
            request.iter().rev().copied().collect::<Vec<u8>>()
        };

        assert_eq!(processor.process(b"abc").as_ref(), b"cba");
        drop(processor);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_echo_processor() {
        assert_eq!(EchoProcessor.process(b"ping").as_ref(), b"ping");
    }
}
