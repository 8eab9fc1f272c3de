//! RSP 클라이언트 - Relay Session Protocol
//!
//! 요청 바이트를 서버로 보내고 FINAL_RESPONSE를 출력한다.
//!
//! 사용법:
//!   cargo run --release --bin rsp-client -- [OPTIONS] [REQUEST]
//!
//! 예시:
//!   # 라우터(127.0.0.1:3000)를 거쳐 127.0.0.1:8007 서버로 요청
//!   cargo run --release --bin rsp-client -- "GET / HTTP/1.0"
//!
//!   # 파일 내용을 요청으로 전송, 라우터 없이 직접
//!   cargo run --release --bin rsp-client -- --server 127.0.0.1:9000 --direct --file req.txt

use std::net::{SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rsp::{Client, Config};

/// 클라이언트 설정
struct ClientConfig {
    server: SocketAddrV4,
    request: Vec<u8>,
    file_path: Option<PathBuf>,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: SocketAddrV4::new([127, 0, 0, 1].into(), 8007),
            request: b"GET / HTTP/1.0\r\n\r\n".to_vec(),
            file_path: None,
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<ClientConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} 옵션에 값이 필요함", args[i]))
        };

        match args[i].as_str() {
            "--server" | "-s" => {
                config.server = value(i)?.parse().map_err(|e| format!("서버 주소: {}", e))?;
                i += 1;
            }
            "--relay" | "-r" => {
                let addr: SocketAddr = value(i)?.parse().map_err(|e| format!("라우터 주소: {}", e))?;
                config.config.relay_addr = Some(addr);
                i += 1;
            }
            "--direct" => {
                config.config.relay_addr = None;
            }
            "--file" | "-f" => {
                config.file_path = Some(PathBuf::from(value(i)?));
                i += 1;
            }
            "--segment-size" => {
                config.config.segment_size =
                    value(i)?.parse().map_err(|e| format!("세그먼트 크기: {}", e))?;
                i += 1;
            }
            "--retries" => {
                config.config.max_retries =
                    value(i)?.parse().map_err(|e| format!("재전송 횟수: {}", e))?;
                i += 1;
            }
            "--rto" => {
                config.config.retransmit_timeout_ms =
                    value(i)?.parse().map_err(|e| format!("재전송 타임아웃: {}", e))?;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"RSP Client - Relay Session Protocol 클라이언트

사용법:
  cargo run --release --bin rsp-client -- [OPTIONS] [REQUEST]

옵션:
  -s, --server <ADDR>      서버 논리 주소 (기본: 127.0.0.1:8007)
  -r, --relay <ADDR>       라우터 주소 (기본: 127.0.0.1:3000)
      --direct             라우터 없이 서버로 직접 전송
  -f, --file <PATH>        요청으로 보낼 파일
      --segment-size <N>   세그먼트 크기 바이트 (기본: 1024)
      --retries <N>        패킷당 최대 재전송 횟수 (기본: 10)
      --rto <MS>           재전송 타임아웃 밀리초 (기본: 500)
  -h, --help               이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => {
                config.request = other.as_bytes().to_vec();
            }
        }
        i += 1;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args()?;

    let request = match &client_config.file_path {
        Some(path) => {
            info!("Loading request: {:?}", path);
            std::fs::read(path)?
        }
        None => client_config.request.clone(),
    };

    info!("Request size: {} bytes", request.len());

    let mut client = Client::bind(client_config.config, client_config.server).await?;
    let response = client.request(&request).await?;

    println!("{}", String::from_utf8_lossy(&response));

    Ok(())
}
