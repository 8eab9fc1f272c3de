//! RSP 서버 - Relay Session Protocol
//!
//! 라우터를 거쳐 들어오는 요청 스트림을 재조립해 처리기에 넘기고
//! 결과를 FINAL_RESPONSE로 돌려준다. 이 바이너리는 에코 처리기를 사용한다.
//!
//! 사용법:
//!   cargo run --release --bin rsp-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 (포트 8007, 라우터 127.0.0.1:3000)
//!   cargo run --release --bin rsp-server
//!
//!   # 라우터 없이 직접 응답
//!   cargo run --release --bin rsp-server -- --port 9000 --direct

use std::net::SocketAddr;

use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rsp::{Config, EchoProcessor, OutOfWindowPolicy, Server};

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} 옵션에 값이 필요함", args[i]))
        };

        match args[i].as_str() {
            "--port" | "-p" => {
                config.listen_port = value(i)?.parse().map_err(|e| format!("포트: {}", e))?;
                i += 1;
            }
            "--relay" | "-r" => {
                let addr: SocketAddr = value(i)?.parse().map_err(|e| format!("라우터 주소: {}", e))?;
                config.relay_addr = Some(addr);
                i += 1;
            }
            "--direct" => {
                config.relay_addr = None;
            }
            "--window" | "-w" => {
                config.window_size = value(i)?.parse().map_err(|e| format!("윈도우: {}", e))?;
                i += 1;
            }
            "--timeout" | "-t" => {
                config.recv_timeout_ms =
                    value(i)?.parse().map_err(|e| format!("타임아웃: {}", e))?;
                i += 1;
            }
            "--drop-out-of-window" => {
                config.out_of_window = OutOfWindowPolicy::Drop;
            }
            "--help" | "-h" => {
                println!(
                    r#"RSP Server - Relay Session Protocol 서버

사용법:
  cargo run --release --bin rsp-server -- [OPTIONS]

옵션:
  -p, --port <PORT>        수신 포트 (기본: 8007)
  -r, --relay <ADDR>       라우터 주소 (기본: 127.0.0.1:3000)
      --direct             라우터 없이 데이터그램 출발지로 응답
  -w, --window <N>         수신 윈도우 슬롯 수 (기본: 4)
  -t, --timeout <MS>       수신 대기 타임아웃 밀리초 (기본: 7000)
      --drop-out-of-window 윈도우 밖 DATA를 응답 없이 버림
  -h, --help               이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => return Err(format!("알 수 없는 옵션: {}", other)),
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

    let config = parse_args()?;

    info!("RSP Server starting...");
    info!("Window size: {}", config.window_size);
    info!("Receive timeout: {}ms", config.recv_timeout_ms);
    info!("Out-of-window policy: {:?}", config.out_of_window);

    let mut server = Server::bind(config, EchoProcessor).await?;
    let stats = server.stats_handle();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("종료: {}", stats.read().summary());
        }
    }

    Ok(())
}
