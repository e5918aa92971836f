//! guardlink-probe: 通过弹性客户端探测后端端点并输出运行时信号
//!
//! Usage:
//!   guardlink-probe [--cached] <path>...
//!
//! Configuration comes from `GUARDLINK_*` environment variables, layered over
//! the YAML file named by `GUARDLINK_CONFIG` when set.

use anyhow::{Context, Result};
use guardlink::{ClientConfig, NetworkClientBuilder, RequestOptions};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        r#"guardlink-probe - issue GET requests through the resilient client

USAGE:
    guardlink-probe [--cached] <path>...

OPTIONS:
    --cached        Serve repeated paths from the response cache
    -h, --help      Show this help message
    -V, --version   Show version information

ENVIRONMENT:
    GUARDLINK_CONFIG     YAML config file (optional)
    GUARDLINK_BASE_URL   Backend base URL
    RUST_LOG             Log filter, e.g. guardlink=debug"#
    );
}

fn load_config() -> Result<ClientConfig> {
    match std::env::var("GUARDLINK_CONFIG") {
        Ok(path) => {
            let mut config = ClientConfig::from_yaml_file(&path)
                .with_context(|| format!("loading config from {path}"))?;
            config.apply_env();
            Ok(config)
        }
        Err(_) => Ok(ClientConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cached = false;
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--cached" => cached = true,
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-V" | "--version" => {
                println!("guardlink-probe {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            _ => paths.push(arg),
        }
    }
    if paths.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    let config = load_config()?;
    let client = NetworkClientBuilder::new(config)
        .disable_background_sweep()
        .build()
        .await
        .context("building network client")?;

    let mut failures = 0usize;
    for path in &paths {
        let options = RequestOptions::get(path.as_str())
            .use_cache(cached)
            .requires_auth(false);
        match client.execute(options).await {
            Ok(resp) => println!("{:<40} {} ({} bytes)", path, resp.status, resp.body.len()),
            Err(e) => {
                failures += 1;
                println!("{:<40} {}: {}", path, e.category(), e);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&client.signals())?);
    client.dispose().await;

    if failures > 0 {
        std::process::exit(2);
    }
    Ok(())
}
