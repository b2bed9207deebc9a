use anyhow::Context;
use clap::{Parser, Subcommand};
use interlink_rs::{
    connect_with_config, init_logger, log_info, monotonic_millis, parse_command, LinkConfig,
    PacketFlags, SerialPortConfig,
};
use interlink_rs::util::hex::{decode_hex, encode_hex};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "interlink-cli")]
#[command(about = "CLI tool for the InterLink serial protocol")]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    port: String,

    #[arg(short, long, default_value = "115200")]
    baudrate: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every accepted packet until interrupted
    Listen {
        /// Also dump drop statistics as JSON after each packet
        #[arg(long)]
        stats: bool,
    },
    /// Send one frame without tracking
    Send {
        cmd: u16,
        seq: u8,
        /// Body as a hex string, e.g. "01A0"
        #[arg(default_value = "")]
        body: String,
    },
    /// Send a tracked request and wait for its result
    Request {
        cmd: u16,
        seq: u8,
        #[arg(default_value = "")]
        body: String,
        #[arg(long, default_value = "500")]
        timeout_ms: u32,
        #[arg(long, default_value = "2")]
        retries: u8,
    },
    /// Acknowledge a (cmd, seq) pair
    Ack {
        cmd: u16,
        seq: u8,
        /// Send an error ack carrying this code instead of a plain ack
        #[arg(long)]
        error_code: Option<u8>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let serial_config = SerialPortConfig {
        baudrate: cli.baudrate,
        ..SerialPortConfig::default()
    };
    let mut link = connect_with_config(&cli.port, LinkConfig::default(), serial_config)
        .await
        .with_context(|| format!("opening {}", cli.port))?;

    match cli.command {
        Commands::Listen { stats } => loop {
            link.poll().await?;
            link.tick(monotonic_millis()).await?;
            while let Some(packet) = link.read_packet() {
                match parse_command(&packet) {
                    Ok(command) => log_info(&format!("{command:?} (seq {})", packet.seq)),
                    Err(_) => log_info(&format!(
                        "cmd={:#06X} seq={} body={}",
                        packet.cmd,
                        packet.seq,
                        encode_hex(&packet.body)
                    )),
                }
                if stats {
                    println!("{}", serde_json::to_string(&link.stats())?);
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        },
        Commands::Send { cmd, seq, body } => {
            let body = decode_hex(&body).context("body must be a hex string")?;
            let written = link.send(cmd, PacketFlags::empty(), seq, &body).await?;
            log_info(&format!("sent {written} bytes"));
        }
        Commands::Request {
            cmd,
            seq,
            body,
            timeout_ms,
            retries,
        } => {
            let body = decode_hex(&body).context("body must be a hex string")?;
            let result = link
                .send_request_and_wait(cmd, seq, &body, timeout_ms, retries)
                .await?;
            log_info(&format!("request finished: {:?}", result.status));
            if let Some(response) = result.response {
                log_info(&format!("response body: {}", encode_hex(&response.body)));
            }
        }
        Commands::Ack {
            cmd,
            seq,
            error_code,
        } => {
            match error_code {
                Some(code) => link.send_error_ack(cmd, seq, code).await?,
                None => link.send_ack(cmd, seq).await?,
            };
            log_info("ack sent");
        }
    }

    Ok(())
}
