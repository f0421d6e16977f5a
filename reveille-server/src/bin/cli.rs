//! Command-line client for the alarm clock daemon.
//!
//! Each invocation opens one connection, sends one command, and prints
//! the reply when the command has one.

use std::env;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const DEFAULT_ADDR: &str = "127.0.0.1:49500";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: reveille-cli <command> [value]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status            Show whether the alarm is ringing");
        eprintln!("  prefs             Show the stored wakeup preferences");
        eprintln!("  arm               Arm the alarm for the next wakeup time");
        eprintln!("  disarm            Disarm the alarm");
        eprintln!("  silence           Stop a ringing alarm");
        eprintln!("  set-hour <0-23>   Set the wakeup hour");
        eprintln!("  set-minute <0-59> Set the wakeup minute");
        eprintln!("  set-window <min>  Set the wakeup window in minutes");
        eprintln!("  set-offset <h>    Set the UTC offset in hours");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  REVEILLE_ADDR     Server address (default: {DEFAULT_ADDR})");
        std::process::exit(1);
    }

    let addr = env::var("REVEILLE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let command = args[1].as_str();

    match command {
        "status" => {
            let reply = request(&addr, "get_alarm_state").await?;
            match reply.as_str() {
                "1" => println!("alarm is ringing"),
                _ => println!("alarm is idle"),
            }
        }
        "prefs" => println!("{}", request(&addr, "get_user_preferences").await?),
        "arm" => send(&addr, "set_active_state 1").await?,
        "disarm" => send(&addr, "set_active_state 0").await?,
        "silence" => send(&addr, "set_alarm_state 0").await?,
        "set-hour" => send(&addr, &format!("set_wakeup_hour {}", value_arg(&args)?)).await?,
        "set-minute" => send(&addr, &format!("set_wakeup_minute {}", value_arg(&args)?)).await?,
        "set-window" => send(&addr, &format!("set_wakeup_window {}", value_arg(&args)?)).await?,
        "set-offset" => send(&addr, &format!("set_utc_offset {}", value_arg(&args)?)).await?,
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn value_arg(args: &[String]) -> Result<i64> {
    let Some(raw) = args.get(2) else {
        bail!("this command needs an integer value");
    };
    raw.parse()
        .with_context(|| format!("not an integer: {raw}"))
}

/// Fire-and-forget set command; success is implicit.
async fn send(addr: &str, command: &str) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    stream.write_all(command.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read command: send, half-close, collect the reply until the server
/// closes the connection.
async fn request(addr: &str, command: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    stream.write_all(command.as_bytes()).await?;
    stream.shutdown().await?;
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply)
}
