use std::fs;
use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep, timeout};

use wormhole_peer::{Sender, WormholeConfig};

use crate::cmd::SendArgs;
use crate::exit::{io_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};

pub async fn run(args: SendArgs) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let payload = resolve_payload(&args)?;

    let sender = Sender::new(WormholeConfig::default().with_port(args.port));
    sender.start();
    wait_for_link(&sender, connect_timeout).await?;

    for _ in 0..args.repeat {
        sender.send(payload.clone());
    }

    // The writer drains the queue asynchronously; give it a beat before the
    // process exit tears the runtime down.
    sleep(Duration::from_millis(150)).await;
    sender.stop();
    Ok(SUCCESS)
}

async fn wait_for_link(sender: &Sender, limit: Duration) -> CliResult<()> {
    timeout(limit, async {
        while !sender.is_connected() {
            // A failed attempt drops the link back to disconnected; keep
            // nudging until the receiver shows up or the clock runs out.
            sender.start();
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| CliError::new(TIMEOUT, format!("no receiver reachable within {limit:?}")))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Bytes> {
    if let Some(data) = &args.data {
        return non_empty(Bytes::from(data.clone().into_bytes()));
    }
    if let Some(path) = &args.file {
        let bytes = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return non_empty(Bytes::from(bytes));
    }
    let mut stdin = Vec::new();
    std::io::stdin()
        .read_to_end(&mut stdin)
        .map_err(|err| io_error("failed reading stdin", err))?;
    non_empty(Bytes::from(stdin))
}

fn non_empty(payload: Bytes) -> CliResult<Bytes> {
    if payload.is_empty() {
        return Err(CliError::new(
            USAGE,
            "payload is empty; empty frames are never delivered",
        ));
    }
    Ok(payload)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
