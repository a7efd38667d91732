use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use wormhole_peer::{FrameConsumer, Receiver, WormholeConfig};

use crate::cmd::ListenArgs;
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_frame, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = WormholeConfig::default().with_port(args.port);
    if let Some(capacity) = args.buffer_capacity {
        config = config.with_recv_buffer_capacity(capacity);
    }

    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<Bytes>();
    let consumer: Arc<dyn FrameConsumer> = Arc::new(move |payload: Bytes| {
        let _ = frames_tx.send(payload);
    });

    let receiver = Receiver::new(config);
    receiver.start(consumer).await;
    if !receiver.is_listening() {
        return Err(CliError::new(
            TRANSPORT_ERROR,
            format!("failed to bind 127.0.0.1:{}", args.port),
        ));
    }

    let mut printed = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = frames_rx.recv() => match frame {
                Some(payload) => {
                    printed = printed.saturating_add(1);
                    print_frame(printed, payload.as_ref(), format);
                    if let Some(count) = args.count {
                        if printed >= count {
                            break;
                        }
                    }
                }
                None => {
                    receiver.stop();
                    return Err(CliError::new(FAILURE, "receiver stopped unexpectedly"));
                }
            },
        }
    }

    receiver.stop();
    Ok(SUCCESS)
}
