//! 设备事件日志
//!
//! 把 DeviceLink 的连接和收发事件写入日志，便于现场排查。

use barbot_link::LinkEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

pub async fn log_link_events(
    mut events: broadcast::Receiver<LinkEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(LinkEvent::Connected) => tracing::info!("Device link up"),
                Ok(LinkEvent::Disconnected) => tracing::warn!("Device link down"),
                Ok(LinkEvent::CommandSent { batch, at }) => {
                    tracing::debug!(batch = %batch, at = %at, "Command sent to device");
                }
                Ok(LinkEvent::Response(response)) => {
                    tracing::debug!(?response, "Device response");
                }
                Ok(LinkEvent::Error(message)) => {
                    tracing::warn!(error = %message, "Device link error");
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "Device event log lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
