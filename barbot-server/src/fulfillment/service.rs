//! Fulfillment actor
//!
//! [`FulfillmentWorker`] owns the [`DispatchQueue`] and is the only task that
//! touches it. It reacts to two inputs, one at a time:
//! - commands from [`Fulfillment`] handles (submit, withdraw, drain, ...)
//! - responses and connection events from the [`DeviceLink`]
//!
//! Every command gets its answer back over a oneshot channel.

use barbot_link::{CommandBatch, DeviceLink, DeviceResponse, LinkEvent};
use shared::models::OrderId;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{Disposition, FulfillmentEvent, FulfillmentStatus};
use super::queue::{DispatchQueue, PendingWorkItem};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("Fulfillment worker is not running")]
    Closed,
}

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

enum Command {
    Submit {
        order_id: OrderId,
        batch: CommandBatch,
        reply: oneshot::Sender<Disposition>,
    },
    Withdraw {
        order_id: OrderId,
        reply: oneshot::Sender<bool>,
    },
    Drain {
        reply: oneshot::Sender<Option<OrderId>>,
    },
    ClearQueue {
        reply: oneshot::Sender<usize>,
    },
    EmergencyStop {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<FulfillmentStatus>,
    },
}

/// Handle to the fulfillment actor
#[derive(Clone)]
pub struct Fulfillment {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<FulfillmentEvent>,
}

impl Fulfillment {
    /// Create the handle and its worker. The worker is subscribed to link
    /// events from this point on; spawn [`FulfillmentWorker::run`] to start
    /// processing.
    pub fn new(link: DeviceLink) -> (Self, FulfillmentWorker) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let worker = FulfillmentWorker {
            link_events: link.subscribe(),
            link,
            commands: commands_rx,
            events: events.clone(),
            queue: DispatchQueue::new(),
            missed_link_events: 0,
        };
        let handle = Self {
            commands: commands_tx,
            events,
        };
        (handle, worker)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
        self.events.subscribe()
    }

    /// Hand an order to the device, or queue it behind the active one.
    /// A device that is offline queues the order; it is never an error.
    pub async fn submit(
        &self,
        order_id: OrderId,
        batch: CommandBatch,
    ) -> FulfillmentResult<Disposition> {
        self.request(|reply| Command::Submit {
            order_id,
            batch,
            reply,
        })
        .await
    }

    /// Remove a waiting order before it is sent. Returns `false` if the
    /// order is not waiting (already on the device, or unknown).
    pub async fn withdraw(&self, order_id: OrderId) -> FulfillmentResult<bool> {
        self.request(|reply| Command::Withdraw { order_id, reply })
            .await
    }

    /// Send the head of the queue if nothing is in flight
    pub async fn drain(&self) -> FulfillmentResult<Option<OrderId>> {
        self.request(|reply| Command::Drain { reply }).await
    }

    /// Drop the active order and the whole queue without per-order events
    pub async fn clear_queue(&self) -> FulfillmentResult<usize> {
        self.request(|reply| Command::ClearQueue { reply }).await
    }

    /// Send `STOP`, then clear the queue. Returns whether `STOP` went out.
    pub async fn emergency_stop(&self) -> FulfillmentResult<bool> {
        self.request(|reply| Command::EmergencyStop { reply }).await
    }

    pub async fn status(&self) -> FulfillmentResult<FulfillmentStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> FulfillmentResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| FulfillmentError::Closed)?;
        rx.await.map_err(|_| FulfillmentError::Closed)
    }
}

/// The actor; see the module docs
pub struct FulfillmentWorker {
    link: DeviceLink,
    link_events: broadcast::Receiver<LinkEvent>,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<FulfillmentEvent>,
    queue: DispatchQueue,
    missed_link_events: u64,
}

impl FulfillmentWorker {
    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Fulfillment worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Fulfillment worker received shutdown signal");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("All fulfillment handles dropped, worker stopping");
                        break;
                    };
                    self.handle_command(command).await;
                }
                event = self.link_events.recv() => match event {
                    Ok(event) => self.handle_link_event(event).await,
                    Err(RecvError::Lagged(n)) => self.on_lagged(n),
                    Err(RecvError::Closed) => {
                        warn!("Link event channel closed, fulfillment worker stopping");
                        break;
                    }
                },
            }
        }

        if let Some(order_id) = self.queue.active() {
            warn!(order_id, queued = self.queue.len(), "Fulfillment worker stopped with work outstanding");
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit {
                order_id,
                batch,
                reply,
            } => {
                let disposition = self.submit(order_id, batch).await;
                let _ = reply.send(disposition);
            }
            Command::Withdraw { order_id, reply } => {
                let removed = self.queue.remove(order_id);
                if removed {
                    info!(order_id, "Order withdrawn from queue");
                }
                let _ = reply.send(removed);
            }
            Command::Drain { reply } => {
                let dispatched = self.dispatch_next().await;
                let _ = reply.send(dispatched);
            }
            Command::ClearQueue { reply } => {
                let dropped = self.queue.clear();
                info!(dropped, "Fulfillment queue cleared");
                let _ = reply.send(dropped);
            }
            Command::EmergencyStop { reply } => {
                let sent = self.link.send(&CommandBatch::stop()).await;
                let dropped = self.queue.clear();
                warn!(stop_sent = sent, dropped, "Emergency stop");
                let _ = reply.send(sent);
            }
            Command::Status { reply } => {
                let _ = reply.send(FulfillmentStatus {
                    active_order: self.queue.active(),
                    queue: self.queue.queued_ids(),
                    queue_length: self.queue.len(),
                    missed_link_events: self.missed_link_events,
                    link: self.link.status(),
                });
            }
        }
    }

    async fn submit(&mut self, order_id: OrderId, batch: CommandBatch) -> Disposition {
        if self.queue.contains(order_id) {
            warn!(order_id, "Order already submitted, ignoring duplicate");
            return self.disposition_of(order_id);
        }

        if let Some(head) = self.queue.admit(PendingWorkItem::new(order_id, batch)) {
            self.send_head(head).await;
        }

        let disposition = self.disposition_of(order_id);
        info!(order_id, ?disposition, "Order accepted for fulfillment");
        self.emit(FulfillmentEvent::Accepted {
            order_id,
            disposition,
        });
        disposition
    }

    fn disposition_of(&self, order_id: OrderId) -> Disposition {
        if self.queue.active() == Some(order_id) {
            Disposition::Dispatched
        } else {
            Disposition::Queued {
                position: self.queue.position(order_id).unwrap_or(self.queue.len()),
            }
        }
    }

    /// Send a freshly promoted item; a failed send puts it back at the head
    async fn send_head(&mut self, item: PendingWorkItem) -> bool {
        if self.link.send(&item.batch).await {
            info!(order_id = item.order_id, batch = %item.batch, "Order dispatched to device");
            true
        } else {
            warn!(order_id = item.order_id, "Device unavailable, order kept at head of queue");
            self.queue.requeue_front(item);
            false
        }
    }

    async fn dispatch_next(&mut self) -> Option<OrderId> {
        let item = self.queue.next()?;
        let order_id = item.order_id;
        self.send_head(item).await.then_some(order_id)
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Response(DeviceResponse::Preparing) => match self.queue.active() {
                Some(order_id) => {
                    debug!(order_id, "Device started preparing");
                    self.emit(FulfillmentEvent::Preparing { order_id });
                }
                None => debug!("PREPARANDO with no active order, ignoring"),
            },
            LinkEvent::Response(DeviceResponse::Finished) => {
                let Some(order_id) = self.queue.finish() else {
                    warn!("TERMINADO with no active order, ignoring");
                    return;
                };
                info!(order_id, "Order completed by device");
                self.emit(FulfillmentEvent::Completed { order_id });
                self.dispatch_next().await;
            }
            LinkEvent::Response(DeviceResponse::Failed(detail)) => {
                let Some(order_id) = self.queue.finish() else {
                    warn!(?detail, "ERROR with no active order, ignoring");
                    return;
                };
                warn!(order_id, ?detail, "Order failed on device");
                self.emit(FulfillmentEvent::Failed { order_id, detail });
                self.dispatch_next().await;
            }
            LinkEvent::Response(response) => debug!(?response, "Device response"),
            LinkEvent::Connected => {
                info!(queued = self.queue.len(), "Device connected");
            }
            LinkEvent::Disconnected => {
                if let Some(order_id) = self.queue.active() {
                    warn!(order_id, "Device disconnected with an order in flight");
                }
            }
            LinkEvent::CommandSent { .. } | LinkEvent::Error(_) => {}
        }
    }

    /// The receiver skipped `skipped` link events. A dropped `TERMINADO` or
    /// `ERROR` leaves the active order waiting forever, so the loss is counted
    /// and reported; recovery is `drain` or `clear_queue` by an operator.
    fn on_lagged(&mut self, skipped: u64) {
        self.missed_link_events += skipped;
        match self.queue.active() {
            Some(order_id) => warn!(
                skipped,
                order_id,
                queued = self.queue.len(),
                "Link events dropped with an order in flight, its outcome may be lost"
            ),
            None => warn!(skipped, "Fulfillment worker lagged behind link events"),
        }
    }

    fn emit(&self, event: FulfillmentEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
