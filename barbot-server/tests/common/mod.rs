//! Shared fixtures: a scripted fake device on loopback and a fully wired
//! server state backed by in-memory storage.

#![allow(dead_code)]

use barbot_link::{DeviceLink, LinkConfig};
use barbot_server::catalog::Catalog;
use barbot_server::core::BackgroundTasks;
use barbot_server::{
    Config, FulfillmentEvent, InventoryStore, MemoryInventory, OrderStorage, ServerState,
};
use shared::models::{NewOrder, Order, OrderId, OrderStatus};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::broadcast;

pub const WAIT: Duration = Duration::from_secs(3);

/// Cocktail 1 pours `P1,60,P7,30`; cocktail 2 uses three ingredients.
pub const CATALOG: &str = r#"{
    "ingredients": [
        { "id": 1, "name": "Gin", "slot_label": "P1" },
        { "id": 2, "name": "Vermouth", "slot_label": "P2" },
        { "id": 3, "name": "Tonic", "slot_label": "P7" }
    ],
    "cocktails": [
        { "id": 1, "name": "Gin Tonic", "recipe": [
            { "ingredient_id": 1, "quantity": 60, "sequence": 1 },
            { "ingredient_id": 3, "quantity": 30, "sequence": 2 }
        ]},
        { "id": 2, "name": "Negroni", "recipe": [
            { "ingredient_id": 1, "quantity": 20, "sequence": 1 },
            { "ingredient_id": 2, "quantity": 20, "sequence": 2 },
            { "ingredient_id": 3, "quantity": 20, "sequence": 3 }
        ]}
    ],
    "inventory": [
        { "id": 101, "event_id": 1, "ingredient_id": 1, "quantity": 1000 },
        { "id": 102, "event_id": 1, "ingredient_id": 2, "quantity": 1000 },
        { "id": 103, "event_id": 1, "ingredient_id": 3, "quantity": 1000 }
    ]
}"#;

pub fn catalog() -> Catalog {
    Catalog::from_json(CATALOG).unwrap()
}

pub fn seeded_inventory() -> Arc<MemoryInventory> {
    Arc::new(MemoryInventory::with_records(catalog().inventory_records()))
}

// ========== Fake device ==========

pub struct FakeDevice {
    listener: TcpListener,
}

impl FakeDevice {
    pub async fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Accept the link's connection and swallow its `PING`
    pub async fn accept(&self) -> DeviceConn {
        let (stream, _) = tokio::time::timeout(WAIT, self.listener.accept())
            .await
            .expect("device accept timeout")
            .unwrap();
        let (read, write) = stream.into_split();
        let mut conn = DeviceConn {
            lines: BufReader::new(read).lines(),
            write,
        };
        assert_eq!(conn.expect_line().await, "PING");
        conn
    }
}

pub struct DeviceConn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl DeviceConn {
    pub async fn expect_line(&mut self) -> String {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("device read timeout")
            .unwrap()
            .expect("link closed the socket")
    }

    /// Nothing arrives within `window`
    pub async fn assert_silent(&mut self, window: Duration) {
        if let Ok(line) = tokio::time::timeout(window, self.lines.next_line()).await {
            panic!("unexpected line from link: {:?}", line);
        }
    }

    pub async fn reply(&mut self, line: &str) {
        self.write
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }
}

// ========== Server harness ==========

pub struct TestBarbot {
    pub state: ServerState,
    pub device: FakeDevice,
    tasks: Option<BackgroundTasks>,
}

impl TestBarbot {
    pub async fn start() -> Self {
        Self::with_inventory(seeded_inventory()).await
    }

    /// Wire the whole server against a fake device. The link is not
    /// connected; call [`Self::connect`].
    pub async fn with_inventory(inventory: Arc<dyn InventoryStore>) -> Self {
        let device = FakeDevice::bind().await;
        let link = DeviceLink::new(
            LinkConfig::from_addr(&device.addr().to_string())
                .unwrap()
                .with_connect_timeout(Duration::from_secs(1))
                .with_reconnect_delay(Duration::from_millis(50))
                .with_auto_reconnect(false),
        );
        let config = Config {
            device_auto_connect: false,
            ..Config::default()
        };

        let state = ServerState::assemble(
            config,
            link,
            OrderStorage::open_in_memory().unwrap(),
            Arc::new(catalog().recipes().unwrap()),
            inventory,
        );
        let tasks = state.start_background_tasks();

        Self {
            state,
            device,
            tasks: Some(tasks),
        }
    }

    pub async fn connect(&self) -> DeviceConn {
        self.state.link.connect().await.unwrap();
        self.device.accept().await
    }

    pub fn events(&self) -> broadcast::Receiver<FulfillmentEvent> {
        self.state.fulfillment.subscribe()
    }

    pub async fn order(&self, cocktail_id: i64) -> Order {
        self.state
            .workflow
            .create_order(NewOrder {
                event_id: 1,
                cocktail_id,
                guest_id: None,
                notes: None,
            })
            .await
            .unwrap()
    }

    pub async fn wait_for_status(&self, order_id: OrderId, status: OrderStatus) -> Order {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let order = self.state.workflow.get(order_id).await.unwrap();
            if order.status == status {
                return order;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "order {} stuck in {}, expected {}",
                order_id,
                order.status,
                status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(mut self) {
        self.state.link.disconnect().await;
        if let Some(tasks) = self.tasks.take() {
            tasks.shutdown().await;
        }
    }
}

/// Next event matching `pred`, skipping others
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<FulfillmentEvent>,
    mut pred: F,
) -> FulfillmentEvent
where
    F: FnMut(&FulfillmentEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("fulfillment event timeout")
            .unwrap();
        if pred(&event) {
            return event;
        }
    }
}

/// Only terminal events (completed / failed), in arrival order
pub async fn next_outcome(rx: &mut broadcast::Receiver<FulfillmentEvent>) -> FulfillmentEvent {
    wait_for_event(rx, |e| {
        matches!(
            e,
            FulfillmentEvent::Completed { .. } | FulfillmentEvent::Failed { .. }
        )
    })
    .await
}
