//! 服务器状态
//!
//! [`ServerState`] 持有所有服务的句柄，在 axum handler 之间共享 (Clone 开销很小)。
//!
//! | 字段 | 说明 |
//! |------|------|
//! | config | 服务器配置 |
//! | link | 设备 TCP 连接 |
//! | fulfillment | 履约 actor 句柄 |
//! | workflow | 订单工作流 |
//! | inventory | 库存存储 |

use barbot_link::DeviceLink;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{Catalog, RecipeSource};
use crate::core::link_monitor::log_link_events;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::fulfillment::{Fulfillment, FulfillmentWorker};
use crate::inventory::{InventoryLedger, InventoryStore, MemoryInventory};
use crate::orders::{OrderStatusSync, OrderStorage, OrderWorkflow};
use crate::utils::logger::periodic_cleanup;

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub link: DeviceLink,
    pub fulfillment: Fulfillment,
    pub workflow: Arc<OrderWorkflow>,
    pub inventory: Arc<dyn InventoryStore>,
    /// 履约 actor，启动后台任务时取走
    worker: Arc<Mutex<Option<FulfillmentWorker>>>,
    started_at: Instant,
}

impl ServerState {
    /// 按配置初始化所有服务
    ///
    /// 1. 创建工作目录
    /// 2. 加载配方目录 (文件不存在时使用空目录)
    /// 3. 打开 redb 数据库
    /// 4. 创建设备连接 (此时不连接)
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        config.ensure_work_dir_structure()?;

        let catalog_path = config.catalog_path();
        let catalog = if catalog_path.exists() {
            Catalog::load(&catalog_path)?
        } else {
            tracing::warn!(path = %catalog_path.display(), "Catalog file not found, starting with an empty catalog");
            Catalog::default()
        };
        let recipes = catalog.recipes()?;
        tracing::info!(
            cocktails = recipes.len(),
            inventory_records = catalog.inventory.len(),
            "Catalog loaded"
        );

        let inventory = Arc::new(MemoryInventory::with_records(catalog.inventory_records()));
        let storage = OrderStorage::open(config.database_path())?;
        let link = DeviceLink::new(config.link_config()?);

        Ok(Self::assemble(
            config.clone(),
            link,
            storage,
            Arc::new(recipes),
            inventory,
        ))
    }

    /// 由现成的组件组装状态 (测试中使用内存数据库和本地假设备)
    pub fn assemble(
        config: Config,
        link: DeviceLink,
        storage: OrderStorage,
        recipes: Arc<dyn RecipeSource>,
        inventory: Arc<dyn InventoryStore>,
    ) -> Self {
        let (fulfillment, worker) = Fulfillment::new(link.clone());
        let ledger = InventoryLedger::new(inventory.clone());
        let workflow = Arc::new(OrderWorkflow::new(
            storage,
            recipes,
            ledger,
            fulfillment.clone(),
        ));

        Self {
            config,
            link,
            fulfillment,
            workflow,
            inventory,
            worker: Arc::new(Mutex::new(Some(worker))),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// 启动后台任务
    ///
    /// - fulfillment_worker (Worker): 履约 actor
    /// - order_status_sync (Listener): 设备结果写回订单
    /// - device_event_log (Listener): 设备事件日志
    /// - device_connect (Warmup): 首次连接设备 (DEVICE_AUTO_CONNECT)
    /// - log_cleanup (Periodic): 清理过期日志
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();

        match self.worker.lock().take() {
            Some(worker) => {
                tasks.spawn("fulfillment_worker", TaskKind::Worker, worker.run(token.clone()));
            }
            None => tracing::warn!("Fulfillment worker already started"),
        }

        let sync = OrderStatusSync::new(self.workflow.clone());
        tasks.spawn(
            "order_status_sync",
            TaskKind::Listener,
            sync.run(self.fulfillment.subscribe(), token.clone()),
        );
        tasks.spawn(
            "device_event_log",
            TaskKind::Listener,
            log_link_events(self.link.subscribe(), token.clone()),
        );

        if self.config.device_auto_connect {
            let link = self.link.clone();
            tasks.spawn("device_connect", TaskKind::Warmup, async move {
                if let Err(e) = link.connect().await {
                    tracing::warn!(error = %e, "Initial device connection failed, retrying in background");
                }
            });
        }

        tasks.spawn(
            "log_cleanup",
            TaskKind::Periodic,
            periodic_cleanup(self.config.log_dir(), token),
        );

        tasks.log_summary();
        tasks
    }
}
