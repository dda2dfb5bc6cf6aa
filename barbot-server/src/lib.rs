//! Barbot Server - 吧台机器人订单履约服务
//!
//! # 架构概述
//!
//! - **设备连接** (`barbot_link`): 与调酒设备的 TCP 行协议连接
//! - **履约** (`fulfillment`): 单飞 + FIFO 派单 actor
//! - **库存** (`inventory`): 配料消耗与回补
//! - **订单** (`orders`): redb 存储、订单工作流、状态同步
//! - **HTTP API** (`api`): 操作员控制与订单接口
//!
//! # 模块结构
//!
//! ```text
//! barbot-server/src/
//! ├── core/          # 配置、状态、后台任务、HTTP 服务
//! ├── api/           # HTTP 路由和处理器
//! ├── catalog/       # 配方目录
//! ├── fulfillment/   # 派单队列与 actor
//! ├── inventory/     # 库存存储与账本
//! ├── orders/        # 订单存储与工作流
//! └── utils/         # 日志
//! ```

pub mod api;
pub mod catalog;
pub mod core;
pub mod fulfillment;
pub mod inventory;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use fulfillment::{Disposition, Fulfillment, FulfillmentEvent};
pub use inventory::{InventoryLedger, InventoryStore, MemoryInventory};
pub use orders::{OrderStorage, OrderWorkflow, WorkflowError};

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// 加载 .env 并初始化日志，返回配置
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    config.ensure_work_dir_structure()?;

    let log_dir = config.log_dir();
    init_logger_with_file(
        &config.log_level,
        config.log_json || config.is_production(),
        log_dir.to_str(),
    )?;
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    ____             __          __
   / __ )____ ______/ /_  ____  / /_
  / __  / __ `/ ___/ __ \/ __ \/ __/
 / /_/ / /_/ / /  / /_/ / /_/ / /_
/_____/\__,_/_/  /_.___/\____/\__/
    "#
    );
}
