use barbot_link::{LinkConfig, LinkResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 服务器配置 - 吧台机器人服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./work_dir | 工作目录 (数据库、日志、配方目录) |
/// | HTTP_PORT | 3001 | HTTP 服务端口 |
/// | DEVICE_HOST | 192.168.5.100 | 设备地址 |
/// | DEVICE_PORT | 8080 | 设备端口 |
/// | DEVICE_RECONNECT_MS | 5000 | 断线重连间隔(毫秒) |
/// | DEVICE_IDLE_TIMEOUT_MS | 30000 | 无数据空闲超时(毫秒) |
/// | DEVICE_CONNECT_TIMEOUT_MS | 5000 | 单次连接超时(毫秒) |
/// | DEVICE_AUTO_CONNECT | true | 启动时自动连接设备 |
/// | CATALOG_PATH | WORK_DIR/catalog.json | 配方目录文件 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// DEVICE_HOST=127.0.0.1 DEVICE_PORT=9100 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 设备地址
    pub device_host: String,
    pub device_port: u16,
    pub device_reconnect_ms: u64,
    pub device_idle_timeout_ms: u64,
    pub device_connect_timeout_ms: u64,
    pub device_write_timeout_ms: u64,
    /// 启动时是否自动连接设备
    pub device_auto_connect: bool,
    /// 配方目录文件，未设置时使用 WORK_DIR/catalog.json
    pub catalog_path: Option<String>,
    pub log_level: String,
    pub log_json: bool,
    /// 运行环境: development | staging | production
    pub environment: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into()),
            http_port: env_or("HTTP_PORT", 3001),
            device_host: std::env::var("DEVICE_HOST").unwrap_or_else(|_| "192.168.5.100".into()),
            device_port: env_or("DEVICE_PORT", 8080),
            device_reconnect_ms: env_or("DEVICE_RECONNECT_MS", 5000),
            device_idle_timeout_ms: env_or("DEVICE_IDLE_TIMEOUT_MS", 30000),
            device_connect_timeout_ms: env_or("DEVICE_CONNECT_TIMEOUT_MS", 5000),
            device_write_timeout_ms: env_or("DEVICE_WRITE_TIMEOUT_MS", 5000),
            device_auto_connect: env_or("DEVICE_AUTO_CONNECT", true),
            catalog_path: std::env::var("CATALOG_PATH").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 覆盖工作目录和端口 (测试和嵌入场景)
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port,
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// redb 数据库文件
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database").join("barbot.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn catalog_path(&self) -> PathBuf {
        match &self.catalog_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.work_dir).join("catalog.json"),
        }
    }

    /// 设备连接配置
    pub fn link_config(&self) -> LinkResult<LinkConfig> {
        Ok(LinkConfig::new(&self.device_host, self.device_port)?
            .with_reconnect_delay(Duration::from_millis(self.device_reconnect_ms))
            .with_idle_timeout(Duration::from_millis(self.device_idle_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.device_connect_timeout_ms))
            .with_write_timeout(Duration::from_millis(self.device_write_timeout_ms)))
    }

    /// 创建工作目录结构
    ///
    /// ```text
    /// work_dir/
    /// ├── database/
    /// └── logs/
    /// ```
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(PathBuf::from(&self.work_dir).join("database"))?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "./work_dir".into(),
            http_port: 3001,
            device_host: "192.168.5.100".into(),
            device_port: 8080,
            device_reconnect_ms: 5000,
            device_idle_timeout_ms: 30000,
            device_connect_timeout_ms: 5000,
            device_write_timeout_ms: 5000,
            device_auto_connect: true,
            catalog_path: None,
            log_level: "info".into(),
            log_json: false,
            environment: "development".into(),
        }
    }
}
