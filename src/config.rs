use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::services::SelectionMode;

pub const DEFAULT_FIREBASE_URL: &str = "https://spin-panalo-default-rtdb.firebaseio.com";
pub const DEFAULT_TRY_AGAIN_WEIGHT: f64 = 40.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub spin: SpinConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Firebase,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// memory 后端的初始数据 (JSON 文件)
    #[serde(default)]
    pub seed_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
            timeout_secs: default_timeout_secs(),
            seed_path: None,
        }
    }
}

/// 抽奖算法选择；`Auto` 表示读取存储中的 `/Settings.useProbability`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmSetting {
    #[default]
    Auto,
    Inventory,
    Probability,
}

impl AlgorithmSetting {
    pub fn fixed_mode(self) -> Option<SelectionMode> {
        match self {
            AlgorithmSetting::Auto => None,
            AlgorithmSetting::Inventory => Some(SelectionMode::Inventory),
            AlgorithmSetting::Probability => Some(SelectionMode::Probability),
        }
    }
}

impl FromStr for AlgorithmSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "inventory" => Ok(Self::Inventory),
            "probability" => Ok(Self::Probability),
            other => Err(format!("unknown spin algorithm: {other}")),
        }
    }
}

/// 以哪个端点为准：抽奖时直接落库，或仅抽奖、由确认端点落库
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpinFlow {
    #[default]
    DrawAndCommit,
    ConfirmOnly,
}

impl FromStr for SpinFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draw_and_commit" => Ok(Self::DrawAndCommit),
            "confirm_only" => Ok(Self::ConfirmOnly),
            other => Err(format!("unknown spin flow: {other}")),
        }
    }
}

/// 库存/计数写入方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// 条件写入 (期望旧值 + 新值)，丢失竞争时重新读取
    #[default]
    CompareAndSwap,
    /// 读后直接覆盖，存在并发丢失更新
    Overwrite,
}

impl FromStr for WriteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compare_and_swap" | "cas" => Ok(Self::CompareAndSwap),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!("unknown inventory write strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinConfig {
    #[serde(default = "default_try_again_weight")]
    pub try_again_weight: f64,
    #[serde(default)]
    pub algorithm: AlgorithmSetting,
    #[serde(default)]
    pub flow: SpinFlow,
    #[serde(default)]
    pub inventory_write: WriteStrategy,
    /// 未设置时：库存模式抖动，概率模式不抖动
    #[serde(default)]
    pub try_again_jitter: Option<bool>,
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            try_again_weight: DEFAULT_TRY_AGAIN_WEIGHT,
            algorithm: AlgorithmSetting::default(),
            flow: SpinFlow::default(),
            inventory_write: WriteStrategy::default(),
            try_again_jitter: None,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_store_url() -> String {
    DEFAULT_FIREBASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_try_again_weight() -> f64 {
    DEFAULT_TRY_AGAIN_WEIGHT
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://spinmo-panalomo.vercel.app".to_string(),
        "https://punx-ph.github.io".to_string(),
    ]
}

/// 解析 "Try Again" 权重；缺失、无法解析、非有限值或负数时回落到 40
pub fn parse_try_again_weight(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|w| w.is_finite() && *w >= 0.0)
        .unwrap_or(DEFAULT_TRY_AGAIN_WEIGHT)
}

/// 逗号分隔的来源列表
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides()?;
        config.sanitize();
        Ok(config)
    }

    /// 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }

        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = match v.trim().to_ascii_lowercase().as_str() {
                "firebase" => StoreBackend::Firebase,
                "memory" => StoreBackend::Memory,
                other => return Err(format!("unknown store backend: {other}").into()),
            };
        }
        if let Ok(v) = env::var("FIREBASE_URL") {
            self.store.url = v;
        }
        if let Ok(v) = env::var("STORE_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.store.timeout_secs = n;
        }
        if let Ok(v) = env::var("STORE_SEED_PATH") {
            self.store.seed_path = Some(v);
        }

        if let Ok(v) = env::var("TRY_AGAIN_WEIGHT") {
            self.spin.try_again_weight = parse_try_again_weight(Some(&v));
        }
        if let Ok(v) = env::var("SPIN_ALGORITHM") {
            self.spin.algorithm = v.parse()?;
        }
        if let Ok(v) = env::var("SPIN_FLOW") {
            self.spin.flow = v.parse()?;
        }
        if let Ok(v) = env::var("INVENTORY_WRITE") {
            self.spin.inventory_write = v.parse()?;
        }
        if let Ok(v) = env::var("TRY_AGAIN_JITTER") {
            self.spin.try_again_jitter = parse_bool(&v);
        }
        if let Ok(v) = env::var("SPIN_RNG_SEED")
            && let Ok(seed) = v.parse()
        {
            self.spin.rng_seed = Some(seed);
        }

        if let Ok(v) = env::var("ALLOWED_ORIGINS") {
            self.cors.allowed_origins = parse_origin_list(&v);
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        if !self.spin.try_again_weight.is_finite() || self.spin.try_again_weight < 0.0 {
            self.spin.try_again_weight = DEFAULT_TRY_AGAIN_WEIGHT;
        }
        self.store.url = self.store.url.trim_end_matches('/').to_string();
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            spin: SpinConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_try_again_weight() {
        assert_eq!(parse_try_again_weight(Some("25")), 25.0);
        assert_eq!(parse_try_again_weight(Some(" 0 ")), 0.0);
        assert_eq!(parse_try_again_weight(None), 40.0);
        assert_eq!(parse_try_again_weight(Some("abc")), 40.0);
        assert_eq!(parse_try_again_weight(Some("NaN")), 40.0);
        assert_eq!(parse_try_again_weight(Some("inf")), 40.0);
        assert_eq!(parse_try_again_weight(Some("-3")), 40.0);
    }

    #[test]
    fn test_parse_origin_list() {
        let origins = parse_origin_list("https://a.example, https://b.example/ ,,");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_toml_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 3000

            [spin]
            algorithm = "probability"
            inventory_write = "overwrite"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::Firebase);
        assert_eq!(config.store.url, DEFAULT_FIREBASE_URL);
        assert_eq!(config.spin.try_again_weight, 40.0);
        assert_eq!(config.spin.algorithm, AlgorithmSetting::Probability);
        assert_eq!(config.spin.flow, SpinFlow::DrawAndCommit);
        assert_eq!(config.spin.inventory_write, WriteStrategy::Overwrite);
        assert_eq!(config.cors.allowed_origins.len(), 2);
    }

    #[test]
    fn test_enum_from_str() {
        assert_eq!("CAS".parse::<WriteStrategy>(), Ok(WriteStrategy::CompareAndSwap));
        assert_eq!("confirm_only".parse::<SpinFlow>(), Ok(SpinFlow::ConfirmOnly));
        assert_eq!(
            AlgorithmSetting::Inventory.fixed_mode(),
            Some(SelectionMode::Inventory)
        );
        assert!(AlgorithmSetting::Auto.fixed_mode().is_none());
        assert!("random".parse::<AlgorithmSetting>().is_err());
    }
}
