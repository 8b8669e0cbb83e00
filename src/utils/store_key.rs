use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{AppError, AppResult};

/// Firebase 键不允许 . $ # [ ] / 以及控制字符，长度上限 768 字节
static STORE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.$#\[\]/\x00-\x1F\x7F]+$").expect("valid key regex"));

pub fn is_valid_store_key(key: &str) -> bool {
    key.len() <= 768 && STORE_KEY.is_match(key)
}

/// 校验客户端提交的奖品ID可以作为统计路径中的键
pub fn validate_store_key(key: &str) -> AppResult<()> {
    if !is_valid_store_key(key) {
        return Err(AppError::ValidationError(format!(
            "PrizeId contains characters that are not allowed: {key}"
        )));
    }
    Ok(())
}

/// 统计按 UTC 日期分桶
pub fn utc_date_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}
