use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::lenient_int;
use crate::services::{SelectionMode, SelectionOutcome};

/// 抽奖结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpinResult {
    #[serde(rename = "PrizeName")]
    pub prize_name: String,
    #[serde(rename = "PrizeId")]
    pub prize_id: String,
    /// 目录中的位置；"Try Again" 为 -1
    #[serde(rename = "Index")]
    pub index: i64,
    /// UTC 日期 (YYYY-MM-DD)
    #[serde(rename = "utcDate", skip_serializing_if = "Option::is_none")]
    pub utc_date: Option<String>,
}

impl SpinResult {
    pub fn from_outcome(outcome: &SelectionOutcome, utc_date: Option<String>) -> Self {
        Self {
            prize_name: outcome.prize_name().to_string(),
            prize_id: outcome.prize_id().to_string(),
            index: outcome.index(),
            utc_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrizeWinCount {
    #[serde(rename = "PrizeId")]
    pub prize_id: String,
    #[serde(rename = "winCount")]
    pub win_count: i64,
}

/// 当日统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpinStats {
    pub utc_date: String,
    pub total_spins: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_prize: Option<PrizeWinCount>,
    /// 扣减后的剩余库存
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

/// GET /spin 响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpinResponse {
    pub success: bool,
    pub result: SpinResult,
    pub algorithm: SelectionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SpinStats>,
}

/// POST /update-inventory 请求体
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ConfirmSpinRequest {
    #[serde(rename = "PrizeId", default)]
    pub prize_id: Option<String>,
    /// 非数字的 Index 视为缺失
    #[serde(rename = "Index", default)]
    #[schema(value_type = Option<i64>)]
    pub index: Option<Value>,
}

impl ConfirmSpinRequest {
    pub fn new(prize_id: impl Into<String>, index: Option<i64>) -> Self {
        Self {
            prize_id: Some(prize_id.into()),
            index: index.map(Value::from),
        }
    }

    pub fn catalog_index(&self) -> Option<usize> {
        self.index
            .as_ref()
            .filter(|v| v.is_number())
            .and_then(lenient_int)
            .and_then(|i| usize::try_from(i).ok())
    }
}

/// POST /update-inventory 响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmSpinResponse {
    pub success: bool,
    pub result: SpinResult,
    pub stats: SpinStats,
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}
