use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::utils::is_valid_store_key;

/// 奖品记录 (存储在 `/Prizes/{index}` 下)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PrizeRecord {
    /// 奖品ID (稳定键)
    pub prize_id: String,
    /// 展示名称
    pub prize_name: String,
    /// 初始总库存；缺失时库存模式下权重为 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    /// 剩余库存
    pub remaining: i64,
    /// 概率模式下的固定权重
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// 目录中的一个位置；`None` 表示该位置的数据无法识别，保留位置但永远不会被抽中
pub type CatalogEntry = Option<PrizeRecord>;

impl PrizeRecord {
    /// 宽松解析：数值字段允许是 JSON 数字或数字字符串
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let prize_id = match obj.get("PrizeId")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        // 奖品ID会作为统计路径中的键
        if !is_valid_store_key(&prize_id) {
            return None;
        }
        let prize_name = obj
            .get("PrizeName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| prize_id.clone());
        let remaining = obj.get("Remaining").and_then(lenient_int)?;
        let quantity = obj.get("Quantity").and_then(lenient_int);
        let probability = obj.get("Probability").and_then(lenient_number);

        Some(Self {
            prize_id,
            prize_name,
            quantity,
            remaining,
            probability,
        })
    }

    pub fn in_stock(&self) -> bool {
        self.remaining > 0
    }
}

/// 将 `/Prizes` 的原始文档转换为目录；不是数组时整个请求失败
pub fn parse_catalog(value: Option<Value>) -> AppResult<Vec<CatalogEntry>> {
    match value {
        Some(Value::Array(items)) => Ok(items.iter().map(PrizeRecord::from_value).collect()),
        _ => Err(AppError::MalformedData("Prizes is not an array".into())),
    }
}

pub fn lenient_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn lenient_int(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let n = lenient_number(value)?;
    (n.fract() == 0.0 && n.abs() < i64::MAX as f64).then_some(n as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_accepts_numeric_strings() {
        let record = PrizeRecord::from_value(&json!({
            "PrizeId": "P1",
            "PrizeName": "Mug",
            "Quantity": "10",
            "Remaining": 4,
            "Probability": "2.5"
        }))
        .unwrap();
        assert_eq!(record.quantity, Some(10));
        assert_eq!(record.remaining, 4);
        assert_eq!(record.probability, Some(2.5));
        assert!(record.in_stock());
    }

    #[test]
    fn test_from_value_rejects_malformed() {
        assert!(PrizeRecord::from_value(&Value::Null).is_none());
        assert!(PrizeRecord::from_value(&json!({ "PrizeId": "P1" })).is_none());
        assert!(
            PrizeRecord::from_value(&json!({ "PrizeId": "P1", "Remaining": "lots" })).is_none()
        );
        assert!(PrizeRecord::from_value(&json!({ "Remaining": 3 })).is_none());
        assert!(
            PrizeRecord::from_value(&json!({ "PrizeId": "a.b", "Remaining": 3 })).is_none()
        );
    }

    #[test]
    fn test_missing_name_falls_back_to_id() {
        let record =
            PrizeRecord::from_value(&json!({ "PrizeId": 7, "Remaining": 1 })).unwrap();
        assert_eq!(record.prize_id, "7");
        assert_eq!(record.prize_name, "7");
        assert_eq!(record.quantity, None);
    }

    #[test]
    fn test_parse_catalog_keeps_positions() {
        let catalog = parse_catalog(Some(json!([
            { "PrizeId": "A", "Remaining": 1, "Quantity": 1 },
            null,
            { "PrizeId": "C", "Remaining": 0, "Quantity": 5 }
        ])))
        .unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog[1].is_none());
        assert_eq!(catalog[2].as_ref().unwrap().prize_id, "C");
    }

    #[test]
    fn test_parse_catalog_rejects_non_array() {
        assert!(matches!(
            parse_catalog(Some(json!({ "A": 1 }))),
            Err(AppError::MalformedData(_))
        ));
        assert!(parse_catalog(None).is_err());
        assert!(parse_catalog(Some(json!("oops"))).is_err());
    }
}
