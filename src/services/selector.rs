//! Weighted prize selection.
//!
//! Both modes build one weight per catalog position plus a trailing "Try Again"
//! slot and invert the cumulative distribution with a single uniform draw.
//! Nothing here touches the store; the caller supplies the random source so a
//! seeded `StdRng` gives reproducible outcomes.

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::CatalogEntry;

pub const TRY_AGAIN_ID: &str = "TRY_AGAIN";
pub const TRY_AGAIN_NAME: &str = "Try Again";
pub const TRY_AGAIN_INDEX: i64 = -1;

/// 库存模式下快空的奖品仍保留的最低比例
const MIN_STOCK_RATIO: f64 = 0.05;
const PRIZE_JITTER: (f64, f64) = (0.85, 1.15);
const TRY_AGAIN_JITTER: (f64, f64) = (0.9, 1.1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// 按剩余库存比例加权
    Inventory,
    /// 按配置的固定概率加权
    Probability,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Prize {
        index: usize,
        prize_id: String,
        prize_name: String,
    },
    TryAgain,
}

impl SelectionOutcome {
    pub fn index(&self) -> i64 {
        match self {
            SelectionOutcome::Prize { index, .. } => *index as i64,
            SelectionOutcome::TryAgain => TRY_AGAIN_INDEX,
        }
    }

    pub fn prize_id(&self) -> &str {
        match self {
            SelectionOutcome::Prize { prize_id, .. } => prize_id,
            SelectionOutcome::TryAgain => TRY_AGAIN_ID,
        }
    }

    pub fn prize_name(&self) -> &str {
        match self {
            SelectionOutcome::Prize { prize_name, .. } => prize_name,
            SelectionOutcome::TryAgain => TRY_AGAIN_NAME,
        }
    }

    pub fn is_prize(&self) -> bool {
        matches!(self, SelectionOutcome::Prize { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorConfig {
    pub mode: SelectionMode,
    pub try_again_weight: f64,
    /// "Try Again" 权重是否乘以 [0.9, 1.1] 的随机系数
    pub try_again_jitter: bool,
}

impl SelectorConfig {
    /// 库存模式默认抖动，概率模式默认不抖动
    pub fn new(mode: SelectionMode, try_again_weight: f64) -> Self {
        Self {
            mode,
            try_again_weight,
            try_again_jitter: mode == SelectionMode::Inventory,
        }
    }

    pub fn with_try_again_jitter(mut self, jitter: Option<bool>) -> Self {
        if let Some(jitter) = jitter {
            self.try_again_jitter = jitter;
        }
        self
    }
}

pub fn select_prize<R: Rng + ?Sized>(
    catalog: &[CatalogEntry],
    mode: SelectionMode,
    try_again_weight: f64,
    rng: &mut R,
) -> SelectionOutcome {
    select_prize_with(catalog, &SelectorConfig::new(mode, try_again_weight), rng)
}

pub fn select_prize_with<R: Rng + ?Sized>(
    catalog: &[CatalogEntry],
    config: &SelectorConfig,
    rng: &mut R,
) -> SelectionOutcome {
    let mut weights = prize_weights(catalog, config.mode, rng);
    weights.push(try_again_slot_weight(config, rng));

    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return SelectionOutcome::TryAgain;
    }

    let picked = pick_index(&weights, rng.r#gen::<f64>() * total);
    match catalog.get(picked) {
        Some(Some(prize)) if prize.in_stock() => SelectionOutcome::Prize {
            index: picked,
            prize_id: prize.prize_id.clone(),
            prize_name: prize.prize_name.clone(),
        },
        _ => SelectionOutcome::TryAgain,
    }
}

/// 每个目录位置的权重；无库存或数据异常的位置为 0
pub fn prize_weights<R: Rng + ?Sized>(
    catalog: &[CatalogEntry],
    mode: SelectionMode,
    rng: &mut R,
) -> Vec<f64> {
    catalog
        .iter()
        .map(|entry| {
            let Some(prize) = entry else { return 0.0 };
            if !prize.in_stock() {
                return 0.0;
            }
            match mode {
                SelectionMode::Inventory => {
                    let Some(quantity) = prize.quantity else {
                        return 0.0;
                    };
                    let ratio = prize.remaining as f64 / quantity.max(1) as f64;
                    let base = ratio.max(MIN_STOCK_RATIO) * 100.0;
                    base * rng.gen_range(PRIZE_JITTER.0..=PRIZE_JITTER.1)
                }
                SelectionMode::Probability => prize
                    .probability
                    .filter(|p| p.is_finite() && *p > 0.0)
                    .unwrap_or(0.0),
            }
        })
        .collect()
}

fn try_again_slot_weight<R: Rng + ?Sized>(config: &SelectorConfig, rng: &mut R) -> f64 {
    let base = if config.try_again_weight.is_finite() {
        config.try_again_weight.max(0.0)
    } else {
        0.0
    };
    if config.try_again_jitter {
        base * rng.gen_range(TRY_AGAIN_JITTER.0..=TRY_AGAIN_JITTER.1)
    } else {
        base
    }
}

/// 累积分布反演；浮点误差导致走完仍未命中时落在最后一格 (Try Again)
fn pick_index(weights: &[f64], mut r: f64) -> usize {
    for (i, w) in weights.iter().enumerate() {
        if r < *w {
            return i;
        }
        r -= w;
    }
    weights.len().saturating_sub(1)
}
