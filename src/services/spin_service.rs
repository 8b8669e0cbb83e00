use chrono::Utc;
use futures_util::future::join;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;

use crate::config::{SpinConfig, SpinFlow, WriteStrategy};
use crate::error::{AppError, AppResult};
use crate::external::SharedStore;
use crate::models::{
    CatalogEntry, ConfirmSpinRequest, ConfirmSpinResponse, PrizeWinCount, SpinResponse,
    SpinResult, SpinStats, lenient_int, parse_catalog,
};
use crate::services::selector::{
    SelectionMode, SelectionOutcome, SelectorConfig, TRY_AGAIN_ID, select_prize_with,
};
use crate::utils::{utc_date_key, validate_store_key};

const PRIZES_PATH: &str = "Prizes";
const SETTINGS_PATH: &str = "Settings";
/// 条件写入丢失竞争后的最大重试次数
const MAX_CAS_ATTEMPTS: usize = 5;
/// 抽中的奖品被抢光后的最大重抽次数
const MAX_REDRAWS: usize = 5;

pub fn prize_remaining_path(index: usize) -> String {
    format!("{PRIZES_PATH}/{index}/Remaining")
}

pub fn total_spins_path(utc_date: &str) -> String {
    format!("GameStats/{utc_date}/TotalSpins")
}

pub fn win_count_path(utc_date: &str, prize_id: &str) -> String {
    format!("GameStats/{utc_date}/Prizes/{prize_id}")
}

#[derive(Clone)]
pub struct SpinService {
    store: SharedStore,
    settings: SpinConfig,
}

impl SpinService {
    pub fn new(store: SharedStore, settings: SpinConfig) -> Self {
        Self { store, settings }
    }

    pub fn flow(&self) -> SpinFlow {
        self.settings.flow
    }

    /// 抽奖 (GET /spin)
    ///
    /// - draw_and_commit: 抽奖 -> 扣减库存 -> 当日总次数 +1 -> 中奖计数 +1
    /// - confirm_only: 只抽奖不写入，结果由 /update-inventory 确认
    pub async fn draw(&self) -> AppResult<SpinResponse> {
        let (catalog, mode) = join(self.store.get(PRIZES_PATH), self.resolve_mode()).await;
        let mut catalog = parse_catalog(catalog?)?;
        let utc_date = utc_date_key(Utc::now());
        let selector = SelectorConfig::new(mode, self.settings.try_again_weight)
            .with_try_again_jitter(self.settings.try_again_jitter);
        let mut rng = self.rng();

        if self.settings.flow == SpinFlow::ConfirmOnly {
            let outcome = select_prize_with(&catalog, &selector, &mut rng);
            return Ok(SpinResponse {
                success: true,
                result: SpinResult::from_outcome(&outcome, Some(utc_date)),
                algorithm: mode,
                stats: None,
            });
        }

        let mut drawn = None;
        for _ in 0..MAX_REDRAWS {
            let outcome = select_prize_with(&catalog, &selector, &mut rng);
            let index = match outcome {
                SelectionOutcome::Prize { index, .. } => index,
                SelectionOutcome::TryAgain => {
                    drawn = Some((outcome, None));
                    break;
                }
            };
            let observed = catalog[index].as_ref().map_or(0, |p| p.remaining);
            match self.take_one(index, observed).await? {
                Some(left) => {
                    drawn = Some((outcome, Some(left)));
                    break;
                }
                None => {
                    // 读取后被其它请求抽完：本地置零后在剩余奖品中重抽
                    log::warn!(
                        "Prize {} sold out before it could be secured, redrawing",
                        outcome.prize_id()
                    );
                    if let Some(Some(prize)) = catalog.get_mut(index) {
                        prize.remaining = 0;
                    }
                }
            }
        }
        let (outcome, remaining) = drawn.unwrap_or_else(|| {
            log::warn!("No prize could be secured after {MAX_REDRAWS} draws, recording Try Again");
            (SelectionOutcome::TryAgain, None)
        });

        let stats = self.record_spin(&utc_date, &outcome, remaining).await?;
        if outcome.is_prize() {
            log::info!(
                "Prize awarded: {} (index {}), remaining {:?}",
                outcome.prize_id(),
                outcome.index(),
                remaining
            );
        }

        Ok(SpinResponse {
            success: true,
            result: SpinResult::from_outcome(&outcome, Some(utc_date)),
            algorithm: mode,
            stats: Some(stats),
        })
    }

    /// 确认客户端已得到的抽奖结果 (POST /update-inventory)
    ///
    /// 奖品无法确认 (缺少 Index、位置不存在、ID 不一致或已无库存) 时
    /// 按 "Try Again" 记录，不修改库存；总次数总是 +1。
    pub async fn confirm(&self, request: &ConfirmSpinRequest) -> AppResult<ConfirmSpinResponse> {
        let prize_id = request
            .prize_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::ValidationError("PrizeId is required".into()))?;
        if prize_id != TRY_AGAIN_ID {
            validate_store_key(prize_id)?;
        }

        let utc_date = utc_date_key(Utc::now());
        let (outcome, remaining) = if prize_id == TRY_AGAIN_ID {
            (SelectionOutcome::TryAgain, None)
        } else {
            let catalog = parse_catalog(self.store.get(PRIZES_PATH).await?)?;
            self.secure_confirmed(&catalog, prize_id, request.catalog_index())
                .await?
        };

        let stats = self.record_spin(&utc_date, &outcome, remaining).await?;
        Ok(ConfirmSpinResponse {
            success: true,
            result: SpinResult::from_outcome(&outcome, None),
            stats,
        })
    }

    async fn secure_confirmed(
        &self,
        catalog: &[CatalogEntry],
        prize_id: &str,
        index: Option<usize>,
    ) -> AppResult<(SelectionOutcome, Option<i64>)> {
        let found = index.and_then(|i| catalog.get(i)?.as_ref().map(|prize| (i, prize)));
        let Some((index, prize)) = found else {
            log::warn!(
                "Confirmation for {prize_id} has no valid Index ({index:?}), recording Try Again"
            );
            return Ok((SelectionOutcome::TryAgain, None));
        };

        if prize.prize_id != prize_id {
            log::warn!(
                "Confirmation PrizeId {prize_id} does not match catalog entry {} at index {index}",
                prize.prize_id
            );
            return Ok((SelectionOutcome::TryAgain, None));
        }
        if !prize.in_stock() {
            log::warn!("Confirmation for depleted prize {prize_id}, recording Try Again");
            return Ok((SelectionOutcome::TryAgain, None));
        }

        match self.take_one(index, prize.remaining).await? {
            Some(left) => Ok((
                SelectionOutcome::Prize {
                    index,
                    prize_id: prize.prize_id.clone(),
                    prize_name: prize.prize_name.clone(),
                },
                Some(left),
            )),
            None => {
                log::warn!("Prize {prize_id} sold out before confirmation, recording Try Again");
                Ok((SelectionOutcome::TryAgain, None))
            }
        }
    }

    /// 扣减一件库存；返回扣减后的剩余数量，已无库存返回 `None`
    async fn take_one(&self, index: usize, observed: i64) -> AppResult<Option<i64>> {
        let path = prize_remaining_path(index);
        match self.settings.inventory_write {
            WriteStrategy::Overwrite => {
                if observed <= 0 {
                    return Ok(None);
                }
                let left = (observed - 1).max(0);
                self.store.put(&path, &Value::from(left)).await?;
                Ok(Some(left))
            }
            WriteStrategy::CompareAndSwap => {
                for _ in 0..MAX_CAS_ATTEMPTS {
                    let current = self.store.get(&path).await?;
                    let remaining = current.as_ref().and_then(lenient_int).unwrap_or(0);
                    if remaining <= 0 {
                        return Ok(None);
                    }
                    let left = remaining - 1;
                    if self
                        .store
                        .compare_and_swap(&path, current.as_ref(), &Value::from(left))
                        .await?
                    {
                        return Ok(Some(left));
                    }
                    log::warn!("Lost inventory race on {path}, retrying");
                }
                Err(AppError::InternalError(format!(
                    "Inventory update on {path} kept conflicting"
                )))
            }
        }
    }

    /// 写入统计：先总次数，中奖时再写奖品计数。
    /// 任何一步写入失败直接返回错误，已完成的写入不会回滚。
    async fn record_spin(
        &self,
        utc_date: &str,
        outcome: &SelectionOutcome,
        remaining: Option<i64>,
    ) -> AppResult<SpinStats> {
        let total_spins = self.bump_counter(&total_spins_path(utc_date)).await?;

        let updated_prize = match outcome {
            SelectionOutcome::Prize { prize_id, .. } => Some(PrizeWinCount {
                prize_id: prize_id.clone(),
                win_count: self.bump_counter(&win_count_path(utc_date, prize_id)).await?,
            }),
            SelectionOutcome::TryAgain => None,
        };

        Ok(SpinStats {
            utc_date: utc_date.to_string(),
            total_spins,
            updated_prize,
            remaining,
        })
    }

    async fn bump_counter(&self, path: &str) -> AppResult<i64> {
        match self.settings.inventory_write {
            WriteStrategy::Overwrite => {
                let next = counter_value(self.read_counter(path).await.as_ref()) + 1;
                self.store.put(path, &Value::from(next)).await?;
                Ok(next)
            }
            WriteStrategy::CompareAndSwap => {
                for _ in 0..MAX_CAS_ATTEMPTS {
                    // 读取失败时没有可比较的值，按 0 直接写入
                    let current = match self.store.get(path).await {
                        Ok(value) => value,
                        Err(e) => {
                            log::warn!("Counter read failed on {path}, assuming 0: {e}");
                            self.store.put(path, &Value::from(1)).await?;
                            return Ok(1);
                        }
                    };
                    let next = counter_value(current.as_ref()) + 1;
                    if self
                        .store
                        .compare_and_swap(path, current.as_ref(), &Value::from(next))
                        .await?
                    {
                        return Ok(next);
                    }
                    log::warn!("Lost counter race on {path}, retrying");
                }
                Err(AppError::InternalError(format!(
                    "Counter update on {path} kept conflicting"
                )))
            }
        }
    }

    /// 计数读取失败按 0 处理
    async fn read_counter(&self, path: &str) -> Option<Value> {
        match self.store.get(path).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Counter read failed on {path}, assuming 0: {e}");
                None
            }
        }
    }

    async fn resolve_mode(&self) -> SelectionMode {
        if let Some(mode) = self.settings.algorithm.fixed_mode() {
            return mode;
        }
        match self.store.get(SETTINGS_PATH).await {
            Ok(settings) => {
                let use_probability = settings
                    .as_ref()
                    .and_then(|s| s.get("useProbability"))
                    .is_some_and(is_truthy);
                if use_probability {
                    SelectionMode::Probability
                } else {
                    SelectionMode::Inventory
                }
            }
            Err(e) => {
                log::warn!("Failed to read settings, using inventory mode: {e}");
                SelectionMode::Inventory
            }
        }
    }

    fn rng(&self) -> StdRng {
        match self.settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn counter_value(raw: Option<&Value>) -> i64 {
    raw.and_then(lenient_int).unwrap_or(0).max(0)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
