//! # 资源档位数据模型
//!
//! 定义作业规模档位（job scale）以及按规模指数选择档位的逻辑。
//!
//! ## 功能
//! - `Walltime`: 解析 `HH:MM:SS` / `D-HH:MM:SS` 格式的墙钟时间
//! - `ResourceTier`: 单个档位，构造时校验不变量
//! - `ResourceTable`: 按上限升序排列的档位表，提供 `select`
//!
//! ## 依赖关系
//! - 被 `registry/`, `batch/`, `render/` 使用
//! - 使用 `error.rs`

use crate::error::{ChainsError, Result};

/// 墙钟时间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walltime {
    raw: String,
    seconds: u64,
}

impl Walltime {
    /// 解析调度器格式的时间字符串
    pub fn parse(text: &str) -> Result<Self> {
        let raw = text.trim();
        let invalid = || {
            ChainsError::config(format!(
                "invalid walltime '{}' (expected HH:MM:SS or D-HH:MM:SS)",
                raw
            ))
        };

        let (days, clock) = match raw.split_once('-') {
            Some((d, rest)) => (d.parse::<u64>().map_err(|_| invalid())?, rest),
            None => (0, raw),
        };

        let parts: Vec<&str> = clock.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut fields = [0u64; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part.parse::<u64>().map_err(|_| invalid())?;
        }
        let [hours, minutes, seconds] = fields;
        if minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }

        let total = days * 86_400 + hours * 3_600 + minutes * 60 + seconds;
        if total == 0 {
            return Err(invalid());
        }

        Ok(Walltime {
            raw: raw.to_string(),
            seconds: total,
        })
    }

    /// 总秒数
    pub fn as_seconds(&self) -> u64 {
        self.seconds
    }
}

impl std::fmt::Display for Walltime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// 资源档位
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTier {
    pub label: String,
    pub scale_limit: f64,
    pub walltime: Walltime,
    pub cores: Option<u32>,
    /// 每核内存 (MB)
    pub mem_per_cpu: u64,
    pub partition: Option<String>,
    pub delay_command: Option<String>,
}

impl ResourceTier {
    /// 创建档位并校验不变量
    pub fn new(
        label: impl Into<String>,
        scale_limit: f64,
        walltime: Walltime,
        cores: Option<u32>,
        mem_per_cpu: u64,
    ) -> Result<Self> {
        let label = label.into();
        if !scale_limit.is_finite() || scale_limit <= 0.0 {
            return Err(ChainsError::config(format!(
                "scale_limit of tier '{}' must be a positive number, got {}",
                label, scale_limit
            )));
        }
        if cores == Some(0) {
            return Err(ChainsError::config(format!(
                "tier '{}' requests zero cores",
                label
            )));
        }
        Ok(ResourceTier {
            label,
            scale_limit,
            walltime,
            cores,
            mem_per_cpu,
            partition: None,
            delay_command: None,
        })
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_delay_command(mut self, delay: impl Into<String>) -> Self {
        let delay = delay.into();
        self.delay_command = if delay.trim().is_empty() {
            None
        } else {
            Some(delay)
        };
        self
    }

    /// 作业总内存 (MB)，未指定核数时按单核计算
    pub fn total_memory(&self) -> u64 {
        self.mem_per_cpu * u64::from(self.cores.unwrap_or(1))
    }
}

/// 资源档位表，始终按 `scale_limit` 升序保存
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTable {
    tiers: Vec<ResourceTier>,
}

impl ResourceTable {
    /// 从任意顺序的档位列表构建
    ///
    /// 两个档位的上限相同属于配置错误。
    pub fn new(mut tiers: Vec<ResourceTier>) -> Result<Self> {
        tiers.sort_by(|a, b| a.scale_limit.total_cmp(&b.scale_limit));

        for pair in tiers.windows(2) {
            if pair[0].scale_limit == pair[1].scale_limit {
                return Err(ChainsError::config(format!(
                    "tiers '{}' and '{}' share the same scale_limit ({})",
                    pair[0].label, pair[1].label, pair[0].scale_limit
                )));
            }
        }

        Ok(ResourceTable { tiers })
    }

    pub fn tiers(&self) -> &[ResourceTier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// 最大上限
    pub fn max_limit(&self) -> Option<f64> {
        self.tiers.last().map(|t| t.scale_limit)
    }

    /// 选择上限不小于 `scale_index` 的最小档位
    pub fn select(&self, scale_index: f64) -> Result<&ResourceTier> {
        let max_limit = self
            .max_limit()
            .ok_or_else(|| ChainsError::config("resource table is empty"))?;

        self.tiers
            .iter()
            .find(|tier| scale_index <= tier.scale_limit)
            .ok_or(ChainsError::ScaleExceeded {
                index: scale_index,
                max_limit,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tier(label: &str, limit: f64) -> ResourceTier {
        ResourceTier::new(label, limit, Walltime::parse("01:00:00").unwrap(), Some(4), 500)
            .unwrap()
    }

    fn sample_table(order: &[usize]) -> ResourceTable {
        let all = [
            tier("tiny", 50.0),
            tier("small", 500.0),
            tier("medium", 1000.0),
            tier("big", 1500.0),
        ];
        ResourceTable::new(order.iter().map(|&i| all[i].clone()).collect()).unwrap()
    }

    #[test]
    fn test_walltime_parse() {
        assert_eq!(Walltime::parse("00:10:00").unwrap().as_seconds(), 600);
        assert_eq!(Walltime::parse("2-01:00:30").unwrap().as_seconds(), 2 * 86_400 + 3_630);
        assert_eq!(Walltime::parse("0-00:10:00").unwrap().to_string(), "0-00:10:00");
        assert!(Walltime::parse("10:00").is_err());
        assert!(Walltime::parse("01:61:00").is_err());
        assert!(Walltime::parse("00:00:00").is_err());
        assert!(Walltime::parse("x-01:00:00").is_err());
    }

    #[test]
    fn test_tier_invariants() {
        let wt = Walltime::parse("01:00:00").unwrap();
        assert!(ResourceTier::new("a", 0.0, wt.clone(), None, 100).is_err());
        assert!(ResourceTier::new("a", -3.0, wt.clone(), None, 100).is_err());
        assert!(ResourceTier::new("a", f64::NAN, wt.clone(), None, 100).is_err());
        assert!(ResourceTier::new("a", 1.0, wt.clone(), Some(0), 100).is_err());

        let t = ResourceTier::new("a", 1.0, wt, None, 100)
            .unwrap()
            .with_delay_command("  ");
        assert_eq!(t.delay_command, None);
        assert_eq!(t.total_memory(), 100);
    }

    #[test]
    fn test_select_example_scenario() {
        let table = sample_table(&[0, 1, 2, 3]);
        assert_eq!(table.select(26.0).unwrap().label, "tiny");
        assert_eq!(table.select(50.0).unwrap().label, "tiny");
        assert_eq!(table.select(50.5).unwrap().label, "small");
        assert_eq!(table.select(1500.0).unwrap().label, "big");
        assert_eq!(table.select(0.0).unwrap().label, "tiny");
    }

    #[test]
    fn test_select_is_order_independent() {
        let orders: [&[usize]; 4] = [&[0, 1, 2, 3], &[3, 2, 1, 0], &[2, 0, 3, 1], &[1, 3, 0, 2]];
        for index in [1.0, 49.0, 51.0, 499.9, 700.0, 1000.0, 1200.0] {
            let expected = sample_table(orders[0]).select(index).unwrap().label.clone();
            for order in &orders[1..] {
                assert_eq!(sample_table(order).select(index).unwrap().label, expected);
            }
        }
    }

    #[test]
    fn test_select_smallest_qualifying_limit() {
        let table = sample_table(&[2, 0, 3, 1]);
        for index in [0.0, 10.0, 50.0, 51.0, 999.0, 1001.0, 1499.0] {
            let chosen = table.select(index).unwrap();
            let best = table
                .tiers()
                .iter()
                .filter(|t| t.scale_limit >= index)
                .map(|t| t.scale_limit)
                .fold(f64::INFINITY, f64::min);
            assert_eq!(chosen.scale_limit, best);
        }
    }

    #[test]
    fn test_select_scale_exceeded() {
        let table = sample_table(&[0, 1, 2, 3]);
        match table.select(1500.1) {
            Err(ChainsError::ScaleExceeded { index, max_limit }) => {
                assert_eq!(index, 1500.1);
                assert_eq!(max_limit, 1500.0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_select_empty_table() {
        let table = ResourceTable::new(vec![]).unwrap();
        let err = table.select(1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_duplicate_limits_rejected() {
        let err = ResourceTable::new(vec![tier("a", 10.0), tier("b", 10.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
