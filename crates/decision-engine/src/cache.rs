//! 求值缓存层
//!
//! 五张彼此独立的记忆化表：正则、字段路径切分、日期解析、球面距离、归一化参数。
//! 读路径直接查 DashMap 不加表级锁；未命中时只锁当前表的填充锁，
//! 二次检查后再计算，保证每个键最多计算一次，且不会阻塞其他表。

use crate::operators::geo::{GeoPoint, haversine_km};
use crate::operators::params::NormalizedParam;
use crate::operators::temporal::parse_timestamp_literal;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// 单张记忆化表
pub struct MemoTable<K, V> {
    name: &'static str,
    entries: DashMap<K, V>,
    fill_lock: Mutex<()>,
    computations: AtomicUsize,
    max_entries: usize,
}

impl<K, V> MemoTable<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// `max_entries` 为 0 表示不限制
    pub fn new(name: &'static str, max_entries: usize) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            fill_lock: Mutex::new(()),
            computations: AtomicUsize::new(0),
            max_entries,
        }
    }

    /// 查找缓存值，未命中时计算并写入
    pub fn get_or_insert_with<Q>(&self, key: &Q, compute: impl FnOnce() -> V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(hit) = self.entries.get(key) {
            return hit.value().clone();
        }

        let _guard = self.fill_lock.lock();
        if let Some(hit) = self.entries.get(key) {
            return hit.value().clone();
        }

        let value = compute();
        self.computations.fetch_add(1, Ordering::Relaxed);

        if self.max_entries > 0 && self.entries.len() >= self.max_entries {
            debug!(table = self.name, capacity = self.max_entries, "缓存表已满，整体清空");
            self.entries.clear();
        }
        self.entries.insert(key.to_owned(), value.clone());
        trace!(table = self.name, size = self.entries.len(), "缓存写入");

        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 累计计算次数（即未命中次数）
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        let _guard = self.fill_lock.lock();
        self.entries.clear();
    }
}

/// 各缓存表的计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub regex: usize,
    pub path: usize,
    pub date: usize,
    pub distance: usize,
    pub param: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.regex + self.path + self.date + self.distance + self.param
    }
}

/// 坐标按 6 位小数量化后的距离缓存键
type DistanceKey = (i64, i64, i64, i64);

fn quantize(degrees: f64) -> i64 {
    (degrees * 1e6).round() as i64
}

/// 引擎持有的全部缓存
pub struct EngineCaches {
    regex: MemoTable<String, Option<Arc<Regex>>>,
    paths: MemoTable<String, Arc<[String]>>,
    dates: MemoTable<String, Option<DateTime<Utc>>>,
    distances: MemoTable<DistanceKey, f64>,
    params: MemoTable<String, Option<Arc<NormalizedParam>>>,
}

impl EngineCaches {
    pub fn new(max_entries: usize) -> Self {
        Self {
            regex: MemoTable::new("regex", max_entries),
            paths: MemoTable::new("path", max_entries),
            dates: MemoTable::new("date", max_entries),
            distances: MemoTable::new("distance", max_entries),
            params: MemoTable::new("param", max_entries),
        }
    }

    /// 编译（或取缓存的）正则，非法模式缓存为 None
    pub fn regex(&self, pattern: &str) -> Option<Arc<Regex>> {
        self.regex.get_or_insert_with(pattern, || match Regex::new(pattern) {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                debug!(pattern, error = %e, "正则表达式无效");
                None
            }
        })
    }

    /// 按 `.` 切分字段路径
    pub fn split_path(&self, path: &str) -> Arc<[String]> {
        self.paths
            .get_or_insert_with(path, || path.split('.').map(str::to_string).collect())
    }

    /// 解析时间字面量，无法解析的结果同样缓存
    pub fn parse_date(&self, literal: &str) -> Option<DateTime<Utc>> {
        self.dates
            .get_or_insert_with(literal, || parse_timestamp_literal(literal))
    }

    /// 两点间的大圆距离（公里）
    pub fn distance_km(&self, a: GeoPoint, b: GeoPoint) -> f64 {
        let key = (quantize(a.lat), quantize(a.lon), quantize(b.lat), quantize(b.lon));
        self.distances.get_or_insert_with(&key, || haversine_km(a, b))
    }

    /// 归一化操作符参数，`canonical_key` 需唯一标识参数种类和原始值
    pub fn param(
        &self,
        canonical_key: &str,
        normalize: impl FnOnce() -> Option<NormalizedParam>,
    ) -> Option<Arc<NormalizedParam>> {
        self.params
            .get_or_insert_with(canonical_key, || normalize().map(Arc::new))
    }

    pub fn sizes(&self) -> CacheStats {
        CacheStats {
            regex: self.regex.len(),
            path: self.paths.len(),
            date: self.dates.len(),
            distance: self.distances.len(),
            param: self.params.len(),
        }
    }

    /// 各表累计计算次数
    pub fn computations(&self) -> CacheStats {
        CacheStats {
            regex: self.regex.computations(),
            path: self.paths.computations(),
            date: self.dates.computations(),
            distance: self.distances.computations(),
            param: self.params.computations(),
        }
    }

    pub fn clear_all(&self) {
        self.regex.clear();
        self.paths.clear();
        self.dates.clear();
        self.distances.clear();
        self.params.clear();
    }
}

impl Default for EngineCaches {
    fn default() -> Self {
        Self::new(0)
    }
}
