//! # 负采样表
//!
//! 类别 `i` 在表中出现的次数正比于 `sqrt(count_i)`：
//!
//! ```text
//! reps_i = floor(sqrt(count_i) * table_size / Σ_j sqrt(count_j))
//! ```
//!
//! 构造时洗牌一次，之后用一个循环游标顺序读取，跳过真实目标。
//! 表项存为 `u32`，默认一千万项占 40 MB。

use rand::Rng;
use rand::seq::SliceRandom;

#[derive(Clone, Debug, Default)]
pub struct NegativeTable {
    table: Vec<u32>,
    cursor: usize,
    distinct: usize,
}

impl NegativeTable {
    pub fn new<R: Rng + ?Sized>(counts: &[i64], table_size: usize, rng: &mut R) -> Self {
        let z: f64 = counts.iter().map(|&c| (c.max(0) as f64).sqrt()).sum();
        let mut table = Vec::with_capacity(table_size);
        let mut distinct = 0;
        if z > 0.0 {
            for (i, &c) in counts.iter().enumerate() {
                let reps = ((c.max(0) as f64).sqrt() * table_size as f64 / z).floor() as usize;
                if reps > 0 {
                    distinct += 1;
                }
                table.extend(std::iter::repeat_n(i as u32, reps));
            }
        }
        table.shuffle(rng);
        log::debug!("负采样表构造完成: {} 项, {} 个类别", table.len(), counts.len());
        Self {
            table,
            cursor: 0,
            distinct,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 表中实际出现的类别数
    pub fn distinct_classes(&self) -> usize {
        self.distinct
    }

    /// 取下一个不等于 `target` 的类别
    ///
    /// 表中找不到非目标类别（空表，或只有一个类别）时返回 `None`。
    pub fn next(&mut self, target: usize) -> Option<usize> {
        for _ in 0..self.table.len() {
            let negative = self.table[self.cursor] as usize;
            self.cursor = (self.cursor + 1) % self.table.len();
            if negative != target {
                return Some(negative);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_never_returns_target() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut table = NegativeTable::new(&[100, 50, 10, 1], 10_000, &mut rng);
        for _ in 0..5_000 {
            assert_ne!(table.next(0), Some(0));
            assert!(table.next(0).is_some());
        }
    }

    #[test]
    fn test_empirical_frequency() {
        let counts = [400i64, 100, 25, 4];
        let mut rng = StdRng::seed_from_u64(42);
        let mut table = NegativeTable::new(&counts, 100_000, &mut rng);

        // target 取一个不存在的类别，所有样本都会被计数
        let draws = 100_000;
        let mut seen = [0usize; 4];
        for _ in 0..draws {
            seen[table.next(usize::MAX).unwrap()] += 1;
        }

        let z: f64 = counts.iter().map(|&c| (c as f64).sqrt()).sum();
        for (i, &c) in counts.iter().enumerate() {
            let expected = (c as f64).sqrt() / z;
            let actual = seen[i] as f64 / draws as f64;
            assert!((expected - actual).abs() < 0.01, "class {i}: {expected} vs {actual}");
        }
    }

    #[test]
    fn test_only_target_available() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut table = NegativeTable::new(&[10], 100, &mut rng);
        assert_eq!(table.next(0), None);
        assert_eq!(table.distinct_classes(), 1);

        let mut empty = NegativeTable::new(&[], 100, &mut rng);
        assert!(empty.is_empty());
        assert_eq!(empty.next(0), None);
        assert_eq!(empty.distinct_classes(), 0);
    }

    #[test]
    fn test_distinct_classes_skips_floored_counts() {
        let mut rng = StdRng::seed_from_u64(4);
        // sqrt(1) * 10 / (sqrt(10000) + 1) < 1，类别 1 没有表项
        let table = NegativeTable::new(&[10_000, 1], 10, &mut rng);
        assert_eq!(table.distinct_classes(), 1);
        assert!(table.len() <= 10);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let counts = [9i64, 4, 1];
        let mut a = NegativeTable::new(&counts, 600, &mut StdRng::seed_from_u64(5));
        let mut b = NegativeTable::new(&counts, 600, &mut StdRng::seed_from_u64(5));
        for _ in 0..600 {
            assert_eq!(a.next(9), b.next(9));
        }
    }
}
