//! # 有界最小堆（Top-K）
//!
//! 从一个候选流里挑出分数最高的 k 个，不需要对整个流排序。
//! 堆顶是当前第 k 名（最小值），新候选只有在不低于它时才可能进入：
//!
//! ```text
//! k = 3, 堆 = {-0.2, -0.9, -1.5}      堆顶 -1.5
//! 候选 -2.0 → admits = false，跳过
//! 候选 -0.5 → push 后大小为 4，弹出 -1.5
//! ```
//!
//! 精确 k-best 和 Huffman 树 DFS 共用同一个 `admits` 判定做剪枝。

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    score: f32,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // 分数相同时，索引大的视为更差，先被淘汰
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    pub fn min_score(&self) -> Option<f32> {
        self.heap.peek().map(|Reverse(c)| c.score)
    }

    /// 剪枝判定：堆满且分数低于堆顶时，这个候选（以及以它为前缀的整棵子树）不可能进入前 k
    #[inline]
    pub fn admits(&self, score: f32) -> bool {
        match self.min_score() {
            Some(min) if self.is_full() => score >= min,
            _ => true,
        }
    }

    pub fn push(&mut self, score: f32, index: usize) {
        self.heap.push(Reverse(Candidate { score, index }));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// 按分数降序输出 `(score, index)`，同分时索引小的在前
    pub fn into_sorted_vec(self) -> Vec<(f32, usize)> {
        // Reverse 的升序即分数降序
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| (c.score, c.index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_k_largest() {
        let mut top = TopK::new(3);
        for (i, s) in [-1.5f32, -0.2, -0.9, -2.0, -0.5].iter().enumerate() {
            if top.admits(*s) {
                top.push(*s, i);
            }
        }
        assert_eq!(top.into_sorted_vec(), vec![(-0.2, 1), (-0.5, 4), (-0.9, 2)]);
    }

    #[test]
    fn test_admits_until_full() {
        let mut top = TopK::new(2);
        assert!(top.admits(f32::NEG_INFINITY));
        top.push(-1.0, 0);
        assert!(top.admits(-5.0));
        top.push(-2.0, 1);
        assert!(top.is_full());
        assert!(!top.admits(-2.5));
        assert!(top.admits(-2.0));
        assert_eq!(top.min_score(), Some(-2.0));
    }

    #[test]
    fn test_ties_prefer_smaller_index() {
        let mut top = TopK::new(2);
        for i in 0..4 {
            top.push(-1.0, i);
        }
        assert_eq!(top.into_sorted_vec(), vec![(-1.0, 0), (-1.0, 1)]);
    }
}
