//! # Huffman 编码树（层次 softmax）
//!
//! 层次 softmax 把 `osz` 路的 softmax 换成一棵二叉树上的 `O(log osz)` 次二分类。
//! 用 Huffman 树可以让高频类别路径更短，期望路径长度最小。
//!
//! ## 节点布局
//!
//! ```text
//! 索引 0 .. osz-1        叶子，对应输出类别
//! 索引 osz .. 2*osz-2    内部节点，按构造顺序编号；根是 2*osz-2
//! 内部节点 n  ←→  输出矩阵第 n - osz 行
//! ```
//!
//! ## 双指针构造
//!
//! 叶子按计数从小到大取，新建的内部节点计数天然单调不减，于是两条有序序列
//! 各用一个指针，每次从两边挑最小的两个合并，整体 O(osz)。
//! 叶子顺序在构造前按计数降序稳定排序一次（O(osz log osz)），
//! 调用方传入的计数已经降序时（词典的常规顺序）结果与经典实现完全一致。

use crate::HUFFMAN_COUNT_SENTINEL;

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub count: i64,
    /// 作为父节点第二个子节点时为 true，即该分支的编码位
    pub binary: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            count: HUFFMAN_COUNT_SENTINEL,
            binary: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HuffmanTree {
    osz: usize,
    nodes: Vec<Node>,
    /// 每个叶子到根经过的内部节点（已减去 osz，即输出矩阵行号）
    paths: Vec<Vec<usize>>,
    codes: Vec<Vec<bool>>,
}

impl HuffmanTree {
    pub fn build(counts: &[i64]) -> Self {
        let osz = counts.len();
        if osz == 0 {
            return Self {
                osz,
                nodes: Vec::new(),
                paths: Vec::new(),
                codes: Vec::new(),
            };
        }

        let mut nodes = vec![Node::default(); 2 * osz - 1];
        for (node, &count) in nodes.iter_mut().zip(counts) {
            node.count = count;
        }

        // 降序稳定排序后从尾部取，等价于按计数从小到大取叶子
        let mut order: Vec<usize> = (0..osz).collect();
        order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));

        let mut leaf = osz;
        let mut node = osz;
        for i in osz..2 * osz - 1 {
            let mut mini = [0usize; 2];
            for slot in mini.iter_mut() {
                if leaf > 0 && nodes[order[leaf - 1]].count < nodes[node].count {
                    leaf -= 1;
                    *slot = order[leaf];
                } else {
                    *slot = node;
                    node += 1;
                }
            }
            nodes[i].left = Some(mini[0]);
            nodes[i].right = Some(mini[1]);
            nodes[i].count = nodes[mini[0]].count + nodes[mini[1]].count;
            nodes[mini[0]].parent = Some(i);
            nodes[mini[1]].parent = Some(i);
            nodes[mini[1]].binary = true;
        }

        let mut paths = Vec::with_capacity(osz);
        let mut codes = Vec::with_capacity(osz);
        for i in 0..osz {
            let mut path = Vec::new();
            let mut code = Vec::new();
            let mut j = i;
            while let Some(parent) = nodes[j].parent {
                path.push(parent - osz);
                code.push(nodes[j].binary);
                j = parent;
            }
            paths.push(path);
            codes.push(code);
        }

        log::debug!(
            "Huffman 树构造完成: {} 个叶子, 最大深度 {}",
            osz,
            paths.iter().map(Vec::len).max().unwrap_or(0)
        );

        Self {
            osz,
            nodes,
            paths,
            codes,
        }
    }

    pub fn osz(&self) -> usize {
        self.osz
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn node(&self, i: usize) -> &Node {
        &self.nodes[i]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_leaf(&self, i: usize) -> bool {
        self.nodes[i].left.is_none() && self.nodes[i].right.is_none()
    }

    pub fn path(&self, target: usize) -> &[usize] {
        &self.paths[target]
    }

    pub fn code(&self, target: usize) -> &[bool] {
        &self.codes[target]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prefix_free(tree: &HuffmanTree) -> bool {
        // 编码按根到叶子的顺序比较
        let codes: Vec<Vec<bool>> = (0..tree.osz())
            .map(|i| tree.code(i).iter().rev().copied().collect())
            .collect();
        for (a, ca) in codes.iter().enumerate() {
            for (b, cb) in codes.iter().enumerate() {
                if a != b && cb.len() >= ca.len() && cb[..ca.len()] == ca[..] {
                    return false;
                }
            }
        }
        true
    }

    #[test]
    fn test_ascending_counts_merge_smallest_first() {
        let tree = HuffmanTree::build(&[1, 2, 3, 4]);
        assert_eq!(tree.nodes().len(), 7);

        // 第一个内部节点合并计数最小的两个叶子
        let first = tree.node(4);
        assert_eq!(first.count, 3);
        let mut children = [first.left.unwrap(), first.right.unwrap()];
        children.sort();
        assert_eq!(children, [0, 1]);

        assert_eq!(tree.node(tree.root()).count, 10);
        assert_eq!(tree.path(3).len(), 1);
        assert_eq!(tree.path(2).len(), 2);
        assert_eq!(tree.path(0).len(), 3);
        assert!(is_prefix_free(&tree));
    }

    #[test]
    fn test_descending_counts_classic_layout() {
        let tree = HuffmanTree::build(&[4, 3, 2, 1]);
        let first = tree.node(4);
        assert_eq!(first.left, Some(3));
        assert_eq!(first.right, Some(2));
        assert!(tree.node(2).binary);
        assert!(!tree.node(3).binary);
        assert!(is_prefix_free(&tree));
    }

    #[test]
    fn test_paths_end_at_root_row() {
        let counts: Vec<i64> = (1..=37).rev().collect();
        let tree = HuffmanTree::build(&counts);
        let osz = counts.len();
        for i in 0..osz {
            assert_eq!(tree.path(i).len(), tree.code(i).len());
            assert_eq!(*tree.path(i).last().unwrap(), osz - 2);
            assert!(tree.path(i).iter().all(|&row| row < osz - 1));
            // 路径长度有界
            assert!(tree.path(i).len() <= osz - 1);
        }
        assert!(is_prefix_free(&tree));
    }

    #[test]
    fn test_single_class() {
        let tree = HuffmanTree::build(&[5]);
        assert_eq!(tree.root(), 0);
        assert!(tree.is_leaf(0));
        assert!(tree.path(0).is_empty());
    }
}
