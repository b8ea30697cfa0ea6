//! # 浅层线性模型（训练与推理核心）
//!
//! 把一组离散 token 映射为隐藏向量，再映射为输出词表上的概率分布。
//!
//! ```text
//! input tokens ──▶ hidden = mean(W_in[t])         (hsz 维)
//!                     │
//!                     ├─ 训练: 损失策略 ──▶ grad ──▶ W_in[t] += grad
//!                     │          └──▶ W_out[row] += alpha * hidden
//!                     │
//!                     └─ 预测: softmax k-best / Huffman 树 DFS
//! ```
//!
//! ## 三种损失策略
//!
//! | 策略 | 单样本代价 | 输出矩阵行 |
//! |------|-----------|-----------|
//! | 负采样 | O(neg) | 每个类别一行 |
//! | 层次 softmax | O(log osz) | 每个内部节点一行 |
//! | 完整 softmax | O(osz) | 每个类别一行 |
//!
//! 策略在构造时根据 `Args::loss` 选定，实例生命周期内不变。
//!
//! ## 并发
//!
//! 每个工作线程一个 `Model`，共享 `Arc<Matrix>` 权重，各自持有隐藏/输出/梯度缓冲、
//! 随机数生成器和辅助表。行更新不加锁，见 [`crate::matrix`]。

use std::sync::Arc;

use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{
    approx::{ApproxTables, exact_sigmoid, stable_log},
    args::{Args, LossName},
    error::{ModelError, Result},
    huffman::HuffmanTree,
    matrix::Matrix,
    negatives::NegativeTable,
    quant_matrix::QuantMatrix,
    top_k::TopK,
    utils::softmax_in_place,
};

/// 损失策略及其辅助表
///
/// 负采样表与 Huffman 树在 `set_target_counts` 之前为 `None`。
enum LossStrategy {
    NegativeSampling(Option<NegativeTable>),
    HierarchicalSoftmax(Option<HuffmanTree>),
    Softmax,
}

impl LossStrategy {
    fn from_loss(loss: LossName) -> Self {
        match loss {
            LossName::Ns => LossStrategy::NegativeSampling(None),
            LossName::Hs => LossStrategy::HierarchicalSoftmax(None),
            LossName::Softmax => LossStrategy::Softmax,
        }
    }

    fn tree(&self) -> Option<&HuffmanTree> {
        match self {
            LossStrategy::HierarchicalSoftmax(tree) => tree.as_ref(),
            _ => None,
        }
    }
}

/// 每个实例私有的计算缓冲
struct Scratch {
    hidden: Array1<f32>,
    output: Array1<f32>,
    grad: Array1<f32>,
}

/// 只读部分：共享权重、配置与查表
struct Weights {
    wi: Arc<Matrix>,
    wo: Arc<Matrix>,
    qwi: Option<Arc<QuantMatrix>>,
    qwo: Option<Arc<QuantMatrix>>,
    quant: bool,
    qout: bool,
    args: Arc<Args>,
    tables: ApproxTables,
    hsz: usize,
    osz: usize,
}

impl Weights {
    #[inline]
    fn verbose(&self) -> bool {
        self.args.verbose > 2
    }

    fn check_tokens(&self, input: &[usize]) -> Result<()> {
        let rows = match (&self.qwi, self.quant) {
            (Some(qwi), true) => qwi.rows(),
            _ => self.wi.rows(),
        };
        match input.iter().find(|&&t| t >= rows) {
            Some(&token) => Err(ModelError::TokenOutOfRange { token, rows }),
            None => Ok(()),
        }
    }

    /// hidden = 输入 token 嵌入行的平均值
    fn compute_hidden(&self, input: &[usize], hidden: &mut Array1<f32>) {
        debug_assert_eq!(hidden.len(), self.hsz);
        hidden.fill(0.0);
        for &token in input {
            match (&self.qwi, self.quant) {
                (Some(qwi), true) => qwi.add_row_to(hidden, token, 1.0),
                _ => self.wi.add_row_to(hidden, token, 1.0),
            }
            if self.verbose() {
                log::debug!("hidden 累加输入 [{}] 行, 维度 {}", token, self.hsz);
            }
        }
        *hidden *= 1.0 / input.len() as f32;
    }

    #[inline]
    fn quantized_output(&self) -> Option<&QuantMatrix> {
        match (&self.qwo, self.quant && self.qout) {
            (Some(qwo), true) => Some(qwo.as_ref()),
            _ => None,
        }
    }

    #[inline]
    fn dot_output_row(&self, hidden: &Array1<f32>, row: usize) -> f32 {
        match self.quantized_output() {
            Some(qwo) => qwo.dot_row(hidden, row),
            None => self.wo.dot_row(hidden, row),
        }
    }

    /// output = softmax(W_out · hidden)
    fn compute_output_softmax(&self, hidden: &Array1<f32>, output: &mut Array1<f32>) {
        match self.quantized_output() {
            Some(qwo) => qwo.mul_vector(hidden, output),
            None => self.wo.mul_vector(hidden, output),
        }
        softmax_in_place(output);
    }

    /// **二元逻辑回归单元**
    ///
    /// ```text
    /// score = σ(W_out[target] · hidden)
    /// alpha = lr * (label - score)
    /// grad          += alpha * W_out[target]
    /// W_out[target] += alpha * hidden
    /// ```
    ///
    /// 训练期间修改输出矩阵的唯一位置。返回该项的负对数似然。
    fn binary_logistic(&self, scratch: &mut Scratch, target: usize, label: bool, lr: f32) -> f32 {
        let score = self
            .tables
            .sigmoid(self.wo.dot_row(&scratch.hidden, target));
        let alpha = lr * (label as u8 as f32 - score);
        self.wo.add_row_to(&mut scratch.grad, target, alpha);
        self.wo.add_row(&scratch.hidden, target, alpha);
        if label {
            -self.tables.log(score)
        } else {
            -self.tables.log(1.0 - score)
        }
    }

    fn negative_sampling(
        &self,
        scratch: &mut Scratch,
        table: &mut NegativeTable,
        target: usize,
        lr: f32,
    ) -> f32 {
        scratch.grad.fill(0.0);
        let mut loss = self.binary_logistic(scratch, target, true, lr);
        for _ in 0..self.args.neg {
            // 退化表（空表或单类别）在 set_target_counts 时已告警
            let Some(negative) = table.next(target) else {
                break;
            };
            loss += self.binary_logistic(scratch, negative, false, lr);
        }
        loss
    }

    fn hierarchical_softmax(
        &self,
        scratch: &mut Scratch,
        tree: &HuffmanTree,
        target: usize,
        lr: f32,
    ) -> f32 {
        scratch.grad.fill(0.0);
        tree.path(target)
            .iter()
            .zip(tree.code(target))
            .map(|(&row, &bit)| self.binary_logistic(scratch, row, bit, lr))
            .sum()
    }

    fn softmax(&self, scratch: &mut Scratch, target: usize, lr: f32) -> f32 {
        scratch.grad.fill(0.0);
        self.compute_output_softmax(&scratch.hidden, &mut scratch.output);
        for i in 0..self.osz {
            let label = if i == target { 1.0 } else { 0.0 };
            // label - output 即损失对 logit 的负梯度
            let alpha = lr * (label - scratch.output[i]);
            self.wo.add_row_to(&mut scratch.grad, i, alpha);
            self.wo.add_row(&scratch.hidden, i, alpha);
        }
        -self.tables.log(scratch.output[target])
    }

    fn find_k_best(
        &self,
        threshold: f32,
        top: &mut TopK,
        hidden: &Array1<f32>,
        output: &mut Array1<f32>,
    ) {
        self.compute_output_softmax(hidden, output);
        if self.verbose() {
            log::debug!("find_k_best 遍历 {} 个类别", self.osz);
        }
        for (i, &p) in output.iter().enumerate() {
            if p < threshold {
                continue;
            }
            let score = stable_log(p);
            if !top.admits(score) {
                continue;
            }
            if self.verbose() {
                log::debug!("find_k_best 入堆 {},{}", score, i);
            }
            top.push(score, i);
        }
    }

    /// **Huffman 树剪枝深度优先搜索**
    ///
    /// `score` 是根到 `node` 路径上的对数概率累加，只会越走越小，
    /// 因此一旦低于阈值或堆顶就可以剪掉整棵子树。
    fn dfs(
        &self,
        tree: &HuffmanTree,
        threshold: f32,
        node: usize,
        score: f32,
        top: &mut TopK,
        hidden: &Array1<f32>,
    ) {
        if self.verbose() {
            log::debug!("dfs {},{},{}", threshold, node, score);
        }
        if score < stable_log(threshold) || !top.admits(score) {
            return;
        }

        if tree.is_leaf(node) {
            top.push(score, node);
            return;
        }

        let f = exact_sigmoid(self.dot_output_row(hidden, node - tree.osz()));
        let n = tree.node(node);
        if let Some(left) = n.left {
            self.dfs(tree, threshold, left, score + stable_log(1.0 - f), top, hidden);
        }
        if let Some(right) = n.right {
            self.dfs(tree, threshold, right, score + stable_log(f), top, hidden);
        }
    }

    fn predict(
        &self,
        strategy: &LossStrategy,
        input: &[usize],
        k: usize,
        threshold: f32,
        hidden: &mut Array1<f32>,
        output: &mut Array1<f32>,
    ) -> Result<Vec<(f32, usize)>> {
        if k == 0 {
            return Err(ModelError::InvalidArgument(
                "k needs to be 1 or higher".to_string(),
            ));
        }
        if !self.args.model.is_supervised() {
            return Err(ModelError::InvalidArgument(
                "model needs to be supervised for prediction".to_string(),
            ));
        }
        if hidden.len() != self.hsz || output.len() != self.osz {
            return Err(ModelError::ShapeMismatch(format!(
                "hidden/output buffers are {}/{}, expected {}/{}",
                hidden.len(),
                output.len(),
                self.hsz,
                self.osz
            )));
        }
        self.check_tokens(input)?;
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let mut top = TopK::new(k);
        self.compute_hidden(input, hidden);
        match strategy {
            LossStrategy::HierarchicalSoftmax(Some(tree)) if tree.is_empty() => {}
            LossStrategy::HierarchicalSoftmax(Some(tree)) => {
                self.dfs(tree, threshold, tree.root(), 0.0, &mut top, hidden);
            }
            LossStrategy::HierarchicalSoftmax(None) => {
                return Err(ModelError::TablesNotBuilt("hierarchical softmax"));
            }
            _ => self.find_k_best(threshold, &mut top, hidden, output),
        }
        Ok(top.into_sorted_vec())
    }
}

pub struct Model {
    weights: Weights,
    scratch: Scratch,
    strategy: LossStrategy,
    rng: StdRng,
    loss: f64,
    nexamples: u64,
}

impl Model {
    /// **创建模型实例**
    ///
    /// # 参数
    /// - `wi`: 嵌入矩阵 (词表 + 子词/标签 × dim)，多个实例共享
    /// - `wo`: 输出矩阵 (osz × dim)，多个实例共享
    /// - `args`: 配置，决定损失策略和模型类型
    /// - `seed`: 实例随机数种子，种子相同则负采样表顺序相同
    pub fn new(wi: Arc<Matrix>, wo: Arc<Matrix>, args: Arc<Args>, seed: u64) -> Result<Self> {
        args.validate()?;
        if wi.cols() != args.dim || wo.cols() != args.dim {
            return Err(ModelError::ShapeMismatch(format!(
                "input {}x{} / output {}x{} vs dim {}",
                wi.rows(),
                wi.cols(),
                wo.rows(),
                wo.cols(),
                args.dim
            )));
        }

        let hsz = args.dim;
        let osz = wo.rows();
        if args.verbose > 2 {
            log::debug!(
                "模型初始化: input={}:{} output={}:{} loss={:?}",
                wi.rows(),
                wi.cols(),
                wo.rows(),
                wo.cols(),
                args.loss
            );
        }

        Ok(Self {
            strategy: LossStrategy::from_loss(args.loss),
            weights: Weights {
                wi,
                wo,
                qwi: None,
                qwo: None,
                quant: false,
                qout: false,
                args,
                tables: ApproxTables::new(),
                hsz,
                osz,
            },
            scratch: Scratch {
                hidden: Array1::zeros(hsz),
                output: Array1::zeros(osz),
                grad: Array1::zeros(hsz),
            },
            rng: StdRng::seed_from_u64(seed),
            loss: 0.0,
            nexamples: 0,
        })
    }

    /// **安装量化矩阵（仅推理）**
    ///
    /// `qout` 为 true 时输出层也走量化矩阵。两个量化矩阵的列数必须等于 `dim`，
    /// `qwo` 的行数必须等于输出矩阵行数；形状不符时返回 `ShapeMismatch`，模型保持不变。
    /// 安装后 `update` 会被拒绝。
    pub fn set_quantized(
        &mut self,
        qwi: Arc<QuantMatrix>,
        qwo: Arc<QuantMatrix>,
        qout: bool,
    ) -> Result<()> {
        let w = &self.weights;
        if qwi.cols() != w.hsz || qwo.cols() != w.hsz || qwo.rows() != w.wo.rows() {
            return Err(ModelError::ShapeMismatch(format!(
                "quantized input {}x{} / output {}x{} vs dim {} and {} output rows",
                qwi.rows(),
                qwi.cols(),
                qwo.rows(),
                qwo.cols(),
                w.hsz,
                w.wo.rows()
            )));
        }
        self.weights.qwi = Some(qwi);
        self.weights.qwo = Some(qwo);
        self.weights.quant = true;
        self.weights.qout = qout;
        Ok(())
    }

    /// **根据输出类别频次构建辅助表**
    ///
    /// 负采样构建采样表，层次 softmax 构建 Huffman 树，完整 softmax 无需任何表。
    pub fn set_target_counts(&mut self, counts: &[i64]) -> Result<()> {
        if counts.len() != self.weights.osz {
            return Err(ModelError::CountsMismatch {
                expected: self.weights.osz,
                actual: counts.len(),
            });
        }
        match &mut self.strategy {
            LossStrategy::NegativeSampling(table) => {
                let built = NegativeTable::new(
                    counts,
                    self.weights.args.negative_table_size,
                    &mut self.rng,
                );
                if built.distinct_classes() < 2 {
                    log::warn!(
                        "负采样表只含 {} 个类别 ({} 项)，训练时将跳过负样本",
                        built.distinct_classes(),
                        built.len()
                    );
                }
                *table = Some(built);
            }
            LossStrategy::HierarchicalSoftmax(tree) => {
                *tree = Some(HuffmanTree::build(counts));
            }
            LossStrategy::Softmax => {}
        }
        Ok(())
    }

    /// **单样本训练步**
    ///
    /// 1. hidden = 输入行平均
    /// 2. 按配置的损失策略计算损失，累积梯度并更新输出矩阵
    /// 3. 有监督模式下梯度除以 |input|
    /// 4. 梯度加到每个输入 token 的嵌入行
    ///
    /// 输入为空时什么都不做。
    pub fn update(&mut self, input: &[usize], target: usize, lr: f32) -> Result<()> {
        let w = &self.weights;
        if target >= w.osz {
            return Err(ModelError::TargetOutOfRange {
                target,
                osz: w.osz,
            });
        }
        if w.quant {
            return Err(ModelError::InvalidArgument(
                "quantized model cannot be trained".to_string(),
            ));
        }
        match &self.strategy {
            LossStrategy::NegativeSampling(None) => {
                return Err(ModelError::TablesNotBuilt("negative sampling"));
            }
            LossStrategy::HierarchicalSoftmax(None) => {
                return Err(ModelError::TablesNotBuilt("hierarchical softmax"));
            }
            _ => {}
        }
        if input.is_empty() {
            return Ok(());
        }
        w.check_tokens(input)?;

        let scratch = &mut self.scratch;
        w.compute_hidden(input, &mut scratch.hidden);
        let loss = match &mut self.strategy {
            LossStrategy::NegativeSampling(Some(table)) => {
                w.negative_sampling(scratch, table, target, lr)
            }
            LossStrategy::HierarchicalSoftmax(Some(tree)) => {
                w.hierarchical_softmax(scratch, tree, target, lr)
            }
            LossStrategy::Softmax => w.softmax(scratch, target, lr),
            _ => return Ok(()),
        };
        self.loss += loss as f64;
        self.nexamples += 1;

        if w.args.model.is_supervised() {
            scratch.grad *= 1.0 / input.len() as f32;
        }
        for &token in input {
            w.wi.add_row(&scratch.grad, token, 1.0);
        }
        Ok(())
    }

    /// **预测前 k 个类别**
    ///
    /// 返回按对数概率降序排列的 `(log_prob, class)`。
    /// 层次 softmax 走 Huffman 树 DFS，其余走完整 softmax 的 k-best。
    pub fn predict(&mut self, input: &[usize], k: usize, threshold: f32) -> Result<Vec<(f32, usize)>> {
        self.weights.predict(
            &self.strategy,
            input,
            k,
            threshold,
            &mut self.scratch.hidden,
            &mut self.scratch.output,
        )
    }

    /// 使用调用方提供的缓冲预测，多个线程可以共享同一个 `&Model`
    pub fn predict_with(
        &self,
        input: &[usize],
        k: usize,
        threshold: f32,
        hidden: &mut Array1<f32>,
        output: &mut Array1<f32>,
    ) -> Result<Vec<(f32, usize)>> {
        self.weights
            .predict(&self.strategy, input, k, threshold, hidden, output)
    }

    pub fn compute_hidden(&self, input: &[usize], hidden: &mut Array1<f32>) -> Result<()> {
        if input.is_empty() {
            return Err(ModelError::InvalidArgument("empty input".to_string()));
        }
        if hidden.len() != self.weights.hsz {
            return Err(ModelError::ShapeMismatch(format!(
                "hidden has {} entries, expected {}",
                hidden.len(),
                self.weights.hsz
            )));
        }
        self.weights.check_tokens(input)?;
        self.weights.compute_hidden(input, hidden);
        Ok(())
    }

    pub fn compute_output_softmax(&self, hidden: &Array1<f32>, output: &mut Array1<f32>) -> Result<()> {
        if hidden.len() != self.weights.hsz || output.len() != self.weights.osz {
            return Err(ModelError::ShapeMismatch(format!(
                "hidden/output are {}/{}, expected {}/{}",
                hidden.len(),
                output.len(),
                self.weights.hsz,
                self.weights.osz
            )));
        }
        self.weights.compute_output_softmax(hidden, output);
        Ok(())
    }

    /// 从负采样表取下一个非目标类别；非负采样模式或表未构建时为 `None`
    pub fn get_negative(&mut self, target: usize) -> Option<usize> {
        match &mut self.strategy {
            LossStrategy::NegativeSampling(Some(table)) => table.next(target),
            _ => None,
        }
    }

    /// 平均损失 = 累计损失 / 样本数，尚未训练时为 0
    pub fn loss(&self) -> f32 {
        if self.nexamples == 0 {
            0.0
        } else {
            (self.loss / self.nexamples as f64) as f32
        }
    }

    pub fn nexamples(&self) -> u64 {
        self.nexamples
    }

    pub fn hsz(&self) -> usize {
        self.weights.hsz
    }

    pub fn osz(&self) -> usize {
        self.weights.osz
    }

    pub fn args(&self) -> &Args {
        &self.weights.args
    }

    pub fn input_matrix(&self) -> &Arc<Matrix> {
        &self.weights.wi
    }

    pub fn output_matrix(&self) -> &Arc<Matrix> {
        &self.weights.wo
    }

    pub fn tree(&self) -> Option<&HuffmanTree> {
        self.strategy.tree()
    }

    pub fn sigmoid(&self, x: f32) -> f32 {
        self.weights.tables.sigmoid(x)
    }

    pub fn log(&self, x: f32) -> f32 {
        self.weights.tables.log(x)
    }
}
