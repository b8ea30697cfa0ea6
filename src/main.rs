//! 合成语料上的文本分类演示
//!
//! 每个类别有一组专属词，再混入所有类别共享的噪声词。多个 rayon 工作线程
//! 各自持有一个 `Model`，共享同一对权重矩阵做无锁 SGD，最后在留出集上评估。
//!
//! ```bash
//! cargo run --release -- --loss=hs --dim=32 --epoch=10 --threads=4
//! cargo run --release -- --config=args.json --save=model.bin
//! ```

use std::sync::Arc;
use std::time::Instant;

use fasttext::{
    Args, LossName, Matrix, Model, ModelName, ModelSnapshot, Result, save_snapshot_binary,
    save_snapshot_json,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

const NUM_CLASSES: usize = 6;
const WORDS_PER_CLASS: usize = 40;
const SHARED_WORDS: usize = 60;
const TRAIN_EXAMPLES: usize = 6_000;
const TEST_EXAMPLES: usize = 600;

// CLI 解析辅助函数
fn parse_arg<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{}=", key);
    args.iter()
        .find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn parse_usize_arg(args: &[String], key: &str) -> Option<usize> {
    parse_arg(args, key).and_then(|v| v.parse::<usize>().ok())
}

fn parse_f32_arg(args: &[String], key: &str) -> Option<f32> {
    parse_arg(args, key).and_then(|v| v.parse::<f32>().ok())
}

struct Corpus {
    examples: Vec<(Vec<usize>, usize)>,
    counts: Vec<i64>,
    nwords: usize,
}

/// 生成合成语料：句子长度服从 N(8, 2)，约 70% 的词来自类别专属词表
fn synthetic_corpus(n: usize, seed: u64) -> Corpus {
    let mut rng = StdRng::seed_from_u64(seed);
    let length = Normal::new(8.0f32, 2.0).ok();
    let nwords = NUM_CLASSES * WORDS_PER_CLASS + SHARED_WORDS;

    let mut examples = Vec::with_capacity(n);
    let mut counts = vec![0i64; NUM_CLASSES];
    for _ in 0..n {
        // 类别分布不均匀，让 Huffman 树有意义
        let label = (rng.random_range(0.0f32..1.0).powi(2) * NUM_CLASSES as f32) as usize;
        let label = label.min(NUM_CLASSES - 1);
        let len = match &length {
            Some(normal) => normal.sample(&mut rng).round().max(1.0) as usize,
            None => 8,
        };
        let tokens = (0..len)
            .map(|_| {
                if rng.random_bool(0.7) {
                    label * WORDS_PER_CLASS + rng.random_range(0..WORDS_PER_CLASS)
                } else {
                    NUM_CLASSES * WORDS_PER_CLASS + rng.random_range(0..SHARED_WORDS)
                }
            })
            .collect();
        counts[label] += 1;
        examples.push((tokens, label));
    }

    Corpus {
        examples,
        counts,
        nwords,
    }
}

/// 一个工作线程：在自己的数据切片上跑完所有 epoch，学习率随进度线性衰减
fn train_worker(
    worker: usize,
    slice: &[(Vec<usize>, usize)],
    wi: Arc<Matrix>,
    wo: Arc<Matrix>,
    args: Arc<Args>,
    counts: &[i64],
) -> Result<(f32, u64)> {
    let mut model = Model::new(wi, wo, Arc::clone(&args), args.seed + worker as u64)?;
    model.set_target_counts(counts)?;

    let total = (slice.len() * args.epoch).max(1);
    let mut step = 0usize;
    for epoch in 0..args.epoch {
        for (input, label) in slice {
            let progress = step as f32 / total as f32;
            model.update(input, *label, args.lr * (1.0 - progress))?;
            step += 1;
        }
        if args.verbose > 1 {
            log::info!(
                "worker {} epoch {}: loss = {:.4}",
                worker,
                epoch,
                model.loss()
            );
        }
    }
    Ok((model.loss(), model.nexamples()))
}

fn main() -> Result<()> {
    let cli: Vec<String> = std::env::args().skip(1).collect();

    let mut args = match parse_arg(&cli, "--config") {
        Some(path) => Args::from_json_file(path)?,
        None => Args {
            dim: 32,
            epoch: 10,
            thread: 4,
            negative_table_size: 100_000,
            ..Args::supervised()
        },
    };
    args.model = ModelName::Sup;
    if let Some(loss) = parse_arg(&cli, "--loss") {
        args.loss = match loss {
            "hs" => LossName::Hs,
            "ns" => LossName::Ns,
            _ => LossName::Softmax,
        };
    }
    if let Some(dim) = parse_usize_arg(&cli, "--dim") {
        args.dim = dim;
    }
    if let Some(epoch) = parse_usize_arg(&cli, "--epoch") {
        args.epoch = epoch;
    }
    if let Some(threads) = parse_usize_arg(&cli, "--threads") {
        args.thread = threads;
    }
    if let Some(lr) = parse_f32_arg(&cli, "--lr") {
        args.lr = lr;
    }
    args.validate()?;

    // 初始化日志系统
    let level = if args.verbose > 2 {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("日志初始化失败: {}", e);
    }

    let corpus = synthetic_corpus(TRAIN_EXAMPLES + TEST_EXAMPLES, args.seed);
    let (train, test) = corpus.examples.split_at(TRAIN_EXAMPLES);
    log::info!(
        "语料: {} 训练 / {} 测试, {} 个词, {} 个类别, loss = {:?}",
        train.len(),
        test.len(),
        corpus.nwords,
        NUM_CLASSES,
        args.loss
    );

    let wi = Arc::new(Matrix::uniform(
        corpus.nwords,
        args.dim,
        1.0 / args.dim as f32,
        args.seed,
    ));
    let wo = Arc::new(Matrix::zeros(NUM_CLASSES, args.dim));
    let args = Arc::new(args);

    let start = Instant::now();
    let threads = args.thread.max(1);
    let chunk = train.len().div_ceil(threads);
    let results = train
        .par_chunks(chunk)
        .enumerate()
        .map(|(worker, slice)| {
            train_worker(
                worker,
                slice,
                Arc::clone(&wi),
                Arc::clone(&wo),
                Arc::clone(&args),
                &corpus.counts,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let seen: u64 = results.iter().map(|(_, n)| n).sum();
    let mean_loss =
        results.iter().map(|(l, n)| l * *n as f32).sum::<f32>() / seen.max(1) as f32;
    log::info!(
        "训练完成: {} 个样本, 平均 loss {:.4}, 耗时 {:.2} 秒",
        seen,
        mean_loss,
        start.elapsed().as_secs_f32()
    );

    // 评估
    let mut model = Model::new(Arc::clone(&wi), Arc::clone(&wo), Arc::clone(&args), args.seed)?;
    model.set_target_counts(&corpus.counts)?;
    let mut correct = 0usize;
    for (input, label) in test {
        let predictions = model.predict(input, 1, 0.0)?;
        if predictions.first().map(|&(_, class)| class) == Some(*label) {
            correct += 1;
        }
    }
    log::info!(
        "P@1 = {:.3} ({} / {})",
        correct as f32 / test.len() as f32,
        correct,
        test.len()
    );

    if let Some((input, label)) = test.first() {
        for (log_prob, class) in model.predict(input, 3, 0.0)? {
            log::info!(
                "  样本标签 {} → 类别 {} p = {:.4}",
                label,
                class,
                log_prob.exp()
            );
        }
    }

    if let Some(path) = parse_arg(&cli, "--save") {
        let snapshot = ModelSnapshot::from_model(&model);
        if path.ends_with(".json") {
            save_snapshot_json(&snapshot, path)?;
        } else {
            save_snapshot_binary(&snapshot, path)?;
        }
    }

    Ok(())
}
