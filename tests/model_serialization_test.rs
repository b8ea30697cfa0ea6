// 模型快照测试

use std::sync::Arc;

use fasttext::{
    Args, LossName, Matrix, Model, ModelName, ModelSnapshot, load_snapshot_auto,
    load_snapshot_binary, load_snapshot_json, save_snapshot_binary, save_snapshot_json,
};

fn trained_model() -> Model {
    let args = Arc::new(Args {
        dim: 6,
        loss: LossName::Hs,
        model: ModelName::Sup,
        verbose: 0,
        ..Args::default()
    });
    let wi = Arc::new(Matrix::uniform(12, 6, 1.0 / 6.0, 1));
    let wo = Arc::new(Matrix::zeros(4, 6));
    let mut model = Model::new(wi, wo, args, 0).unwrap();
    model.set_target_counts(&[40, 30, 20, 10]).unwrap();
    for step in 0..200 {
        let class = step % 4;
        model.update(&[class * 3, class * 3 + 1], class, 0.1).unwrap();
    }
    model
}

fn reload(snapshot: ModelSnapshot) -> Model {
    let (wi, wo, args) = snapshot.into_parts().unwrap();
    let mut model = Model::new(wi, wo, args, 0).unwrap();
    model.set_target_counts(&[40, 30, 20, 10]).unwrap();
    model
}

#[test]
fn test_binary_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    let mut model = trained_model();
    let snapshot = ModelSnapshot::from_model(&model);
    assert!(save_snapshot_binary(&snapshot, &path).is_ok(), "Failed to save model");
    assert!(path.exists());

    let loaded = match load_snapshot_binary(&path) {
        Ok(s) => s,
        Err(e) => panic!("Failed to load model: {}", e),
    };
    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.metadata.nexamples, 200);

    let mut restored = reload(loaded);
    assert_eq!(
        restored.input_matrix().to_vec(),
        model.input_matrix().to_vec()
    );
    for class in 0..4 {
        let input = [class * 3, class * 3 + 1];
        assert_eq!(
            restored.predict(&input, 2, 0.0).unwrap(),
            model.predict(&input, 2, 0.0).unwrap()
        );
    }

    println!("✓ 二进制格式保存/加载测试通过!");
}

#[test]
fn test_json_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    let model = trained_model();
    let snapshot = ModelSnapshot::from_model(&model);
    assert!(save_snapshot_json(&snapshot, &path).is_ok(), "Failed to save model");

    let loaded = load_snapshot_json(&path).unwrap();
    assert_eq!(loaded.args, snapshot.args);
    assert_eq!(loaded.input.shape, (12, 6));
    assert_eq!(loaded.output.shape, (4, 6));

    // 自动识别扩展名
    let auto = load_snapshot_auto(&path).unwrap();
    assert_eq!(auto.input.shape, loaded.input.shape);

    println!("✓ JSON格式保存/加载测试通过!");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_snapshot_binary(dir.path().join("missing.bin")).is_err());
    assert!(load_snapshot_auto(dir.path().join("missing.json")).is_err());
}
