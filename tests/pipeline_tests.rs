//! End-to-end pipeline tests
//!
//! These drive whole sessions through train -> select -> test for each
//! learning scenario and check the statistical behavior of the results,
//! not just the plumbing.

use cellsvm::api::{self, Svm};

/// Deterministic noise in (-1, 1), good enough for synthetic data.
fn noise(i: usize) -> f64 {
    ((i as f64 * 12.9898).sin() * 43758.5453).fract()
}

/// 50 rows, 2 features, linear target plus small noise.
fn regression_data() -> (Vec<f64>, Vec<f64>) {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..50 {
        let x1 = i as f64 / 50.0;
        let x2 = ((i * 7) % 50) as f64 / 50.0;
        features.push(x1);
        features.push(x2);
        labels.push(1.0 + 2.0 * x1 - x2 + 0.05 * noise(i));
    }
    (features, labels)
}

const REGRESSION_GRID: &[(&str, &str)] = &[
    ("GAMMA_STEPS", "5"),
    ("MIN_GAMMA", "0.5"),
    ("MAX_GAMMA", "50"),
    ("LAMBDA_STEPS", "5"),
    ("MIN_LAMBDA", "0.00001"),
    ("MAX_LAMBDA", "0.1"),
];

#[test]
fn test_regression_end_to_end_mse() {
    let (features, labels) = regression_data();
    let svm = Svm::least_squares(&features, 50, 2, &labels, REGRESSION_GRID).unwrap();

    // Noise-free held-out grid.
    let mut test_features = Vec::new();
    let mut truth = Vec::new();
    for i in 0..20 {
        let x1 = (i as f64 + 0.5) / 20.0;
        let x2 = 1.0 - x1;
        test_features.push(x1);
        test_features.push(x2);
        truth.push(1.0 + 2.0 * x1 - x2);
    }
    let predictions = svm.predict(&test_features, 20, 2).unwrap();
    assert_eq!(predictions.rows(), 20);
    assert_eq!(predictions.cols(), 1);

    let mse: f64 = (0..20)
        .map(|r| {
            let d = predictions.get(r, 0) - truth[r];
            d * d
        })
        .sum::<f64>()
        / 20.0;
    assert!(mse < 0.05, "held-out MSE too large: {mse}");
}

#[test]
fn test_regression_errors_table() {
    let (features, labels) = regression_data();
    let svm = Svm::least_squares(&features, 50, 2, &labels, REGRESSION_GRID).unwrap();

    let (predictions, errors) = svm.test(&features, 50, 2, &labels).unwrap();
    assert_eq!(predictions.rows(), 50);
    assert_eq!(errors.rows(), 1);
    assert_eq!(errors.cols(), 4);
    // Training-set MSE on lightly noisy linear data stays small.
    assert!(errors.get(0, 1) < 0.05);
}

#[test]
fn test_quantile_sweep_columns_and_monotonicity() {
    let n = 40;
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n {
        let x = i as f64 / n as f64;
        features.push(x);
        labels.push(x + 0.4 * noise(i));
    }

    let levels = [0.05, 0.1, 0.5, 0.9, 0.95];
    let svm = Svm::quantile(
        &features,
        n,
        1,
        &labels,
        &levels,
        &[
            ("GAMMA_STEPS", "3"),
            ("LAMBDA_STEPS", "3"),
            ("MIN_LAMBDA", "0.0001"),
            ("MAX_LAMBDA", "0.01"),
        ],
    )
    .unwrap();

    let (predictions, errors) = svm.test(&features, n, 1, &labels).unwrap();
    assert_eq!(predictions.cols(), levels.len());
    assert_eq!(errors.rows(), levels.len());

    // Quantile estimates never cross: each row is non-decreasing across
    // the ascending levels.
    for r in 0..predictions.rows() {
        for c in 1..predictions.cols() {
            assert!(
                predictions.get(r, c) >= predictions.get(r, c - 1),
                "quantile crossing at row {r}, column {c}"
            );
        }
    }
}

#[test]
fn test_expectile_sweep_shape() {
    let n = 30;
    let features: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
    let labels: Vec<f64> = features.iter().map(|x| 2.0 * x).collect();

    let svm = Svm::expectile(
        &features,
        n,
        1,
        &labels,
        &[0.2, 0.8],
        &[("GAMMA_STEPS", "2"), ("LAMBDA_STEPS", "2")],
    )
    .unwrap();
    let predictions = svm.predict(&features, n, 1).unwrap();
    assert_eq!(predictions.cols(), 2);
    for r in 0..predictions.rows() {
        assert!(predictions.get(r, 1) >= predictions.get(r, 0));
    }
}

/// Three well-separated clusters labeled 0, 1, 2.
fn three_class_data() -> (Vec<f64>, Vec<f64>, usize) {
    let centers = [(0.0, 0.0), (5.0, 0.0), (0.0, 5.0)];
    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut n = 0;
    for (class, &(cx, cy)) in centers.iter().enumerate() {
        for i in 0..15 {
            features.push(cx + 0.3 * noise(i + class * 100));
            features.push(cy + 0.3 * noise(i + class * 100 + 50));
            labels.push(class as f64);
            n += 1;
        }
    }
    (features, labels, n)
}

#[test]
fn test_multiclass_ava_end_to_end() {
    let (features, labels, n) = three_class_data();
    let svm = Svm::multiclass(
        &features,
        n,
        2,
        &labels,
        "AvA_hinge",
        &[("GAMMA_STEPS", "3"), ("LAMBDA_STEPS", "3")],
    )
    .unwrap();

    let (predictions, errors) = svm.test(&features, n, 2, &labels).unwrap();
    assert_eq!(predictions.cols(), 1);
    for r in 0..predictions.rows() {
        let p = predictions.get(r, 0);
        assert!(p == 0.0 || p == 1.0 || p == 2.0, "unexpected label {p}");
    }

    // First errors row is the overall classification error; one row per
    // subtask follows (3 class pairs).
    assert_eq!(errors.rows(), 1 + 3);
    assert!(
        errors.get(0, 1) < 0.1,
        "separable clusters should classify cleanly, error {}",
        errors.get(0, 1)
    );
}

#[test]
fn test_multiclass_ova_end_to_end() {
    let (features, labels, n) = three_class_data();
    let svm = Svm::multiclass(
        &features,
        n,
        2,
        &labels,
        "OvA_ls",
        &[("GAMMA_STEPS", "3"), ("LAMBDA_STEPS", "3")],
    )
    .unwrap();

    let (_, errors) = svm.test(&features, n, 2, &labels).unwrap();
    assert!(errors.get(0, 1) < 0.1);
}

/// Two overlapping binary clusters with ±1 labels.
fn binary_data() -> (Vec<f64>, Vec<f64>, usize) {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut n = 0;
    for i in 0..25 {
        features.push(1.5 + noise(i));
        labels.push(1.0);
        features.push(-1.5 + noise(i + 1000));
        labels.push(-1.0);
        n += 2;
    }
    (features, labels, n)
}

#[test]
fn test_roc_sweep_end_to_end() {
    let (features, labels, n) = binary_data();
    let steps = 3;
    let svm = Svm::roc(
        &features,
        n,
        1,
        &labels,
        steps,
        &[("GAMMA_STEPS", "2"), ("LAMBDA_STEPS", "3")],
    )
    .unwrap();

    let (predictions, errors) = svm.test(&features, n, 1, &labels).unwrap();
    assert_eq!(predictions.cols(), steps);
    assert_eq!(errors.rows(), steps);
    for r in 0..predictions.rows() {
        for c in 0..steps {
            let p = predictions.get(r, c);
            assert!(p == 1.0 || p == -1.0);
        }
    }
    // Error rates stay sane on well-separated data.
    for s in 0..steps {
        assert!(errors.get(s, 1) < 0.2);
    }
}

#[test]
fn test_npl_constraint_sweep_accumulates_columns() {
    let (features, labels, n) = binary_data();
    let svm = Svm::npl(
        &features,
        n,
        1,
        &labels,
        1,
        0.1,
        &[1.0, 2.0],
        &[("GAMMA_STEPS", "2"), ("LAMBDA_STEPS", "3")],
    )
    .unwrap();

    let (predictions, errors) = svm.test(&features, n, 1, &labels).unwrap();
    assert_eq!(predictions.cols(), 2);
    assert_eq!(errors.rows(), 2);
}

#[test]
fn test_cell_partitioned_training_end_to_end() {
    let (features, labels) = regression_data();
    let mut params = REGRESSION_GRID.to_vec();
    params.push(("USECELLS", "1"));
    params.push(("CELL_SIZE", "20"));
    let svm = Svm::least_squares(&features, 50, 2, &labels, &params).unwrap();

    assert_eq!(svm.get("PARTITION_CHOICE").unwrap(), "6");
    let predictions = svm.predict(&features, 50, 2).unwrap();
    assert_eq!(predictions.rows(), 50);
}

#[test]
fn test_unlabeled_test_gives_empty_errors() {
    let (features, labels) = regression_data();
    let svm = Svm::least_squares(&features, 50, 2, &labels, REGRESSION_GRID).unwrap();

    let handle = svm.handle();
    let argv = vec!["cellsvm".to_string()];
    let (predictions, errors) =
        api::test(handle, &argv, &features[..10], 5, 2, None).unwrap();
    assert_eq!(predictions.rows(), 5);
    assert_eq!(errors.rows(), 0);
    assert!(errors.cols() > 0);
}
