use scan_triage::{
    metrics::QualityMetrics,
    policy::{decide, Decision},
    score::{breakdown, contrast_points, noise_points, score, sharpness_points},
};

fn m(sharpness: f64, contrast: f64, noise: f64) -> QualityMetrics {
    QualityMetrics {
        sharpness,
        contrast,
        noise,
    }
}

#[test]
fn boundary_cases() {
    let cases = [
        (m(300.0, 50.0, 8.0), 130, Decision::SendToAi),
        (m(149.0, 19.0, 21.0), -10, Decision::Redigitalize),
        (m(150.0, 20.0, 20.0), 55, Decision::ReviewManually),
        (m(50.0, 50.0, 8.0), 80, Decision::SendToAi),
        (m(0.0, 0.0, 0.0), 20, Decision::Redigitalize),
    ];
    for (metrics, expected, decision) in cases {
        assert_eq!(score(&metrics), expected, "{metrics:?}");
        assert_eq!(decide(score(&metrics)), decision, "{metrics:?}");
    }
}

#[test]
fn each_metric_contributes_one_bucket() {
    assert_eq!(sharpness_points(1e9), 60);
    assert_eq!(sharpness_points(299.999), 25);
    assert_eq!(sharpness_points(149.999), 10);
    assert_eq!(sharpness_points(49.999), -10);

    assert_eq!(contrast_points(50.0), 30);
    assert_eq!(contrast_points(49.999), 15);
    assert_eq!(contrast_points(19.999), -10);

    assert_eq!(noise_points(0.0), 40);
    assert_eq!(noise_points(8.001), 15);
    assert_eq!(noise_points(20.001), -10);
}

#[test]
fn breakdown_sums_to_score() {
    let metrics = m(160.0, 10.0, 3.0);
    let b = breakdown(&metrics);
    assert_eq!((b.sharpness, b.contrast, b.noise), (25, -10, 40));
    assert_eq!(b.total(), score(&metrics));
}

#[test]
fn score_is_unclamped() {
    assert_eq!(score(&m(0.0, 0.0, 100.0)), -30);
    assert_eq!(score(&m(1e6, 1e6, 0.0)), 130);
}

#[test]
fn nan_falls_into_the_lowest_bucket() {
    assert_eq!(score(&m(f64::NAN, f64::NAN, f64::NAN)), -30);
}

#[test]
fn monotone_in_each_metric() {
    let grid: Vec<f64> = (0..=400).map(|i| i as f64).collect();
    for pair in grid.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        assert!(sharpness_points(hi) >= sharpness_points(lo));
        assert!(contrast_points(hi) >= contrast_points(lo));
        // Lower noise never scores less.
        assert!(noise_points(lo) >= noise_points(hi));
        assert!(score(&m(hi, 30.0, 10.0)) >= score(&m(lo, 30.0, 10.0)));
        assert!(score(&m(200.0, hi, 10.0)) >= score(&m(200.0, lo, 10.0)));
        assert!(score(&m(200.0, 30.0, lo)) >= score(&m(200.0, 30.0, hi)));
    }
}
