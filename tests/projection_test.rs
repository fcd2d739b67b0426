mod helpers;

use embedding_explorer::error::PipelineError;
use embedding_explorer::projection::{project, target_dimensions};
use helpers::{basis, distance, fake_embedding};

fn batch(texts: &[&str]) -> Vec<Vec<f32>> {
    texts.iter().map(|t| fake_embedding(t)).collect()
}

#[test]
fn three_vectors_project_to_plane() {
    let points = project(&batch(&["cat", "dog", "car"])).unwrap();
    assert_eq!(points.len(), 3);
    for p in &points {
        assert_eq!(p.len(), 2);
        assert!(p.iter().all(|&x| (0.0..=1.0).contains(&x)), "out of range: {p:?}");
    }
}

#[test]
fn four_or_more_vectors_project_to_space() {
    for texts in [
        &["cat", "dog", "car", "airplane"][..],
        &["cat", "dog", "car", "airplane", "boat", "train", "kitten"][..],
    ] {
        let points = project(&batch(texts)).unwrap();
        assert_eq!(points.len(), texts.len());
        assert!(points.iter().all(|p| p.len() == 3));
        assert_eq!(target_dimensions(texts.len()), 3);
    }
}

#[test]
fn projection_is_repeatable() {
    let vectors = batch(&["red", "green", "blue", "yellow", "purple"]);
    assert_eq!(project(&vectors).unwrap(), project(&vectors).unwrap());
}

#[test]
fn output_order_follows_input_order() {
    let texts = ["cat", "dog", "car", "airplane", "boat"];
    let forward = project(&batch(&texts)).unwrap();

    let mut reversed_texts = texts;
    reversed_texts.reverse();
    let backward = project(&batch(&reversed_texts)).unwrap();

    for (p, q) in forward.iter().zip(backward.iter().rev()) {
        for (a, b) in p.iter().zip(q) {
            assert!((a - b).abs() < 1e-9, "{p:?} vs {q:?}");
        }
    }
}

#[test]
fn full_rank_projection_preserves_distances() {
    // Orthonormal points span exactly n-1 dimensions around their centroid,
    // which the retained components cover; pairwise distances survive
    // halved by the (x + 1) / 2 mapping.
    for n in [3, 4] {
        let vectors: Vec<Vec<f32>> = (0..n).map(|i| basis(i, 8)).collect();
        let points = project(&vectors).unwrap();
        let expected = std::f64::consts::SQRT_2 / 2.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance(&points[i], &points[j]);
                assert!((d - expected).abs() < 1e-9, "d({i},{j}) = {d}");
            }
        }
    }
}

#[test]
fn identical_vectors_collapse_to_center() {
    let vectors = vec![vec![0.5f32; 4]; 4];
    let points = project(&vectors).unwrap();
    for p in points {
        assert_eq!(p, vec![0.5, 0.5, 0.5]);
    }
}

#[test]
fn two_vectors_are_accepted() {
    let points = project(&[basis(0, 2), basis(1, 2)]).unwrap();
    assert_eq!(points.len(), 2);
    // second component carries no variance
    assert!((points[0][1] - 0.5).abs() < 1e-6);
    assert!((points[1][1] - 0.5).abs() < 1e-6);
}

#[test]
fn too_few_vectors_is_invalid_shape() {
    assert!(matches!(
        project(&[basis(0, 4)]),
        Err(PipelineError::InvalidInputShape(_))
    ));
    assert!(matches!(project(&[]), Err(PipelineError::InvalidInputShape(_))));
}

#[test]
fn ragged_vectors_are_invalid_shape() {
    let err = project(&[basis(0, 4), basis(1, 4), basis(0, 3)]).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInputShape(_)));
    assert!(!err.is_user_facing());
}

#[test]
fn vectors_narrower_than_target_are_invalid_shape() {
    let vectors: Vec<Vec<f32>> = (0..4).map(|i| vec![i as f32, 1.0]).collect();
    assert!(matches!(
        project(&vectors),
        Err(PipelineError::InvalidInputShape(_))
    ));
}
