mod common;

use common::{assert_close, init_test_subscriber, op_entry, test_matrix};
use distla::blas::{local_trr2k, trr2k};
use distla::{Config, DistError, DistMatrix, DistPair, Grid, Matrix, Orientation, Universe, UpperOrLower};

/// `alpha op(A) op(B) + beta op(C) op(D) + gamma E` on the `uplo` triangle,
/// `E` unchanged elsewhere.
#[allow(clippy::too_many_arguments)]
fn reference(
    uplo: UpperOrLower,
    orient: [Orientation; 4],
    alpha: f64,
    a: &Matrix<f64>,
    b: &Matrix<f64>,
    beta: f64,
    c: &Matrix<f64>,
    d: &Matrix<f64>,
    gamma: f64,
    e: &Matrix<f64>,
    k: usize,
) -> Matrix<f64> {
    let [oa, ob, oc, od] = orient;
    Matrix::from_fn(e.height(), e.width(), |i, j| {
        if !uplo.contains(i, j) {
            return e.get(i, j);
        }
        let mut ab = 0.0;
        let mut cd = 0.0;
        for l in 0..k {
            ab += op_entry(oa, a, i, l) * op_entry(ob, b, l, j);
            cd += op_entry(oc, c, i, l) * op_entry(od, d, l, j);
        }
        alpha * ab + beta * cd + gamma * e.get(i, j)
    })
    .unwrap()
}

fn stored(orient: Orientation, rows: usize, cols: usize, seed: usize) -> Matrix<f64> {
    if orient.is_transposed() {
        test_matrix(seed, cols, rows)
    } else {
        test_matrix(seed, rows, cols)
    }
}

fn small_blocks() -> Config {
    Config {
        blocksize: 3,
        local_trr2k_blocksize: 1,
        ..Config::default()
    }
}

#[test]
fn test_trr2k_matches_reference() {
    init_test_subscriber();
    let (n, k) = (9, 7);
    let cases = [
        [Orientation::Normal, Orientation::Normal, Orientation::Normal, Orientation::Normal],
        [Orientation::Transpose, Orientation::Normal, Orientation::Normal, Orientation::Transpose],
        [Orientation::Normal, Orientation::Adjoint, Orientation::Transpose, Orientation::Normal],
        [Orientation::Transpose, Orientation::Transpose, Orientation::Adjoint, Orientation::Adjoint],
    ];
    for uplo in [UpperOrLower::Lower, UpperOrLower::Upper] {
        for orient in cases {
            let [oa, ob, oc, od] = orient;
            let a = stored(oa, n, k, 1);
            let b = stored(ob, k, n, 2);
            let c = stored(oc, n, k, 3);
            let d = stored(od, k, n, 4);
            let e = test_matrix(5, n, n);
            let expected = reference(uplo, orient, 2.0, &a, &b, -1.0, &c, &d, 0.5, &e, k);
            let results = Universe::new(4)
                .with_config(small_blocks())
                .run(|world| {
                    let grid = Grid::new(&world)?;
                    let a = DistMatrix::from_global(&grid, DistPair::MC_MR, &a)?;
                    let b = DistMatrix::from_global(&grid, DistPair::STAR_VR, &b)?;
                    let c = DistMatrix::from_global(&grid, DistPair::VC_STAR, &c)?;
                    let d = DistMatrix::from_global(&grid, DistPair::MR_MC, &d)?;
                    let mut e = DistMatrix::from_global(&grid, DistPair::MC_MR, &e)?;
                    trr2k(
                        uplo,
                        oa,
                        ob,
                        oc,
                        od,
                        2.0,
                        &a.as_view(),
                        &b.as_view(),
                        -1.0,
                        &c.as_view(),
                        &d.as_view(),
                        0.5,
                        &mut e,
                    )?;
                    e.to_global()
                })
                .unwrap();
            for got in results {
                assert_close(&got, &expected, &format!("{uplo:?} {orient:?}"));
            }
        }
    }
}

#[test]
fn test_trr2k_into_non_default_distribution() {
    let (n, k) = (8, 4);
    let normal = [Orientation::Normal; 4];
    let a = test_matrix(1, n, k);
    let b = test_matrix(2, k, n);
    let e = test_matrix(3, n, n);
    let expected = reference(UpperOrLower::Upper, normal, 1.0, &a, &b, 1.0, &a, &b, 0.0, &e, k);
    let results = Universe::new(6)
        .with_config(small_blocks())
        .run(|world| {
            let grid = Grid::new(&world)?;
            let a = DistMatrix::from_global(&grid, DistPair::STAR_STAR, &a)?;
            let b = DistMatrix::from_global(&grid, DistPair::CIRC_CIRC, &b)?;
            let mut e = DistMatrix::from_global(&grid, DistPair::VR_STAR, &e)?;
            trr2k(
                UpperOrLower::Upper,
                Orientation::Normal,
                Orientation::Normal,
                Orientation::Normal,
                Orientation::Normal,
                1.0,
                &a.as_view(),
                &b.as_view(),
                1.0,
                &a.as_view(),
                &b.as_view(),
                0.0,
                &mut e,
            )?;
            assert_eq!(e.dist(), DistPair::VR_STAR);
            e.to_global()
        })
        .unwrap();
    for got in results {
        assert_close(&got, &expected, "[VR,*] output");
    }
}

#[test]
fn test_local_trr2k_on_aligned_panels() {
    let (n, k) = (10, 3);
    let a = test_matrix(6, n, k);
    let b = test_matrix(7, k, n);
    let e = test_matrix(8, n, n);
    let normal = [Orientation::Normal; 4];
    let expected = reference(UpperOrLower::Lower, normal, 1.0, &a, &b, 2.0, &a, &b, -1.0, &e, k);
    let results = Universe::new(6)
        .with_config(small_blocks())
        .run(|world| {
            let grid = Grid::new(&world)?;
            let mut e = DistMatrix::from_global(&grid, DistPair::MC_MR, &e)?;
            let a = DistMatrix::from_global(&grid, DistPair::MC_STAR, &a)?;
            let b = DistMatrix::from_global(&grid, DistPair::STAR_MR, &b)?;
            let before = world.stats().collectives();
            local_trr2k(
                UpperOrLower::Lower,
                Orientation::Normal,
                Orientation::Normal,
                Orientation::Normal,
                Orientation::Normal,
                1.0,
                &a.as_view(),
                &b.as_view(),
                2.0,
                &a.as_view(),
                &b.as_view(),
                -1.0,
                &mut e.as_view_mut(),
            )?;
            assert_eq!(world.stats().collectives(), before);
            e.to_global()
        })
        .unwrap();
    for got in results {
        assert_close(&got, &expected, "local_trr2k");
    }
}

#[test]
fn test_empty_depth_only_scales_triangle() {
    let e = test_matrix(9, 5, 5);
    let results = Universe::new(4)
        .run(|world| {
            let grid = Grid::new(&world)?;
            let a = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 5, 0)?;
            let b = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 0, 5)?;
            let mut e = DistMatrix::from_global(&grid, DistPair::MC_MR, &e)?;
            let before = world.stats().collectives();
            trr2k(
                UpperOrLower::Lower,
                Orientation::Normal,
                Orientation::Normal,
                Orientation::Normal,
                Orientation::Normal,
                1.0,
                &a.as_view(),
                &b.as_view(),
                1.0,
                &a.as_view(),
                &b.as_view(),
                2.0,
                &mut e,
            )?;
            assert_eq!(world.stats().collectives(), before);
            e.to_global()
        })
        .unwrap();
    for got in results {
        for i in 0..5 {
            for j in 0..5 {
                let factor = if i >= j { 2.0 } else { 1.0 };
                assert_eq!(got.get(i, j), factor * e.get(i, j));
            }
        }
    }
}

#[test]
fn test_mismatched_depths_rejected() {
    let result = Universe::new(2).run(|world| {
        let grid = Grid::new(&world)?;
        let a = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 4, 3)?;
        let b = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 3, 4)?;
        let c = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 4, 2)?;
        let d = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 2, 4)?;
        let mut e = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 4, 4)?;
        trr2k(
            UpperOrLower::Upper,
            Orientation::Normal,
            Orientation::Normal,
            Orientation::Normal,
            Orientation::Normal,
            1.0,
            &a.as_view(),
            &b.as_view(),
            1.0,
            &c.as_view(),
            &d.as_view(),
            1.0,
            &mut e,
        )
    });
    match result {
        Err(DistError::Nonconformal { op, .. }) => assert_eq!(op, "Trr2k"),
        other => panic!("expected a nonconformal error, got {other:?}"),
    }
}

#[test]
fn test_non_square_target_rejected() {
    let result = Universe::new(2).run(|world| {
        let grid = Grid::new(&world)?;
        let a = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 4, 3)?;
        let mut e = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, 4, 5)?;
        trr2k(
            UpperOrLower::Upper,
            Orientation::Normal,
            Orientation::Transpose,
            Orientation::Normal,
            Orientation::Transpose,
            1.0,
            &a.as_view(),
            &a.as_view(),
            1.0,
            &a.as_view(),
            &a.as_view(),
            1.0,
            &mut e,
        )
    });
    assert!(matches!(result, Err(DistError::Nonconformal { .. })));
}

#[test]
fn test_local_trr2k_rejects_tall_operand() {
    let (n, k) = (6, 3);
    let result = Universe::new(4).run(|world| {
        let grid = Grid::new(&world)?;
        let a = DistMatrix::<f64>::zeros(&grid, DistPair::MC_STAR, n + 2, k)?;
        let b = DistMatrix::<f64>::zeros(&grid, DistPair::STAR_MR, k, n)?;
        let mut e = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, n, n)?;
        local_trr2k(
            UpperOrLower::Lower,
            Orientation::Normal,
            Orientation::Normal,
            Orientation::Normal,
            Orientation::Normal,
            1.0,
            &a.as_view(),
            &b.as_view(),
            1.0,
            &a.as_view(),
            &b.as_view(),
            1.0,
            &mut e.as_view_mut(),
        )
    });
    match result {
        Err(DistError::Nonconformal { op, .. }) => assert_eq!(op, "Trr2k"),
        other => panic!("expected a nonconformal error, got {other:?}"),
    }
}

#[test]
fn test_local_trr2k_rejects_mismatched_inner_dimension() {
    let n = 6;
    let result = Universe::new(4).run(|world| {
        let grid = Grid::new(&world)?;
        let a = DistMatrix::<f64>::zeros(&grid, DistPair::MC_STAR, n, 3)?;
        let b = DistMatrix::<f64>::zeros(&grid, DistPair::STAR_MR, 2, n)?;
        let mut e = DistMatrix::<f64>::zeros(&grid, DistPair::MC_MR, n, n)?;
        local_trr2k(
            UpperOrLower::Upper,
            Orientation::Normal,
            Orientation::Normal,
            Orientation::Normal,
            Orientation::Normal,
            1.0,
            &a.as_view(),
            &b.as_view(),
            1.0,
            &a.as_view(),
            &b.as_view(),
            1.0,
            &mut e.as_view_mut(),
        )
    });
    match result {
        Err(DistError::Nonconformal { op, .. }) => assert_eq!(op, "Trr2k"),
        other => panic!("expected a nonconformal error, got {other:?}"),
    }
}
