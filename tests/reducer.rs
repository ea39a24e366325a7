//! Integration tests for progressive-mesh collapse maps.

mod common;

use std::collections::HashSet;

use mdconv::convert::generate_collapse_map;
use mdconv::lod::{reduce, resolve_collapse, CancelToken, ReduceOptions, NO_TARGET};
use mdconv::model::{CollapseMap, Lod};
use mdconv::util::Vec3;
use mdconv::{convert, ConvertOptions, Error, Format};

/// Check that every map entry points strictly below its own index.
fn assert_prefix_closed(map: &[i32]) {
    for (i, &t) in map.iter().enumerate() {
        assert!(t == NO_TARGET || (t >= 0 && (t as usize) < i), "entry {i} -> {t}");
    }
}

#[test]
fn test_grid_reduction_is_permutation() {
    let (positions, triangles) = common::grid(5);
    let r = reduce(&positions, &triangles, &ReduceOptions::default()).unwrap();

    let ranks: HashSet<u32> = r.rank.iter().copied().collect();
    assert_eq!(ranks.len(), 25);
    assert!(ranks.iter().all(|&x| x < 25));
    assert!(r.min_lod as usize <= positions.len());

    let order = r.collapse_order();
    assert_prefix_closed(&order.map);
    // every truncation of the stored order resolves inside the kept prefix
    for keep in 1..=25 {
        for v in 0..25 {
            if let Some(t) = resolve_collapse(&order.map, v, keep) {
                assert!(t < keep);
            }
        }
    }
}

#[test]
fn test_renumbering_preserves_geometry() {
    let model = common::morph_model(&[0.0]);
    let mut surface = model.surfaces[0].clone();
    let before: HashSet<[[u32; 3]; 3]> = triangle_keys(&surface.positions_at(0, None), &surface.triangles);

    let positions = surface.positions_at(0, None);
    let CollapseMap { map, .. } = generate_collapse_map(&mut surface, &positions, &ReduceOptions::default()).unwrap();
    assert_prefix_closed(&map);

    let after = triangle_keys(&surface.positions_at(0, None), &surface.triangles);
    assert_eq!(before, after);
    // uvs follow their vertices: u is x / 2 on this grid
    for (uv, p) in surface.uvs.iter().zip(surface.positions_at(0, None)) {
        assert_eq!(uv.x, p.x / 2.0);
    }
}

/// Triangles as rotation-normalized position triples, independent of numbering.
fn triangle_keys(positions: &[Vec3], triangles: &[[u32; 3]]) -> HashSet<[[u32; 3]; 3]> {
    triangles
        .iter()
        .map(|t| {
            let key = |v: u32| {
                let p = positions[v as usize];
                [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
            };
            let k = t.map(key);
            let start = (0..3).min_by_key(|&i| k[i]).unwrap_or(0);
            [k[start], k[(start + 1) % 3], k[(start + 2) % 3]]
        })
        .collect()
}

#[test]
fn test_convert_generates_lod_for_skeletal_targets() {
    let model = convert(&common::rigged_model(2), Format::Mds, &ConvertOptions::default())
        .unwrap()
        .value;
    let Some(Lod::CollapseMap { scale, bias, surfaces }) = &model.lod else {
        panic!("expected collapse maps");
    };
    assert_eq!((*scale, *bias), (1.0, 0.0));
    assert_eq!(surfaces.len(), 1);
    assert_eq!(surfaces[0].map.len(), model.surfaces[0].vertex_count());
    assert_prefix_closed(&surfaces[0].map);
}

#[test]
fn test_existing_lod_kept_unless_regenerated() {
    let opts = ConvertOptions::default().with_lod_params(2.0, 0.5);
    let first = convert(&common::rigged_model(2), Format::Mds, &opts).unwrap().value;

    let kept = convert(&first, Format::Mdm, &ConvertOptions::default()).unwrap().value;
    assert_eq!(kept.lod, first.lod);

    let regenerated = convert(&first, Format::Mdm, &ConvertOptions::default().with_regenerate_lod(true))
        .unwrap()
        .value;
    match regenerated.lod {
        Some(Lod::CollapseMap { scale, bias, .. }) => assert_eq!((scale, bias), (1.0, 0.0)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_convert_honours_reduce_limits() {
    let tight = ConvertOptions::default().with_reduce(ReduceOptions::default().with_max_vertices(4));
    assert!(matches!(
        convert(&common::rigged_model(1), Format::Mds, &tight),
        Err(Error::LimitExceeded { count: 9, limit: 4 })
    ));

    let token = CancelToken::new();
    token.cancel();
    let cancelled = ConvertOptions::default().with_reduce(ReduceOptions::default().with_cancel(token));
    assert!(matches!(
        convert(&common::rigged_model(1), Format::Mdm, &cancelled),
        Err(Error::Cancelled)
    ));
}
