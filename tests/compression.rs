//! Integration tests for MDC base-frame selection and delta compression.

mod common;

use mdconv::compress::{COMPRESSION_DELTA, MAX_COMPRESSIBLE_DISTANCE, NOT_COMPRESSED};
use mdconv::format::mdc;
use mdconv::io::{decode_bytes, encode_bytes};
use mdconv::model::Vertices;
use mdconv::util::Vec3;
use mdconv::{convert, ConvertOptions, Error, Format, Model};

fn encode_mdc(model: &Model) -> Vec<u8> {
    encode_bytes(model, Format::Mdc).expect("Failed to encode MDC").data
}

#[test]
fn test_small_motion_is_compressed() {
    let data = encode_mdc(&common::morph_model(&[0.0, 1.0, 2.0, 3.0]));
    let file = mdc::read(&data).unwrap();
    let surface = &file.surfaces[0];

    assert_eq!(surface.base_vertices.len(), 1);
    assert_eq!(surface.comp_vertices.len(), 3);
    assert_eq!(surface.frame_base, vec![0, 0, 0, 0]);
    assert_eq!(surface.frame_comp, vec![NOT_COMPRESSED, 0, 1, 2]);
}

#[test]
fn test_large_motion_starts_new_base() {
    let far = MAX_COMPRESSIBLE_DISTANCE + 1.0;
    let data = encode_mdc(&common::morph_model(&[0.0, 1.0, far, far + 1.0, 2.0 * far + 1.0]));
    let surface = &mdc::read(&data).unwrap().surfaces[0];

    assert_eq!(surface.frame_base, vec![0, 0, 1, 1, 2]);
    assert_eq!(surface.frame_comp, vec![NOT_COMPRESSED, 0, NOT_COMPRESSED, 1, NOT_COMPRESSED]);
    assert_eq!(surface.base_vertices.len(), 3);
}

#[test]
fn test_every_surface_shares_the_plan() {
    let mut model = common::morph_model(&[0.0, 1.0, 2.0]);
    let mut second = model.surfaces[0].clone();
    second.name = "lid".into();
    // the second surface jumps at frame 2 while the first stays close
    if let Vertices::Morph(verts) = &mut second.vertices {
        for v in verts {
            v.frames[2].location += Vec3::new(0.0, 0.0, 10.0);
        }
    }
    model.surfaces.push(second);

    let file = mdc::read(&encode_mdc(&model)).unwrap();
    for surface in &file.surfaces {
        assert_eq!(surface.frame_comp, vec![NOT_COMPRESSED, 0, NOT_COMPRESSED]);
    }
}

#[test]
fn test_decoded_error_is_bounded() {
    // offsets that are not multiples of the delta step
    let model = common::morph_model(&[0.0, 0.33, 1.71, 4.02]);
    let decoded = decode_bytes(Format::Mdc, &encode_mdc(&model), None).unwrap().value;

    for frame in 0..4 {
        let a = decoded.surfaces[0].positions_at(frame, None);
        let b = model.surfaces[0].positions_at(frame, None);
        for (p, q) in a.iter().zip(&b) {
            assert!((*p - *q).abs().max_element() <= COMPRESSION_DELTA, "frame {frame}: {p} vs {q}");
        }
    }
}

#[test]
fn test_rigged_model_via_convert() {
    let rigged = common::rigged_model(3);
    assert!(matches!(encode_bytes(&rigged, Format::Mdc), Err(Error::Unsupported(_))));

    let morph = convert(&rigged, Format::Mdc, &ConvertOptions::default()).unwrap().value;
    let file = mdc::read(&encode_mdc(&morph)).unwrap();
    // the rig climbs one unit per frame, well within reach of frame 0
    assert_eq!(file.surfaces[0].frame_comp, vec![NOT_COMPRESSED, 0, 1]);
    assert_eq!(file.tag_names, vec!["tag_head".to_string()]);
}

#[test]
fn test_reach_boundary_reencodes_identically() {
    let mut mismatched = Vec::new();
    for i in 0..=100 {
        let d = 6.30 + i as f32 * 0.001;
        for shift in [d, -d] {
            let first = encode_mdc(&common::morph_model(&[0.0, shift]));
            let decoded = decode_bytes(Format::Mdc, &first, None).unwrap().value;
            if encode_mdc(&decoded) != first {
                mismatched.push(shift);
            }
        }
    }
    assert!(mismatched.is_empty(), "deltas not reproduced: {mismatched:?}");
}
