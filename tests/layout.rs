//! Integration tests for header and surface offsets in written files.

mod common;

use byteorder::{ByteOrder, LittleEndian};
use mdconv::io::encode_bytes;
use mdconv::{convert, ConvertOptions, Format, Model};

/// Where a container keeps its surface count and offsets.
struct Layout {
    num_surfaces: usize,
    ofs_surfaces: usize,
    /// Header field holding the offset of the section after the surfaces.
    ofs_after: usize,
    ofs_end: usize,
    surface_header: u32,
    /// Offset fields inside a surface header, relative to the surface.
    surface_offsets: &'static [usize],
    surface_end: usize,
}

const MD3: Layout = Layout {
    num_surfaces: 84,
    ofs_surfaces: 100,
    ofs_after: 104,
    ofs_end: 104,
    surface_header: 108,
    surface_offsets: &[88, 92, 96, 100],
    surface_end: 104,
};

const MDS: Layout = Layout {
    num_surfaces: 100,
    ofs_surfaces: 104,
    ofs_after: 112,
    ofs_end: 116,
    surface_header: 176,
    surface_offsets: &[148, 156, 160, 168],
    surface_end: 172,
};

const MDM: Layout = Layout {
    num_surfaces: 80,
    ofs_surfaces: 84,
    ofs_after: 92,
    ofs_end: 96,
    surface_header: 176,
    surface_offsets: &[148, 156, 160, 168],
    surface_end: 172,
};

fn field(data: &[u8], at: usize) -> u32 {
    LittleEndian::read_u32(&data[at..at + 4])
}

/// Walk the surface chain and check every offset lands inside its surface.
fn assert_surfaces_consistent(data: &[u8], layout: &Layout, expected: usize) {
    let count = field(data, layout.num_surfaces) as usize;
    assert_eq!(count, expected);
    assert_eq!(field(data, layout.ofs_end) as usize, data.len());

    let mut start = field(data, layout.ofs_surfaces) as usize;
    for i in 0..count {
        let size = field(data, start + layout.surface_end) as usize;
        let end = start + size;
        assert!(end <= data.len(), "surface {i} ends past the file");
        for &f in layout.surface_offsets {
            let ofs = field(data, start + f);
            assert!(ofs >= layout.surface_header && ofs as usize <= size, "surface {i}: field {f} = {ofs}");
        }
        // the next surface begins where this one ends, so none overlap
        start = end;
    }
    assert_eq!(start, field(data, layout.ofs_after) as usize);
}

fn with_second_surface(mut model: Model) -> Model {
    let mut lid = model.surfaces[0].clone();
    lid.name = "lid".into();
    model.surfaces.push(lid);
    model
}

#[test]
fn test_md3_surface_offsets() {
    let model = with_second_surface(common::morph_model(&[0.0, 0.5, 1.0]));
    let data = encode_bytes(&model, Format::Md3).unwrap().data;
    assert_surfaces_consistent(&data, &MD3, 2);
}

#[test]
fn test_mds_surface_offsets() {
    let rig = with_second_surface(common::rigged_model(2));
    let model = convert(&rig, Format::Mds, &ConvertOptions::default()).unwrap().value;
    let data = encode_bytes(&model, Format::Mds).unwrap().data;
    assert_surfaces_consistent(&data, &MDS, 2);
}

#[test]
fn test_mdm_surface_offsets() {
    let rig = with_second_surface(common::rigged_model(2));
    let model = convert(&rig, Format::Mdm, &ConvertOptions::default()).unwrap().value;
    let encoded = encode_bytes(&model, Format::Mdm).unwrap();
    assert!(encoded.sibling.is_some());
    assert_surfaces_consistent(&encoded.data, &MDM, 2);
}

#[test]
fn test_skeletal_surface_points_back_to_header() {
    let rig = with_second_surface(common::rigged_model(1));
    let model = convert(&rig, Format::Mds, &ConvertOptions::default()).unwrap().value;
    let data = encode_bytes(&model, Format::Mds).unwrap().data;
    let mut start = field(&data, MDS.ofs_surfaces) as usize;
    for _ in 0..2 {
        let back = LittleEndian::read_i32(&data[start + 140..start + 144]);
        assert_eq!(back, -(start as i32));
        start += field(&data, start + MDS.surface_end) as usize;
    }
}
