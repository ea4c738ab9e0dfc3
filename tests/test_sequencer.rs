mod common;

use medgif::enums::WindowMode;
use medgif::sequencer::uniform_indices;
use medgif::window::window_slices;
use medgif::{
    Colormap, ExtractOptions, FrameSet, SequenceSettings, SliceRange, TransformSpec, WindowSpec,
    select_frames,
};

fn settings(range: SliceRange, transform: TransformSpec, max_frames: usize) -> SequenceSettings {
    SequenceSettings {
        range,
        transform,
        max_frames,
        max_size: 0,
        fps: 10,
    }
}

#[test]
fn test_manual_window_spans_full_gray_range() {
    let volume = common::ramp_volume(10, 4);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let spec = WindowSpec::from_width_level(WindowMode::Manual, 9.0, 4.5);
    let (bounds, frames) = window_slices(&slices, &spec);

    assert_eq!((bounds.lower, bounds.upper), (0.0, 9.0));
    assert_eq!(frames[0][[0, 0]], 0);
    assert_eq!(frames[9][[0, 0]], 255);
    for pair in frames.windows(2) {
        assert!(pair[1][[0, 0]] > pair[0][[0, 0]]);
    }
}

#[test]
fn test_range_and_reverse_select_expected_slices() {
    let range = SliceRange::new(20, 80);
    assert_eq!(select_frames(10, &range, false, 0).unwrap(), vec![2, 3, 4, 5, 6, 7]);
    assert_eq!(select_frames(10, &range, true, 0).unwrap(), vec![7, 6, 5, 4, 3, 2]);
}

#[test]
fn test_frame_set_follows_reversed_order() {
    let volume = common::ramp_volume(10, 4);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let spec = WindowSpec::from_width_level(WindowMode::Manual, 9.0, 4.5);
    let (_, frames) = window_slices(&slices, &spec);

    let transform = TransformSpec {
        reverse_slices: true,
        ..Default::default()
    };
    let set = FrameSet::build(
        &frames,
        &settings(SliceRange::new(20, 80), transform, 0),
        Colormap::Gray.table(),
    )
    .unwrap();

    assert_eq!(set.source_indices, vec![7, 6, 5, 4, 3, 2]);
    for (frame, &source) in set.frames.iter().zip(&set.source_indices) {
        let expected = frames[source][[0, 0]];
        assert_eq!(frame.get_pixel(0, 0).0, [expected; 3]);
    }
}

#[test]
fn test_max_frames_uses_stride_not_truncation() {
    assert_eq!(uniform_indices(6, 3), vec![0, 2, 4]);
    let picked = select_frames(10, &SliceRange::new(20, 80), false, 3).unwrap();
    assert_eq!(picked, vec![2, 4, 6]);
}

#[test]
fn test_reverse_is_an_involution() {
    let range = SliceRange::new(10, 90);
    let forward = select_frames(37, &range, false, 0).unwrap();
    let mut twice = select_frames(37, &range, true, 0).unwrap();
    twice.reverse();
    assert_eq!(twice, forward);
}

#[test]
fn test_valid_ranges_are_non_empty_and_ordered() {
    for total in [1usize, 2, 7, 10, 64] {
        for start in 0..100u32 {
            for end in (start + 1)..=100 {
                let picked = select_frames(total, &SliceRange::new(start, end), false, 0).unwrap();
                assert!(!picked.is_empty());
                assert!(picked.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}

#[test]
fn test_gray_output_replicates_windowed_input() {
    let volume = common::coded_volume(3, 5, 6);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let (_, frames) = window_slices(&slices, &WindowSpec::default());

    let set = FrameSet::build(
        &frames,
        &settings(SliceRange::default(), TransformSpec::default(), 0),
        Colormap::Gray.table(),
    )
    .unwrap();
    for (rgb, gray) in set.frames.iter().zip(&frames) {
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let v = gray[[y as usize, x as usize]];
            assert_eq!(pixel.0, [v, v, v]);
        }
    }
}

#[test]
fn test_filtering_does_not_change_brightness() {
    let volume = common::coded_volume(8, 4, 4);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let (_, frames) = window_slices(&slices, &WindowSpec::default());

    let full = FrameSet::build(
        &frames,
        &settings(SliceRange::default(), TransformSpec::default(), 0),
        Colormap::Gray.table(),
    )
    .unwrap();
    let filtered = FrameSet::build(
        &frames,
        &settings(SliceRange::new(50, 100), TransformSpec::default(), 0),
        Colormap::Gray.table(),
    )
    .unwrap();

    assert_eq!(filtered.source_indices, vec![4, 5, 6, 7]);
    for (frame, &source) in filtered.frames.iter().zip(&filtered.source_indices) {
        assert_eq!(frame, &full.frames[source]);
    }
}

#[test]
fn test_frames_are_resized_to_max_size() {
    let volume = common::coded_volume(2, 10, 20);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let (_, frames) = window_slices(&slices, &WindowSpec::default());
    let mut s = settings(SliceRange::default(), TransformSpec::default(), 0);
    s.max_size = 64;

    let set = FrameSet::build(&frames, &s, Colormap::Viridis.table()).unwrap();
    assert_eq!(set.dimensions(), Some((64, 32)));
}

#[test]
fn test_encoded_gif_loops_with_expected_frames() {
    use image::AnimationDecoder;
    use image::codecs::gif::GifDecoder;

    let volume = common::ramp_volume(5, 8);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let (_, frames) = window_slices(&slices, &WindowSpec::default());
    let set = FrameSet::build(
        &frames,
        &settings(SliceRange::default(), TransformSpec::default(), 0),
        Colormap::Hot.table(),
    )
    .unwrap();

    let gif = set.encode_gif(0).unwrap();
    assert_eq!(&gif[..6], b"GIF89a");
    let decoded = GifDecoder::new(std::io::Cursor::new(gif))
        .unwrap()
        .into_frames()
        .collect_frames()
        .unwrap();
    assert_eq!(decoded.len(), 5);
    let (numer, denom) = decoded[0].delay().numer_denom_ms();
    assert_eq!(numer / denom, 100);
}

#[test]
fn test_artifact_limit_is_enforced() {
    let volume = common::coded_volume(4, 16, 16);
    let slices = volume.extract_slices(&ExtractOptions::default());
    let (_, frames) = window_slices(&slices, &WindowSpec::default());
    let set = FrameSet::build(
        &frames,
        &settings(SliceRange::default(), TransformSpec::default(), 0),
        Colormap::Jet.table(),
    )
    .unwrap();

    let err = set.encode_gif(16).unwrap_err();
    assert!(matches!(err, medgif::ConvertError::EncodingFailure(_)));
}
