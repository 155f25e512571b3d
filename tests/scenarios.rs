//! End-to-end filter scenarios through the public API.

use prisma::filters::builtin::histogram::equalization_table;
use prisma::prelude::*;

mod common;
use common::{active_configurations, gradient, vertical_edge};

#[test]
fn every_builtin_has_an_active_configuration() {
    let registry = FilterRegistry::with_builtins();
    let configured: Vec<&str> = active_configurations().iter().map(|(id, _)| *id).collect();
    for id in registry.filter_ids() {
        assert!(configured.contains(&id), "no configuration for {}", id);
    }
}

#[test]
fn filters_keep_dimensions_and_handle_tiny_images() {
    let registry = FilterRegistry::with_builtins();
    for (width, height) in [(1, 1), (1, 4), (7, 5)] {
        let source = gradient(width, height);
        for (id, params) in active_configurations() {
            let filter = registry.create(id, &params).unwrap();
            assert!(!filter.is_neutral(), "{} should be active", id);

            let mut buffer = source.clone();
            filter.apply_cpu(&mut buffer);
            assert_eq!(buffer.dimensions(), (width, height), "{}", id);
            assert_eq!(buffer.data().len(), (width * height * 4) as usize, "{}", id);
        }
    }
}

#[test]
fn every_program_assembles_with_step_uniforms() {
    let registry = FilterRegistry::with_builtins();
    for (id, params) in active_configurations() {
        let filter = registry.create(id, &params).unwrap();
        let programs = filter.programs();
        assert_eq!(programs.len(), filter.metadata().gpu_passes, "{}", id);
        for program in programs {
            let source = program.source();
            assert!(source.contains("uStepW: f32"), "{}", id);
            assert!(source.contains("fn fs_main"), "{} ({})", id, program.key());
            assert_eq!(program.uniform_bytes(8, 4).len() % 16, 0);
        }
    }
}

#[test]
fn convolution_of_single_pixel_replicates_centre() {
    let source = PixelBuffer::filled(1, 1, [12, 200, 77, 140]).unwrap();
    for size in [3, 5, 7, 9, 11, 13, 15] {
        let mut blurred = source.clone();
        GaussianBlur::new(3.0, size).unwrap().apply_cpu(&mut blurred);
        assert!(blurred.max_abs_diff(&source).unwrap() <= 1, "size {}", size);

        let mut filtered = source.clone();
        BilateralFilter::new(3.0, 0.5, size.max(5)).unwrap().apply_cpu(&mut filtered);
        assert!(filtered.max_abs_diff(&source).unwrap() <= 1, "size {}", size);
    }

    let mut sharpened = source.clone();
    Sharpen::new(2.0).unwrap().apply_cpu(&mut sharpened);
    assert_eq!(sharpened, source);
}

#[test]
fn median_of_flat_image_is_exact() {
    let source = PixelBuffer::filled(9, 9, [31, 62, 93, 200]).unwrap();
    for size in [3, 5, 7] {
        let mut buffer = source.clone();
        MedianFilter::new(size).unwrap().apply_cpu(&mut buffer);
        assert_eq!(buffer, source);
    }
}

#[test]
fn canny_marks_single_vertical_edge() {
    let chain = FilterChain::new().with("edges", CannyEdge::new(1.0, 5, 10.0, 20.0).unwrap());
    let (output, stats) = RenderEngine::cpu().render(&chain, &vertical_edge(16, 8)).unwrap();
    assert_eq!(stats.filters_applied, 1);

    for y in 0..8 {
        let ridge = output.pixel(7, y)[0].max(output.pixel(8, y)[0]);
        assert_eq!(ridge, 255, "row {}", y);
        for x in (0..16).filter(|&x| x != 7 && x != 8) {
            assert_eq!(output.pixel(x, y), [0, 0, 0, 255], "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn reflect_left_to_right_twice_keeps_source_half() {
    let source = gradient(9, 4);
    let chain = FilterChain::new().with("mirror", Reflect::new(ReflectMode::LeftToRight, true));
    let mut engine = RenderEngine::cpu();

    let (once, _) = engine.render(&chain, &source).unwrap();
    let (twice, _) = engine.render(&chain, &once).unwrap();
    assert_eq!(once, twice);
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(twice.pixel(x, y), source.pixel(x, y));
            assert_eq!(twice.pixel(8 - x, y), source.pixel(x, y));
        }
    }
}

#[test]
fn bilateral_keeps_edges_that_gaussian_blends() {
    let source = vertical_edge(16, 4);
    let step = |b: &PixelBuffer| b.pixel(8, 1)[0] as i32 - b.pixel(7, 1)[0] as i32;

    let mut gaussian = source.clone();
    GaussianBlur::new(2.0, 7).unwrap().apply_cpu(&mut gaussian);
    let mut bilateral = source.clone();
    BilateralFilter::new(2.0, 0.1, 7).unwrap().apply_cpu(&mut bilateral);

    assert!(step(&bilateral) > step(&gaussian) + 50);
}

#[test]
fn chain_order_matters() {
    let source = PixelBuffer::filled(2, 2, [128, 128, 128, 255]).unwrap();
    let gray_then_tone = FilterChain::new()
        .with("gray", Grayscale::new(true))
        .with("tone", ColorTone::new(Tone::Warm, true));
    let tone_then_gray = FilterChain::new()
        .with("tone", ColorTone::new(Tone::Warm, true))
        .with("gray", Grayscale::new(true));

    let mut engine = RenderEngine::cpu();
    let (a, _) = engine.render(&gray_then_tone, &source).unwrap();
    let (b, _) = engine.render(&tone_then_gray, &source).unwrap();
    assert_ne!(a, b);
    let [r, g, bl, _] = b.pixel(0, 0);
    assert!(r == g && g == bl);
}

#[test]
fn equalization_stretches_low_contrast() {
    let source = PixelBuffer::from_fn(4, 1, |x, _| {
        let v = 100 + x as u8;
        [v, v, v, 255]
    })
    .unwrap();

    let table = equalization_table(&source);
    assert_eq!(table.len(), 256);
    assert!(table.windows(2).all(|w| w[0] <= w[1]));

    let filter = HistogramEqualization::from_image(&source);
    assert!(!filter.is_neutral());
    let mut buffer = source.clone();
    filter.apply_cpu(&mut buffer);
    assert!(buffer.pixel(0, 0)[0] <= 1);
    assert!(buffer.pixel(3, 0)[0] >= 254);
}

#[test]
fn invalid_parameters_are_rejected_at_construction() {
    let registry = FilterRegistry::with_builtins();
    let cases = [
        ("sharpen", Parameters::new().with("strength", 3.0)),
        ("gaussian_blur", Parameters::new().with("sigma", f64::NAN)),
        ("median", Parameters::new().with("size", 9i64)),
        ("canny", Parameters::new().with("low", 50.0).with("high", 10.0)),
        ("histogram_equalization", Parameters::new().with("table", vec![1.0, 2.0])),
        ("reflect", Parameters::new().with("mode", "sideways")),
        ("brightness", Parameters::new().with("amount", "bright")),
    ];
    for (id, params) in cases {
        assert!(registry.create(id, &params).is_err(), "{} accepted {:?}", id, params);
    }
    assert!(matches!(
        registry.create("posterize", &Parameters::new()),
        Err(ParameterError::UnknownFilter(_))
    ));
}
