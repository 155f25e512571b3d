//! Fixtures shared by the integration suites.

#![allow(dead_code)]

use prisma::prelude::*;

pub fn vertical_edge(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 {
            [0, 0, 0, 255]
        } else {
            [255, 255, 255, 255]
        }
    })
    .unwrap()
}

pub fn gradient(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        [(x * 30) as u8, (y * 40) as u8, ((x + y) * 15) as u8, 255]
    })
    .unwrap()
}

/// Registry id plus parameters that make the filter do something.
pub fn active_configurations() -> Vec<(&'static str, Parameters)> {
    let reversed: Vec<f64> = (0..256).rev().map(|v| v as f64).collect();
    vec![
        ("brightness", Parameters::new().with("amount", 0.3)),
        ("contrast", Parameters::new().with("amount", 0.5)),
        ("saturation", Parameters::new().with("amount", -0.5)),
        ("exposure", Parameters::new().with("exposure", 1.0)),
        ("vignette", Parameters::new().with("radius", 0.3)),
        ("gaussian_blur", Parameters::new().with("sigma", 1.5).with("size", 7i64)),
        ("bilateral", Parameters::new().with("sigma_spatial", 2.0).with("sigma_color", 0.3)),
        ("median", Parameters::new().with("size", 3i64)),
        ("sharpen", Parameters::new().with("strength", 1.0)),
        ("grayscale", Parameters::new()),
        ("sepia", Parameters::new()),
        ("invert", Parameters::new().with("invert_alpha", true)),
        ("threshold", Parameters::new().with("red", true).with("red_threshold", 100.0)),
        ("color_tone", Parameters::new().with("tone", "cold")),
        ("sobel", Parameters::new()),
        ("directional_edge", Parameters::new().with("direction", "vertical")),
        ("canny", Parameters::new().with("low", 5.0).with("high", 40.0)),
        ("histogram_equalization", Parameters::new().with("table", reversed)),
        ("swirl", Parameters::new().with("angle", 2.0)),
        ("bulge", Parameters::new().with("strength", 0.5)),
        ("zoom_blur", Parameters::new().with("strength", 0.5)),
        ("reflect", Parameters::new().with("mode", "top_to_bottom")),
    ]
}
