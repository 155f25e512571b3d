//! WGSL fragment programs.
//!
//! Each constant or generator returns the `fs_main` part of a program; the
//! shared bindings, vertex stage and `fetch`/`step_size` helpers are
//! prepended by [`GpuProgram::source`](crate::core::gpu::GpuProgram::source).
//! Neighbourhood programs get one variant per kernel size so loop bounds are
//! compile-time constants.

use crate::core::kernel::ChannelScope;
use std::fmt::Write as _;

/// Shared luma weights, also used by the CPU paths.
pub const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

// ============================================================================
// Per-pixel colour programs
// ============================================================================

pub const GRAYSCALE: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let color = fetch(frag.uv);
    let gray = dot(color.rgb, vec3<f32>(0.299, 0.587, 0.114));
    return vec4<f32>(vec3<f32>(gray), color.a);
}
"#;

pub const SEPIA: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let r = dot(c.rgb, vec3<f32>(0.393, 0.769, 0.189));
    let g = dot(c.rgb, vec3<f32>(0.349, 0.686, 0.168));
    let b = dot(c.rgb, vec3<f32>(0.272, 0.534, 0.131));
    return vec4<f32>(clamp(vec3<f32>(r, g, b), vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

pub const INVERT: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let a = select(c.a, 1.0 - c.a, params.uInvertAlpha > 0.5);
    return vec4<f32>(vec3<f32>(1.0) - c.rgb, a);
}
"#;

pub const BRIGHTNESS: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    return vec4<f32>(clamp(c.rgb + params.uOffset, vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

pub const CONTRAST: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let v = ((c.rgb * 255.0 - vec3<f32>(128.0)) * params.uFactor + vec3<f32>(128.0)) / 255.0;
    return vec4<f32>(clamp(v, vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

pub const SATURATION: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let gray = vec3<f32>(dot(c.rgb, vec3<f32>(0.299, 0.587, 0.114)));
    let v = gray + (c.rgb - gray) * params.uSaturation;
    return vec4<f32>(clamp(v, vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

pub const EXPOSURE: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    return vec4<f32>(min(c.rgb * params.uMultiplier, vec3<f32>(1.0)), c.a);
}
"#;

pub const THRESHOLD: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let stepped = select(params.uLower, params.uUpper, c.rgb > params.uThreshold);
    let rgb = select(c.rgb, stepped, params.uMask > vec3<f32>(0.5));
    return vec4<f32>(rgb, c.a);
}
"#;

pub const COLOR_TONE: &str = r#"
fn curve(k: vec4<f32>, v: f32) -> f32 {
    let x = v * 255.0;
    return clamp((((k.x * x + k.y) * x + k.z) * x + k.w) / 255.0, 0.0, 1.0);
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    return vec4<f32>(curve(params.uRedCurve, c.r), c.g, curve(params.uBlueCurve, c.b), c.a);
}
"#;

pub const VIGNETTE: &str = r#"
fn soft_step(e0: f32, e1: f32, x: f32) -> f32 {
    let t = clamp((x - e0) / max(e1 - e0, 0.00001), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let centre = vec2<f32>(0.5, 0.5);
    let max_dist = length(centre);
    let dist = distance(frag.uv, centre);
    let v = soft_step(params.uRadius * max_dist, (params.uRadius + params.uSoftness) * max_dist, dist);
    let factor = select(1.0 + v, 1.0 - v, params.uDark > 0.5);
    return vec4<f32>(clamp(c.rgb * factor, vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

pub const HISTOGRAM_EQUALIZE: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let y = dot(c.rgb, vec3<f32>(0.299, 0.587, 0.114));
    let cr = (c.r - y) * 0.713 + 0.5;
    let cb = (c.b - y) * 0.564 + 0.5;
    let index = u32(clamp(round(y * 255.0), 0.0, 255.0));
    let eq = uCdf[index] / 255.0;
    let r = eq + 1.402 * (cr - 0.5);
    let g = eq - 0.714 * (cr - 0.5) - 0.344 * (cb - 0.5);
    let b = eq + 1.772 * (cb - 0.5);
    return vec4<f32>(clamp(vec3<f32>(r, g, b), vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

// ============================================================================
// Neighbourhood programs
// ============================================================================

pub const SHARPEN: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv);
    let s = step_size();
    let up = fetch(frag.uv + vec2<f32>(0.0, -s.y)).rgb;
    let down = fetch(frag.uv + vec2<f32>(0.0, s.y)).rgb;
    let left = fetch(frag.uv + vec2<f32>(-s.x, 0.0)).rgb;
    let right = fetch(frag.uv + vec2<f32>(s.x, 0.0)).rgb;
    let lap = 4.0 * c.rgb - up - down - left - right;
    return vec4<f32>(clamp(c.rgb + lap * params.uStrength, vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
}
"#;

const SOBEL_HELPERS: &str = r#"
fn lum(uv: vec2<f32>) -> f32 {
    return dot(fetch(uv).rgb, vec3<f32>(0.299, 0.587, 0.114));
}

fn gradient(uv: vec2<f32>) -> vec2<f32> {
    let s = step_size();
    let tl = lum(uv + vec2<f32>(-s.x, -s.y));
    let t = lum(uv + vec2<f32>(0.0, -s.y));
    let tr = lum(uv + vec2<f32>(s.x, -s.y));
    let l = lum(uv + vec2<f32>(-s.x, 0.0));
    let r = lum(uv + vec2<f32>(s.x, 0.0));
    let bl = lum(uv + vec2<f32>(-s.x, s.y));
    let b = lum(uv + vec2<f32>(0.0, s.y));
    let br = lum(uv + vec2<f32>(s.x, s.y));
    let gx = -tl + tr - 2.0 * l + 2.0 * r - bl + br;
    let gy = -tl - 2.0 * t - tr + bl + 2.0 * b + br;
    return vec2<f32>(gx, gy);
}
"#;

const SOBEL_EDGE_MAIN: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let g = gradient(frag.uv);
    var v = length(g);
    if (params.uMode > 1.5) {
        v = abs(g.y);
    } else if (params.uMode > 0.5) {
        v = abs(g.x);
    }
    let e = min(v, 1.0);
    return vec4<f32>(e, e, e, 1.0);
}
"#;

/// Sobel edge map. `uMode`: 0 magnitude, 1 `|Gx|`, 2 `|Gy|`.
pub fn sobel_edge() -> String {
    let mut src = String::from(SOBEL_HELPERS);
    src.push_str(SOBEL_EDGE_MAIN);
    src
}

const CONVOLUTION_TEMPLATE: &str = r#"
const RADIUS: i32 = __RADIUS__;
const SIZE: i32 = __SIZE__;

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let centre = fetch(frag.uv);
    let s = step_size();
    var sum = vec4<f32>(0.0);
    for (var y: i32 = -RADIUS; y <= RADIUS; y = y + 1) {
        for (var x: i32 = -RADIUS; x <= RADIUS; x = x + 1) {
            let w = uKernel[(y + RADIUS) * SIZE + (x + RADIUS)];
            sum = sum + w * fetch(frag.uv + vec2<f32>(f32(x), f32(y)) * s);
        }
    }
    __RETURN__
}
"#;

/// Program key for a convolution variant.
pub fn convolution_key(size: u32, scope: ChannelScope) -> String {
    match scope {
        ChannelScope::Full => format!("convolution_full_{}", size),
        ChannelScope::ColorOnly => format!("convolution_{}", size),
    }
}

/// Weighted-sum program for an odd `size`; weights come from the `uKernel` table.
pub fn convolution(size: u32, scope: ChannelScope) -> String {
    let ret = match scope {
        ChannelScope::Full => "return clamp(sum, vec4<f32>(0.0), vec4<f32>(1.0));",
        ChannelScope::ColorOnly => {
            "return vec4<f32>(clamp(sum.rgb, vec3<f32>(0.0), vec3<f32>(1.0)), centre.a);"
        }
    };
    CONVOLUTION_TEMPLATE
        .replace("__RADIUS__", &(size / 2).to_string())
        .replace("__SIZE__", &size.to_string())
        .replace("__RETURN__", ret)
}

const BILATERAL_TEMPLATE: &str = r#"
const RADIUS: i32 = __RADIUS__;
const SIZE: i32 = __SIZE__;

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let centre = fetch(frag.uv);
    let s = step_size();
    var sum = vec3<f32>(0.0);
    var total = 0.0;
    for (var y: i32 = -RADIUS; y <= RADIUS; y = y + 1) {
        for (var x: i32 = -RADIUS; x <= RADIUS; x = x + 1) {
            let neighbour = fetch(frag.uv + vec2<f32>(f32(x), f32(y)) * s).rgb;
            let spatial = uSpatial[(y + RADIUS) * SIZE + (x + RADIUS)];
            let d = length(neighbour - centre.rgb);
            let closeness = exp(-(d * d) / (2.0 * params.uSigmaColor * params.uSigmaColor));
            let w = spatial * closeness;
            sum = sum + neighbour * w;
            total = total + w;
        }
    }
    let rgb = select(centre.rgb, sum / total, total > 0.0);
    return vec4<f32>(rgb, centre.a);
}
"#;

/// Bilateral program for an odd `size`; spatial weights come from `uSpatial`.
pub fn bilateral(size: u32) -> String {
    BILATERAL_TEMPLATE
        .replace("__RADIUS__", &(size / 2).to_string())
        .replace("__SIZE__", &size.to_string())
}

/// Comparator pairs of Batcher's odd–even merge sort for `n` inputs.
///
/// Each pair `(i, j)` has `i < j` and orders the two slots ascending.
/// Comparators touching slots beyond `n` are dropped, which is sound because
/// those slots behave as `+∞` padding.
pub fn sorting_network(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut p = 1;
    while p < n {
        let mut k = p;
        while k >= 1 {
            let mut j = k % p;
            while j + k < n {
                for i in 0..k.min(n - j - k) {
                    if (i + j) / (p * 2) == (i + j + k) / (p * 2) {
                        pairs.push((i + j, i + j + k));
                    }
                }
                j += 2 * k;
            }
            k /= 2;
        }
        p *= 2;
    }
    pairs
}

/// Per-channel median program for an odd `size`, using a sorting network
/// over `size²` samples (component-wise `min`/`max` on RGB).
pub fn median(size: u32) -> String {
    let n = (size * size) as usize;
    let r = (size / 2) as i32;
    let mut src = String::new();
    let _ = writeln!(src, "\n@fragment");
    let _ = writeln!(src, "fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {{");
    let _ = writeln!(src, "    let centre = fetch(frag.uv);");
    let _ = writeln!(src, "    let s = step_size();");
    let _ = writeln!(src, "    var v: array<vec3<f32>, {}>;", n);
    let mut slot = 0;
    for y in -r..=r {
        for x in -r..=r {
            let _ = writeln!(
                src,
                "    v[{}] = fetch(frag.uv + vec2<f32>({:.1}, {:.1}) * s).rgb;",
                slot, x as f32, y as f32
            );
            slot += 1;
        }
    }
    for (i, j) in sorting_network(n) {
        let _ = writeln!(
            src,
            "    {{ let a = v[{i}]; let b = v[{j}]; v[{i}] = min(a, b); v[{j}] = max(a, b); }}"
        );
    }
    let _ = writeln!(src, "    return vec4<f32>(v[{}], centre.a);", n / 2);
    let _ = writeln!(src, "}}");
    src
}

// ============================================================================
// Geometric warps
// ============================================================================

pub const SWIRL: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    var tc = frag.uv - params.uCenter;
    let dist = length(tc);
    if (dist < params.uRadius) {
        let percent = (params.uRadius - dist) / params.uRadius;
        let theta = percent * percent * params.uAngle;
        let s = sin(theta);
        let c = cos(theta);
        tc = vec2<f32>(dot(tc, vec2<f32>(c, -s)), dot(tc, vec2<f32>(s, c)));
    }
    return fetch(tc + params.uCenter);
}
"#;

pub const BULGE: &str = r#"
fn soft_step(e0: f32, e1: f32, x: f32) -> f32 {
    let t = clamp((x - e0) / max(e1 - e0, 0.00001), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    var coord = frag.uv - params.uCenter;
    let dist = length(coord);
    if (dist < params.uRadius && dist > 0.0) {
        let percent = dist / params.uRadius;
        if (params.uStrength > 0.0) {
            coord = coord * mix(1.0, soft_step(0.0, params.uRadius / dist, percent), params.uStrength * 0.75);
        } else {
            coord = coord * mix(1.0, pow(percent, 1.0 + params.uStrength * 0.75) * params.uRadius / dist, 1.0 - percent);
        }
    }
    return fetch(coord + params.uCenter);
}
"#;

pub const ZOOM_BLUR: &str = r#"
fn random(frag_coord: vec3<f32>, seed: f32) -> f32 {
    return fract(sin(dot(frag_coord + vec3<f32>(seed), vec3<f32>(12.9898, 78.233, 151.7182))) * 43758.5453 + seed);
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let to_centre = params.uCenter - frag.uv;
    let offset = random(vec3<f32>(frag.position.xy, 0.0), 0.0);
    var color = vec4<f32>(0.0);
    var total = 0.0;
    for (var t: i32 = 0; t < 40; t = t + 1) {
        let percent = (f32(t) + offset) / 40.0;
        let weight = 4.0 * (percent - percent * percent);
        let tap = fetch(frag.uv + to_centre * percent * params.uStrength);
        color = color + vec4<f32>(tap.rgb * tap.a, tap.a) * weight;
        total = total + weight;
    }
    color = color / total;
    var rgb = vec3<f32>(0.0);
    if (color.a > 0.0) {
        rgb = color.rgb / color.a;
    }
    return clamp(vec4<f32>(rgb, color.a), vec4<f32>(0.0), vec4<f32>(1.0));
}
"#;

pub const REFLECT: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let u = frag.uv.x;
    let v = frag.uv.y;
    var m = frag.uv;
    let mode = i32(params.uMode + 0.5);
    switch mode {
        case 0 { if (u > 0.5) { m.x = 1.0 - u; } }
        case 1 { if (u < 0.5) { m.x = 1.0 - u; } }
        case 2 { if (v > 0.5) { m.y = 1.0 - v; } }
        case 3 { if (v < 0.5) { m.y = 1.0 - v; } }
        case 4 {
            if (u > 0.5) { m.x = 1.0 - u; }
            if (v > 0.5) { m.y = 1.0 - v; }
        }
        case 5 {
            if (u < 0.5) { m.x = 1.0 - u; }
            if (v > 0.5) { m.y = 1.0 - v; }
        }
        case 6 {
            if (u > 0.5) { m.x = 1.0 - u; }
            if (v < 0.5) { m.y = 1.0 - v; }
        }
        case 7 {
            if (u < 0.5) { m.x = 1.0 - u; }
            if (v < 0.5) { m.y = 1.0 - v; }
        }
        case 8 { if (u + v > 1.0) { m = vec2<f32>(1.0 - u, 1.0 - v); } }
        case 9 { if (u < v) { m = vec2<f32>(v, u); } }
        default {}
    }
    return fetch(m);
}
"#;

// ============================================================================
// Edge-detection cascade passes
// ============================================================================

pub const CANNY_GRAYSCALE: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let gray = dot(fetch(frag.uv).rgb, vec3<f32>(0.299, 0.587, 0.114));
    return vec4<f32>(gray, gray, gray, 1.0);
}
"#;

/// Sobel pass on the red channel, writing `g / 8 + 0.5` to `rg`.
pub const CANNY_SOBEL: &str = r#"
fn lum(uv: vec2<f32>) -> f32 {
    return fetch(uv).r;
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let s = step_size();
    let uv = frag.uv;
    let tl = lum(uv + vec2<f32>(-s.x, -s.y));
    let t = lum(uv + vec2<f32>(0.0, -s.y));
    let tr = lum(uv + vec2<f32>(s.x, -s.y));
    let l = lum(uv + vec2<f32>(-s.x, 0.0));
    let r = lum(uv + vec2<f32>(s.x, 0.0));
    let bl = lum(uv + vec2<f32>(-s.x, s.y));
    let b = lum(uv + vec2<f32>(0.0, s.y));
    let br = lum(uv + vec2<f32>(s.x, s.y));
    let gx = -tl + tr - 2.0 * l + 2.0 * r - bl + br;
    let gy = -tl - 2.0 * t - tr + bl + 2.0 * b + br;
    return vec4<f32>(gx / 8.0 + 0.5, gy / 8.0 + 0.5, 0.0, 1.0);
}
"#;

pub const CANNY_SUPPRESS: &str = r#"
fn decode(uv: vec2<f32>) -> vec2<f32> {
    return (fetch(uv).rg - vec2<f32>(0.5)) * 8.0;
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let g = decode(frag.uv);
    let mag = length(g);
    var angle = degrees(atan2(g.y, g.x));
    if (angle < 0.0) {
        angle = angle + 180.0;
    }
    let s = step_size();
    var d = vec2<f32>(s.x, 0.0);
    if (angle >= 22.5 && angle < 67.5) {
        d = vec2<f32>(s.x, s.y);
    } else if (angle >= 67.5 && angle < 112.5) {
        d = vec2<f32>(0.0, s.y);
    } else if (angle >= 112.5 && angle < 157.5) {
        d = vec2<f32>(-s.x, s.y);
    }
    let n1 = length(decode(frag.uv + d));
    let n2 = length(decode(frag.uv - d));
    let kept = min(select(0.0, mag, mag >= n1 && mag >= n2), 1.0);
    return vec4<f32>(kept, kept, kept, 1.0);
}
"#;

pub const CANNY_THRESHOLD: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let m = fetch(frag.uv).r;
    var v = 0.0;
    if (m >= params.uHigh) {
        v = 1.0;
    } else if (m > params.uLow) {
        v = 0.5;
    }
    return vec4<f32>(v, v, v, 1.0);
}
"#;

pub const CANNY_HYSTERESIS: &str = r#"
@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let c = fetch(frag.uv).r;
    var v = 0.0;
    if (c >= 0.99) {
        v = 1.0;
    } else if (c > 0.25) {
        let s = step_size();
        for (var dy: i32 = -1; dy <= 1; dy = dy + 1) {
            for (var dx: i32 = -1; dx <= 1; dx = dx + 1) {
                if (fetch(frag.uv + vec2<f32>(f32(dx), f32(dy)) * s).r >= 0.99) {
                    v = 1.0;
                }
            }
        }
    }
    return vec4<f32>(v, v, v, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(network: &[(usize, usize)], values: &mut [u32]) {
        for &(i, j) in network {
            if values[i] > values[j] {
                values.swap(i, j);
            }
        }
    }

    #[test]
    fn test_sorting_network_sorts() {
        for n in [9usize, 25, 49] {
            let network = sorting_network(n);
            assert!(network.iter().all(|&(i, j)| i < j && j < n));

            // Deterministic pseudo-random inputs plus a reversed sequence.
            let mut state = 0x2545_f491u32;
            for _ in 0..200 {
                let mut values: Vec<u32> = (0..n)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 17;
                        state ^= state << 5;
                        state % 256
                    })
                    .collect();
                let mut expected = values.clone();
                expected.sort_unstable();
                apply(&network, &mut values);
                assert_eq!(values, expected);
            }
            let mut reversed: Vec<u32> = (0..n as u32).rev().collect();
            apply(&network, &mut reversed);
            assert_eq!(reversed, (0..n as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_zero_one_principle_small() {
        // Exhaustive over all 0/1 inputs of length 9.
        let network = sorting_network(9);
        for bits in 0u32..(1 << 9) {
            let mut values: Vec<u32> = (0..9).map(|i| (bits >> i) & 1).collect();
            apply(&network, &mut values);
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "failed for {:09b}", bits);
        }
    }

    #[test]
    fn test_generated_variants() {
        let conv = convolution(7, ChannelScope::ColorOnly);
        assert!(conv.contains("const RADIUS: i32 = 3;"));
        assert!(conv.contains("const SIZE: i32 = 7;"));
        assert!(conv.contains("centre.a"));
        assert!(!convolution(7, ChannelScope::Full).contains("centre.a);"));
        assert_ne!(
            convolution_key(5, ChannelScope::Full),
            convolution_key(5, ChannelScope::ColorOnly)
        );

        let med = median(3);
        assert!(med.contains("array<vec3<f32>, 9>"));
        assert!(med.contains("return vec4<f32>(v[4], centre.a);"));

        assert!(bilateral(5).contains("const RADIUS: i32 = 2;"));
    }
}
