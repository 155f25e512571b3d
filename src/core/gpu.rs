//! GPU program descriptions.
//!
//! A filter's GPU half is a [`GpuProgram`]: a WGSL fragment entry point plus
//! the named uniform values the renderer binds before the draw. Programs are
//! plain data; compiling and running them is the renderer's job
//! (see [`crate::execution::gpu`]).
//!
//! Every assembled program shares one header:
//! - `@binding(0)` the source texture, `@binding(1)` a nearest, clamp-to-edge sampler
//! - `@binding(2)` a uniform block `params` whose first two fields are always
//!   `uStepW = 1/width` and `uStepH = 1/height`
//! - `@binding(3)` an optional read-only `array<f32>` for kernels and lookup tables
//! - a fullscreen-triangle vertex stage and a `fetch(uv)` sampling helper

use std::fmt::Write as _;

/// Uniform names bound by the renderer for every program.
pub const STEP_W: &str = "uStepW";
/// See [`STEP_W`].
pub const STEP_H: &str = "uStepH";

/// A uniform parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    /// Alignment in bytes under WGSL uniform layout rules.
    pub fn align(&self) -> usize {
        match self {
            UniformValue::Float(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) | UniformValue::Vec4(_) => 16,
        }
    }

    /// WGSL type name.
    pub fn wgsl_type(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "f32",
            UniformValue::Vec2(_) => "vec2<f32>",
            UniformValue::Vec3(_) => "vec3<f32>",
            UniformValue::Vec4(_) => "vec4<f32>",
        }
    }

    fn components(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => std::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec3(v) => v,
            UniformValue::Vec4(v) => v,
        }
    }
}

/// A named uniform bound before each draw.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    /// Field name inside the `params` block.
    pub name: String,
    /// Current value.
    pub value: UniformValue,
}

/// A float array bound as a read-only storage buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBinding {
    /// Global variable name in WGSL.
    pub name: String,
    /// Values.
    pub values: Vec<f32>,
}

/// A fragment program plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuProgram {
    key: String,
    body: String,
    uniforms: Vec<UniformBinding>,
    table: Option<TableBinding>,
}

impl GpuProgram {
    /// Create a program. `key` identifies the compiled variant (for example
    /// `convolution_7`); two programs with the same key must assemble to the
    /// same source. `body` defines `fs_main`.
    pub fn new(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            uniforms: Vec::new(),
            table: None,
        }
    }

    /// Add a float uniform.
    pub fn with_float(self, name: impl Into<String>, value: f32) -> Self {
        self.with_uniform(name, UniformValue::Float(value))
    }

    /// Add a uniform.
    pub fn with_uniform(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.uniforms.push(UniformBinding {
            name: name.into(),
            value,
        });
        self
    }

    /// Attach a float table.
    pub fn with_table(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.table = Some(TableBinding {
            name: name.into(),
            values,
        });
        self
    }

    /// Variant key used for pipeline caching.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The `fs_main` definition.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Filter-specific uniforms, excluding the step sizes.
    pub fn uniforms(&self) -> &[UniformBinding] {
        &self.uniforms
    }

    /// Look up a uniform by name.
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.iter().find(|u| u.name == name).map(|u| &u.value)
    }

    /// Attached table, if any.
    pub fn table(&self) -> Option<&TableBinding> {
        self.table.as_ref()
    }

    /// All uniforms in block order, with the step sizes for a
    /// `width × height` target first.
    pub fn bindings_for(&self, width: u32, height: u32) -> Vec<UniformBinding> {
        let mut all = Vec::with_capacity(self.uniforms.len() + 2);
        all.push(UniformBinding {
            name: STEP_W.to_string(),
            value: UniformValue::Float(1.0 / width as f32),
        });
        all.push(UniformBinding {
            name: STEP_H.to_string(),
            value: UniformValue::Float(1.0 / height as f32),
        });
        all.extend(self.uniforms.iter().cloned());
        all
    }

    /// Full WGSL module source.
    pub fn source(&self) -> String {
        let mut src = String::with_capacity(HEADER.len() + self.body.len() + 256);
        src.push_str(BINDINGS);

        src.push_str("struct Params {\n");
        let _ = writeln!(src, "    {}: f32,", STEP_W);
        let _ = writeln!(src, "    {}: f32,", STEP_H);
        for u in &self.uniforms {
            let _ = writeln!(src, "    {}: {},", u.name, u.value.wgsl_type());
        }
        src.push_str("};\n");
        src.push_str("@group(0) @binding(2) var<uniform> params: Params;\n");

        if let Some(table) = &self.table {
            let _ = writeln!(
                src,
                "@group(0) @binding(3) var<storage, read> {}: array<f32>;",
                table.name
            );
        }

        src.push_str(HEADER);
        src.push_str(&self.body);
        src
    }

    /// Uniform block bytes for a `width × height` target.
    pub fn uniform_bytes(&self, width: u32, height: u32) -> Vec<u8> {
        pack_uniforms(&self.bindings_for(width, height))
    }
}

/// Pack uniforms into a byte block following WGSL uniform layout: each field
/// aligned to its type, block size rounded up to 16 bytes.
pub fn pack_uniforms(bindings: &[UniformBinding]) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::new();
    for binding in bindings {
        let align = binding.value.align();
        while bytes.len() % align != 0 {
            bytes.push(0);
        }
        bytes.extend_from_slice(bytemuck::cast_slice(binding.value.components()));
    }
    while bytes.len() % 16 != 0 || bytes.is_empty() {
        bytes.push(0);
    }
    bytes
}

const BINDINGS: &str = "\
@group(0) @binding(0) var uImage: texture_2d<f32>;
@group(0) @binding(1) var uSampler: sampler;
";

const HEADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    var output: VertexOutput;
    output.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, y);
    return output;
}

fn fetch(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(uImage, uSampler, uv, 0.0);
}

fn step_size() -> vec2<f32> {
    return vec2<f32>(params.uStepW, params.uStepH);
}

"#;

/// GPU-related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GpuError {
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    #[error("Failed to create GPU device: {0}")]
    DeviceRequest(String),

    #[error("Program '{key}' failed to compile: {message}")]
    Pipeline { key: String, message: String },

    #[error("Image {width}x{height} exceeds the maximum texture size {max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },

    #[error("GPU readback failed: {0}")]
    Readback(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_packing_alignment() {
        let bindings = vec![
            UniformBinding {
                name: "a".into(),
                value: UniformValue::Float(1.0),
            },
            UniformBinding {
                name: "b".into(),
                value: UniformValue::Vec2([2.0, 3.0]),
            },
            UniformBinding {
                name: "c".into(),
                value: UniformValue::Vec3([4.0, 5.0, 6.0]),
            },
        ];
        let bytes = pack_uniforms(&bindings);
        // a @0, b @8, c @16, size 28 rounded to 32
        assert_eq!(bytes.len(), 32);
        let floats = floats(&bytes);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[2], 2.0);
        assert_eq!(floats[3], 3.0);
        assert_eq!(floats[4], 4.0);
        assert_eq!(floats[6], 6.0);
    }

    #[test]
    fn test_step_sizes_lead_block() {
        let program = GpuProgram::new("test", "").with_float("uStrength", 0.5);
        let bytes = program.uniform_bytes(4, 8);
        let floats = floats(&bytes);
        assert_eq!(floats[0], 0.25);
        assert_eq!(floats[1], 0.125);
        assert_eq!(floats[2], 0.5);
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn test_source_declares_bindings() {
        let program = GpuProgram::new("test", "@fragment fn fs_main() {}")
            .with_float("uStrength", 1.0)
            .with_table("uKernel", vec![1.0]);
        let src = program.source();
        assert!(src.contains("uStrength: f32,"));
        assert!(src.contains("var<storage, read> uKernel: array<f32>;"));
        assert!(src.contains("fn vs_main"));
        assert!(src.ends_with("@fragment fn fs_main() {}"));
    }

    #[test]
    fn test_no_table_binding_without_table() {
        let src = GpuProgram::new("plain", "").source();
        assert!(!src.contains("@binding(3)"));
    }
}
