//! Build script for generating WGSL constant definitions from Rust GPU limits

use std::{fs, path::Path};

// Mirrors of src/constants.rs; the generated WGSL is the single copy the
// shaders see, so a mismatch here shows up as a layout test failure rather
// than a silent GPU divergence.
const MESHLET_MAX_VERTICES: u32 = 64;
const MESHLET_MAX_TRIANGLES: u32 = 64;
const TASK_GROUP_SIZE: u32 = 64;
const CULL_WORKGROUP_SIZE: u32 = 64;
const MAX_TASK_COMMANDS: u32 = 1 << 17;
const MAX_MESHLET_DRAWS: u32 = 1 << 20;
const MAX_DISPATCH_DIM: u32 = 65_535;
const MAX_LOD_COUNT: u32 = 8;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let shader_dir = Path::new("src/renderer/shaders/generated");
    fs::create_dir_all(shader_dir).expect("Failed to create generated shader directory");

    let constants_path = shader_dir.join("constants.wgsl");
    fs::write(&constants_path, generate_wgsl_constants())
        .expect("Failed to write generated constants WGSL");
}

/// Generate WGSL constants
fn generate_wgsl_constants() -> String {
    format!(
        r#"// AUTO-GENERATED GPU CONSTANTS - DO NOT EDIT
// Generated from build.rs; keep in sync with src/constants.rs

const MESHLET_MAX_VERTICES: u32 = {}u;
const MESHLET_MAX_TRIANGLES: u32 = {}u;
const TASK_GROUP_SIZE: u32 = {}u;
const CULL_WORKGROUP_SIZE: u32 = {}u;
const MAX_TASK_COMMANDS: u32 = {}u;
const MAX_MESHLET_DRAWS: u32 = {}u;
const MAX_DISPATCH_DIM: u32 = {}u;
const MAX_LOD_COUNT: u32 = {}u;
"#,
        MESHLET_MAX_VERTICES,
        MESHLET_MAX_TRIANGLES,
        TASK_GROUP_SIZE,
        CULL_WORKGROUP_SIZE,
        MAX_TASK_COMMANDS,
        MAX_MESHLET_DRAWS,
        MAX_DISPATCH_DIM,
        MAX_LOD_COUNT,
    )
}
