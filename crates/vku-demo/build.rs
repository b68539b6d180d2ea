use std::{env, fs, path::PathBuf};

// Inline GLSL for the demo triangle, written to $OUT_DIR as
// triangle.vert.spv / triangle.frag.spv for the runtime loader.
//   binding 0, location 0: R32G32B32_SFLOAT (pos)
//   binding 0, location 1: R32G32B32_SFLOAT (color)
//   set 0, binding 0: uniform mat4 mvp
const VS_SRC: &str = r#"
#version 450
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inColor;

layout(set = 0, binding = 0) uniform Camera { mat4 mvp; } u;

layout(location = 0) out vec3 vColor;

void main() {
    vColor = inColor;
    gl_Position = u.mvp * vec4(inPos, 1.0);
}
"#;

const FS_SRC: &str = r#"
#version 450
layout(location = 0) in vec3 vColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(vColor, 1.0);
}
"#;

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));

    let comp = shaderc::Compiler::new().expect("shaderc compiler");
    let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (src, kind, name) in [
        (VS_SRC, shaderc::ShaderKind::Vertex, "triangle.vert"),
        (FS_SRC, shaderc::ShaderKind::Fragment, "triangle.frag"),
    ] {
        let spv = comp
            .compile_into_spirv(src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8())
            .unwrap_or_else(|e| panic!("write {name}.spv: {e}"));
    }

    println!("cargo:rerun-if-changed=build.rs");
}
