// build.rs
// Compiles the demo's GLSL shaders to SPIR-V with glslc from the Vulkan SDK

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

fn compile_shader(glslc: &Path, source: &Path, target_dir: &Path) -> Result<bool, String> {
    let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
        return Ok(false);
    };
    // quad.vert -> quad.vert.spv, so stages sharing a stem do not collide
    let out_file = target_dir.join(format!("{file_name}.spv"));

    let up_to_date = match (std::fs::metadata(source), std::fs::metadata(&out_file)) {
        (Ok(src), Ok(dst)) => matches!((src.modified(), dst.modified()), (Ok(s), Ok(d)) if s <= d),
        _ => false,
    };
    if up_to_date {
        eprintln!("info: Shader {file_name} is up to date");
        return Ok(false);
    }

    let status = Command::new(glslc)
        .arg(source)
        .arg("-o")
        .arg(&out_file)
        .status()
        .map_err(|e| format!("failed to run glslc for {file_name}: {e}"))?;

    if status.success() {
        eprintln!("info: Compiled {file_name} -> {}", out_file.display());
        Ok(true)
    } else {
        Err(format!(
            "glslc failed for {file_name} with exit code {}",
            status.code().unwrap_or(-1)
        ))
    }
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        PathBuf::from(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        PathBuf::from(&vulkan_sdk).join("bin").join("glslc")
    };
    if !glslc.exists() {
        println!("cargo:warning=glslc not found at {}", glslc.display());
        return;
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let shader_dir = manifest_dir.join("shaders");
    // Workspace-level target/shaders, where the renderer looks by default
    let target_dir = manifest_dir.join("..").join("target").join("shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=failed to create {}: {e}", target_dir.display());
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=no shader directory at {}: {e}", shader_dir.display());
            return;
        }
    };

    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        if !is_shader {
            continue;
        }
        match compile_shader(&glslc, &path, &target_dir) {
            Ok(true) => compiled += 1,
            Ok(false) => {}
            Err(e) => panic!("Shader compilation failed: {e}"),
        }
    }

    eprintln!("info: {compiled} shader(s) compiled");
}
