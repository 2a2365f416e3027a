// build.rs
// Compiles the GLSL shaders next to their sources as `<name>.spv` with glslc

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_DIR: &str = "../shaders/default";
const STAGES: [&str; 2] = ["vert", "frag"];

fn is_stale(source: &Path, output: &Path) -> bool {
    match (std::fs::metadata(source), std::fs::metadata(output)) {
        (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
            (Ok(src_time), Ok(dst_time)) => src_time > dst_time,
            _ => true,
        },
        _ => true,
    }
}

fn compile(glslc: &Path, source: &Path) -> bool {
    let mut output = source.as_os_str().to_owned();
    output.push(".spv");
    let output = PathBuf::from(output);

    if !is_stale(source, &output) {
        eprintln!("info: Shader {} is up to date", source.display());
        return false;
    }

    match Command::new(glslc).arg(source).arg("-o").arg(&output).status() {
        Ok(status) if status.success() => {
            eprintln!("info: Compiled {} -> {}", source.display(), output.display());
            true
        }
        Ok(status) => panic!(
            "glslc failed for {} with exit code {}",
            source.display(),
            status.code().unwrap_or(-1)
        ),
        Err(e) => panic!("Failed to run glslc for {}: {e}", source.display()),
    }
}

fn main() {
    println!("cargo:rerun-if-changed={SHADER_DIR}");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        PathBuf::from(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        PathBuf::from(&vulkan_sdk).join("bin").join("glslc")
    };
    if !glslc.exists() {
        panic!("glslc not found at {}", glslc.display());
    }

    let entries = match std::fs::read_dir(SHADER_DIR) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory at {SHADER_DIR}");
            return;
        }
    };

    let compiled = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| STAGES.contains(&ext))
        })
        .filter(|path| compile(&glslc, path))
        .count();

    eprintln!("info: Compiled {compiled} shader(s)");
}
