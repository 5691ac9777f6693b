//! Build script for clockless-envoy.

use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rustc-check-cfg=cfg(rust_analyzer)");

    // Pick the linker memory map for the board target, if the demo provides one
    let target = env::var("TARGET").expect("cargo sets TARGET");
    let memory_file = if target.starts_with("thumbv8m") {
        "memory-pico2.x"
    } else if target.starts_with("thumbv6m") {
        "memory-pico1.x"
    } else {
        return;
    };

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("cargo sets CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let source = manifest_dir.join(memory_file);
    println!("cargo:rerun-if-changed={memory_file}");
    if let Ok(memory_x) = fs::read_to_string(&source) {
        fs::write(out_dir.join("memory.x"), memory_x).expect("Failed to write memory.x");
        println!("cargo:rustc-link-search={}", out_dir.display());
    }
}
