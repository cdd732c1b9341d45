use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    // The linker script is only consumed for the embedded target, but the
    // copy is cheap enough to do unconditionally.
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
