//! Wire the linker script into bare-metal builds. Host builds (tests) link
//! normally.

use std::env;
use std::path::Path;

fn main() {
    let target = env::var("TARGET").unwrap_or_default();
    if target.starts_with("riscv64") {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR");
        let script = Path::new(&manifest_dir).join("src/arch/riscv64/linker.ld");
        println!("cargo:rustc-link-arg=-T{}", script.display());
        println!("cargo:rerun-if-changed={}", script.display());
    }
}
