//! Build-time selection of which implementation families are compiled in.
//!
//! The runtime selector only chooses among implementations present in the
//! registry; this script decides what the registry may contain for the target.
//!
//! - `VKERN_GENERIC_ONLY=1` compiles only the zero-requirement implementations.
//! - Targets other than x86_64 and aarch64 get the generic implementations only.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=VKERN_GENERIC_ONLY");
    println!("cargo:rustc-check-cfg=cfg(vkern_generic_only)");

    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if generic_only_requested() {
        println!("cargo:warning=VKERN_GENERIC_ONLY set: building generic kernels only");
        println!("cargo:rustc-cfg=vkern_generic_only");
        return;
    }

    match target_arch.as_str() {
        "x86_64" | "aarch64" => {}
        other => {
            println!(
                "cargo:warning=No vector implementations for target architecture: {}",
                other
            );
            println!("cargo:rustc-cfg=vkern_generic_only");
        }
    }
}

fn generic_only_requested() -> bool {
    env::var("VKERN_GENERIC_ONLY")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
