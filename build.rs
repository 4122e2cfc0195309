use std::env::var;

/// Build-time variables surfaced by the startup banner.
const BANNER_ENV: [&str; 4] = [
    "CARGO_CFG_TARGET_ARCH",
    "CARGO_CFG_TARGET_OS",
    "CARGO_CFG_TARGET_ENV",
    "PROFILE",
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    for name in BANNER_ENV {
        if let Ok(value) = var(name) {
            println!("cargo:rustc-env={name}={value}");
        }
    }
}
