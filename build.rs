// Sets API_SERVER_VERSION for the startup log and the upstream User-Agent.
// The patch component can be replaced through API_SERVER_PATCH_VERSION.

use std::env;

fn main() {
    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION not set");

    let parts: Vec<&str> = version.split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        panic!("package version must be MAJOR.MINOR.PATCH, got {version}");
    };

    let final_patch = env::var("API_SERVER_PATCH_VERSION").unwrap_or_else(|_| patch.to_string());

    println!(
        "cargo:rustc-env=API_SERVER_VERSION={}.{}.{}",
        major, minor, final_patch
    );

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=API_SERVER_PATCH_VERSION");
}
