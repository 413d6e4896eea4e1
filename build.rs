use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");

    // Plugins are loaded through the Rust ABI, so a plugin built with a
    // different compiler must be rejected at load time.
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let output = Command::new(rustc).arg("--version").output()?;
    let version = String::from_utf8(output.stdout)?;

    println!("cargo:rustc-env=RUST_REQGEN_RUSTC_VERSION={}", version.trim());

    Ok(())
}
