// Build script for proctl - embeds version at compile time

fn main() {
    // Release builds set PRO_VERSION; otherwise use Cargo.toml
    let version =
        std::env::var("PRO_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=PRO_VERSION={}", version);
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=PRO_VERSION");
}
