//! Build script for the storefront crate.
//!
//! Fingerprints the stylesheet so templates can reference it by content hash
//! and browsers can cache it forever.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    fingerprint_css();
}

/// Hash `static/css/main.css` and expose the first 8 hex chars as `CSS_HASH`.
///
/// A copy named `main.<hash>.css` is written next to the original.
fn fingerprint_css() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let css_dir = Path::new(&manifest_dir).join("static/css");
    let css_path = css_dir.join("main.css");

    println!("cargo:rerun-if-changed={}", css_path.display());

    let Ok(content) = fs::read(&css_path) else {
        println!("cargo:warning=main.css not found, serving unhashed stylesheet");
        println!("cargo:rustc-env=CSS_HASH=");
        return;
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short = digest.get(..8).unwrap_or(&digest);
    println!("cargo:rustc-env=CSS_HASH={short}");

    let hashed = css_dir.join(format!("main.{short}.css"));
    if !hashed.exists() {
        fs::write(&hashed, &content).expect("Failed to write fingerprinted stylesheet");
    }
}
