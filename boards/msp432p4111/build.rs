//! Put memory.x on the linker search path and link the TI driver library.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR not set"));
    fs::copy("memory.x", out.join("memory.x")).expect("copy memory.x");
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // FlashCtl_A, PCM and SysCtl_A come from the MSP432P4 driverlib archive.
    println!("cargo:rerun-if-env-changed=MSP432_DRIVERLIB_DIR");
    if let Some(dir) = env::var_os("MSP432_DRIVERLIB_DIR") {
        println!("cargo:rustc-link-search={}", PathBuf::from(dir).display());
    }
    println!("cargo:rustc-link-lib=static=msp432p4xx_driverlib");

    if env::var_os("CARGO_FEATURE_RTT").is_some() {
        println!("cargo:rustc-link-arg=-Tdefmt.x");
    }
}
