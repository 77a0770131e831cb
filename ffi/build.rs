use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=cargo did not set CARGO_MANIFEST_DIR/OUT_DIR, skipping nettask.h");
        return;
    };

    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("NETTASK_H")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(PathBuf::from(out_dir).join("nettask.h"));
        }
        Err(e) => println!("cargo:warning=failed to generate nettask.h: {e}"),
    }
}
