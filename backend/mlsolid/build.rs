use std::io::Result;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=../../mlsolid.proto");

    tonic_build::configure()
        .type_attribute(".mlsolid", "#[derive(serde::Serialize)]")
        .compile_protos(&["../../mlsolid.proto"], &["../../"])?;

    Ok(())
}
