//! Build script for proto compilation.
//!
//! Generates the protocol types and the `Provider` gRPC service from
//! `proto/tfplugin.proto` into `OUT_DIR`. A vendored `protoc` is used so the
//! build does not depend on a system installation.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_prost_build::configure()
        .build_client(false)
        .build_server(true)
        .compile_protos(&["proto/tfplugin.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/tfplugin.proto");

    Ok(())
}
