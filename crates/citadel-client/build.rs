//! Build script for citadel-client.
//!
//! Compiles the protobuf definitions into Rust code.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        // Client code is the SDK surface
        .build_client(true)
        // Server code backs the in-process mock used by integration tests
        .build_server(true)
        .compile_protos(&["proto/citadel.proto"], &["proto/"])?;

    println!("cargo:rerun-if-changed=proto/");

    Ok(())
}
