use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get the project root (workspace root)
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .ok_or("crate is expected to live under <workspace>/crates/")?;
    let proto_dir = workspace_root.join("proto");

    // Proto files to compile
    let proto_files = [
        proto_dir.join("modelroute/v1/common.proto"),
        proto_dir.join("modelroute/v1/router_service.proto"),
    ];

    // Tell Cargo to rerun if proto files change
    for proto in &proto_files {
        println!("cargo:rerun-if-changed={}", proto.display());
    }

    // Fall back to the vendored protoc when none is configured
    if env::var_os("PROTOC").is_none() {
        env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let out_dir = manifest_dir.join("src/gen");
    std::fs::create_dir_all(&out_dir)?;

    // Configure and run tonic-build
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir(out_dir)
        .compile_protos(&proto_files, &[proto_dir])?;

    Ok(())
}
