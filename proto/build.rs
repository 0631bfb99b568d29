// Build script for elchi-proto
// Handles protobuf code generation for the controller channel.
//
// The generated module is checked in under src/generated so a normal build
// never needs protoc. Set ELCHI_REGEN_PROTO=1 to regenerate after editing
// protos/elchi.proto.

fn main() {
    if std::env::var_os("ELCHI_REGEN_PROTO").is_some() {
        compile_protos();
    }

    println!("cargo:rerun-if-env-changed=ELCHI_REGEN_PROTO");
    println!("cargo:rerun-if-changed=protos/");
}

/// Compile protocol buffers for the controller channel
fn compile_protos() {
    tonic_prost_build::configure()
        .build_server(false) // The controller implements the server side
        .build_client(true)
        .out_dir("src/generated")
        .compile_protos(&["protos/elchi.proto"], &["protos/"])
        .unwrap_or_else(|e| panic!("Failed to compile protos: {}", e));
}
