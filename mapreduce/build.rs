fn main() {
    println!("cargo:rerun-if-changed=proto/mr.proto");
    tonic_prost_build::configure()
        .compile_protos(&["proto/mr.proto"], &["proto/"])
        .expect("Failed to compile proto/mr.proto");
}
