fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/queue.proto");
    tonic_build::compile_protos("proto/queue.proto")?;
    Ok(())
}
