fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true) // Used by the integration tests
        .build_client(true)
        .compile_protos(&["proto/calculator.proto"], &["proto/"])?;
    Ok(())
}
