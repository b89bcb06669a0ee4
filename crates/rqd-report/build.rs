use protoc_bin_vendored::protoc_bin_path;
use std::{env, error::Error};

fn main() -> Result<(), Box<dyn Error>> {
    let protoc_path = protoc_bin_path().expect("failed to get vendored protoc binary");

    unsafe {
        env::set_var("PROTOC", &protoc_path);
    }

    // Shared messages are generated once, by rqd-api.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .extern_path(".rqd.types.v1", "::rqd_api::proto::types::v1")
        .compile_protos(
            &["proto/rqd/report/v1/report.proto"],
            &["proto", "../rqd-api/proto"],
        )?;
    Ok(())
}
