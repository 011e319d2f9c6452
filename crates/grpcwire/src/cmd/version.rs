use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("grpcwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: grpcwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("GRPCWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("GRPCWIRE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: stream={}, async={}, cli=true",
        cfg!(feature = "stream"),
        cfg!(feature = "async")
    );
    println!(
        "defaults: max_message_size={}, read_chunk_size={}",
        grpcwire_frame::DEFAULT_MAX_MESSAGE_SIZE,
        grpcwire_transport::DEFAULT_CHUNK_SIZE
    );

    Ok(SUCCESS)
}
