use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wwbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wwbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("WWBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("WWBRIDGE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("role_env: {}", wwbridge_transport::ROLE_ENV);
    println!(
        "max_payload: {} bytes",
        wwbridge_frame::DEFAULT_MAX_PAYLOAD
    );

    Ok(SUCCESS)
}
