use std::io;
use std::process::ExitCode;

use sbp_cli::{cli, init_tracing, run};

fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let code = run(&matches, &mut io::stdout().lock())?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
