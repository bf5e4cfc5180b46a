mod cmd;

use std::process::ExitCode;

use dnskraken::core::konst::APP_NAME;
use tracing::{Level, event};

use crate::cmd::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::init();

    match cli.run().await {
        Ok(_) => ExitCode::from(0),
        Err(e) => {
            match e.source() {
                Some(s) => {
                    eprintln!("{s}");
                    event!(target: APP_NAME, Level::ERROR, "{s}")
                }
                None => {
                    eprintln!("{e}");
                    event!(target: APP_NAME, Level::ERROR, "{e}")
                }
            }
            ExitCode::from(1)
        }
    }
}
