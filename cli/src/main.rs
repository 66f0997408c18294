use clap::Parser;
use fsconsul_cli::{Cli, init_tracing, run};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and are not failures.
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(e) = init_tracing() {
        eprintln!("fsconsul: {e:#}");
    }

    std::process::exit(run(cli).await);
}
