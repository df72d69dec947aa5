use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use wordtally::{init_tracing_once, render_counts, WordCount, WordCountOptions};

const DEFAULT_INPUT: &str = "./input.json";

fn main() -> ExitCode {
    init_tracing_once();
    let input = std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));

    let opts = WordCountOptions::default().with_progress(true).with_env_overrides();
    let mut wc = match WordCount::builder().options(opts).open() {
        Ok(wc) => wc,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&mut wc, &input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(wc: &mut WordCount, input: &Path) -> Result<()> {
    let counts = wc.from_input_file(input)?;
    print!("{}", render_counts(&counts));
    Ok(())
}
