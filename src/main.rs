use shufflebox::app::{self, AppOptions};
use shufflebox::config::StorePaths;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    library: Option<PathBuf>,
    null_audio: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let paths = StorePaths::from_env()?;
    let _log_guard = shufflebox::logging::init(&paths.log)?;

    let library = args
        .library
        .unwrap_or_else(|| paths.default_music_dir());
    tracing::info!(library = %library.display(), null_audio = args.null_audio, "starting");

    app::run(AppOptions {
        paths,
        library,
        null_audio: args.null_audio,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "--null-audio" => out.null_audio = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            other => {
                if out.library.is_some() {
                    anyhow::bail!("only one music directory can be given");
                }
                if other.trim().is_empty() {
                    anyhow::bail!("music directory cannot be empty");
                }
                out.library = Some(PathBuf::from(other));
            }
        }
    }
    Ok(out)
}

fn print_help() {
    println!("Shufflebox");
    println!("  shufflebox [DIR] [--null-audio]");
    println!("  DIR               Music directory to play (default ~/Music)");
    println!("  --null-audio      Run without an audio device");
    println!("  SHUFFLEBOX_HOME   Overrides where settings, playlists and the log live");
}
