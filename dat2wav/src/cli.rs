use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Convert IMOS acoustic logger .DAT records to WAV files")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Directory where the WAV files will be written (next to each input by default)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Allow overwriting existing WAV files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("info")
                .long("info")
                .help("Print record metadata without writing audio")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Log at debug level regardless of RUST_LOG")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("file_path")
                .value_name("FILE_PATH")
                .help("Paths of the input .DAT record files")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn accepts_multiple_inputs() {
        let matches = build_cli()
            .try_get_matches_from(["dat2wav", "a.DAT", "b.DAT"])
            .unwrap();
        let files: Vec<&PathBuf> = matches.get_many("file_path").unwrap().collect();
        assert_eq!(files.len(), 2);
        assert!(!matches.get_flag("overwrite"));
    }

    #[test]
    fn requires_an_input() {
        assert!(build_cli().try_get_matches_from(["dat2wav"]).is_err());
    }

    #[test]
    fn parses_flags_and_output_dir() {
        let matches = build_cli()
            .try_get_matches_from(["dat2wav", "--info", "--overwrite", "-o", "out", "rec.DAT"])
            .unwrap();
        assert!(matches.get_flag("info"));
        assert!(matches.get_flag("overwrite"));
        assert_eq!(
            matches.get_one::<PathBuf>("output").unwrap(),
            &PathBuf::from("out")
        );
    }
}
