mod cli;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use dat2wav_core::{inspect, run, Config, RecordInfo};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::build_cli;

fn config_for(input: &Path, output_dir: Option<&PathBuf>, overwrite: bool) -> Config {
    let mut builder = Config::builder(input).overwrite(overwrite);
    if let Some(dir) = output_dir {
        builder = builder.output_dir(dir);
    }
    builder.build()
}

fn print_info(input: &Path, info: &RecordInfo) {
    println!("{}:", input.display());
    println!("  sample rate   {} Hz", info.sample_rate);
    println!("  duration      {} s", info.duration_secs);
    println!("  samples       {}", info.sample_count);
    match info.channel_count {
        Some(channels) => println!("  channels      {channels}"),
        None => println!("  channels      unknown"),
    }
    println!("  footer lines  {}", info.footer_lines);
    if let Some(stamp) = info.first_data {
        println!("  first data    {stamp}");
    }
    if let Some(stamp) = info.finalised {
        println!("  finalised     {stamp}");
    }
}

fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let mut logger = env_logger::Builder::from_default_env();
    if matches.get_flag("debug") {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("file_path")
        .expect("required argument")
        .cloned()
        .collect();
    let output_dir = matches.get_one::<PathBuf>("output").cloned();
    let overwrite = matches.get_flag("overwrite");

    if let Some(dir) = &output_dir {
        if !dir.is_dir() {
            return Err(anyhow!(
                "output directory does not exist: {}",
                dir.display()
            ));
        }
    }

    if matches.get_flag("info") {
        for input in &inputs {
            let config = config_for(input, output_dir.as_ref(), overwrite);
            let info = inspect(&config)
                .with_context(|| format!("failed to read '{}'", input.display()))?;
            print_info(input, &info);
        }
        return Ok(());
    }

    let progress = ProgressBar::new(inputs.len() as u64);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);

    let mut failed = 0usize;
    for input in &inputs {
        if let Some(name) = input.file_name() {
            progress.set_message(name.to_string_lossy().into_owned());
        }

        let config = config_for(input, output_dir.as_ref(), overwrite);
        match run(&config) {
            Ok(report) => {
                progress.println(format!(
                    "{} -> {} ({} frames at {} Hz)",
                    input.display(),
                    config.output_path().display(),
                    report.frames_written,
                    report.format.sample_rate
                ));
            }
            Err(err) => {
                failed += 1;
                progress.println(format!("failed to convert {}: {err}", input.display()));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if failed > 0 {
        bail!("{failed} of {} file(s) failed", inputs.len());
    }
    Ok(())
}
