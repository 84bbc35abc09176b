use anyhow::Context;
use clap::Parser;
use tracing::{info, warn, Level};

use media_resize::cli::Cli;
use media_resize::{run, RunConfig, ScaleMode};
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::{
    is_ffmpeg_available, is_ffprobe_available, print_summary_report, ConsoleSummary,
    JsonReportWriter, StatsSink,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::new().with_level(if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    });
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_log_dir(dir);
    }
    if let Err(e) = init_logging("media_resize", log_config) {
        eprintln!("⚠️  Logging to file disabled: {:#}", e);
    }

    let config = RunConfig::from_options(cli.to_options()).context("Invalid arguments")?;

    info!("🖼️  Media Resize");
    info!("   Input:  {}", config.input_dir.display());
    info!("   Output: {}", config.output_dir.display());
    match config.scale {
        ScaleMode::Ratio(r) => info!("   Scale:  ratio {}", r),
        ScaleMode::Width(w) => info!("   Scale:  width {}px", w),
        ScaleMode::Unscaled => info!("   Scale:  none"),
    }
    if config.dry_run {
        info!("   🔍 Dry run: nothing will be written");
    }

    if config.video.enabled && !config.dry_run {
        for (tool, available) in [
            ("ffmpeg", is_ffmpeg_available()),
            ("ffprobe", is_ffprobe_available()),
        ] {
            if !available {
                warn!("⚠️  {} not found in PATH, video files will fail", tool);
            }
        }
    }

    let mut sinks: Vec<Box<dyn StatsSink>> = vec![Box::new(ConsoleSummary)];
    // reports are only written for unfiltered, real runs
    if !config.dry_run && config.extensions.is_none() {
        sinks.push(Box::new(JsonReportWriter::new(&config.output_dir)));
    }

    let report = run(config, sinks)?;
    print_summary_report(&report.stats, &report.totals());

    for (directory, error) in &report.failed {
        warn!("❌ {}: {}", directory, error);
    }
    Ok(())
}
