use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use autocaptcha_lib::{
    config::PipelineConfig,
    init_logging,
    sandbox::{imaging, FileScreenSource, NoScreen, ScreenSource, TesseractLoader},
    AutoCaptcha, CaptureDescriptor, RecognitionRequest, RegionRect,
};
use clap::{Parser, Subcommand};

/// Recognize voCode captcha images with the same pipeline the page script uses.
#[derive(Parser)]
#[command(name = "autocaptcha", version)]
struct Cli {
    /// Directory holding `tessdata/<lang>.traineddata`
    #[arg(long, env = "AUTOCAPTCHA_ASSETS_DIR")]
    assets: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long, env = "AUTOCAPTCHA_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Tesseract page segmentation mode
    #[arg(long)]
    psm: Option<u8>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize a captcha image file
    Solve { image: PathBuf },
    /// Recognize a region of a screenshot, given in CSS pixels
    SolveRegion {
        screenshot: PathBuf,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        #[arg(long, default_value_t = 1.0)]
        dpr: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(assets) = cli.assets {
        config.engine.assets_dir = assets;
    }
    if let Some(tesseract) = cli.tesseract {
        config.engine.tesseract_bin = tesseract;
    }
    if cli.psm.is_some() {
        config.engine.page_seg_mode = cli.psm;
    }

    let (descriptor, screen): (CaptureDescriptor, Arc<dyn ScreenSource>) = match cli.command {
        Command::Solve { image } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("failed to read {}", image.display()))?;
            let png = imaging::encode_png(
                &image::load_from_memory(&bytes).context("unsupported image format")?,
            )?;
            (
                CaptureDescriptor::InlineImage {
                    image: imaging::encode_data_url(&png),
                },
                Arc::new(NoScreen),
            )
        }
        Command::SolveRegion {
            screenshot,
            x,
            y,
            width,
            height,
            dpr,
        } => (
            CaptureDescriptor::RegionCapture(RegionRect {
                x,
                y,
                width,
                height,
                device_pixel_ratio: dpr,
            }),
            Arc::new(FileScreenSource::new(screenshot)),
        ),
    };

    let loader = Arc::new(TesseractLoader::new(config.engine.clone()));
    let pipeline = AutoCaptcha::with_engine(config, loader, screen);
    let result = pipeline
        .coordinator()
        .request(&RecognitionRequest::SolveCaptcha(descriptor))
        .await?;
    pipeline.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
