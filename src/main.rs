//! Batch demo: run the detector over a directory of images.
//!
//! Stands in for the camera pipeline during bench bring-up: prints one JSON
//! line of detections per image and can save annotated copies.

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::{info, warn};
use walkdir::WalkDir;

use rubik_detect::{BgrFrame, DetectParams, Detector};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the ONNX model file
    #[arg(long, value_name = "MODEL")]
    model: PathBuf,

    /// Directory of images to run through the detector
    #[arg(long, value_name = "DIR")]
    images: PathBuf,

    /// Directory for annotated copies (skipped when absent)
    #[arg(long, value_name = "DIR")]
    annotated: Option<PathBuf>,

    /// Confidence threshold (0.0 - 1.0)
    #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
    box_threshold: f32,

    /// NMS IoU threshold (0.0 - 1.0)
    #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
    nms_threshold: f32,

    /// Skip the hardware accelerator and run on the default backend
    #[arg(long)]
    no_accelerator: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut detector = Detector::new(&args.model, !args.no_accelerator)?;
    let (height, width, channels) = detector.input_shape();
    info!(
        width,
        height,
        channels,
        quantized = detector.is_quantized(),
        accelerated = detector.accelerated(),
        "detector ready"
    );

    let params = DetectParams {
        box_threshold: args.box_threshold,
        nms_threshold: args.nms_threshold,
    };

    for entry in WalkDir::new(&args.images) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("jpg" | "jpeg" | "png" | "bmp") => {}
            _ => continue,
        }

        let rgb = image::open(path)?.into_rgb8();
        let bgr = rgb_to_bgr_bytes(&rgb);
        let frame = BgrFrame::new(rgb.width(), rgb.height(), &bgr)?;

        let detections = match detector.detect(&frame, &params) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(image = %path.display(), error = %e, "detection failed");
                continue;
            }
        };
        println!("{}\t{}", path.display(), serde_json::to_string(&detections)?);

        if let Some(dir) = &args.annotated {
            fs::create_dir_all(dir)?;
            let mut annotated = rgb.clone();
            for detection in &detections {
                let rect = detection.rect;
                draw_hollow_rect_mut(
                    &mut annotated,
                    Rect::at(rect.left, rect.top).of_size(
                        (rect.right - rect.left) as u32,
                        (rect.bottom - rect.top) as u32,
                    ),
                    Rgb([255, 0, 0]),
                );
            }
            if let Some(name) = path.file_name() {
                annotated.save(dir.join(name))?;
            }
        }
    }

    Ok(())
}

/// The detector consumes camera-order (BGR) buffers; file images arrive as
/// RGB, so the demo swaps them back.
fn rgb_to_bgr_bytes(img: &RgbImage) -> Vec<u8> {
    img.pixels().flat_map(|p| [p[2], p[1], p[0]]).collect()
}
