//! CLI application for preparing biometric passport photos.
//!
//! Usage:
//!   percent-portrait <image> --landmarks face.json             # Write <image>_passport.jpg
//!   percent-portrait <image> --landmarks face.json --json      # JSON report
//!   percent-portrait <image> --landmarks face.json -i          # Refine from stdin commands
//!   percent-portrait --write-config settings.json              # Dump default settings

use clap::{Parser, ValueEnum};
use percent_portrait::{
    analyze, process, AdjustCommand, BiometricConfig, BoundingBox, ComplianceResult,
    CropTransform, EnabledChecks, EncodedArtifact, FaceLocator, FaceMetrics, ImageSize,
    PipelineOutcome, PlacementReport, PortraitRequest, PrecomputedLandmarks, RefinementSession,
    Rendered, RustfaceLocator, WholeImageLocator,
};
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "percent-portrait")]
#[command(author, version, about = "Biometric passport photo cropping", long_about = None)]
struct Args {
    /// Input image file
    #[arg(required_unless_present = "write_config")]
    image: Option<PathBuf>,

    /// JSON file with 68 [x, y] landmark pairs for the input image
    #[arg(long, required_unless_present = "write_config")]
    landmarks: Option<PathBuf>,

    /// SeetaFace detector model; without it the whole image is the face region
    #[arg(long)]
    detector: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective settings to this file
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Output size preset
    #[arg(long, value_enum, default_value = "35x45")]
    preset: Preset,

    /// Output width in pixels (overrides the preset)
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels (overrides the preset)
    #[arg(long)]
    height: Option<u32>,

    /// Maximum output size in kilobytes
    #[arg(long, default_value = "500")]
    max_kb: usize,

    /// Output file (default: <image>_passport.jpg)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(short, long)]
    json: bool,

    /// Level the eye line before cropping
    #[arg(long)]
    auto_rotate: bool,

    /// Skip the head turn check
    #[arg(long)]
    no_side_ratio: bool,

    /// Skip the head tilt check
    #[arg(long)]
    no_head_tilt: bool,

    /// Skip the open eyes check
    #[arg(long)]
    no_eye: bool,

    /// Skip the framing check (only runs with --detector)
    #[arg(long)]
    no_framing: bool,

    /// Require a closed mouth
    #[arg(long)]
    check_mouth: bool,

    /// Refine the crop interactively, reading commands from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Preview image written after every interactive step
    #[arg(long, default_value = "preview.png")]
    preview: PathBuf,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    #[value(name = "35x45")]
    Passport35x45,
    #[value(name = "35x45-600dpi")]
    Passport35x45HighRes,
}

impl Args {
    fn target(&self) -> ImageSize {
        let preset = match self.preset {
            Preset::Passport35x45 => ImageSize::PASSPORT_35X45,
            Preset::Passport35x45HighRes => ImageSize::PASSPORT_35X45_600DPI,
        };
        ImageSize::new(
            self.width.unwrap_or(preset.width),
            self.height.unwrap_or(preset.height),
        )
    }

    fn checks(&self) -> EnabledChecks {
        EnabledChecks {
            side_ratio: !self.no_side_ratio,
            head_tilt: !self.no_head_tilt,
            mouth: self.check_mouth,
            eye: !self.no_eye,
            framing: !self.no_framing,
        }
    }

    fn request(&self) -> PortraitRequest {
        PortraitRequest {
            target: self.target(),
            max_bytes: self.max_kb * 1024,
            checks: self.checks(),
            auto_rotate: self.auto_rotate,
        }
    }

    fn output_path(&self, image: &Path) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "portrait".into());
            image.with_file_name(format!("{stem}_passport.jpg"))
        })
    }
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Report {
    image: String,
    target: ImageSize,
    accepted: bool,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    face: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<FaceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transform: Option<CropTransform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placement: Option<PlacementReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<EncodingOutput>,
}

#[derive(Serialize)]
struct EncodingOutput {
    quality: u8,
    bytes: usize,
    max_bytes: usize,
    within_budget: bool,
}

impl From<&EncodedArtifact> for EncodingOutput {
    fn from(artifact: &EncodedArtifact) -> Self {
        Self {
            quality: artifact.quality,
            bytes: artifact.len(),
            max_bytes: artifact.max_bytes,
            within_budget: artifact.within_budget(),
        }
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the image was accepted.
fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => BiometricConfig::from_json_file(path)?,
        None => BiometricConfig::default(),
    };

    if let Some(path) = &args.write_config {
        config.to_json_file(path)?;
        eprintln!("Settings written to {:?}", path);
    }

    let (Some(image_path), Some(landmarks_path)) = (&args.image, &args.landmarks) else {
        return Ok(true);
    };

    let mut locator: Box<dyn FaceLocator> = match &args.detector {
        Some(path) => Box::new(RustfaceLocator::from_model_file(path, &config.face_detection)?),
        None => Box::new(WholeImageLocator),
    };
    let predictor = PrecomputedLandmarks::from_json_file(landmarks_path)?;
    let bytes = std::fs::read(image_path)?;
    let output_path = args.output_path(image_path);

    if args.interactive {
        return refine(args, &config, &bytes, locator.as_mut(), &predictor, &output_path);
    }

    let request = args.request();
    let outcome = process(&bytes, &config, &request, locator.as_mut(), &predictor)?;

    let mut report = Report {
        image: image_path.display().to_string(),
        target: request.target,
        accepted: outcome.is_encoded(),
        reason: ComplianceResult::ok().reason,
        output: None,
        face: None,
        metrics: None,
        transform: None,
        placement: None,
        encoding: None,
    };

    match outcome {
        PipelineOutcome::Encoded(portrait) => {
            std::fs::write(&output_path, &portrait.artifact.bytes)?;
            report.output = Some(output_path.display().to_string());
            report.encoding = Some(EncodingOutput::from(&portrait.artifact));
            report.face = Some(portrait.face);
            report.metrics = Some(portrait.metrics);
            report.transform = Some(portrait.transform);
            report.placement = Some(portrait.placement);
        }
        PipelineOutcome::Rejected(result) => report.reason = result.reason,
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_human_readable(&report));
    }

    Ok(report.accepted)
}

/// Drive a refinement session from stdin, one command per line.
fn refine(
    args: &Args,
    config: &BiometricConfig,
    bytes: &[u8],
    locator: &mut dyn FaceLocator,
    predictor: &PrecomputedLandmarks,
    output_path: &Path,
) -> Result<bool, Box<dyn std::error::Error>> {
    let analysis = analyze(bytes, config, args.checks(), locator, predictor)?;
    if !analysis.verdict.accepted {
        eprintln!("Rejected: {}", analysis.verdict.reason);
        return Ok(false);
    }

    let request = args.request();
    let mut session = RefinementSession::new(config.clone(), request.target, request.max_bytes);
    let rotation = analysis.initial_rotation(args.auto_rotate);
    let preview = session.start_with_rotation(
        analysis.image.to_rgb8(),
        analysis.landmarks,
        rotation,
    )?;
    show_preview(&args.preview, preview)?;
    eprintln!("Commands: + - left right up down rl rr commit cancel");

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" => continue,
            "commit" | "c" => {
                let artifact = session.commit()?;
                std::fs::write(output_path, &artifact.bytes)?;
                eprintln!(
                    "Saved {:?} (quality {}, {} bytes{})",
                    output_path,
                    artifact.quality,
                    artifact.len(),
                    if artifact.within_budget() { "" } else { ", over budget" }
                );
                return Ok(true);
            }
            "cancel" | "q" => break,
            other => match other.parse::<AdjustCommand>() {
                Ok(command) => {
                    let preview = session.adjust(command)?;
                    show_preview(&args.preview, preview)?;
                }
                Err(message) => eprintln!("{message}"),
            },
        }
    }

    session.cancel()?;
    eprintln!("Cancelled, nothing written");
    Ok(true)
}

fn show_preview(path: &Path, preview: &Rendered) -> Result<(), Box<dyn std::error::Error>> {
    preview.image.save(path)?;
    let p = &preview.placement;
    eprintln!(
        "chin {:.1}%  eyes {:.1}%{}  face {:.1}%{}  -> {:?}",
        p.chin_pct,
        p.eye_line_pct,
        if p.eyes_in_band { "" } else { " (out of band)" },
        p.face_height_pct,
        if p.face_in_band { "" } else { " (out of band)" },
        path
    );
    Ok(())
}

fn format_human_readable(report: &Report) -> String {
    let mut s = String::new();

    s.push_str(&format!("Image: {} -> {}\n", report.image, report.target));
    if !report.accepted {
        s.push_str(&format!("Rejected: {}\n", report.reason));
        return s;
    }

    if let Some(output) = &report.output {
        s.push_str(&format!("Output: {}\n", output));
    }
    if let Some(encoding) = &report.encoding {
        s.push_str(&format!(
            "Encoding: quality {}, {} bytes (limit {}){}\n",
            encoding.quality,
            encoding.bytes,
            encoding.max_bytes,
            if encoding.within_budget { "" } else { " - OVER BUDGET" }
        ));
    }

    if let Some(m) = &report.metrics {
        s.push_str("\nFace:\n");
        s.push_str(&format!("  Tilt:       {:.1}°\n", m.tilt_degrees));
        if let Some(ratio) = m.side_ratio {
            s.push_str(&format!("  Side ratio: {:.2}\n", ratio));
        }
        if let (Some(l), Some(r)) = (m.left_eye_ratio, m.right_eye_ratio) {
            s.push_str(&format!("  Eyes:       L {:.2}, R {:.2}\n", l, r));
        }
        s.push_str(&format!("  Mouth gap:  {:.1}px\n", m.mouth_gap));
    }

    if let Some(p) = &report.placement {
        s.push_str("\nPlacement (% of height from bottom):\n");
        s.push_str(&format!("  Chin:     {:.1}%\n", p.chin_pct));
        s.push_str(&format!(
            "  Eye line: {:.1}%{}\n",
            p.eye_line_pct,
            if p.eyes_in_band { "" } else { " (out of band)" }
        ));
        s.push_str(&format!(
            "  Face:     {:.1}%{}\n",
            p.face_height_pct,
            if p.face_in_band { "" } else { " (out of band)" }
        ));
    }

    s
}
