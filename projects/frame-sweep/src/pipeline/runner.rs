// Detector seam: the dispatcher only knows `Detector`; `ModelRunner` is the
// RT-DETR backed implementation that writes annotated frames and labels.

use crate::pipeline::detection::ObjectDetector;
use crate::run_artifacts::{Detection, LabelRow};
use anyhow::{bail, Context, Result};
use opencv::core::{Mat, Point, Rect, Scalar, Vector};
use opencv::imgcodecs;
use opencv::imgproc::{put_text, rectangle, FONT_HERSHEY_SIMPLEX, LINE_8};
use opencv::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// One detector call: read `source`, write results under `project/name`.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    pub source: &'a Path,
    pub project: &'a Path,
    pub name: &'a str,
}

impl DetectionRequest<'_> {
    pub fn output_dir(&self) -> PathBuf {
        self.project.join(self.name)
    }
}

pub trait Detector {
    fn run(&mut self, request: &DetectionRequest<'_>) -> Result<()>;
}

pub struct ModelRunner {
    detector: ObjectDetector,
    min_confidence: f32,
}

impl ModelRunner {
    pub fn new(model_path: &str, min_confidence: f32) -> Result<Self> {
        let detector = ObjectDetector::new(model_path)
            .with_context(|| format!("Failed to load model: {}", model_path))?;
        tracing::info!("Loaded detection model {}", model_path);
        Ok(Self {
            detector,
            min_confidence,
        })
    }
}

impl Detector for ModelRunner {
    fn run(&mut self, request: &DetectionRequest<'_>) -> Result<()> {
        let source = path_str(request.source)?;
        let mut image = imgcodecs::imread(source, imgcodecs::IMREAD_COLOR)?;
        if image.empty() {
            bail!("Failed to read image {}", source);
        }

        let detections = self.detector.detect(&image, self.min_confidence)?;
        tracing::debug!("{}: {} detection(s)", source, detections.len());

        write_outputs(request, &mut image, &detections)
    }
}

/// Draw `detections` onto `image` and persist it with its label file.
fn write_outputs(
    request: &DetectionRequest<'_>,
    image: &mut Mat,
    detections: &[Detection],
) -> Result<()> {
    let outputs = OutputPaths::for_request(request)?;
    fs::create_dir_all(&outputs.labels_dir)
        .with_context(|| format!("Failed to create {:?}", outputs.labels_dir))?;

    annotate(image, detections)?;
    let annotated = path_str(&outputs.annotated)?;
    let written = imgcodecs::imwrite(annotated, &*image, &Vector::new())
        .with_context(|| format!("Failed to encode annotated frame {}", annotated))?;
    if !written {
        bail!("Failed to write annotated frame {}", annotated);
    }

    write_labels(&outputs.labels, detections)
}

/// Where a request's results land: the annotated frame keeps the source file
/// name, labels go to `labels/<stem>.csv`.
#[derive(Debug, PartialEq)]
struct OutputPaths {
    annotated: PathBuf,
    labels_dir: PathBuf,
    labels: PathBuf,
}

impl OutputPaths {
    fn for_request(request: &DetectionRequest<'_>) -> Result<Self> {
        let file_name = request
            .source
            .file_name()
            .with_context(|| format!("Source has no file name: {:?}", request.source))?;
        let stem = request
            .source
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Source has no file stem: {:?}", request.source))?;

        let out_dir = request.output_dir();
        let labels_dir = out_dir.join("labels");
        Ok(Self {
            annotated: out_dir.join(file_name),
            labels: labels_dir.join(format!("{}.csv", stem)),
            labels_dir,
        })
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid UTF-8: {:?}", path))
}

/// Draw each detection's box with its class name and confidence.
pub fn annotate(image: &mut Mat, detections: &[Detection]) -> Result<()> {
    let color = Scalar::new(0.0, 255.0, 0.0, 0.0); // Green
    for d in detections {
        let rect = Rect::new(
            d.bbox.x.round() as i32,
            d.bbox.y.round() as i32,
            d.bbox.w.round() as i32,
            d.bbox.h.round() as i32,
        );
        rectangle(&mut *image, rect, color, 2, LINE_8, 0)?;

        let label = format!(
            "{} {:.2}",
            d.class_name.as_deref().unwrap_or("?"),
            d.confidence
        );
        let origin = Point::new(rect.x, (rect.y - 4).max(12));
        put_text(
            &mut *image,
            &label,
            origin,
            FONT_HERSHEY_SIMPLEX,
            0.5,
            color,
            1,
            LINE_8,
            false,
        )?;
    }
    Ok(())
}

pub fn write_labels(path: &Path, detections: &[Detection]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    if detections.is_empty() {
        writer.write_record([
            "class_id",
            "class_name",
            "confidence",
            "x",
            "y",
            "w",
            "h",
        ])?;
    }
    for d in detections {
        writer.serialize(LabelRow::from(d))?;
    }
    writer.flush()?;
    Ok(())
}
