use crate::run_artifacts::{BBox, Detection};
use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::Mat;
use opencv::prelude::*;
use usls::models::RTDETR;
use usls::{Config, Image};

/// A wrapper around the USLS RT-DETR model that handles BGR-to-RGB conversion
/// and corrects for aspect-ratio padding bugs in the underlying model library.
pub struct ObjectDetector {
    model: RTDETR,
}

impl ObjectDetector {
    /// Create a new detector with the given model path.
    pub fn new(model_path: &str) -> Result<Self> {
        let config = Config::default()
            .with_model_file(model_path)
            .with_class_names(&usls::NAMES_COCO_80);

        #[cfg(target_os = "macos")]
        let config = config.with_model_device(usls::Device::CoreMl);

        let config = config.commit()?;
        let model = RTDETR::new(config)?;
        Ok(Self { model })
    }

    /// Run detection on an OpenCV Mat (BGR) and keep detections whose
    /// confidence is at least `min_conf`. Boxes are in pixel coordinates.
    pub fn detect(&mut self, image: &Mat, min_conf: f32) -> Result<Vec<Detection>> {
        let size = image.size()?;
        let (x_corr, y_corr) = aspect_correction(size.width as f32, size.height as f32);

        let input = Image::from(mat_to_dynamic_image(image)?);
        let results = self.model.forward(&[input])?;

        let detections = results
            .into_iter()
            .next()
            .map(|y| y.hbbs)
            .unwrap_or_default()
            .into_iter()
            .filter(|hbb| hbb.confidence().unwrap_or(0.0) >= min_conf)
            .map(|hbb| Detection {
                bbox: BBox {
                    x: hbb.xmin() * x_corr,
                    y: hbb.ymin() * y_corr,
                    w: hbb.width() * x_corr,
                    h: hbb.height() * y_corr,
                },
                confidence: hbb.confidence().unwrap_or(0.0),
                class_id: hbb.id().unwrap_or(0),
                class_name: hbb.name().map(|s| s.to_string()),
            })
            .collect();

        Ok(detections)
    }
}

/// RT-DETR in usls letterboxes to a square without undoing the padding on
/// the longer axis; scale that axis back by the aspect ratio.
fn aspect_correction(img_w: f32, img_h: f32) -> (f32, f32) {
    if img_w > img_h {
        (img_w / img_h, 1.0)
    } else if img_h > img_w {
        (1.0, img_h / img_w)
    } else {
        (1.0, 1.0)
    }
}

/// Convert an OpenCV Mat (BGR) to an image::DynamicImage (RGB)
fn mat_to_dynamic_image(mat: &Mat) -> Result<DynamicImage> {
    let mut rgb_mat = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB)?;

    let size = rgb_mat.size()?;
    let width = size.width as u32;
    let height = size.height as u32;

    if !rgb_mat.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }

    let buffer = rgb_mat.data_bytes()?.to_vec();
    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, buffer)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from Mat data"))?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}
