use image::imageops::FilterType;

use crate::error::ServiceError;

pub const IMAGE_SIZE: u32 = 256;
pub const CHANNELS: usize = 3;

/// How raw u8 channel values are mapped into the float range the model
/// was trained with. The tomato model expects [0,1]; `Signed` is here
/// for models trained on [-1,1] inputs so the scaling stays a config
/// decision instead of a hardcoded divide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Normalization {
    /// [0,255] -> [0.0,1.0]
    #[default]
    Unit,
    /// [0,255] -> [-1.0,1.0]
    Signed,
}

impl Normalization {
    fn apply(self, channel: u8) -> f32 {
        match self {
            Normalization::Unit => channel as f32 / 255.0,
            Normalization::Signed => channel as f32 / 127.5 - 1.0,
        }
    }
}

/// A decoded, resized image as a flat HWC float buffer of exactly
/// 256x256x3 values. The batch axis is added by the inference backend.
#[derive(Debug)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    pub const LEN: usize = (IMAGE_SIZE as usize) * (IMAGE_SIZE as usize) * CHANNELS;

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Decodes `raw`, resizes to 256x256, forces RGB (alpha dropped,
/// grayscale replicated across channels) and scales channel values per
/// `normalization`. Undecodable bytes are a client-input error.
pub fn prepare(raw: &[u8], normalization: Normalization) -> Result<ImageTensor, ServiceError> {
    let img = image::load_from_memory(raw)?;
    let rgb = img
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Lanczos3)
        .to_rgb8();

    let mut data = Vec::with_capacity(ImageTensor::LEN);
    for pixel in rgb.pixels() {
        data.push(normalization.apply(pixel[0]));
        data.push(normalization.apply(pixel[1]));
        data.push(normalization.apply(pixel[2]));
    }

    Ok(ImageTensor { data })
}
