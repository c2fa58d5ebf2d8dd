use super::{traits::Surface, Frame};

use bytes::Bytes;
use image::{
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
    ImageFormat, RgbImage,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum SurfaceError {
    #[error("no drawing context for a {0}x{1} surface")]
    Context(u32, u32),
    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Offscreen RGB bitmap with fixed dimensions.
pub(crate) struct CaptureSurface {
    canvas: RgbImage,
    quality: u8,
}

impl CaptureSurface {
    pub fn acquire(width: u32, height: u32, quality: u8) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::Context(width, height));
        }
        Ok(Self {
            canvas: RgbImage::new(width, height),
            quality,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }
}

impl Surface for CaptureSurface {
    type Error = SurfaceError;

    fn draw(&mut self, frame: Option<&Frame>) -> Result<(), Self::Error> {
        let Some(frame) = frame else {
            return Ok(());
        };

        let decoded = image::load_from_memory_with_format(frame.as_ref(), ImageFormat::Jpeg)?
            .to_rgb8();
        let (width, height) = self.canvas.dimensions();
        self.canvas = if decoded.dimensions() == (width, height) {
            decoded
        } else {
            imageops::resize(&decoded, width, height, FilterType::Triangle)
        };
        Ok(())
    }

    fn encode(&self) -> Option<Bytes> {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        self.canvas.write_with_encoder(encoder).ok()?;
        (!buf.is_empty()).then(|| Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_jpeg(width: u32, height: u32) -> Frame {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 90))
            .unwrap();
        Frame::new(buf)
    }

    fn decoded_dimensions(jpeg: &[u8]) -> (u32, u32) {
        image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8()
            .dimensions()
    }

    #[test]
    fn zero_sized_surface_has_no_context() {
        assert!(matches!(
            CaptureSurface::acquire(0, 480, 80),
            Err(SurfaceError::Context(0, 480))
        ));
        assert!(CaptureSurface::acquire(640, 0, 80).is_err());
    }

    #[test]
    fn blank_surface_encodes_to_jpeg() {
        let surface = CaptureSurface::acquire(640, 480, 80).unwrap();
        let jpeg = surface.encode().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(decoded_dimensions(&jpeg), (640, 480));
    }

    #[test]
    fn smaller_frame_is_scaled_to_surface() {
        let mut surface = CaptureSurface::acquire(640, 480, 80).unwrap();
        surface.draw(Some(&gradient_jpeg(320, 240))).unwrap();
        assert_eq!(surface.dimensions(), (640, 480));
        assert_eq!(decoded_dimensions(&surface.encode().unwrap()), (640, 480));
    }

    #[test]
    fn larger_frame_is_scaled_to_surface() {
        let mut surface = CaptureSurface::acquire(640, 480, 80).unwrap();
        surface.draw(Some(&gradient_jpeg(1280, 720))).unwrap();
        assert_eq!(decoded_dimensions(&surface.encode().unwrap()), (640, 480));
    }

    #[test]
    fn missing_frame_leaves_previous_contents() {
        let mut surface = CaptureSurface::acquire(64, 48, 80).unwrap();
        surface.draw(Some(&gradient_jpeg(64, 48))).unwrap();
        let before = surface.canvas.clone();
        surface.draw(None).unwrap();
        assert_eq!(surface.canvas, before);
    }

    #[test]
    fn garbage_frame_fails_to_decode() {
        let mut surface = CaptureSurface::acquire(640, 480, 80).unwrap();
        let result = surface.draw(Some(&Frame::new(&b"not a jpeg"[..])));
        assert!(matches!(result, Err(SurfaceError::Decode(_))));
    }

    #[test]
    fn lower_quality_produces_smaller_output() {
        let frame = gradient_jpeg(640, 480);
        let mut high = CaptureSurface::acquire(640, 480, 95).unwrap();
        let mut low = CaptureSurface::acquire(640, 480, 30).unwrap();
        high.draw(Some(&frame)).unwrap();
        low.draw(Some(&frame)).unwrap();
        assert!(low.encode().unwrap().len() < high.encode().unwrap().len());
    }
}
