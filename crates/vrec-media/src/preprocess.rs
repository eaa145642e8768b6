//! Raster preprocessing applied to frames before OCR.
//!
//! Stages run in a fixed order and each one is optional:
//! base plane, adaptive threshold, blur + Otsu, morphological open,
//! contrast stretch, inversion. Everything here is CPU-bound; callers on
//! the async runtime should wrap [`preprocess`] in `spawn_blocking`.
//!
//! The thresholding, blur, morphology and contrast stages run on OpenCV
//! `imgproc` and need the `opencv` feature (enabled by default).

use image::GrayImage;

use vrec_models::PreprocessOptions;

use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// Plane OCR sees when grayscale is off. Error dialogs are usually red on
/// white, which only keeps its contrast in the blue plane.
pub const BASE_CHANNEL: usize = 2;

/// Run the enabled stages over `frame` and return the plane handed to OCR.
pub fn preprocess(frame: &Frame, options: &PreprocessOptions) -> MediaResult<GrayImage> {
    let plane = if options.grayscale {
        frame.luma()?
    } else {
        frame.channel(BASE_CHANNEL)?
    };

    let mut plane = if needs_imgproc(options) {
        imgproc_stages(plane, options)?
    } else {
        plane
    };

    if options.invert {
        image::imageops::invert(&mut plane);
    }

    Ok(plane)
}

/// Fail early when `options` asks for a stage this build cannot run.
pub fn ensure_supported(options: &PreprocessOptions) -> MediaResult<()> {
    if needs_imgproc(options) && !cfg!(feature = "opencv") {
        return Err(MediaError::preprocess_failed(
            "threshold, morphology and contrast stages require the opencv feature",
        ));
    }
    Ok(())
}

fn needs_imgproc(options: &PreprocessOptions) -> bool {
    options.adaptive_threshold || options.blur_threshold || options.morphology || options.contrast
}

#[cfg(feature = "opencv")]
fn imgproc_stages(plane: GrayImage, options: &PreprocessOptions) -> MediaResult<GrayImage> {
    if plane.width() == 0 || plane.height() == 0 {
        return Ok(plane);
    }
    let mut mat = cv::to_mat(&plane)?;

    if options.adaptive_threshold {
        mat = cv::adaptive_threshold(&mat)?;
    }
    if options.blur_threshold {
        mat = cv::blur_otsu(&mat)?;
    }
    if options.morphology {
        mat = cv::open(&mat)?;
    }
    if options.contrast {
        mat = cv::contrast(&mat)?;
    }

    cv::to_gray_image(&mat)
}

#[cfg(not(feature = "opencv"))]
fn imgproc_stages(_plane: GrayImage, options: &PreprocessOptions) -> MediaResult<GrayImage> {
    ensure_supported(options)?;
    Err(MediaError::internal("imgproc stages requested without opencv"))
}

#[cfg(feature = "opencv")]
mod cv {
    use image::GrayImage;
    use opencv::{
        core::{self, Mat, Point, Scalar, Size},
        imgproc,
        prelude::*,
    };

    use crate::error::{MediaError, MediaResult};

    /// Neighbourhood of the adaptive threshold.
    const ADAPTIVE_BLOCK: i32 = 15;
    /// Constant subtracted from the neighbourhood mean.
    const ADAPTIVE_C: f64 = 2.0;
    /// Value written for pixels above the local threshold.
    const ADAPTIVE_MAX: f64 = 220.0;
    /// Contrast adjustment in the -127..127 range.
    const CONTRAST: f64 = 64.0;

    pub fn to_mat(plane: &GrayImage) -> MediaResult<Mat> {
        let mut mat = Mat::new_rows_cols_with_default(
            plane.height() as i32,
            plane.width() as i32,
            core::CV_8UC1,
            Scalar::all(0.0),
        )
        .map_err(|e| MediaError::preprocess_failed(format!("alloc plane: {e}")))?;
        mat.data_bytes_mut()
            .map_err(|e| MediaError::preprocess_failed(format!("plane bytes: {e}")))?
            .copy_from_slice(plane.as_raw());
        Ok(mat)
    }

    pub fn to_gray_image(mat: &Mat) -> MediaResult<GrayImage> {
        let bytes = mat
            .data_bytes()
            .map_err(|e| MediaError::preprocess_failed(format!("plane bytes: {e}")))?
            .to_vec();
        GrayImage::from_raw(mat.cols() as u32, mat.rows() as u32, bytes)
            .ok_or_else(|| MediaError::preprocess_failed("plane size changed during preprocessing"))
    }

    pub fn adaptive_threshold(src: &Mat) -> MediaResult<Mat> {
        let mut dst = Mat::default();
        imgproc::adaptive_threshold(
            src,
            &mut dst,
            ADAPTIVE_MAX,
            imgproc::ADAPTIVE_THRESH_MEAN_C,
            imgproc::THRESH_BINARY,
            ADAPTIVE_BLOCK,
            ADAPTIVE_C,
        )
        .map_err(|e| MediaError::preprocess_failed(format!("adaptive threshold: {e}")))?;
        Ok(dst)
    }

    /// 3x3 Gaussian blur, then an inverse binary threshold at the Otsu level.
    pub fn blur_otsu(src: &Mat) -> MediaResult<Mat> {
        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(src, &mut blurred, Size::new(3, 3), 0.0)
            .map_err(|e| MediaError::preprocess_failed(format!("gaussian blur: {e}")))?;

        let mut dst = Mat::default();
        imgproc::threshold(
            &blurred,
            &mut dst,
            0.0,
            255.0,
            imgproc::THRESH_BINARY_INV | imgproc::THRESH_OTSU,
        )
        .map_err(|e| MediaError::preprocess_failed(format!("otsu threshold: {e}")))?;
        Ok(dst)
    }

    /// Morphological open with a 3x3 rectangle.
    pub fn open(src: &Mat) -> MediaResult<Mat> {
        let kernel =
            imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(3, 3), Point::new(-1, -1))
                .map_err(|e| MediaError::preprocess_failed(format!("structuring element: {e}")))?;

        let mut dst = Mat::default();
        imgproc::morphology_ex_def(src, &mut dst, imgproc::MORPH_OPEN, &kernel)
            .map_err(|e| MediaError::preprocess_failed(format!("morphology open: {e}")))?;
        Ok(dst)
    }

    /// Linear stretch around mid-grey, saturating at both ends.
    pub fn contrast(src: &Mat) -> MediaResult<Mat> {
        let alpha = 131.0 * (CONTRAST + 127.0) / (127.0 * (131.0 - CONTRAST));
        let gamma = 127.0 * (1.0 - alpha);

        let mut dst = Mat::default();
        core::add_weighted(src, alpha, src, 0.0, gamma, &mut dst, -1)
            .map_err(|e| MediaError::preprocess_failed(format!("contrast: {e}")))?;
        Ok(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White page with a block of `ink` in the middle.
    fn page_with_ink(ink: [u8; 3]) -> Frame {
        let (w, h) = (20u32, 20u32);
        let mut frame = Frame::filled(0, w, h, [255, 255, 255]);
        for y in 8..12 {
            for x in 4..16 {
                let at = (y * w + x) as usize * 3;
                frame.data[at..at + 3].copy_from_slice(&ink);
            }
        }
        frame
    }

    #[test]
    fn test_default_options_take_blue_plane() {
        let frame = Frame::filled(0, 4, 4, [90, 10, 40]);
        let plane = preprocess(&frame, &PreprocessOptions::default()).unwrap();
        assert!(plane.pixels().all(|p| p.0[0] == 40));
    }

    #[test]
    fn test_red_text_on_white_keeps_contrast() {
        let plane = preprocess(&page_with_ink([220, 0, 0]), &PreprocessOptions::default()).unwrap();
        let page = plane.get_pixel(0, 0).0[0];
        let ink = plane.get_pixel(10, 10).0[0];
        assert_eq!(page, 255);
        assert!(page - ink > 200, "ink {} too close to page {}", ink, page);
    }

    #[test]
    fn test_invert_runs_last() {
        let frame = Frame::filled(0, 2, 2, [255, 255, 255]);
        let options = PreprocessOptions {
            grayscale: true,
            invert: true,
            ..Default::default()
        };
        let plane = preprocess(&frame, &options).unwrap();
        assert!(plane.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_plain_options_always_supported() {
        let options = PreprocessOptions {
            grayscale: true,
            invert: true,
            ..Default::default()
        };
        assert!(ensure_supported(&options).is_ok());
    }

    #[cfg(feature = "opencv")]
    mod imgproc {
        use super::*;

        #[test]
        fn test_adaptive_threshold_on_flat_page() {
            let options = PreprocessOptions {
                adaptive_threshold: true,
                ..Default::default()
            };
            let plane = preprocess(&Frame::filled(0, 20, 20, [100, 100, 100]), &options).unwrap();
            assert!(plane.pixels().all(|p| p.0[0] == 220));
        }

        #[test]
        fn test_adaptive_threshold_drops_dark_ink() {
            let options = PreprocessOptions {
                adaptive_threshold: true,
                ..Default::default()
            };
            let plane = preprocess(&page_with_ink([0, 0, 0]), &options).unwrap();
            assert_eq!(plane.get_pixel(10, 10).0[0], 0);
            assert_eq!(plane.get_pixel(0, 0).0[0], 220);
        }

        #[test]
        fn test_blur_threshold_inverts_ink() {
            let options = PreprocessOptions {
                blur_threshold: true,
                ..Default::default()
            };
            let plane = preprocess(&page_with_ink([0, 0, 0]), &options).unwrap();
            assert_eq!(plane.get_pixel(10, 10).0[0], 255);
            assert_eq!(plane.get_pixel(0, 0).0[0], 0);
        }

        #[test]
        fn test_open_removes_isolated_speck() {
            let mut frame = Frame::filled(0, 9, 9, [0, 0, 0]);
            let at = (4 * 9 + 4) * 3;
            frame.data[at..at + 3].copy_from_slice(&[255, 255, 255]);
            let options = PreprocessOptions {
                morphology: true,
                ..Default::default()
            };
            let plane = preprocess(&frame, &options).unwrap();
            assert!(plane.pixels().all(|p| p.0[0] == 0));
        }

        #[test]
        fn test_contrast_saturates_extremes() {
            let options = PreprocessOptions {
                contrast: true,
                ..Default::default()
            };
            let plane = preprocess(&page_with_ink([0, 0, 20]), &options).unwrap();
            assert_eq!(plane.get_pixel(0, 0).0[0], 255);
            assert_eq!(plane.get_pixel(10, 10).0[0], 0);
        }
    }
}
