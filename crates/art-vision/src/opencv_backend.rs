//! [`VisionBackend`] implementation backed by the `opencv` crate.

use art_core::types::{Descriptor, DescriptorSet, Keypoint};
use opencv::core::{Mat, MatTraitConst, Point2f, Size, TermCriteria, TermCriteria_Type, Vector};
use opencv::prelude::*;
use opencv::{calib3d, core, features2d, imgproc, video};

use crate::backend::{
    BackendError, ExtractionParams, FlowPoint, GrayImage, HomographyFit, KnnMatch, PointPair,
    VisionBackend,
};

/// Binary-descriptor ORB extractor plus brute-force Hamming matcher,
/// wired the way the retrieval pack's OpenCV-based trackers use them.
pub struct OpenCvBackend {
    orb: core::Ptr<features2d::ORB>,
}

impl OpenCvBackend {
    pub fn new() -> Result<Self, BackendError> {
        let orb = features2d::ORB::create_def().map_err(opencv_err)?;
        Ok(Self { orb })
    }

    fn preprocess(&self, image: GrayImage<'_>) -> Result<Mat, BackendError> {
        let raw = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                image.height as i32,
                image.width as i32,
                core::CV_8UC1,
                image.data.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(opencv_err)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            &raw,
            &mut blurred,
            Size::new(3, 3),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
            core::ALGO_HINT_DEFAULT,
        )
        .map_err(opencv_err)?;

        let mut equalised = Mat::default();
        imgproc::equalize_hist(&blurred, &mut equalised).map_err(opencv_err)?;
        Ok(equalised)
    }
}

fn opencv_err(e: opencv::Error) -> BackendError {
    BackendError::Operation(e.to_string())
}

impl VisionBackend for OpenCvBackend {
    fn extract_features(
        &self,
        image: GrayImage<'_>,
        params: ExtractionParams,
    ) -> Result<DescriptorSet, BackendError> {
        let prepared = self.preprocess(image)?;

        let mut orb = features2d::ORB::create(
            (params.max_features * 2).max(500) as i32,
            1.2,
            8,
            31,
            0,
            2,
            features2d::ORB_ScoreType::HARRIS_SCORE,
            31,
            params.detector_threshold as i32,
        )
        .map_err(opencv_err)?;

        let mut keypoints = Vector::<core::KeyPoint>::new();
        let mut descriptors = Mat::default();
        let mask = Mat::default();
        opencv::prelude::Feature2DTrait::detect_and_compute(
            &mut orb,
            &prepared,
            &mask,
            &mut keypoints,
            &mut descriptors,
            false,
        )
        .map_err(opencv_err)?;

        let mut kps: Vec<Keypoint> = Vec::with_capacity(keypoints.len());
        let mut descs: Vec<Descriptor> = Vec::with_capacity(keypoints.len());
        let width = descriptors.cols().max(0) as usize;
        for i in 0..keypoints.len() {
            let k = keypoints.get(i).map_err(opencv_err)?;
            kps.push(Keypoint {
                x: k.pt().x,
                y: k.pt().y,
                response: k.response(),
                size: k.size(),
                angle: k.angle(),
            });
            let row = descriptors.row(i as i32).map_err(opencv_err)?;
            let mut bytes = vec![0u8; width];
            for (j, b) in bytes.iter_mut().enumerate() {
                *b = *row.at::<u8>(j as i32).map_err(opencv_err)?;
            }
            descs.push(bytes);
        }

        let mut set = DescriptorSet::new(kps, descs).map_err(|e| BackendError::Operation(e.to_string()))?;
        set.truncate_by_response(params.max_features);
        Ok(set)
    }

    fn knn_match(
        &self,
        query: &[Vec<u8>],
        train: &[Vec<u8>],
    ) -> Result<Vec<KnnMatch>, BackendError> {
        if query.is_empty() || train.is_empty() {
            return Ok(Vec::new());
        }
        let query_mat = descriptors_to_mat(query)?;
        let train_mat = descriptors_to_mat(train)?;

        let matcher = features2d::BFMatcher::new(core::NORM_HAMMING, false).map_err(opencv_err)?;
        let mut knn_matches = Vector::<Vector<core::DMatch>>::new();
        let k = if train.len() >= 2 { 2 } else { 1 };
        matcher
            .knn_train_match(
                &query_mat,
                &train_mat,
                &mut knn_matches,
                k,
                &Mat::default(),
                false,
            )
            .map_err(opencv_err)?;

        let mut out = Vec::with_capacity(knn_matches.len());
        for i in 0..knn_matches.len() {
            let neighbours = knn_matches.get(i).map_err(opencv_err)?;
            if neighbours.is_empty() {
                continue;
            }
            let best = neighbours.get(0).map_err(opencv_err)?;
            let second = if neighbours.len() > 1 {
                Some(neighbours.get(1).map_err(opencv_err)?.distance)
            } else {
                None
            };
            out.push(KnnMatch {
                query_index: best.query_idx as usize,
                train_index: best.train_idx as usize,
                distance_1: best.distance,
                distance_2: second,
            });
        }
        Ok(out)
    }

    fn find_homography(
        &self,
        correspondences: &[PointPair],
        reproj_threshold: f64,
    ) -> Result<Option<HomographyFit>, BackendError> {
        if correspondences.len() < 4 {
            return Ok(None);
        }
        let src: Vector<Point2f> = correspondences
            .iter()
            .map(|p| Point2f::new(p.from.0 as f32, p.from.1 as f32))
            .collect();
        let dst: Vector<Point2f> = correspondences
            .iter()
            .map(|p| Point2f::new(p.to.0 as f32, p.to.1 as f32))
            .collect();

        let mut mask = Mat::default();
        let h = calib3d::find_homography_ext(
            &src,
            &dst,
            calib3d::RANSAC,
            reproj_threshold,
            &mut mask,
            2000,
            0.995,
        )
        .map_err(opencv_err)?;

        if h.empty() || h.rows() != 3 || h.cols() != 3 {
            return Ok(None);
        }

        let mut rows = [[0.0f64; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                rows[r][c] = *h.at_2d::<f64>(r as i32, c as i32).map_err(opencv_err)?;
            }
        }
        if rows[2][2].abs() < 1e-12 && rows.iter().flatten().all(|v| v.abs() < 1e-12) {
            return Ok(None);
        }

        let mut inlier_mask = Vec::with_capacity(correspondences.len());
        for i in 0..correspondences.len() {
            let v = if mask.rows() > i as i32 {
                *mask.at::<u8>(i as i32).map_err(opencv_err)?
            } else {
                0
            };
            inlier_mask.push(v != 0);
        }

        Ok(Some(HomographyFit {
            homography: art_core::types::Homography(rows),
            inlier_mask,
        }))
    }

    fn good_features_to_track(
        &self,
        image: GrayImage<'_>,
        mask: &[u8],
        max_corners: usize,
        quality_level: f64,
        min_distance: f64,
    ) -> Result<Vec<(f32, f32)>, BackendError> {
        let src = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                image.height as i32,
                image.width as i32,
                core::CV_8UC1,
                image.data.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(opencv_err)?;

        let mask_mat = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                image.height as i32,
                image.width as i32,
                core::CV_8UC1,
                mask.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(opencv_err)?;

        let mut corners = Vector::<Point2f>::new();
        imgproc::good_features_to_track(
            &src,
            &mut corners,
            max_corners as i32,
            quality_level,
            min_distance,
            &mask_mat,
            3,
            false,
            0.04,
        )
        .map_err(opencv_err)?;

        Ok(corners.iter().map(|p| (p.x, p.y)).collect())
    }

    fn calc_optical_flow(
        &self,
        prev: GrayImage<'_>,
        next: GrayImage<'_>,
        points: &[(f32, f32)],
        win_size: u32,
        max_level: u32,
    ) -> Result<Vec<FlowPoint>, BackendError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let prev_mat = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                prev.height as i32,
                prev.width as i32,
                core::CV_8UC1,
                prev.data.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(opencv_err)?;
        let next_mat = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                next.height as i32,
                next.width as i32,
                core::CV_8UC1,
                next.data.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(opencv_err)?;

        let prev_pts: Vector<Point2f> = points.iter().map(|p| Point2f::new(p.0, p.1)).collect();
        let mut next_pts = Vector::<Point2f>::new();
        let mut status = Vector::<u8>::new();
        let mut err = Vector::<f32>::new();

        video::calc_optical_flow_pyr_lk(
            &prev_mat,
            &next_mat,
            &prev_pts,
            &mut next_pts,
            &mut status,
            &mut err,
            Size::new(win_size as i32, win_size as i32),
            max_level as i32,
            TermCriteria::new(
                (TermCriteria_Type::COUNT as i32) | (TermCriteria_Type::EPS as i32),
                10,
                0.03,
            )
            .map_err(opencv_err)?,
            0,
            1e-4,
        )
        .map_err(opencv_err)?;

        let mut out = Vec::with_capacity(points.len());
        for i in 0..points.len() {
            let p = next_pts.get(i).map_err(opencv_err)?;
            let found = status.get(i).map_err(opencv_err)? != 0;
            let error = err.get(i).map_err(opencv_err)?;
            out.push(FlowPoint {
                point: (p.x, p.y),
                found,
                error,
            });
        }
        Ok(out)
    }

    fn resize(
        &self,
        image: GrayImage<'_>,
        new_width: u32,
        new_height: u32,
    ) -> Result<Vec<u8>, BackendError> {
        let src = unsafe {
            Mat::new_rows_cols_with_data_unsafe(
                image.height as i32,
                image.width as i32,
                core::CV_8UC1,
                image.data.as_ptr() as *mut std::ffi::c_void,
                core::Mat_AUTO_STEP,
            )
        }
        .map_err(opencv_err)?;

        let mut resized = Mat::default();
        imgproc::resize(
            &src,
            &mut resized,
            Size::new(new_width as i32, new_height as i32),
            0.0,
            0.0,
            imgproc::INTER_AREA,
        )
        .map_err(opencv_err)?;

        let mut out = vec![0u8; (new_width as usize) * (new_height as usize)];
        for y in 0..new_height as i32 {
            for x in 0..new_width as i32 {
                out[(y as usize) * (new_width as usize) + x as usize] =
                    *resized.at_2d::<u8>(y, x).map_err(opencv_err)?;
            }
        }
        Ok(out)
    }
}

fn descriptors_to_mat(descs: &[Vec<u8>]) -> Result<Mat, BackendError> {
    let width = descs.first().map(|d| d.len()).unwrap_or(0);
    let mut mat = unsafe {
        Mat::new_rows_cols(descs.len() as i32, width as i32, core::CV_8UC1)
    }
    .map_err(opencv_err)?;
    for (i, row) in descs.iter().enumerate() {
        for (j, b) in row.iter().enumerate() {
            *mat.at_2d_mut::<u8>(i as i32, j as i32).map_err(opencv_err)? = *b;
        }
    }
    Ok(mat)
}
