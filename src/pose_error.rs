//! # Pose error functions
//!
//! Every function returns `None` when the error is not computable for the given pair,
//! e.g. an empty model or an object that is visible under neither pose.

use geo::prelude::{Area, ConvexHull};
use geo::{polygon, MultiPoint, MultiPolygon, Point, Polygon};
use geo_clipper::Clipper;
use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use once_cell::sync::Lazy;
use strum_macros::{Display, EnumString};

use crate::data::{CamK, DepthMap, ImageSize, ObjectModel, Pose};

/// Clipper works on integers, pixel coordinates are scaled by this before clipping
const CLIPPER_FACTOR: f64 = 1e3;

/// Per-pixel cost of a misaligned visible pixel in VSD
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum VsdCost {
    /// 1 when the distance difference reaches tau, 0 otherwise
    Step,
    /// Difference divided by tau, saturated at 1
    TLinear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VsdParams {
    /// Tolerance used for the visibility test [mm]
    pub delta: f64,
    /// Misalignment tolerance [mm]
    pub tau: f64,
    pub cost: VsdCost,
}

#[inline]
fn finite(e: f64) -> Option<f64> {
    if e.is_finite() {
        Some(e)
    } else {
        None
    }
}

/// Rotational error in degrees
pub fn re(r_est: &Matrix3<f64>, r_gt: &Matrix3<f64>) -> Option<f64> {
    let r_gt_inv = r_gt.try_inverse()?;
    let trace = (r_est * r_gt_inv).trace().max(-1.0).min(3.0);
    finite(((trace - 1.0) / 2.0).acos().to_degrees())
}

/// Translational error, in the unit of the translations
pub fn te(t_est: &Vector3<f64>, t_gt: &Vector3<f64>) -> Option<f64> {
    finite((t_est - t_gt).norm())
}

/// Average distance of model points (distinguishable views)
pub fn add(est: &Pose, gt: &Pose, model: &ObjectModel) -> Option<f64> {
    if model.pts.is_empty() {
        return None;
    }
    let sum: f64 = model
        .pts
        .iter()
        .map(|pt| (est.transform(pt) - gt.transform(pt)).norm())
        .sum();
    finite(sum / model.pts.len() as f64)
}

/// Vertices of a posed model, bucket size large enough for dense CAD faces
type VertexTree = KdTree<f64, u64, 3, 256, u32>;

/// Oblique frame the vertex tree is built in. Axis-aligned model faces would
/// otherwise put whole buckets on a single split coordinate.
static TREE_FRAME: Lazy<Rotation3<f64>> = Lazy::new(|| Rotation3::from_euler_angles(0.3, 0.7, 1.1));

#[inline]
fn tree_coords(pt: &Point3<f64>) -> [f64; 3] {
    let pt = TREE_FRAME.transform_point(pt);
    [pt.x, pt.y, pt.z]
}

fn is_finite_pose(pose: &Pose) -> bool {
    pose.r.iter().chain(pose.t.iter()).all(|v| v.is_finite())
}

/// Average distance of model points (indistinguishable views)
///
/// For every point under the ground-truth pose, the distance to the closest point
/// under the estimated pose.
pub fn adi(est: &Pose, gt: &Pose, model: &ObjectModel) -> Option<f64> {
    if model.pts.is_empty() || !is_finite_pose(est) || !is_finite_pose(gt) {
        return None;
    }
    let mut tree = VertexTree::new();
    for (i, pt) in model.pts.iter().enumerate() {
        tree.add(&tree_coords(&est.transform(pt)), i as u64);
    }
    let sum: f64 = model
        .pts
        .iter()
        .map(|pt| {
            tree.nearest_one::<SquaredEuclidean>(&tree_coords(&gt.transform(pt)))
                .distance
                .sqrt()
        })
        .sum();
    finite(sum / model.pts.len() as f64)
}

/// Pixel coordinates of a camera-frame point, `None` behind the camera
#[inline]
fn project(cam_k: &CamK, pt: &Point3<f64>) -> Option<(f64, f64)> {
    if pt.z <= 0.0 {
        return None;
    }
    let h = cam_k * pt.coords;
    Some((h.x / h.z, h.y / h.z))
}

/// Projected outline of the model, approximated by the convex hull of its projected vertices
/// and clipped to the image
fn silhouette(model: &ObjectModel, pose: &Pose, cam_k: &CamK, im_size: ImageSize) -> MultiPolygon<f64> {
    let projected: Vec<Point<f64>> = model
        .pts
        .iter()
        .filter_map(|pt| project(cam_k, &pose.transform(pt)))
        .map(|(u, v)| Point::new(u, v))
        .collect();
    if projected.len() < 3 {
        return MultiPolygon(Vec::new());
    }

    let hull: Polygon<f64> = MultiPoint::from(projected).convex_hull();
    let (w, h) = (im_size.width as f64, im_size.height as f64);
    let image_rect = polygon![
        (x: 0.0, y: 0.0),
        (x: w, y: 0.0),
        (x: w, y: h),
        (x: 0.0, y: h),
    ];
    hull.intersection(&image_rect, CLIPPER_FACTOR)
}

/// Complement over union of the projected silhouettes
///
/// When neither silhouette falls into the image the union is empty and the result
/// is `None`, which reports write as `-1.0`. A missed object is not scored as the
/// worst error 1.0.
pub fn cou(est: &Pose, gt: &Pose, model: &ObjectModel, im_size: ImageSize, cam_k: &CamK) -> Option<f64> {
    let (sil_est, sil_gt) = (
        silhouette(model, est, cam_k, im_size),
        silhouette(model, gt, cam_k, im_size),
    );
    let union_area = sil_est.union(&sil_gt, CLIPPER_FACTOR).unsigned_area();
    if union_area <= 0.0 {
        return None;
    }
    let inter_area = sil_est.intersection(&sil_gt, CLIPPER_FACTOR).unsigned_area();
    finite(1.0 - inter_area / union_area)
}

/// Depth image of the model under `pose`, one z-buffered splat per vertex, 0 where empty
pub fn render_depth(model: &ObjectModel, pose: &Pose, cam_k: &CamK, im_size: ImageSize) -> DepthMap {
    let (w, h) = (im_size.width as usize, im_size.height as usize);
    let mut depth_map = DepthMap::zeros(im_size);
    let depth = depth_map.values_mut();
    for pt in &model.pts {
        let pt_c = pose.transform(pt);
        let (u, v) = match project(cam_k, &pt_c) {
            Some(uv) => uv,
            None => continue,
        };
        let (u, v) = (u.round(), v.round());
        if u < 0.0 || v < 0.0 || u >= w as f64 || v >= h as f64 {
            continue;
        }
        let idx = v as usize * w + u as usize;
        if depth[idx] == 0.0 || pt_c.z < depth[idx] {
            depth[idx] = pt_c.z;
        }
    }
    depth_map
}

/// Converts a depth image (z along the optical axis) into distances from the camera center
pub fn depth_to_dist(depth: &DepthMap, cam_k: &CamK) -> Vec<f64> {
    let (fx, fy, cx, cy) = (cam_k[(0, 0)], cam_k[(1, 1)], cam_k[(0, 2)], cam_k[(1, 2)]);
    let w = depth.width() as usize;
    depth
        .values()
        .iter()
        .enumerate()
        .map(|(idx, &z)| {
            let (u, v) = ((idx % w) as f64, (idx / w) as f64);
            let xs = (u - cx) * z / fx;
            let ys = (v - cy) * z / fy;
            (xs * xs + ys * ys + z * z).sqrt()
        })
        .collect()
}

/// Pixels where the model surface is in front of (or within `delta` behind) the test surface
#[inline]
fn visible(dist_test: f64, dist_model: f64, delta: f64) -> bool {
    dist_model > 0.0 && dist_test > 0.0 && dist_model - dist_test <= delta
}

/// Visible surface discrepancy
///
/// `depth_test` must already be in millimeters; its size defines the rendered area.
/// When the object is visible under neither pose the union is empty and the result
/// is `None` (written as `-1.0`), not the worst error 1.0.
pub fn vsd(
    est: &Pose,
    gt: &Pose,
    model: &ObjectModel,
    depth_test: &DepthMap,
    params: &VsdParams,
    cam_k: &CamK,
) -> Option<f64> {
    let im_size = depth_test.size();
    let dist_test = depth_to_dist(depth_test, cam_k);
    let dist_est = depth_to_dist(&render_depth(model, est, cam_k, im_size), cam_k);
    let dist_gt = depth_to_dist(&render_depth(model, gt, cam_k, im_size), cam_k);

    let (mut n_union, mut n_inter, mut cost_sum) = (0usize, 0usize, 0f64);
    for ((&d_test, &d_est), &d_gt) in dist_test.iter().zip(&dist_est).zip(&dist_gt) {
        let visib_gt = visible(d_test, d_gt, params.delta);
        // where the GT surface is visible, any estimated surface counts as visible
        let visib_est = visible(d_test, d_est, params.delta) || (visib_gt && d_est > 0.0);

        if visib_gt || visib_est {
            n_union += 1;
        }
        if visib_gt && visib_est {
            n_inter += 1;
            let diff = (d_gt - d_est).abs();
            cost_sum += match params.cost {
                VsdCost::Step => {
                    if diff >= params.tau {
                        1.0
                    } else {
                        0.0
                    }
                }
                VsdCost::TLinear => (diff / params.tau).min(1.0),
            };
        }
    }

    if n_union == 0 {
        return None;
    }
    finite((cost_sum + (n_union - n_inter) as f64) / n_union as f64)
}
