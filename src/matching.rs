use std::collections::BTreeMap;

use crate::data::{GroundTruthPose, GtId, ObjectId};

/// Ground-truth poses of `obj_id` in one image, keyed by their position in `gts`
///
/// An empty map is a valid outcome: the estimate is still reported, with no errors.
pub fn match_gt(obj_id: ObjectId, gts: &[GroundTruthPose]) -> BTreeMap<GtId, &GroundTruthPose> {
    gts.iter()
        .enumerate()
        .filter(|(_, gt)| gt.obj_id == obj_id)
        .collect()
}
