use derivative::Derivative;
use log::debug;

use crate::data::input::DatasetStore;
use crate::data::{DepthMap, ImageId, SceneId};
use crate::error::Result;
use crate::params::DatasetParams;

/// Keeps the depth image of the last requested test image, scaled to millimeters
///
/// Result files are visited in name order, so all objects of one image come one after
/// another and a single slot is enough.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct DepthCache<'a, S: DatasetStore + ?Sized> {
    #[derivative(Debug = "ignore")]
    store: &'a S,
    #[derivative(Debug = "ignore")]
    params: &'a DatasetParams,
    #[derivative(Debug = "ignore")]
    slot: Option<((SceneId, ImageId), DepthMap)>,
    loads: usize,
}

impl<'a, S: DatasetStore + ?Sized> DepthCache<'a, S> {
    pub fn new(store: &'a S, params: &'a DatasetParams) -> Self {
        Self {
            store,
            params,
            slot: None,
            loads: 0,
        }
    }

    pub fn get(&mut self, scene_id: SceneId, im_id: ImageId) -> Result<&DepthMap> {
        let key = (scene_id, im_id);
        let depth = match self.slot.take() {
            Some((cached, depth)) if cached == key => depth,
            _ => {
                let path = self.params.depth_path(scene_id, im_id);
                let depth = self
                    .store
                    .load_depth(&path)?
                    .scaled(self.params.depth_scale);
                self.loads += 1;
                debug!("Loaded depth image {} ({})", path.display(), depth.size());
                depth
            }
        };
        Ok(&self.slot.insert((key, depth)).1)
    }

    /// Number of depth images read from the store so far
    pub fn load_count(&self) -> usize {
        self.loads
    }
}
