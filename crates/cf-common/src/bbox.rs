//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// `[min_lon, min_lat, max_lon, max_lat]`, the order used in store attributes.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_attribute_order() {
        let bbox = BoundingBox::new(-10.0, 30.0, 10.0, 40.0);
        assert_eq!(bbox.to_array(), [-10.0, 30.0, 10.0, 40.0]);
    }
}
