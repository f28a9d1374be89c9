//! Annotation payloads returned by the vision service
//!
//! Field names follow the service's camelCase JSON; the service omits zero
//! coordinates and absent likelihoods, so everything has a default.

use serde::{Deserialize, Serialize};

/// Any value the service adds later reads as `Unknown`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Likelihood {
    /// `LIKELY` or `VERY_LIKELY`
    pub fn is_likely(self) -> bool {
        matches!(self, Likelihood::Likely | Likelihood::VeryLikely)
    }

    /// `POSSIBLE` or stronger
    pub fn is_plausible(self) -> bool {
        matches!(
            self,
            Likelihood::Possible | Likelihood::Likely | Likelihood::VeryLikely
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

impl Vertex {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

impl BoundingPoly {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned bounds as (min x, min y, max x, max y)
    pub fn bounds(&self) -> Option<(i64, i64, i64, i64)> {
        let first = self.vertices.first()?;
        Some(self.vertices.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), v| {
                (min_x.min(v.x), min_y.min(v.y), max_x.max(v.x), max_y.max(v.y))
            },
        ))
    }
}

/// Label, landmark and logo results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAnnotation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub bounding_poly: BoundingPoly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnnotation {
    #[serde(default)]
    pub bounding_poly: BoundingPoly,
    #[serde(default)]
    pub joy_likelihood: Likelihood,
    #[serde(default)]
    pub sorrow_likelihood: Likelihood,
    #[serde(default)]
    pub anger_likelihood: Likelihood,
    #[serde(default)]
    pub surprise_likelihood: Likelihood,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeSearchAnnotation {
    #[serde(default)]
    pub adult: Likelihood,
    #[serde(default)]
    pub spoof: Likelihood,
    #[serde(default)]
    pub medical: Likelihood,
    #[serde(default)]
    pub violence: Likelihood,
    #[serde(default)]
    pub racy: Likelihood,
}

impl SafeSearchAnnotation {
    /// Adult, violent or racy content is likely
    pub fn is_unsafe(&self) -> bool {
        [self.adult, self.violence, self.racy]
            .iter()
            .any(|likelihood| likelihood.is_likely())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropHint {
    #[serde(default)]
    pub bounding_poly: BoundingPoly,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropHintsAnnotation {
    #[serde(default)]
    pub crop_hints: Vec<CropHint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub message: String,
}

/// One entry of an `images:annotate` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    pub label_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    pub landmark_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    pub logo_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    pub face_annotations: Vec<FaceAnnotation>,
    #[serde(default)]
    pub safe_search_annotation: Option<SafeSearchAnnotation>,
    #[serde(default)]
    pub crop_hints_annotation: Option<CropHintsAnnotation>,
    #[serde(default)]
    pub error: Option<ServiceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_search_verdicts() {
        let adult: SafeSearchAnnotation =
            serde_json::from_value(json!({"adult": "VERY_LIKELY"})).unwrap();
        assert!(adult.is_unsafe());

        let violent: SafeSearchAnnotation =
            serde_json::from_value(json!({"violence": "LIKELY"})).unwrap();
        assert!(violent.is_unsafe());

        let control: SafeSearchAnnotation = serde_json::from_value(json!({})).unwrap();
        assert!(!control.is_unsafe());

        let mild: SafeSearchAnnotation =
            serde_json::from_value(json!({"adult": "UNLIKELY", "racy": "POSSIBLE"})).unwrap();
        assert!(!mild.is_unsafe());
    }

    #[test]
    fn test_unrecognized_likelihood_is_unknown() {
        let annotation: SafeSearchAnnotation =
            serde_json::from_value(json!({"medical": "SOMEWHAT", "adult": "SOMETHING_NEW"}))
                .unwrap();
        assert_eq!(annotation.medical, Likelihood::Unknown);
        assert_eq!(annotation.adult, Likelihood::Unknown);
        assert!(!annotation.adult.is_likely());
        assert!(!annotation.adult.is_plausible());
        assert!(!annotation.is_unsafe());

        let face: FaceAnnotation =
            serde_json::from_value(json!({"joyLikelihood": "SOMETHING_NEW"})).unwrap();
        assert!(!face.joy_likelihood.is_plausible());
    }

    #[test]
    fn test_vertices_default_missing_coordinates() {
        let vertices = json!([{}, {"x": 100}, {"x": 100, "y": 80}, {"y": 80}]);
        let poly: BoundingPoly = serde_json::from_value(json!({ "vertices": vertices })).unwrap();
        assert_eq!(poly.vertices[0], Vertex::new(0, 0));
        assert_eq!(poly.bounds(), Some((0, 0, 100, 80)));
        assert_eq!(BoundingPoly::default().bounds(), None);
    }

    #[test]
    fn test_annotate_response_parsing() {
        let response: AnnotateImageResponse = serde_json::from_value(json!({
            "labelAnnotations": [{"description": "cat", "score": 0.98}],
            "faceAnnotations": [{"joyLikelihood": "VERY_LIKELY"}]
        }))
        .unwrap();
        assert_eq!(response.label_annotations[0].description, "cat");
        assert!(response.face_annotations[0].joy_likelihood.is_plausible());
        assert!(response.safe_search_annotation.is_none());
    }
}
