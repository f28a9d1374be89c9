//! Conversions from annotation geometry to ImageMagick argument strings

use crate::vision::{BoundingPoly, CropHintsAnnotation};

/// Google brand palette, in the order captions cycle through it
pub const GOOGLE_PALETTE: [(&str, &str); 4] = [
    ("blue", "#4285F4"),
    ("red", "#EA4335"),
    ("yellow", "#FBBC05"),
    ("green", "#34A853"),
];

/// Hex value of a palette color name, ignoring case
pub fn google_color(name: &str) -> Option<&'static str> {
    GOOGLE_PALETTE
        .iter()
        .find(|(color, _)| color.eq_ignore_ascii_case(name))
        .map(|(_, hex)| *hex)
}

/// Palette color for the `index`-th item
pub fn next_google_color(index: usize) -> &'static str {
    GOOGLE_PALETTE[index % GOOGLE_PALETTE.len()].1
}

/// Axis-aligned box of a polygon as (x, y, width, height)
pub fn bounding_box(poly: &BoundingPoly) -> Option<(i64, i64, i64, i64)> {
    let (min_x, min_y, max_x, max_y) = poly.bounds()?;
    Some((min_x, min_y, max_x - min_x, max_y - min_y))
}

/// `WxH+X+Y` geometry of the first crop hint
pub fn crop_hints_to_geometry(annotation: &CropHintsAnnotation) -> Option<String> {
    let hint = annotation.crop_hints.first()?;
    let (x, y, width, height) = bounding_box(&hint.bounding_poly)?;
    Some(format!("{}x{}+{}+{}", width, height, x, y))
}

/// Largest square centred inside the first crop hint, as `SxS+X+Y`
pub fn crop_hints_to_square(annotation: &CropHintsAnnotation) -> Option<(String, i64)> {
    let hint = annotation.crop_hints.first()?;
    let (x, y, width, height) = bounding_box(&hint.bounding_poly)?;
    let side = width.min(height);
    let geometry = format!(
        "{}x{}+{}+{}",
        side,
        side,
        x + (width - side) / 2,
        y + (height - side) / 2
    );
    Some((geometry, side))
}

/// Draw primitive for a circle inscribed in a `side`-pixel square
pub fn inscribed_circle(side: i64) -> String {
    let radius = side / 2;
    format!("circle {},{} {},0", radius, radius, radius)
}

/// Vertices as `x,y x,y ...`
pub fn face_annotation_to_bounding_poly(poly: &BoundingPoly) -> String {
    poly.vertices
        .iter()
        .map(|v| format!("{},{}", v.x, v.y))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Draw string with one `polygon` primitive per annotation
pub fn annotations_to_polygons<'a>(polys: impl IntoIterator<Item = &'a BoundingPoly>) -> String {
    polys
        .into_iter()
        .filter(|poly| !poly.vertices.is_empty())
        .map(|poly| format!("polygon {}", face_annotation_to_bounding_poly(poly)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `WxH` size of an annotation's bounding box
pub fn annotation_dimensions(poly: &BoundingPoly) -> String {
    let (_, _, width, height) = bounding_box(poly).unwrap_or_default();
    format!("{}x{}", width, height)
}

/// `+X+Y` offset of an annotation's bounding box
pub fn annotation_coordinate(poly: &BoundingPoly) -> String {
    let (x, y, _, _) = bounding_box(poly).unwrap_or_default();
    format!("+{}+{}", x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{CropHint, Vertex};

    fn poly(points: &[(i64, i64)]) -> BoundingPoly {
        BoundingPoly::new(points.iter().map(|&(x, y)| Vertex::new(x, y)).collect())
    }

    fn hints(points: &[(i64, i64)]) -> CropHintsAnnotation {
        CropHintsAnnotation {
            crop_hints: vec![CropHint {
                bounding_poly: poly(points),
                confidence: 1.0,
            }],
        }
    }

    #[test]
    fn test_crop_hints_to_geometry() {
        let square = hints(&[(0, 0), (100, 0), (0, 100), (100, 100)]);
        assert_eq!(crop_hints_to_geometry(&square).unwrap(), "100x100+0+0");

        let offset = hints(&[(10, 15), (100, 100), (100, 15), (10, 100)]);
        assert_eq!(crop_hints_to_geometry(&offset).unwrap(), "90x85+10+15");

        assert!(crop_hints_to_geometry(&CropHintsAnnotation::default()).is_none());
    }

    #[test]
    fn test_crop_hints_to_square() {
        let wide = hints(&[(0, 0), (200, 0), (200, 100), (0, 100)]);
        let (geometry, side) = crop_hints_to_square(&wide).unwrap();
        assert_eq!(geometry, "100x100+50+0");
        assert_eq!(side, 100);
        assert_eq!(inscribed_circle(side), "circle 50,50 50,0");
    }

    #[test]
    fn test_face_annotation_to_bounding_poly() {
        let face = poly(&[(1, 2), (3, 4), (5, 6), (7, 8)]);
        assert_eq!(face_annotation_to_bounding_poly(&face), "1,2 3,4 5,6 7,8");
    }

    #[test]
    fn test_annotations_to_polygons() {
        let a = poly(&[(0, 0), (1, 0), (1, 1)]);
        let b = poly(&[(5, 5), (6, 5), (6, 6)]);
        let empty = BoundingPoly::default();
        assert_eq!(
            annotations_to_polygons([&a, &empty, &b]),
            "polygon 0,0 1,0 1,1 polygon 5,5 6,5 6,6"
        );
        assert_eq!(annotations_to_polygons(std::iter::empty()), "");
    }

    #[test]
    fn test_annotation_dimensions_and_coordinate() {
        let face = poly(&[(10, 20), (60, 20), (60, 90), (10, 90)]);
        assert_eq!(annotation_dimensions(&face), "50x70");
        assert_eq!(annotation_coordinate(&face), "+10+20");
    }

    #[test]
    fn test_palette() {
        assert_eq!(google_color("blue"), Some("#4285F4"));
        assert_eq!(google_color("RED"), Some("#EA4335"));
        assert_eq!(google_color("magenta"), None);
        assert_eq!(next_google_color(0), "#4285F4");
        assert_eq!(next_google_color(5), "#EA4335");
    }
}
